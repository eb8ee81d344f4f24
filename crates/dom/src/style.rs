//! Inline style declarations
//!
//! The `style` attribute is the single source of truth for inline styles,
//! so a style write is an attribute write and shows up as one to observers.
//!
//! Declarations are tokenized with `cssparser`: comments are dropped,
//! whitespace collapsed, and a trailing `!important` is split off into
//! [`Declaration::important`]. Invalid declarations are skipped the way a
//! browser skips them.

use cssparser::{
    parse_important, AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, ToCss, Token,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            important: false,
        }
    }
}

struct InlineDeclarations;

impl<'i> DeclarationParser<'i> for InlineDeclarations {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Declaration, ParseError<'i, ()>> {
        let mut value = String::new();
        let mut important = false;

        while !input.is_exhausted() {
            if input.try_parse(parse_important).is_ok() {
                input.expect_exhausted()?;
                important = true;
                break;
            }
            write_component(input, &mut value)?;
        }

        let value = value.trim_end();
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        // Custom properties are case-sensitive
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        Ok(Declaration {
            name,
            value: value.to_string(),
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for InlineDeclarations {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for InlineDeclarations {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for InlineDeclarations {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Append one component value, recursing into blocks
fn write_component<'i>(input: &mut Parser<'i, '_>, out: &mut String) -> Result<(), ParseError<'i, ()>> {
    let token = input.next_including_whitespace()?.clone();
    let closing = match token {
        Token::WhiteSpace(_) => {
            if !out.is_empty() && !out.ends_with([' ', '(', '[', '{']) {
                out.push(' ');
            }
            return Ok(());
        }
        Token::Function(_) | Token::ParenthesisBlock => Some(')'),
        Token::SquareBracketBlock => Some(']'),
        Token::CurlyBracketBlock => Some('}'),
        _ => None,
    };

    out.push_str(&token.to_css_string());
    if let Some(closing) = closing {
        input.parse_nested_block(|nested| {
            while !nested.is_exhausted() {
                write_component(nested, out)?;
            }
            Ok(())
        })?;
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push(closing);
    }
    Ok(())
}

/// Parse a declaration block (the body of a `style` attribute)
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    let mut parser = Parser::new(&mut input);
    let mut declarations = InlineDeclarations;
    RuleBodyParser::new(&mut parser, &mut declarations)
        .filter_map(|item| item.ok())
        .collect()
}

pub fn serialize_declarations(decls: &[Declaration]) -> String {
    decls
        .iter()
        .map(|decl| {
            if decl.important {
                format!("{}: {} !important;", decl.name, decl.value)
            } else {
                format!("{}: {};", decl.name, decl.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Winning declaration of `property`: the last important one, else the last one
pub fn get_declaration(block: &str, property: &str) -> Option<Declaration> {
    let matching: Vec<Declaration> = parse_declarations(block)
        .into_iter()
        .filter(|decl| decl.name.eq_ignore_ascii_case(property))
        .collect();
    matching
        .iter()
        .rev()
        .find(|decl| decl.important)
        .or(matching.last())
        .cloned()
}

/// Value of `property`, like the CSSOM getter
pub fn get_property(block: &str, property: &str) -> Option<String> {
    get_declaration(block, property).map(|decl| decl.value)
}

/// Return `block` with `property` set to `value`, keeping declaration order.
///
/// The first declaration of `property` is rewritten in place and keeps its
/// `!important` flag; later duplicates are dropped.
pub fn set_property(block: &str, property: &str, value: &str) -> String {
    let property = property.to_ascii_lowercase();
    let mut decls = parse_declarations(block);
    match decls.iter().position(|decl| decl.name == property) {
        Some(first) => {
            decls[first].value = value.to_string();
            let mut index = 0;
            decls.retain(|decl| {
                let keep = index <= first || decl.name != property;
                index += 1;
                keep
            });
        }
        None => decls.push(Declaration::new(&property, value)),
    }
    serialize_declarations(&decls)
}
