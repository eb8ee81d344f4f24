//! CSS selectors over the arena
//!
//! Parsing and matching are done by Servo's `selectors` crate. This module
//! supplies the `SelectorImpl` (no pseudo-elements, no non-tree-structural
//! pseudo-classes) and an [`Element`] view of arena nodes.

use cssparser::{serialize_identifier, CssStringWriter, Parser as CssParser, ParserInput, ToCss};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::QuirksMode;
use selectors::matching::{
    matches_selector_list, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext,
    MatchingMode, NeedsSelectorFlags,
};
use selectors::parser::{self, ParseRelative, SelectorImpl, SelectorParseErrorKind};
use selectors::{Element, NthIndexCache, OpaqueElement};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CssIdent(String);

impl AsRef<str> for CssIdent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CssIdent {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for CssIdent {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for CssIdent {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        serialize_identifier(&self.0, dest)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CssAttrValue(String);

impl AsRef<str> for CssAttrValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for CssAttrValue {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for CssAttrValue {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        use std::fmt::Write;
        dest.write_char('"')?;
        write!(CssStringWriter::new(dest), "{}", &self.0)?;
        dest.write_char('"')
    }
}

/// Uninhabited: nothing beyond tree-structural pseudo-classes is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoPseudo {}

impl ToCss for NoPseudo {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

impl parser::NonTSPseudoClass for NoPseudo {
    type Impl = DomSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl parser::PseudoElement for NoPseudo {
    type Impl = DomSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        match *self {}
    }

    fn valid_after_slotted(&self) -> bool {
        match *self {}
    }
}

#[derive(Clone, Debug)]
pub enum DomSelectors {}

impl SelectorImpl for DomSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssAttrValue;
    type Identifier = CssIdent;
    type LocalName = CssIdent;
    type NamespaceUrl = CssIdent;
    type NamespacePrefix = CssIdent;
    type BorrowedNamespaceUrl = str;
    type BorrowedLocalName = str;
    type NonTSPseudoClass = NoPseudo;
    type PseudoElement = NoPseudo;
}

struct PredicateParser;

impl<'i> parser::Parser<'i> for PredicateParser {
    type Impl = DomSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }
}

/// Element view of one arena node, as `selectors` sees it
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    arena: &'a DomArena,
    node: &'a DomNode,
}

impl<'a> ElementRef<'a> {
    /// `None` for unknown ids and non-element nodes
    pub fn new(arena: &'a DomArena, node_id: NodeId) -> Option<Self> {
        let node = arena.get(node_id).ok()?;
        node.is_element().then_some(Self { arena, node })
    }

    fn siblings(&self) -> &'a [NodeId] {
        self.node
            .parent_id
            .and_then(|parent| self.arena.get(parent).ok())
            .map(|parent| &parent.children_ids[..])
            .unwrap_or(&[])
    }

    fn position(&self, siblings: &[NodeId]) -> Option<usize> {
        siblings.iter().position(|&id| id == self.node.node_id)
    }

    fn first_element<I>(&self, ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        ids.into_iter().find_map(|&id| Self::new(self.arena, id))
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> #{}", self.node.node_name, self.node.node_id)
    }
}

impl<'a> Element for ElementRef<'a> {
    type Impl = DomSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.node)
    }

    fn parent_element(&self) -> Option<Self> {
        self.node
            .parent_id
            .and_then(|parent| Self::new(self.arena, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let index = self.position(siblings)?;
        self.first_element(siblings[..index].iter().rev())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let index = self.position(siblings)?;
        self.first_element(&siblings[index + 1..])
    }

    fn first_element_child(&self) -> Option<Self> {
        self.first_element(&self.node.children_ids[..])
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &str) -> bool {
        self.node.node_name.eq_ignore_ascii_case(name)
    }

    fn has_namespace(&self, _ns: &str) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.node.node_name == other.node.node_name
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&CssIdent>,
        local_name: &CssIdent,
        operation: &AttrSelectorOperation<&CssAttrValue>,
    ) -> bool {
        self.node
            .attr(local_name.as_ref())
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NoPseudo,
        _context: &mut MatchingContext<DomSelectors>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &NoPseudo,
        _context: &mut MatchingContext<DomSelectors>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.node.node_name == "a" && self.node.has_attr("href")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssIdent, case_sensitivity: CaseSensitivity) -> bool {
        self.node
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(value.as_bytes(), id.as_ref().as_bytes()))
    }

    fn has_class(&self, name: &CssIdent, case_sensitivity: CaseSensitivity) -> bool {
        self.node
            .class_list()
            .any(|class| case_sensitivity.eq(class.as_bytes(), name.as_ref().as_bytes()))
    }

    fn imported_part(&self, _name: &CssIdent) -> Option<CssIdent> {
        None
    }

    fn is_part(&self, _name: &CssIdent) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.node.children_ids.iter().any(|&id| {
            self.arena
                .get(id)
                .is_ok_and(|child| child.is_element() || (child.is_text() && !child.node_value.is_empty()))
        })
    }

    fn is_root(&self) -> bool {
        self.parent_element().is_none()
    }
}

type ParsedList = parser::SelectorList<DomSelectors>;

fn parse_one(source: &str) -> Result<ParsedList> {
    let mut input = ParserInput::new(source);
    let mut css = CssParser::new(&mut input);
    ParsedList::parse(&PredicateParser, &mut css, ParseRelative::No).map_err(|e| {
        DomError::SelectorParse {
            selector: source.to_string(),
            line: e.location.line,
            column: e.location.column,
            reason: format!("{:?}", e.kind),
        }
    })
}

/// A parsed, comma separated selector list
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    lists: Vec<ParsedList>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.trim().to_string(),
            lists: vec![parse_one(source)?],
        })
    }

    /// Parse several selector strings into one list, in order.
    pub fn parse_many<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = Vec::new();
        let mut lists = Vec::new();
        for source in sources {
            let source = source.as_ref();
            lists.push(parse_one(source)?);
            joined.push(source.trim().to_string());
        }
        Ok(Self {
            source: joined.join(", "),
            lists,
        })
    }

    /// An empty list matches nothing
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            lists: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Number of complex selectors across all parsed sources
    pub fn len(&self) -> usize {
        self.lists.iter().map(|list| list.0.len()).sum()
    }

    pub fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        let Some(element) = ElementRef::new(arena, node_id) else {
            return false;
        };
        let mut cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        self.lists
            .iter()
            .any(|list| matches_selector_list(list, &element, &mut context))
    }
}

impl PartialEq for SelectorList {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for SelectorList {}

impl FromStr for SelectorList {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
