//! Markup dump and node paths, for logs and test assertions

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;

#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Text nodes longer than this are cut and suffixed with `...`
    pub max_text_length: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_text_length: 200,
        }
    }
}

/// Cap text length on a char boundary
pub fn cap_text_length(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Indented markup of the subtree at `node_id`, attributes sorted by name
    pub fn serialize(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(1024);
        self.serialize_node(arena, node_id, 0, &mut output)?;
        Ok(output)
    }

    fn serialize_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;
        let indent = "  ".repeat(depth);

        match node.node_type {
            NodeType::Element => {
                output.push_str(&indent);
                output.push('<');
                output.push_str(&node.node_name);

                let mut attrs: Vec<_> = node.attributes.iter().collect();
                attrs.sort();
                for (name, value) in attrs {
                    output.push_str(&format!(" {}=\"{}\"", name, value));
                }
                output.push_str(">\n");

                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth + 1, output)?;
                }

                output.push_str(&indent);
                output.push_str("</");
                output.push_str(&node.node_name);
                output.push_str(">\n");
            }
            NodeType::Text => {
                let text = node.node_value.trim();
                if !text.is_empty() {
                    output.push_str(&indent);
                    output.push_str(&cap_text_length(text, self.config.max_text_length));
                    output.push('\n');
                }
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth, output)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Positional path like `/html[1]/body[1]/div[2]`
    pub fn node_path(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut path_parts = Vec::new();
        let mut current_id = Some(node_id);

        while let Some(id) = current_id {
            let node = arena.get(id)?;

            if node.is_element() {
                // Position among siblings with same tag name
                let position = match node.parent_id {
                    Some(parent_id) => arena
                        .children(parent_id)?
                        .into_iter()
                        .filter(|child| child.is_element() && child.node_name == node.node_name)
                        .position(|child| child.node_id == node.node_id)
                        .map(|p| p + 1)
                        .unwrap_or(1),
                    None => 1,
                };
                path_parts.push(format!("{}[{}]", node.node_name, position));
            }

            current_id = node.parent_id;
        }

        path_parts.reverse();
        Ok(format!("/{}", path_parts.join("/")))
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}
