//! Build an arena from a CDP `DOM.getDocument` response
//!
//! Input format:
//! ```json
//! {
//!   "root": {
//!     "nodeType": 9,
//!     "nodeName": "#document",
//!     "children": [
//!       { "nodeType": 1, "nodeName": "DIV", "attributes": ["class", "a"], "children": [] }
//!     ]
//!   }
//! }
//! ```
//!
//! `nodeId`/`backendNodeId` are ignored, the arena assigns its own ids.
//! Frame documents and shadow roots are not descended into.

use serde_json::Value;

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

pub fn parse_cdp_document(response: &Value) -> Result<DomArena> {
    let root = response
        .get("root")
        .ok_or_else(|| DomError::Snapshot("Missing 'root' in CDP response".to_string()))?;

    let root_type = node_type(root)?;
    if root_type != NodeType::Document {
        return Err(DomError::InvalidNodeType {
            expected: "Document".to_string(),
            actual: format!("{:?}", root_type),
        });
    }

    let mut arena = DomArena::new();
    let document_id = arena.root_id();
    parse_children(&mut arena, root, document_id)?;
    Ok(arena)
}

fn node_type(cdp_node: &Value) -> Result<NodeType> {
    let value = cdp_node["nodeType"]
        .as_u64()
        .ok_or_else(|| DomError::Snapshot("Missing nodeType".to_string()))?;

    u8::try_from(value)
        .ok()
        .and_then(NodeType::from_u8)
        .ok_or_else(|| DomError::InvalidNodeType {
            expected: "valid NodeType".to_string(),
            actual: value.to_string(),
        })
}

fn parse_children(arena: &mut DomArena, cdp_node: &Value, parent_id: NodeId) -> Result<()> {
    if let Some(children) = cdp_node["children"].as_array() {
        for child in children {
            let child_id = parse_node(arena, child)?;
            arena.append_child(parent_id, child_id)?;
        }
    }
    Ok(())
}

fn parse_node(arena: &mut DomArena, cdp_node: &Value) -> Result<NodeId> {
    let node_type = node_type(cdp_node)?;
    if node_type == NodeType::Document {
        return Err(DomError::Snapshot(
            "nested document nodes are not supported".to_string(),
        ));
    }

    let node_name = cdp_node["nodeName"].as_str().unwrap_or("");
    let mut node = DomNode::new(0, node_type, node_name);
    node.node_value = cdp_node["nodeValue"].as_str().unwrap_or("").to_string();

    // Attributes come as a flat [name, value, name, value, ...] array
    if let Some(attrs) = cdp_node["attributes"].as_array() {
        for pair in attrs.chunks_exact(2) {
            if let (Some(key), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
                node.attributes.insert(key.to_string(), value.to_string());
            }
        }
    }

    let node_id = arena.add_node(node);
    parse_children(arena, cdp_node, node_id)?;
    Ok(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_dom() {
        let cdp_json = serde_json::json!({
            "root": {
                "nodeId": 1,
                "backendNodeId": 1,
                "nodeType": 9,
                "nodeName": "#document",
                "children": [{
                    "nodeId": 2,
                    "nodeType": 1,
                    "nodeName": "HTML",
                    "attributes": ["lang", "he", "dangling"],
                    "children": [{
                        "nodeId": 3,
                        "nodeType": 3,
                        "nodeName": "#text",
                        "nodeValue": "Hello"
                    }]
                }]
            }
        });

        let arena = parse_cdp_document(&cdp_json).unwrap();
        assert_eq!(arena.len(), 3);

        let html = arena.find_by_tag("html")[0];
        let node = arena.get(html).unwrap();
        assert_eq!(node.node_name, "html");
        assert_eq!(node.attr("lang"), Some("he"));
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.parent_id, Some(arena.root_id()));
        assert_eq!(arena.text_content(html).unwrap(), "Hello");
    }

    #[test]
    fn test_rejects_non_document_root() {
        let cdp_json = serde_json::json!({ "root": { "nodeType": 1, "nodeName": "DIV" } });
        assert!(matches!(
            parse_cdp_document(&cdp_json),
            Err(DomError::InvalidNodeType { .. })
        ));
    }

    #[test]
    fn test_missing_root() {
        let err = parse_cdp_document(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, DomError::Snapshot(_)));
    }
}
