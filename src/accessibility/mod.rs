//! Accessibility tree extraction
//!
//! Pulls Chrome's accessibility tree over CDP into a queryable structure
//! the WCAG rule engine runs against. Node order follows the CDP response
//! so rule output is deterministic for a given page.

use std::collections::HashMap;

use chromiumoxide::cdp::browser_protocol::accessibility::GetFullAxTreeParams;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuditError, Result};

/// A single node in the accessibility tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxNode {
    /// Unique identifier for this node
    pub node_id: String,
    /// Whether assistive technology ignores this node
    #[serde(default)]
    pub ignored: bool,
    /// The accessibility role (e.g., "button", "heading", "image")
    pub role: Option<String>,
    /// The accessible name (what screen readers announce)
    pub name: Option<String>,
    /// The accessible description
    pub description: Option<String>,
    /// The accessible value (for form controls)
    pub value: Option<String>,
    /// Raw AX properties (focusable, hidden, level, ...)
    #[serde(default)]
    pub properties: Vec<AxProperty>,
    /// Child node ids
    #[serde(default)]
    pub child_ids: Vec<String>,
    /// Parent node id
    pub parent_id: Option<String>,
}

/// A named AX property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxProperty {
    pub name: String,
    pub value: serde_json::Value,
}

impl AxNode {
    /// Whether the node has a non-empty accessible name.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn property_bool(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(|v| v.as_bool())
    }

    /// Heading level, when the node is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        self.property("level").and_then(|v| v.as_u64()).map(|l| l as u8)
    }

    /// A human-readable locator for issue reports. Not a CSS selector; a
    /// stable role-based path fragment.
    pub fn locator(&self) -> String {
        match (&self.role, &self.name) {
            (Some(role), Some(name)) if !name.is_empty() => {
                format!("{}[name=\"{}\"]", role, truncate(name, 60))
            }
            (Some(role), _) => format!("{}#{}", role, self.node_id),
            _ => format!("node#{}", self.node_id),
        }
    }

    /// A short snippet of what the node exposes to assistive technology.
    pub fn context_snippet(&self) -> String {
        let role = self.role.as_deref().unwrap_or("generic");
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} \"{}\"", role, truncate(name, 80)),
            _ => role.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut)
    }
}

/// The accessibility tree of one loaded page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxTree {
    nodes: Vec<AxNode>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl AxTree {
    /// Build the tree from nodes in CDP response order.
    pub fn from_nodes(nodes: Vec<AxNode>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.node_id.clone(), i))
            .collect();
        Self { nodes, index }
    }

    pub fn get(&self, node_id: &str) -> Option<&AxNode> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// The root node (first in CDP order).
    pub fn root(&self) -> Option<&AxNode> {
        self.nodes.first()
    }

    /// Iterate nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = &AxNode> {
        self.nodes.iter()
    }

    fn with_roles<'a>(&'a self, roles: &'a [&'a str]) -> impl Iterator<Item = &'a AxNode> {
        self.nodes
            .iter()
            .filter(move |n| n.role.as_deref().is_some_and(|r| roles.contains(&r)))
    }

    pub fn images(&self) -> Vec<&AxNode> {
        self.with_roles(&["image", "img"]).collect()
    }

    pub fn headings(&self) -> Vec<&AxNode> {
        self.with_roles(&["heading"]).collect()
    }

    pub fn buttons(&self) -> Vec<&AxNode> {
        self.with_roles(&["button"]).collect()
    }

    pub fn links(&self) -> Vec<&AxNode> {
        self.with_roles(&["link"]).collect()
    }

    pub fn form_controls(&self) -> Vec<&AxNode> {
        self.with_roles(&[
            "textbox",
            "checkbox",
            "radio",
            "combobox",
            "listbox",
            "spinbutton",
            "slider",
            "searchbox",
        ])
        .collect()
    }

    pub fn landmarks(&self) -> Vec<&AxNode> {
        self.with_roles(&[
            "banner",
            "navigation",
            "main",
            "contentinfo",
            "complementary",
            "search",
            "region",
        ])
        .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Extract the full accessibility tree from a loaded page.
pub async fn extract_ax_tree(page: &Page) -> Result<AxTree> {
    let response = page
        .execute(GetFullAxTreeParams::default())
        .await
        .map_err(|e| AuditError::CdpError(format!("AX tree extraction failed: {}", e)))?;

    let nodes_json =
        serde_json::to_value(&response.nodes).map_err(AuditError::JsonError)?;

    let nodes = nodes_json
        .as_array()
        .map(|arr| arr.iter().filter_map(convert_node).collect::<Vec<_>>())
        .unwrap_or_default();

    debug!("Extracted AX tree with {} nodes", nodes.len());
    Ok(AxTree::from_nodes(nodes))
}

/// Convert one CDP AXNode JSON object into our node shape.
fn convert_node(json: &serde_json::Value) -> Option<AxNode> {
    let node_id = json["nodeId"].as_str()?.to_string();

    let properties = json["properties"]
        .as_array()
        .map(|props| {
            props
                .iter()
                .filter_map(|p| {
                    let name = p["name"].as_str()?.to_string();
                    let value = p["value"]["value"].clone();
                    if value.is_null() {
                        return None;
                    }
                    Some(AxProperty { name, value })
                })
                .collect()
        })
        .unwrap_or_default();

    let child_ids = json["childIds"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Some(AxNode {
        node_id,
        ignored: json["ignored"].as_bool().unwrap_or(false),
        role: json["role"]["value"].as_str().map(String::from),
        name: json["name"]["value"].as_str().map(String::from),
        description: json["description"]["value"].as_str().map(String::from),
        value: json["value"]["value"].as_str().map(String::from),
        properties,
        child_ids,
        parent_id: json["parentId"].as_str().map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn node(id: &str, role: &str, name: Option<&str>) -> AxNode {
        AxNode {
            node_id: id.to_string(),
            ignored: false,
            role: Some(role.to_string()),
            name: name.map(String::from),
            description: None,
            value: None,
            properties: vec![],
            child_ids: vec![],
            parent_id: None,
        }
    }

    #[test]
    fn test_tree_queries_preserve_order() {
        let tree = AxTree::from_nodes(vec![
            node("1", "WebArea", Some("Page")),
            node("2", "image", None),
            node("3", "heading", Some("Title")),
            node("4", "image", Some("Logo")),
        ]);

        let images = tree.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].node_id, "2");
        assert_eq!(images[1].node_id, "4");
        assert_eq!(tree.headings().len(), 1);
        assert_eq!(tree.root().unwrap().node_id, "1");
    }

    #[test]
    fn test_has_name_ignores_whitespace() {
        assert!(!node("1", "image", Some("   ")).has_name());
        assert!(node("1", "image", Some("Logo")).has_name());
        assert!(!node("1", "image", None).has_name());
    }

    #[test]
    fn test_convert_node() {
        let json = serde_json::json!({
            "nodeId": "7",
            "ignored": false,
            "role": {"value": "heading"},
            "name": {"value": "Welcome"},
            "properties": [
                {"name": "level", "value": {"type": "integer", "value": 2}}
            ],
        });

        let node = convert_node(&json).unwrap();
        assert_eq!(node.node_id, "7");
        assert_eq!(node.role.as_deref(), Some("heading"));
        assert_eq!(node.heading_level(), Some(2));
    }

    #[test]
    fn test_locator_and_snippet() {
        let n = node("9", "button", Some("Submit"));
        assert_eq!(n.locator(), "button[name=\"Submit\"]");
        assert_eq!(n.context_snippet(), "button \"Submit\"");

        let anon = node("10", "image", None);
        assert_eq!(anon.locator(), "image#10");
        assert_eq!(anon.context_snippet(), "image");
    }
}
