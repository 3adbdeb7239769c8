//! JSON snapshots of document content.
//!
//! Two shapes are used. [`NodeSnapshot`] is recursive and self-contained:
//! it is the persistence format returned by [`Document::to_json`] and the
//! shape custom rules receive and return. [`NodeRecord`] is flat: children
//! are ids, and one record describes one node. History steps and renderer
//! diffs are lists of records.

use markup5ever::{LocalName, QualName, ns};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::node::{Attribute, Attributes, ElementData, Node, NodeData, TextData};

pub(crate) const ROOT_NAME: &str = "#root";
pub(crate) const FRAGMENT_NAME: &str = "#fragment";
pub(crate) const TEXT_NAME: &str = "#text";
pub(crate) const VIRTUAL_NAME: &str = "#virtual";
pub(crate) const SPACE_NAME: &str = "#space";

/// Options for [`Document::to_json`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOptions {
    /// Include virtual text nodes in the output. Off by default.
    pub keep_virtual: bool,
}

/// A recursive snapshot of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSnapshot {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// A flat snapshot of a single node. Children are referenced by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
    pub id: usize,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<usize>,
}

impl NodeSnapshot {
    pub fn element(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn text(value: &str) -> Self {
        Self {
            name: Some(TEXT_NAME.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    /// A bare grouping of children. When a custom rule returns a fragment,
    /// its children are spliced in place of the matched node.
    pub fn fragment(children: Vec<NodeSnapshot>) -> Self {
        Self {
            name: Some(FRAGMENT_NAME.to_string()),
            children,
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_children(mut self, children: Vec<NodeSnapshot>) -> Self {
        self.children = children;
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some(name) if !name.starts_with('#') => Some(name),
            _ => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        match self.name.as_deref() {
            Some(FRAGMENT_NAME) => true,
            // A snapshot with neither name nor value is a bare child list.
            None => self.value.is_none(),
            _ => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.name.as_deref(), Some(TEXT_NAME)) || (self.name.is_none() && self.value.is_some())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Structural equality ignoring ids. Used to detect custom rules that
    /// return their input unchanged.
    pub fn same_shape(&self, other: &NodeSnapshot) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.attributes == other.attributes
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.same_shape(b))
    }
}

/// Build [`NodeData`] from the serialized parts shared by snapshots and
/// records.
pub(crate) fn node_data_from(
    name: Option<&str>,
    value: Option<&str>,
    attributes: &[(String, String)],
) -> NodeData {
    match name {
        Some(ROOT_NAME) => NodeData::Root,
        Some(FRAGMENT_NAME) => NodeData::Fragment,
        Some(TEXT_NAME) => NodeData::Text(TextData {
            content: value.unwrap_or_default().to_string(),
        }),
        Some(VIRTUAL_NAME) => NodeData::Virtual,
        Some(SPACE_NAME) => NodeData::Space,
        Some(tag) => {
            let name = QualName::new(None, ns!(html), LocalName::from(tag));
            let attrs = attributes
                .iter()
                .map(|(attr_name, attr_value)| Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name.as_str())),
                    value: attr_value.clone(),
                })
                .collect::<Attributes>();
            NodeData::Element(ElementData::new(name, attrs))
        }
        None => match value {
            Some(value) => NodeData::Text(TextData {
                content: value.to_string(),
            }),
            None => NodeData::Fragment,
        },
    }
}

pub(crate) fn record_name(node: &Node) -> String {
    match &node.data {
        NodeData::Root => ROOT_NAME.to_string(),
        NodeData::Fragment => FRAGMENT_NAME.to_string(),
        NodeData::Element(data) => data.name.local.to_string(),
        NodeData::Text(_) => TEXT_NAME.to_string(),
        NodeData::Virtual => VIRTUAL_NAME.to_string(),
        NodeData::Space => SPACE_NAME.to_string(),
    }
}

/// Attribute list for snapshots and records. Empty values are skipped;
/// empty and absent are the same state.
pub(crate) fn attribute_pairs(node: &Node) -> Vec<(String, String)> {
    match node.element_data() {
        Some(data) => data
            .attrs
            .iter()
            .filter(|attr| !attr.value.is_empty())
            .map(|attr| (attr.name.local.to_string(), attr.value.clone()))
            .collect(),
        None => Vec::new(),
    }
}

impl Document {
    /// Materialize a snapshot as a detached subtree, allocating fresh ids.
    pub(crate) fn build_subtree(&mut self, snapshot: &NodeSnapshot) -> usize {
        let data = node_data_from(
            snapshot.name.as_deref(),
            snapshot.value.as_deref(),
            &snapshot.attributes,
        );
        let id = self.create_node(data);
        let children: Vec<usize> = snapshot
            .children
            .iter()
            .map(|child| self.build_subtree(child))
            .collect();
        for &child_id in &children {
            if let Some(child) = self.get_node_mut(child_id) {
                child.parent = Some(id);
            }
        }
        if let Some(node) = self.get_node_mut(id) {
            node.children = children;
        }
        id
    }

    /// Flat snapshot of a single live node.
    pub fn record_for(&self, id: usize) -> Option<NodeRecord> {
        let node = self.get_node(id)?;
        Some(NodeRecord {
            id,
            name: Some(record_name(node)),
            value: node.text_data().map(|text| text.content.clone()),
            attributes: attribute_pairs(node),
            child_ids: node.children.clone(),
        })
    }

    /// Recursive snapshot of the subtree rooted at `id`.
    pub fn to_json(&self, id: usize, opts: JsonOptions) -> Option<NodeSnapshot> {
        let node = self.get_node(id)?;
        if node.is_virtual() && !opts.keep_virtual {
            return None;
        }
        let children = node
            .children
            .iter()
            .filter_map(|child_id| self.to_json(*child_id, opts))
            .collect();
        Some(NodeSnapshot {
            id,
            name: Some(record_name(node)),
            value: node.text_data().map(|text| text.content.clone()),
            attributes: attribute_pairs(node),
            children,
        })
    }

    /// Serialize the whole document to a JSON string.
    pub fn to_json_string(&self, opts: JsonOptions) -> serde_json::Result<String> {
        let snapshot = self.to_json(self.root_id(), opts).unwrap_or_default();
        serde_json::to_string(&snapshot)
    }

    /// Build a document from a snapshot produced by [`Document::to_json`]
    /// (or assembled by hand). Content is renormalized by the rule engine
    /// and fresh ids are assigned.
    pub fn from_json(snapshot: &NodeSnapshot, config: crate::DocumentConfig) -> Self {
        let mut doc = Document::new(config);
        let root_id = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let children = mutr.import_json(snapshot);
            mutr.append_children(root_id, &children);
        }
        doc.clear_history();
        doc
    }

    /// Parse a JSON string previously produced by [`Document::to_json_string`].
    pub fn from_json_string(
        json: &str,
        config: crate::DocumentConfig,
    ) -> serde_json::Result<Self> {
        let snapshot: NodeSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_json(&snapshot, config))
    }
}
