use markup5ever::{LocalName, QualName};

use crate::node::Attributes;
use crate::rules::Kind;

/// A node in the document arena.
///
/// Nodes are identified by their arena id. An id is stable for the lifetime
/// of the document and is never reused after the node has been removed.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub data: NodeData,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    /// The unique editable root of a document.
    Root,
    /// A detached grouping node used while content is built or imported.
    Fragment,
    /// An element with a tag name and attributes.
    Element(ElementData),
    /// A visible text node.
    Text(TextData),
    /// An invisible zero-width text node that anchors the caret in
    /// containers that have no visible content. Never serialized by default.
    Virtual,
    /// Inter-block whitespace that exists for pretty-printed output only.
    /// Excluded from content lengths and from default serialization.
    Space,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub name: QualName,
    pub attrs: Attributes,
}

#[derive(Debug, Clone, Default)]
pub struct TextData {
    pub content: String,
}

impl ElementData {
    pub fn new(name: QualName, attrs: Attributes) -> Self {
        Self { name, attrs }
    }

    pub fn attr(&self, name: &LocalName) -> Option<&str> {
        self.attrs.get(name)
    }
}

impl Node {
    pub fn new(id: usize, data: NodeData) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    pub fn element_data(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_data_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.data {
            NodeData::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.data {
            NodeData::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.data, NodeData::Root)
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.data, NodeData::Fragment)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.data, NodeData::Virtual)
    }

    pub fn is_space(&self) -> bool {
        matches!(self.data, NodeData::Space)
    }

    /// Whether this node can hold children.
    pub fn is_container(&self) -> bool {
        matches!(
            self.data,
            NodeData::Root | NodeData::Fragment | NodeData::Element(_)
        )
    }

    pub fn tag_name(&self) -> Option<&LocalName> {
        self.element_data().map(|data| &data.name.local)
    }

    pub fn attr(&self, name: &LocalName) -> Option<&str> {
        self.element_data()?.attr(name)
    }

    /// The rule-matching kind of this node. All text-like nodes share the
    /// text kind so that constraints declared for text cover virtual and
    /// space nodes too.
    pub fn kind(&self) -> Kind {
        match &self.data {
            NodeData::Root | NodeData::Fragment => Kind::Editable,
            NodeData::Element(data) => Kind::Tag(data.name.local.clone()),
            NodeData::Text(_) | NodeData::Virtual | NodeData::Space => Kind::Text,
        }
    }

    /// Content length of the node: characters for text, child count for
    /// containers. Virtual and space nodes have length zero.
    pub fn length(&self) -> usize {
        match &self.data {
            NodeData::Text(data) => data.content.chars().count(),
            NodeData::Virtual | NodeData::Space => 0,
            _ => self.children.len(),
        }
    }
}
