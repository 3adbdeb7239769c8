mod attributes;
mod node;

pub use attributes::{Attribute, Attributes};
pub use node::{ElementData, Node, NodeData, TextData};
