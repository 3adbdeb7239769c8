//! Vellum-dom: an editable document tree for rich text editors.
//!
//! This crate contains the in-memory tree ([`Document`]), the transactional
//! editing API ([`DocumentMutator`]), the rule engine that renormalizes the
//! tree after every transaction ([`RuleSet`]), the tree-coordinate selection
//! model ([`Range`]), per-node diff history with undo/redo, and a renderer
//! that reconciles an external native tree against committed diffs
//! ([`Renderer`]).
//!
//! Parsing HTML into a [`Document`] lives in the `vellum-html` crate, wired
//! in through the [`HtmlParserProvider`] trait so that this crate does not
//! depend on a parser implementation.

mod config;
mod document;
mod edit;
mod history;
mod html;
mod json;
mod mutator;
mod node;
mod range;
mod render;
mod rules;
mod serialize;
mod text;
mod traversal;

pub use config::DocumentConfig;
pub use document::{Document, EditError};
pub use html::{HtmlParserProvider, PlainTextParserProvider};
pub use json::{JsonOptions, NodeRecord, NodeSnapshot};
pub use mutator::{AppendTextErr, DocumentMutator};
pub use node::{Attribute, Attributes, ElementData, Node, NodeData, TextData};
pub use range::{Range, RangePoint, VoidBias};
pub use render::{MirrorTree, NativeTree, NoopNativeTree, Renderer};
pub use rules::{Kind, RuleSet};
pub use serialize::SerializeOptions;
pub use traversal::{AncestorTraverser, TreeTraverser};

pub use markup5ever::{
    LocalName, Namespace, NamespaceStaticSet, Prefix, PrefixStaticSet, QualName, local_name,
    namespace_prefix, namespace_url, ns,
};
