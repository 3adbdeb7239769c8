//! An implementation of Html5ever's sink trait, allowing us to parse HTML
//! into a vellum document tree.

use html5ever::ParseOpts;
use html5ever::tokenizer::TokenizerOpts;
use html5ever::tree_builder::TreeBuilderOpts;
use std::borrow::Cow;
use std::cell::{Cell, Ref, RefCell, RefMut};

use html5ever::{
    QualName,
    tendril::{StrTendril, TendrilSink},
    tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink},
};
use vellum_dom::{Attribute, DocumentMutator, local_name};

use crate::parse::ParseError;

/// Convert an html5ever Attribute which uses tendril for its value to a
/// vellum Attribute which uses String.
fn html5ever_to_vellum_attr(attr: html5ever::Attribute) -> Attribute {
    Attribute {
        name: attr.name,
        value: attr.value.to_string(),
    }
}

/// A [`TreeSink`] building nodes through a borrowed [`DocumentMutator`].
///
/// The html5ever document node is played by a detached staging fragment, so
/// the `<html>`/`<head>`/`<body>` scaffold the tree builder synthesizes
/// never touches the document root. The caller lifts the content out of the
/// staged `<body>` afterwards; whatever remains parked under the fragment is
/// discarded when the transaction commits.
pub struct DocumentHtmlParser<'m, 'doc> {
    document_mutator: RefCell<&'m mut DocumentMutator<'doc>>,

    /// Stand-in for the html5ever document node.
    staging_id: usize,

    /// Errors that occurred during parsing.
    pub errors: RefCell<Vec<Cow<'static, str>>>,

    /// The document's quirks mode.
    pub quirks_mode: Cell<QuirksMode>,
}

impl<'m, 'doc> DocumentHtmlParser<'m, 'doc> {
    #[track_caller]
    /// Get a mutable borrow of the DocumentMutator
    fn mutr(&self) -> RefMut<'_, &'m mut DocumentMutator<'doc>> {
        self.document_mutator.borrow_mut()
    }

    pub fn new(mutr: &'m mut DocumentMutator<'doc>) -> Self {
        let staging_id = mutr.create_fragment();
        DocumentHtmlParser {
            document_mutator: RefCell::new(mutr),
            staging_id,
            errors: RefCell::new(Vec::new()),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
        }
    }

    /// Comments and processing instructions have no node kind of their own:
    /// they are staged as placeholder fragments that never get attached.
    fn is_placeholder(&self, id: usize) -> bool {
        self.document_mutator
            .borrow()
            .doc
            .get_node(id)
            .is_some_and(|node| node.is_fragment())
    }
}

impl DocumentHtmlParser<'_, '_> {
    /// Run a recovery parse of `html`, staging the result inside the
    /// transaction. Returns the ids of the parsed content (the children of
    /// the synthesized `<body>`, still staged; inserting them elsewhere
    /// unlinks them) along with any recovery diagnostics.
    pub fn parse_into_staging(
        mutr: &mut DocumentMutator<'_>,
        html: &str,
    ) -> (Vec<usize>, Vec<ParseError>) {
        let sink = DocumentHtmlParser::new(mutr);
        let staging_id = sink.staging_id;
        let opts = ParseOpts {
            tokenizer: TokenizerOpts::default(),
            tree_builder: TreeBuilderOpts {
                exact_errors: false,
                scripting_enabled: false, // Enables parsing of <noscript> tags
                iframe_srcdoc: false,
                drop_doctype: true,
                quirks_mode: QuirksMode::NoQuirks,
            },
        };
        let errors = html5ever::parse_document(sink, opts).one(html);
        let ids = staged_content(mutr, staging_id);
        (ids, errors)
    }
}

/// The children of the first `<body>` under the staging fragment, or the
/// fragment's own children when the scaffold is missing.
fn staged_content(mutr: &DocumentMutator<'_>, staging_id: usize) -> Vec<usize> {
    let doc = &mutr.doc;
    let mut stack = vec![staging_id];
    while let Some(id) = stack.pop() {
        let Some(node) = doc.get_node(id) else {
            continue;
        };
        if node.tag_name() == Some(&local_name!("body")) {
            return node.children.clone();
        }
        stack.extend(node.children.iter().rev().copied());
    }
    doc.get_node(staging_id)
        .map(|node| node.children.clone())
        .unwrap_or_default()
}

impl<'m, 'doc> TreeSink for DocumentHtmlParser<'m, 'doc> {
    type Output = Vec<ParseError>;

    // we use the ID of the nodes in the tree as the handle
    type Handle = usize;

    type ElemName<'a>
        = Ref<'a, QualName>
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        drop(self.document_mutator.into_inner());
        self.errors
            .into_inner()
            .into_iter()
            .map(|message| ParseError { message })
            .collect()
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.errors.borrow_mut().push(msg);
    }

    fn get_document(&self) -> Self::Handle {
        self.staging_id
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        Ref::map(self.document_mutator.borrow(), |mutr| {
            mutr.element_name(*target)
                .expect("TreeSink::elem_name called on a node which is not an element!")
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs.into_iter().map(html5ever_to_vellum_attr).collect();
        self.mutr().create_element(name, attrs)
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        self.mutr().create_fragment()
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.mutr().create_fragment()
    }

    fn append(&self, parent_id: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(id) => {
                if !self.is_placeholder(id) {
                    self.mutr().append_children(*parent_id, &[id]);
                }
            }
            // If content to append is text, first attempt to append it to the last child of parent.
            // Else create a new text node and append it to the parent
            NodeOrText::AppendText(text) => {
                let last_child_id = self.mutr().last_child_id(*parent_id);
                let has_appended = if let Some(id) = last_child_id {
                    self.mutr().append_text_to_node(id, &text).is_ok()
                } else {
                    false
                };
                if !has_appended {
                    let new_child_id = self.mutr().create_text_node(&text);
                    self.mutr().append_children(*parent_id, &[new_child_id]);
                }
            }
        }
    }

    // Note: The tree builder promises we won't have a text node after the insertion point.
    fn append_before_sibling(&self, sibling_id: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        match new_node {
            NodeOrText::AppendNode(id) => {
                if !self.is_placeholder(id) {
                    self.mutr().insert_nodes_before(*sibling_id, &[id]);
                }
            }
            // If content to append is text, first attempt to append it to the node before sibling_node
            // Else create a new text node and insert it before sibling_node
            NodeOrText::AppendText(text) => {
                let previous_sibling_id = self.mutr().previous_sibling_id(*sibling_id);
                let has_appended = if let Some(id) = previous_sibling_id {
                    self.mutr().append_text_to_node(id, &text).is_ok()
                } else {
                    false
                };
                if !has_appended {
                    let new_child_id = self.mutr().create_text_node(&text);
                    self.mutr()
                        .insert_nodes_before(*sibling_id, &[new_child_id]);
                }
            }
        };
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if self.mutr().node_has_parent(*element) {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Ignore. The document model has no doctype.
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        let attrs = attrs.into_iter().map(html5ever_to_vellum_attr).collect();
        self.mutr().add_attrs_if_missing(*target, attrs);
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.mutr().remove_node(*target);
    }

    fn reparent_children(&self, old_parent_id: &Self::Handle, new_parent_id: &Self::Handle) {
        self.mutr()
            .reparent_children(*old_parent_id, *new_parent_id);
    }
}

#[test]
fn parses_some_html() {
    use vellum_dom::{Document, DocumentConfig};

    let html = "<!DOCTYPE html><html><body><h1>hello world</h1></body></html>";
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    {
        let mut mutr = doc.mutate();
        let (ids, _) = DocumentHtmlParser::parse_into_staging(&mut mutr, html);
        assert_eq!(ids.len(), 1);
        mutr.append_children(root_id, &ids);
    }

    // Now our tree should have the heading and nothing of the scaffold
    assert_eq!(doc.to_html(), "<h1>hello world</h1>");
}
