//! Document and fragment parse entry points built on html5ever.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;
use vellum_dom::{Document, DocumentConfig, DocumentMutator, HtmlParserProvider};

use crate::html_sink::DocumentHtmlParser;

/// A defect the parser recovered from while reading malformed markup.
///
/// Parsing never fails outright: the tree builder repairs what it can, the
/// way browsers do, and reports each repair.
#[derive(Debug, Clone, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: Cow<'static, str>,
}

/// Parse a full HTML document into a [`Document`].
///
/// The `<html>`/`<head>`/`<body>` scaffold is discarded and only the body
/// content is kept. The parsed tree is normalized by the document's rule set
/// and installed as the history baseline, so the first undoable step is the
/// first edit, not the parse itself.
///
/// When `config` carries no parser provider, [`HtmlParser`] is installed so
/// that later `insert_html` calls parse markup the same way.
pub fn parse_document(html: &str, config: DocumentConfig) -> Document {
    parse_document_with_diagnostics(html, config).0
}

/// As [`parse_document`], but also returning the recovery diagnostics.
pub fn parse_document_with_diagnostics(
    html: &str,
    mut config: DocumentConfig,
) -> (Document, Vec<ParseError>) {
    if config.html_parser_provider.is_none() {
        config.html_parser_provider = Some(Arc::new(HtmlParser));
    }
    let mut doc = Document::new(config);
    let root_id = doc.root_id();
    let diagnostics = {
        let mut mutr = doc.mutate();
        let (ids, diagnostics) = DocumentHtmlParser::parse_into_staging(&mut mutr, html);
        mutr.append_children(root_id, &ids);
        diagnostics
    };
    #[cfg(feature = "tracing")]
    for diagnostic in &diagnostics {
        tracing::warn!("recovered from malformed markup: {diagnostic}");
    }
    doc.clear_history();
    (doc, diagnostics)
}

/// Parse an HTML fragment inside an open transaction, returning the ids of
/// the parsed top-level nodes.
///
/// The nodes are staged but not yet placed: insert them with
/// [`DocumentMutator::insert_children_at`] or a sibling of it. Staged nodes
/// that are never placed are discarded when the transaction commits.
pub fn parse_fragment(mutr: &mut DocumentMutator<'_>, html: &str) -> Vec<usize> {
    let (ids, _diagnostics) = parse_fragment_with_diagnostics(mutr, html);
    #[cfg(feature = "tracing")]
    for diagnostic in &_diagnostics {
        tracing::warn!("recovered from malformed markup: {diagnostic}");
    }
    ids
}

/// As [`parse_fragment`], but also returning the recovery diagnostics.
pub fn parse_fragment_with_diagnostics(
    mutr: &mut DocumentMutator<'_>,
    html: &str,
) -> (Vec<usize>, Vec<ParseError>) {
    DocumentHtmlParser::parse_into_staging(mutr, html)
}

/// [`HtmlParserProvider`] backed by the html5ever recovery parser.
///
/// Install it through [`DocumentConfig::html_parser_provider`] (or use
/// [`parse_document`], which installs it for you) so that
/// [`DocumentMutator::insert_html`] understands real markup instead of
/// treating it as plain text.
pub struct HtmlParser;

impl HtmlParserProvider for HtmlParser {
    fn parse_html_fragment(&self, mutr: &mut DocumentMutator<'_>, html: &str) -> Vec<usize> {
        parse_fragment(mutr, html)
    }
}
