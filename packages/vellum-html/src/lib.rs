//! HTML front end for [`vellum_dom`] documents.
//!
//! Parsing is recovery-first: html5ever repairs malformed markup the way
//! browsers do, and every repair is reported as a [`ParseError`] rather than
//! a failure. [`parse_document`] builds a fresh
//! [`Document`](vellum_dom::Document) from a page of HTML,
//! [`parse_fragment`] stages markup inside an open transaction so it can be
//! inserted wherever the caller chooses, and [`HtmlParser`] plugs the same
//! parser into [`DocumentConfig`](vellum_dom::DocumentConfig) so that
//! `insert_html` at the caret goes through it too.

mod html_sink;
mod parse;

pub use html_sink::DocumentHtmlParser;
pub use parse::{
    HtmlParser, ParseError, parse_document, parse_document_with_diagnostics, parse_fragment,
    parse_fragment_with_diagnostics,
};
