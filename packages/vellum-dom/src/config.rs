use std::sync::Arc;

use crate::html::HtmlParserProvider;
use crate::rules::RuleSet;

/// Options used when constructing a [`Document`](crate::Document)
#[derive(Default)]
pub struct DocumentConfig {
    /// The rule set that normalizes the tree after every transaction.
    /// Defaults to [`RuleSet::default`].
    pub rules: Option<RuleSet>,
    /// Parser invoked when HTML strings are inserted into the document.
    /// Defaults to [`PlainTextParserProvider`](crate::PlainTextParserProvider),
    /// which treats the input as plain text.
    pub html_parser_provider: Option<Arc<dyn HtmlParserProvider>>,
    /// Indent width in spaces for pretty-printed serialization. Defaults to 4.
    pub indent: Option<usize>,
}
