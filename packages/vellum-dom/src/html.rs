use crate::DocumentMutator;

/// Pluggable HTML parsing.
///
/// The engine never parses HTML itself. A front end (vellum-html) implements
/// this trait and is handed to [`DocumentConfig`](crate::DocumentConfig); the
/// editing operations that accept markup call through it. Implementations
/// create unattached nodes through the mutator and return the top-level ids
/// in document order; the caller decides where to attach them, and anything
/// left unattached is swept at commit.
pub trait HtmlParserProvider {
    fn parse_html_fragment(&self, mutr: &mut DocumentMutator<'_>, html: &str) -> Vec<usize>;
}

/// Fallback provider that treats markup as literal text. Documents built
/// without a parser front end still accept `insert_html`, they just do not
/// interpret tags.
pub struct PlainTextParserProvider;

impl HtmlParserProvider for PlainTextParserProvider {
    fn parse_html_fragment(&self, mutr: &mut DocumentMutator<'_>, html: &str) -> Vec<usize> {
        if html.is_empty() {
            return Vec::new();
        }
        vec![mutr.create_text_node(html)]
    }
}
