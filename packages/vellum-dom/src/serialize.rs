use crate::document::Document;
use crate::node::NodeData;

/// Options for [`Document::serialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Emit newlines and indentation between block-level siblings.
    pub pretty_print: bool,
    /// Emit virtual text nodes as zero-width no-break spaces. Off by
    /// default: virtual nodes are a caret anchoring detail.
    pub keep_virtual: bool,
}

impl Document {
    /// Serialize a subtree to HTML. Root and fragment nodes are
    /// transparent: only their content is written.
    pub fn serialize(&self, id: usize, opts: SerializeOptions) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, opts, 0);
        out
    }

    /// Serialize the whole document with default options.
    pub fn to_html(&self) -> String {
        self.serialize(self.root_id(), SerializeOptions::default())
    }

    fn write_node(&self, out: &mut String, id: usize, opts: SerializeOptions, depth: usize) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        match &node.data {
            NodeData::Root | NodeData::Fragment => self.write_children(out, id, opts, depth),
            NodeData::Element(data) => {
                let tag: &str = &data.name.local;
                out.push('<');
                out.push_str(tag);
                for attr in data.attrs.iter() {
                    // An empty value and an absent attribute are the same
                    // state.
                    if attr.value.is_empty() {
                        continue;
                    }
                    out.push(' ');
                    out.push_str(&attr.name.local);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(&attr.value));
                    out.push('"');
                }
                if self.rule_set().is_void(&data.name.local) {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    let block_children = opts.pretty_print && self.has_block_children(id);
                    self.write_children(out, id, opts, depth + 1);
                    if block_children {
                        newline_indent(out, depth, self.indent);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
            NodeData::Text(text) => {
                out.push_str(&html_escape::encode_text(&text.content));
            }
            NodeData::Virtual => {
                if opts.keep_virtual {
                    out.push('\u{feff}');
                }
            }
            NodeData::Space => {}
        }
    }

    fn write_children(&self, out: &mut String, id: usize, opts: SerializeOptions, depth: usize) {
        let pretty_blocks = opts.pretty_print && self.has_block_children(id);
        for &child_id in &self[id].children {
            if self[child_id].is_space() {
                continue;
            }
            if pretty_blocks && !out.is_empty() {
                newline_indent(out, depth, self.indent);
            }
            self.write_node(out, child_id, opts, depth);
        }
    }

    fn has_block_children(&self, id: usize) -> bool {
        if self.in_pre_context(id) {
            return false;
        }
        let Some(node) = self.get_node(id) else {
            return false;
        };
        node.children.iter().any(|child_id| {
            let child = &self[*child_id];
            match child.tag_name() {
                Some(tag) => self.rule_set().is_block(tag),
                None => false,
            }
        })
    }
}

fn newline_indent(out: &mut String, level: usize, indent: usize) {
    out.push('\n');
    for _ in 0..level * indent {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentConfig;
    use markup5ever::{QualName, local_name, ns};

    fn doc_with_paragraph(text: &str) -> Document {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let t = mutr.create_text_node(text);
            mutr.append_children(p, &[t]);
            mutr.append_children(root, &[p]);
        }
        doc
    }

    #[test]
    fn serializes_paragraph() {
        let doc = doc_with_paragraph("hello");
        assert_eq!(doc.to_html(), "<p>hello</p>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            mutr.set_attribute(p, QualName::new(None, ns!(), local_name!("title")), "a\"b");
            let t = mutr.create_text_node("1 < 2 & 3");
            mutr.append_children(p, &[t]);
            mutr.append_children(root, &[p]);
        }
        let html = doc.to_html();
        assert!(html.starts_with("<p title=\"a&quot;b\">"));
        assert!(html.contains("1 &lt; 2 &amp; 3"));
    }

    #[test]
    fn empty_attribute_values_are_not_emitted() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            mutr.set_attribute(p, QualName::new(None, ns!(), local_name!("class")), "");
            mutr.set_attribute(p, QualName::new(None, ns!(), local_name!("id")), "y");
            let t = mutr.create_text_node("x");
            mutr.append_children(p, &[t]);
            mutr.append_children(root, &[p]);
        }
        assert_eq!(doc.to_html(), "<p id=\"y\">x</p>");
    }

    #[test]
    fn void_elements_self_close() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let t = mutr.create_text_node("a");
            let br = mutr.create_element_tag(local_name!("br"));
            let t2 = mutr.create_text_node("b");
            mutr.append_children(p, &[t, br, t2]);
            mutr.append_children(root, &[p]);
        }
        assert_eq!(doc.to_html(), "<p>a<br/>b</p>");
    }

    #[test]
    fn pretty_print_indents_blocks() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let div = mutr.create_element_tag(local_name!("div"));
            let p = mutr.create_element_tag(local_name!("p"));
            let t = mutr.create_text_node("x");
            mutr.append_children(p, &[t]);
            mutr.append_children(div, &[p]);
            mutr.append_children(root, &[div]);
        }
        let pretty = doc.serialize(
            doc.root_id(),
            SerializeOptions {
                pretty_print: true,
                ..Default::default()
            },
        );
        assert_eq!(pretty, "<div>\n    <p>x</p>\n</div>");
        // Default serialization is unchanged by pretty concerns.
        assert_eq!(doc.to_html(), "<div><p>x</p></div>");
    }
}
