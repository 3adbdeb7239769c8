//! Tree-coordinate selection model.
//!
//! A range endpoint is a node id plus an offset: a character offset inside
//! text nodes, a child index inside containers. The document always holds
//! one range; mutation commits clamp it back to a valid position.

use std::cmp::Ordering;

use crate::document::{Document, EditError};
use crate::mutator::DocumentMutator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePoint {
    pub id: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: RangePoint,
    pub end: RangePoint,
}

impl Range {
    pub fn new(start: RangePoint, end: RangePoint) -> Self {
        Self { start, end }
    }

    pub fn collapsed(point: RangePoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Which side of a void element an endpoint lands on when a range is set
/// directly on one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoidBias {
    /// Place the endpoint before the void element.
    Before,
    /// Place the endpoint after the void element.
    #[default]
    After,
}

impl Document {
    pub(crate) fn points_ordered(&self, a: RangePoint, b: RangePoint) -> bool {
        if a.id == b.id {
            return a.offset <= b.offset;
        }
        !matches!(self.compare_document_order(a.id, b.id), Ordering::Greater)
    }

    /// Pull the range back onto live nodes after a commit. A lost endpoint
    /// collapses onto its partner; losing both parks the caret at the
    /// start of the document.
    pub(crate) fn clamp_range_after_commit(&mut self) {
        let mut range = self.range;
        let start_ok = self.is_attached(range.start.id);
        let end_ok = self.is_attached(range.end.id);
        match (start_ok, end_ok) {
            (true, true) => {}
            (true, false) => range.end = range.start,
            (false, true) => range.start = range.end,
            (false, false) => {
                range = Range::collapsed(RangePoint {
                    id: Self::ROOT_ID,
                    offset: 0,
                });
            }
        }
        range.start.offset = range.start.offset.min(self[range.start.id].length());
        range.end.offset = range.end.offset.min(self[range.end.id].length());
        if !self.points_ordered(range.start, range.end) {
            range = Range::collapsed(range.start);
        }
        self.range = range;
    }
}

impl DocumentMutator<'_> {
    /// Set the selection. Endpoints are validated, clamped, reordered when
    /// given backwards, snapped off void elements, and anchored with a
    /// virtual node when they land in an empty container.
    pub fn set_range(&mut self, range: Range) -> Result<(), EditError> {
        self.set_range_with_bias(range, VoidBias::default())
    }

    pub fn set_caret(&mut self, id: usize, offset: usize) -> Result<(), EditError> {
        self.set_range(Range::collapsed(RangePoint { id, offset }))
    }

    pub fn set_range_with_bias(&mut self, range: Range, bias: VoidBias) -> Result<(), EditError> {
        for point in [range.start, range.end] {
            if !self.doc.is_attached(point.id) {
                return Err(EditError::InvalidRange(point.id));
            }
        }
        let mut start = self.resolve_point(range.start, bias);
        let mut end = self.resolve_point(range.end, bias);
        if !self.doc.points_ordered(start, end) {
            std::mem::swap(&mut start, &mut end);
        }
        let anchored_start = self.anchor_point(start);
        let anchored_end = if end == start {
            anchored_start
        } else {
            self.anchor_point(end)
        };
        self.doc.range = Range {
            start: anchored_start,
            end: anchored_end,
        };
        Ok(())
    }

    /// Snap an endpoint off a void element onto its parent and clamp the
    /// offset to the node's length.
    fn resolve_point(&self, point: RangePoint, bias: VoidBias) -> RangePoint {
        let Some(node) = self.doc.get_node(point.id) else {
            return point;
        };
        if let Some(tag) = node.tag_name() {
            if self.doc.rule_set().is_void(tag) {
                if let (Some(parent_id), Some(index)) =
                    (node.parent, self.doc.child_index(point.id))
                {
                    let offset = match bias {
                        VoidBias::Before => index,
                        VoidBias::After => index + 1,
                    };
                    return RangePoint {
                        id: parent_id,
                        offset,
                    };
                }
            }
        }
        RangePoint {
            id: point.id,
            offset: point.offset.min(node.length()),
        }
    }

    /// Endpoints in childless containers get a virtual text node to sit in,
    /// so the caret always has a text position.
    fn anchor_point(&mut self, point: RangePoint) -> RangePoint {
        let Some(node) = self.doc.get_node(point.id) else {
            return point;
        };
        if node.is_container() && !node.is_fragment() && node.children.is_empty() {
            let virtual_id = self.create_virtual_node();
            self.append_children(point.id, &[virtual_id]);
            return RangePoint {
                id: virtual_id,
                offset: 0,
            };
        }
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentConfig};
    use markup5ever::local_name;

    fn doc_with_text(content: &str) -> (Document, usize) {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        let text = {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let text = mutr.create_text_node(content);
            mutr.append_children(p, &[text]);
            mutr.append_children(root, &[p]);
            text
        };
        (doc, text)
    }

    #[test]
    fn caret_offsets_are_clamped_to_length() {
        let (mut doc, text) = doc_with_text("abc");
        {
            let mut mutr = doc.mutate();
            mutr.set_caret(text, 99).unwrap();
        }
        assert_eq!(doc.range().start, RangePoint { id: text, offset: 3 });
    }

    #[test]
    fn unattached_endpoint_is_rejected() {
        let (mut doc, text) = doc_with_text("abc");
        let bogus = doc.id_bound() + 10;
        let mut mutr = doc.mutate();
        let err = mutr
            .set_range(Range {
                start: RangePoint { id: text, offset: 0 },
                end: RangePoint {
                    id: bogus,
                    offset: 0,
                },
            })
            .unwrap_err();
        assert_eq!(err, EditError::InvalidRange(bogus));
    }

    #[test]
    fn backwards_ranges_are_reordered() {
        let (mut doc, text) = doc_with_text("abcdef");
        {
            let mut mutr = doc.mutate();
            mutr.set_range(Range {
                start: RangePoint { id: text, offset: 4 },
                end: RangePoint { id: text, offset: 1 },
            })
            .unwrap();
        }
        let range = doc.range();
        assert_eq!(range.start.offset, 1);
        assert_eq!(range.end.offset, 4);
    }

    #[test]
    fn caret_on_void_snaps_to_parent() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        let (p, br) = {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let a = mutr.create_text_node("a");
            let br = mutr.create_element_tag(local_name!("br"));
            mutr.append_children(p, &[a, br]);
            mutr.append_children(root, &[p]);
            (p, br)
        };
        {
            let mut mutr = doc.mutate();
            mutr.set_caret(br, 0).unwrap();
        }
        assert_eq!(doc.range().start, RangePoint { id: p, offset: 2 });

        {
            let mut mutr = doc.mutate();
            mutr.set_range_with_bias(
                Range::collapsed(RangePoint { id: br, offset: 0 }),
                VoidBias::Before,
            )
            .unwrap();
        }
        assert_eq!(doc.range().start, RangePoint { id: p, offset: 1 });
    }

    #[test]
    fn empty_container_grows_a_virtual_anchor() {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            mutr.set_caret(root, 0).unwrap();
        }
        let caret = doc.range().start;
        let anchor = doc.get_node(caret.id).unwrap();
        assert!(anchor.is_virtual());
        // The rule pass wraps the anchor in a paragraph.
        let parent = anchor.parent.unwrap();
        assert_eq!(doc[parent].tag_name(), Some(&local_name!("p")));
    }
}
