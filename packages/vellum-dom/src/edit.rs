//! High-level editing commands.
//!
//! These are the operations an editor binds to keys: inserting typed text
//! or HTML at the caret, breaking paragraphs, and deleting forwards,
//! backwards or across a selection. They are built from the primitive
//! mutations and leave the caret where a user expects it; the rule engine
//! cleans up after them at commit.

use crate::document::EditError;
use crate::mutator::DocumentMutator;
use crate::node::NodeData;
use crate::range::{Range, RangePoint};

impl DocumentMutator<'_> {
    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Insert typed text at the caret, replacing the selection if one is
    /// open. Returns the text node holding the caret afterwards.
    ///
    /// Typed spaces are stored as non-breaking spaces: a plain space at a
    /// block edge would be collapsed away by normalization at commit.
    pub fn insert_text(&mut self, text: &str) -> Option<usize> {
        if text.is_empty() {
            return None;
        }
        let text = text.replace(' ', "\u{a0}");
        let caret = self.collapse_selection()?;
        let node = self.doc.get_node(caret.id)?;
        match &node.data {
            NodeData::Text(_) => {
                let inserted_chars = text.chars().count();
                let byte = byte_offset(self.doc[caret.id].text_data()?.content.as_str(), caret.offset);
                if let Some(data) = self
                    .doc
                    .get_node_mut(caret.id)
                    .and_then(|node| node.text_data_mut())
                {
                    data.content.insert_str(byte, &text);
                }
                self.doc.mark_changed(caret.id);
                let _ = self.set_caret(caret.id, caret.offset + inserted_chars);
                Some(caret.id)
            }
            NodeData::Virtual => {
                // Typing into a virtual anchor materializes it in place.
                let text_id = self.create_text_node(&text);
                self.insert_nodes_before(caret.id, &[text_id]);
                self.remove_node(caret.id);
                let _ = self.set_caret(text_id, text.chars().count());
                Some(text_id)
            }
            _ => {
                let text_id = self.create_text_node(&text);
                self.insert_children_at(caret.id, caret.offset, &[text_id]);
                let _ = self.set_caret(text_id, text.chars().count());
                Some(text_id)
            }
        }
    }

    /// Parse an HTML string with the configured parser and insert the
    /// result at the caret. Returns the first inserted node.
    pub fn insert_html(&mut self, html: &str) -> Option<usize> {
        let provider = self.doc.html_provider();
        let ids = provider.parse_html_fragment(self, html);
        self.insert_nodes_at_caret(&ids)
    }

    /// Parse an HTML string and insert it at an explicit position.
    pub fn insert_html_at(&mut self, parent_id: usize, offset: usize, html: &str) -> Option<usize> {
        let provider = self.doc.html_provider();
        let ids = provider.parse_html_fragment(self, html);
        if ids.is_empty() {
            return None;
        }
        self.insert_children_at(parent_id, offset, &ids);
        ids.first().copied()
    }

    /// Insert a snapshot subtree at the caret. Returns the first inserted
    /// node.
    pub fn insert_json(&mut self, snapshot: &crate::json::NodeSnapshot) -> Option<usize> {
        let ids = self.import_json(snapshot);
        self.insert_nodes_at_caret(&ids)
    }

    /// Import a snapshot subtree and insert it at an explicit position.
    pub fn insert_json_at(
        &mut self,
        parent_id: usize,
        offset: usize,
        snapshot: &crate::json::NodeSnapshot,
    ) -> Option<usize> {
        let ids = self.import_json(snapshot);
        if ids.is_empty() {
            return None;
        }
        self.insert_children_at(parent_id, offset, &ids);
        ids.first().copied()
    }

    fn insert_nodes_at_caret(&mut self, ids: &[usize]) -> Option<usize> {
        if ids.is_empty() {
            return None;
        }
        let caret = self.collapse_selection()?;
        let node = self.doc.get_node(caret.id)?;
        match &node.data {
            NodeData::Virtual => {
                self.insert_nodes_before(caret.id, ids);
                self.remove_node(caret.id);
            }
            NodeData::Text(_) => {
                let length = node.length();
                if caret.offset == 0 {
                    self.insert_nodes_before(caret.id, ids);
                } else if caret.offset >= length {
                    self.insert_nodes_after(caret.id, ids);
                } else {
                    self.split_text(caret.id, caret.offset);
                    self.insert_nodes_after(caret.id, ids);
                }
            }
            _ => {
                self.insert_children_at(caret.id, caret.offset, ids);
            }
        }
        let last = *ids.last()?;
        let leaf = self.doc.last_leaf(last);
        let offset = self.doc.get_node(leaf).map(|n| n.length()).unwrap_or(0);
        let _ = self.set_caret(leaf, offset);
        ids.first().copied()
    }

    // ------------------------------------------------------------------
    // Paragraph breaks
    // ------------------------------------------------------------------

    /// Split the current paragraph-level block at the caret, like the
    /// enter key. The caret moves to the start of the new block. Inside
    /// unbreakable content this does nothing and returns `None`.
    pub fn insert_paragraph_break(&mut self) -> Option<usize> {
        let caret = self.collapse_selection()?;
        let block_id = self.paragraph_block_of(caret.id)?;
        if let Err(_refused) = self.guard_split(caret.id, block_id) {
            #[cfg(feature = "tracing")]
            tracing::debug!("paragraph break refused: {_refused}");
            return None;
        }
        let right_id = self.split_block_at(caret, block_id)?;
        for block in [block_id, right_id] {
            if self.doc.get_node(block).is_some_and(|n| n.children.is_empty()) {
                let anchor = self.create_virtual_node();
                self.append_children(block, &[anchor]);
            }
        }
        let leaf = self.doc.first_leaf(right_id);
        let _ = self.set_caret(leaf, 0);
        Some(right_id)
    }

    /// Nearest ancestor-or-self that is a paragraph-level block and may be
    /// split.
    fn paragraph_block_of(&self, id: usize) -> Option<usize> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.doc.get_node(node_id)?;
            if let Some(tag) = node.tag_name() {
                if self.doc.rule_set().is_paragraph(tag) {
                    if self.doc.rule_set().is_unbreakable(tag) {
                        return None;
                    }
                    return Some(node_id);
                }
            }
            current = node.parent;
        }
        None
    }

    /// Check that cutting the tree at `from` up to `block_id` crosses no
    /// unbreakable wall. The error names the node that refused.
    fn guard_split(&self, from: usize, block_id: usize) -> Result<(), EditError> {
        let mut current = Some(from);
        while let Some(node_id) = current {
            if node_id == block_id {
                return Ok(());
            }
            let Some(node) = self.doc.get_node(node_id) else {
                return Err(EditError::InvalidRange(node_id));
            };
            if node
                .tag_name()
                .is_some_and(|tag| self.doc.rule_set().is_unbreakable(tag))
            {
                return Err(EditError::UnbreakableViolation(node_id));
            }
            current = node.parent;
        }
        Err(EditError::InvalidRange(from))
    }

    /// Split every node on the path from the caret up to and including
    /// `block_id`. The left parts keep their ids; the new right block is
    /// returned.
    fn split_block_at(&mut self, caret: RangePoint, block_id: usize) -> Option<usize> {
        let (mut container, mut index) = if self
            .doc
            .get_node(caret.id)
            .is_some_and(|node| node.is_text() || node.is_virtual())
        {
            let right = self.split_text(caret.id, caret.offset).unwrap_or(caret.id);
            let parent = self.doc.get_node(right)?.parent?;
            (parent, self.doc.child_index(right)?)
        } else {
            let length = self.doc.get_node(caret.id)?.children.len();
            (caret.id, caret.offset.min(length))
        };
        loop {
            let right = self.split_element(container, index)?;
            if container == block_id {
                return Some(right);
            }
            index = self.doc.child_index(right)?;
            container = self.doc.get_node(right)?.parent?;
        }
    }

    /// Clone an element's shell and move its children from `index` on into
    /// the clone, inserted as the next sibling.
    fn split_element(&mut self, element_id: usize, index: usize) -> Option<usize> {
        let data = self.doc.get_node(element_id)?.element_data()?.clone();
        let right_id = self.doc.create_node(NodeData::Element(data));
        let split_at = index.min(self.doc[element_id].children.len());
        let moved = self.doc[element_id].children.split_off(split_at);
        for &child in &moved {
            self.doc[child].parent = Some(right_id);
        }
        self.doc[right_id].children = moved;
        self.insert_nodes_after(element_id, &[right_id]);
        self.doc.mark_changed(element_id);
        Some(right_id)
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Backspace. Deletes the selection if one is open, otherwise the
    /// character (or void element) before the caret; at a block start the
    /// block is merged into the previous one. Returns the node holding
    /// the caret, or `None` when nothing could be deleted.
    pub fn remove_left(&mut self) -> Option<usize> {
        let range = self.doc.range;
        if !range.is_collapsed() {
            return self.remove_range(range).map(|point| point.id);
        }
        let caret = range.start;
        let node = self.doc.get_node(caret.id)?;
        if node.is_text() && caret.offset > 0 {
            return self.delete_char_at(caret.id, caret.offset - 1);
        }
        // At the very start of a text node (or on a non-text position):
        // look left.
        let prev = self.prev_content_leaf(caret.id)?;
        let caret_block = self.block_scope(caret.id);
        let prev_block = self.block_scope(prev);
        if prev_block == caret_block {
            let prev_node = &self.doc[prev];
            if prev_node.is_text() {
                let length = prev_node.length();
                if length == 0 {
                    return None;
                }
                return self.delete_char_at(prev, length - 1);
            }
            // A void element directly before the caret is deleted whole.
            let parent = self.doc.get_node(prev)?.parent?;
            let index = self.doc.child_index(prev)?;
            self.remove_node(prev);
            let _ = self.set_caret(parent, index);
            return Some(parent);
        }
        self.merge_blocks(prev_block?, caret_block?)
    }

    /// Forward delete, the mirror of [`DocumentMutator::remove_left`].
    pub fn remove_right(&mut self) -> Option<usize> {
        let range = self.doc.range;
        if !range.is_collapsed() {
            return self.remove_range(range).map(|point| point.id);
        }
        let caret = range.start;
        let node = self.doc.get_node(caret.id)?;
        if node.is_text() && caret.offset < node.length() {
            return self.delete_char_at(caret.id, caret.offset);
        }
        let next = self.next_content_leaf(caret.id)?;
        let caret_block = self.block_scope(caret.id);
        let next_block = self.block_scope(next);
        if next_block == caret_block {
            let next_node = &self.doc[next];
            if next_node.is_text() {
                if next_node.length() == 0 {
                    return None;
                }
                return self.delete_char_at(next, 0);
            }
            let parent = self.doc.get_node(next)?.parent?;
            let index = self.doc.child_index(next)?;
            self.remove_node(next);
            let _ = self.set_caret(parent, index);
            return Some(parent);
        }
        self.merge_blocks(caret_block?, next_block?)
    }

    /// Delete the content of a range and merge the boundary blocks when
    /// allowed. Returns the collapsed caret position.
    pub fn remove_range(&mut self, range: Range) -> Option<RangePoint> {
        let start = range.start;
        let end = range.end;
        if range.is_collapsed() {
            return Some(start);
        }
        let scope = self.doc.common_ancestor(start.id, end.id)?;
        let start_block = self.block_scope(start.id);
        let end_block = self.block_scope(end.id);

        let (first, last) = self.cut_bounds(start, end)?;
        if let (Some(first), Some(last)) = (first, last) {
            self.remove_leaf_run(first, last, scope);
        }

        // Join the boundary blocks so the remaining halves read as one
        // line, unless an unbreakable wall stands between them.
        if let (Some(left), Some(right)) = (start_block, end_block) {
            if left != right
                && self.doc.is_attached(left)
                && self.doc.is_attached(right)
            {
                self.merge_blocks(left, right);
            }
        }

        let caret = if self.doc.is_attached(start.id) {
            let length = self.doc[start.id].length();
            RangePoint {
                id: start.id,
                offset: start.offset.min(length),
            }
        } else if let Some(block) = start_block.filter(|b| self.doc.is_attached(*b)) {
            let leaf = self.doc.last_leaf(block);
            RangePoint {
                id: leaf,
                offset: self.doc[leaf].length(),
            }
        } else {
            RangePoint {
                id: self.doc.root_id(),
                offset: 0,
            }
        };
        let _ = self.set_caret(caret.id, caret.offset);
        Some(caret)
    }

    /// Remove the content of the current selection.
    pub fn remove_selection(&mut self) -> Option<usize> {
        let range = self.doc.range;
        self.remove_range(range).map(|point| point.id)
    }

    /// Replace the content between two points with a snapshot subtree.
    /// Returns the first inserted node.
    pub fn replace_range(
        &mut self,
        range: Range,
        snapshot: &crate::json::NodeSnapshot,
    ) -> Result<Option<usize>, EditError> {
        self.set_range(range)?;
        Ok(self.insert_json(snapshot))
    }

    // ------------------------------------------------------------------
    // Shared deletion plumbing
    // ------------------------------------------------------------------

    /// Collapse the selection, deleting its content when expanded.
    fn collapse_selection(&mut self) -> Option<RangePoint> {
        let range = self.doc.range;
        if range.is_collapsed() {
            return Some(range.start);
        }
        self.remove_range(range)
    }

    /// Delete one character of a text node. When the node becomes empty it
    /// is replaced by a virtual anchor unless rendered siblings can hold
    /// the caret.
    fn delete_char_at(&mut self, text_id: usize, char_index: usize) -> Option<usize> {
        let content = self.doc.get_node(text_id)?.text_data()?.content.clone();
        let start = byte_offset(&content, char_index);
        let end = byte_offset(&content, char_index + 1);
        if start >= end {
            return None;
        }
        let remaining = content.len() - (end - start);
        if let Some(data) = self
            .doc
            .get_node_mut(text_id)
            .and_then(|node| node.text_data_mut())
        {
            data.content.replace_range(start..end, "");
        }
        self.doc.mark_changed(text_id);
        if remaining > 0 {
            let _ = self.set_caret(text_id, char_index);
            return Some(text_id);
        }
        // Last character gone: keep the caret anchored.
        let has_neighbor = self.doc.previous_sibling(text_id).is_some()
            || self.doc.next_sibling(text_id).is_some();
        let parent = self.doc.get_node(text_id)?.parent?;
        let index = self.doc.child_index(text_id)?;
        self.remove_node(text_id);
        if has_neighbor {
            let _ = self.set_caret(parent, index);
            Some(parent)
        } else {
            let anchor = self.create_virtual_node();
            self.insert_children_at(parent, index, &[anchor]);
            let _ = self.set_caret(anchor, 0);
            Some(anchor)
        }
    }

    /// Boundary leaves of the removal region, after splitting partially
    /// selected text nodes. Either side may be `None` when the selection
    /// holds no whole node (adjacent block boundaries).
    #[allow(clippy::type_complexity)]
    fn cut_bounds(
        &mut self,
        start: RangePoint,
        end: RangePoint,
    ) -> Option<(Option<usize>, Option<usize>)> {
        // One text node carrying both endpoints: carve out the middle.
        if start.id == end.id && self.doc.get_node(start.id)?.is_text() {
            let length = self.doc[start.id].length();
            if end.offset < length {
                self.split_text(start.id, end.offset);
            }
            if start.offset == 0 {
                return Some((Some(start.id), Some(start.id)));
            }
            let middle = self.split_text(start.id, start.offset)?;
            return Some((Some(middle), Some(middle)));
        }

        let first = match &self.doc.get_node(start.id)?.data {
            NodeData::Text(_) => {
                let length = self.doc[start.id].length();
                if start.offset == 0 {
                    Some(start.id)
                } else if start.offset >= length {
                    self.next_leaf_for_cut(start.id)
                } else {
                    self.split_text(start.id, start.offset)
                }
            }
            _ => match self.doc.get_node(start.id)?.children.get(start.offset) {
                Some(child) => Some(*child),
                None => self.next_leaf_for_cut(start.id),
            },
        };
        let last = match &self.doc.get_node(end.id)?.data {
            NodeData::Text(_) => {
                let length = self.doc[end.id].length();
                if end.offset == 0 {
                    self.doc.prev_leaf(end.id)
                } else {
                    if end.offset < length {
                        self.split_text(end.id, end.offset);
                    }
                    Some(end.id)
                }
            }
            _ => {
                let node = self.doc.get_node(end.id)?;
                if end.offset == 0 {
                    self.doc.prev_leaf(end.id)
                } else {
                    node.children.get(end.offset - 1).copied()
                }
            }
        };
        Some((first, last))
    }

    fn next_leaf_for_cut(&self, id: usize) -> Option<usize> {
        self.doc.next_leaf(id)
    }

    /// Remove whole leaves from `first` through `last` in document order,
    /// pruning ancestors that become empty, never crossing `scope`.
    fn remove_leaf_run(&mut self, first: usize, last: usize, scope: usize) {
        if self.doc.get_node(first).is_none() || self.doc.get_node(last).is_none() {
            return;
        }
        if self.doc.compare_document_order(first, last) == std::cmp::Ordering::Greater {
            return;
        }
        let mut leaves = Vec::new();
        let mut cursor = Some(self.doc.first_leaf(first));
        let last_leaf = self.doc.last_leaf(last);
        while let Some(leaf) = cursor {
            leaves.push(leaf);
            if leaf == last_leaf {
                break;
            }
            cursor = self.doc.next_leaf(leaf);
        }
        for leaf in leaves {
            if self.doc.get_node(leaf).is_none() || leaf == scope {
                continue;
            }
            let mut target = leaf;
            loop {
                let parent = self.doc.get_node(target).and_then(|node| node.parent);
                self.remove_node(target);
                match parent {
                    Some(parent_id)
                        if parent_id != scope
                            && self
                                .doc
                                .get_node(parent_id)
                                .is_some_and(|node| node.children.is_empty()) =>
                    {
                        target = parent_id;
                    }
                    _ => break,
                }
            }
        }
    }

    /// Move the right block's children to the end of the left block and
    /// drop the right block, provided both sit inside the same unbreakable
    /// scope. Returns the node holding the caret at the junction.
    fn merge_blocks(&mut self, left_block: usize, right_block: usize) -> Option<usize> {
        if left_block == right_block {
            return None;
        }
        if self.unbreakable_scope(left_block) != self.unbreakable_scope(right_block) {
            #[cfg(feature = "tracing")]
            tracing::debug!("block merge refused across unbreakable boundary");
            return None;
        }
        let junction = {
            let leaf = self.doc.last_leaf(left_block);
            if leaf == left_block {
                RangePoint {
                    id: left_block,
                    offset: self.doc[left_block].children.len(),
                }
            } else {
                RangePoint {
                    id: leaf,
                    offset: self.doc[leaf].length(),
                }
            }
        };
        let old_parent = self.doc.get_node(right_block)?.parent;
        self.reparent_children(right_block, left_block);
        self.remove_node(right_block);
        // A list item or similar shell left empty by the merge goes too.
        let mut current = old_parent;
        while let Some(id) = current {
            let node = self.doc.get_node(id)?;
            if !node.is_element() || !node.children.is_empty() {
                break;
            }
            if node
                .tag_name()
                .is_some_and(|tag| self.doc.rule_set().is_unbreakable(tag))
            {
                break;
            }
            current = node.parent;
            self.remove_node(id);
        }
        let _ = self.set_caret(junction.id, junction.offset);
        Some(junction.id)
    }

    /// Nearest paragraph-level ancestor-or-self, unbreakable or not.
    fn block_scope(&self, id: usize) -> Option<usize> {
        self.doc.ancestor_matching(id, |node| {
            node.tag_name()
                .is_some_and(|tag| self.doc.rule_set().is_paragraph(tag))
        })
    }

    /// Nearest unbreakable ancestor-or-self, or the root.
    fn unbreakable_scope(&self, id: usize) -> usize {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.doc.get_node(node_id) else {
                break;
            };
            if node.is_root() {
                return node_id;
            }
            if node
                .tag_name()
                .is_some_and(|tag| self.doc.rule_set().is_unbreakable(tag))
            {
                return node_id;
            }
            current = node.parent;
        }
        self.doc.root_id()
    }

    fn prev_content_leaf(&self, from: usize) -> Option<usize> {
        let mut current = self.doc.prev_leaf(from)?;
        loop {
            let node = self.doc.get_node(current)?;
            if !node.is_virtual() && !node.is_space() {
                return Some(current);
            }
            current = self.doc.prev_leaf(current)?;
        }
    }

    fn next_content_leaf(&self, from: usize) -> Option<usize> {
        let mut current = self.doc.next_leaf(from)?;
        loop {
            let node = self.doc.get_node(current)?;
            if !node.is_virtual() && !node.is_space() {
                return Some(current);
            }
            current = self.doc.next_leaf(current)?;
        }
    }
}

fn byte_offset(content: &str, char_offset: usize) -> usize {
    content
        .char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(content.len())
}
