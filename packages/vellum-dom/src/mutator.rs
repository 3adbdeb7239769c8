use std::collections::HashSet;

use markup5ever::{LocalName, QualName, ns};
use thiserror::Error;

use crate::document::{Document, EditError};
use crate::json::{NodeSnapshot, ROOT_NAME};
use crate::node::{Attribute, Attributes, ElementData, NodeData, TextData};

/// A transaction over a [`Document`].
///
/// All edits made through one mutator commit together: when the mutator is
/// finished (or dropped) the rule engine renormalizes everything that was
/// touched, one history step is recorded, and one render diff is queued.
/// Prefer [`DocumentMutator::finish`] where the commit outcome matters;
/// dropping commits too but can only log failures.
pub struct DocumentMutator<'doc> {
    /// Document is public to allow read-only introspection while mutating.
    pub doc: &'doc mut Document,
    finished: bool,
}

#[derive(Debug, Error)]
pub enum AppendTextErr {
    /// The node is not a text node
    #[error("Not a text node")]
    NotTextNode,
}

impl Drop for DocumentMutator<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(_err) = self.doc.commit() {
                #[cfg(feature = "tracing")]
                tracing::error!("dropped transaction failed to commit: {_err}");
            }
        }
    }
}

impl<'doc> DocumentMutator<'doc> {
    pub fn new(doc: &'doc mut Document) -> Self {
        Self {
            doc,
            finished: false,
        }
    }

    /// Commit the transaction, surfacing normalization failures.
    pub fn finish(mut self) -> Result<(), EditError> {
        self.finished = true;
        self.doc.commit()
    }

    // ------------------------------------------------------------------
    // Read-only introspection
    // ------------------------------------------------------------------

    pub fn node_has_parent(&self, node_id: usize) -> bool {
        self.doc
            .get_node(node_id)
            .is_some_and(|node| node.parent.is_some())
    }

    pub fn parent_id(&self, node_id: usize) -> Option<usize> {
        self.doc.get_node(node_id)?.parent
    }

    pub fn previous_sibling_id(&self, node_id: usize) -> Option<usize> {
        self.doc.previous_sibling(node_id)
    }

    pub fn next_sibling_id(&self, node_id: usize) -> Option<usize> {
        self.doc.next_sibling(node_id)
    }

    pub fn last_child_id(&self, node_id: usize) -> Option<usize> {
        self.doc.get_node(node_id)?.children.last().copied()
    }

    pub fn element_name(&self, node_id: usize) -> Option<&QualName> {
        self.doc
            .get_node(node_id)?
            .element_data()
            .map(|el| &el.name)
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> usize {
        let mut attributes = Attributes::new();
        for attr in attrs {
            attributes.set(attr.name, &attr.value);
        }
        self.doc
            .create_node(NodeData::Element(ElementData::new(name, attributes)))
    }

    /// Create an element in the HTML namespace with no attributes.
    pub fn create_element_tag(&mut self, tag: LocalName) -> usize {
        self.doc.create_node(NodeData::Element(ElementData::new(
            QualName::new(None, ns!(html), tag),
            Attributes::new(),
        )))
    }

    pub fn create_text_node(&mut self, text: &str) -> usize {
        self.doc.create_node(NodeData::Text(TextData {
            content: text.to_string(),
        }))
    }

    pub fn create_virtual_node(&mut self) -> usize {
        self.doc.create_node(NodeData::Virtual)
    }

    /// Create a detached staging fragment. Anything still parked under a
    /// fragment when the transaction commits is discarded.
    pub fn create_fragment(&mut self) -> usize {
        self.doc.create_node(NodeData::Fragment)
    }

    // ------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------

    pub fn append_children(&mut self, parent_id: usize, child_ids: &[usize]) {
        let Some(parent) = self.doc.get_node(parent_id) else {
            return;
        };
        let index = parent.children.len();
        self.insert_children_at(parent_id, index, child_ids);
    }

    /// Insert children at a child index, unlinking them from their old
    /// parents. The index is clamped to the current child count.
    pub fn insert_children_at(&mut self, parent_id: usize, index: usize, child_ids: &[usize]) {
        if self.doc.get_node(parent_id).is_none() {
            return;
        }
        let mut cursor = index;
        for &child_id in child_ids {
            if child_id == parent_id || self.doc.get_node(child_id).is_none() {
                continue;
            }
            if let Some(old_parent) = self.doc[child_id].parent {
                if old_parent == parent_id {
                    if let Some(old_index) = self.doc.child_index(child_id) {
                        if old_index < cursor {
                            cursor -= 1;
                        }
                    }
                }
                self.doc.detach(child_id);
                self.doc.mark_changed(old_parent);
            }
            let at = cursor.min(self.doc[parent_id].children.len());
            self.doc[parent_id].children.insert(at, child_id);
            self.doc[child_id].parent = Some(parent_id);
            self.doc.mark_changed(child_id);
            cursor = at + 1;
        }
        self.doc.mark_changed(parent_id);
    }

    pub fn insert_nodes_before(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        let Some(parent_id) = self.parent_id(anchor_node_id) else {
            return;
        };
        let Some(index) = self.doc.child_index(anchor_node_id) else {
            return;
        };
        self.insert_children_at(parent_id, index, new_node_ids);
    }

    pub fn insert_nodes_after(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        let Some(parent_id) = self.parent_id(anchor_node_id) else {
            return;
        };
        let Some(index) = self.doc.child_index(anchor_node_id) else {
            return;
        };
        self.insert_children_at(parent_id, index + 1, new_node_ids);
    }

    /// Replace a node with other nodes, dropping the replaced subtree.
    pub fn replace_node_with(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        self.insert_nodes_before(anchor_node_id, new_node_ids);
        self.remove_node(anchor_node_id);
    }

    /// Remove a subtree, retiring its ids. Returns the old parent id.
    /// The root cannot be removed.
    pub fn remove_node(&mut self, node_id: usize) -> Option<usize> {
        let node = self.doc.get_node(node_id)?;
        if node.is_root() {
            return None;
        }
        let parent_id = node.parent;
        self.doc.detach(node_id);
        self.doc.drop_subtree(node_id);
        if let Some(parent_id) = parent_id {
            self.doc.mark_changed(parent_id);
        }
        parent_id
    }

    /// Move all children of one node onto the end of another.
    pub fn reparent_children(&mut self, old_parent_id: usize, new_parent_id: usize) {
        if self.doc.get_node(old_parent_id).is_none()
            || self.doc.get_node(new_parent_id).is_none()
        {
            return;
        }
        let child_ids = std::mem::take(&mut self.doc[old_parent_id].children);
        for &child_id in &child_ids {
            self.doc[child_id].parent = Some(new_parent_id);
            self.doc.mark_changed(child_id);
        }
        self.doc[new_parent_id].children.extend(child_ids);
        self.doc.mark_changed(old_parent_id);
        self.doc.mark_changed(new_parent_id);
    }

    /// Mark a node changed so the rule engine revisits its subtree at
    /// commit, without editing anything.
    pub fn touch(&mut self, node_id: usize) {
        if self.doc.get_node(node_id).is_some() {
            self.doc.mark_changed(node_id);
        }
    }

    // ------------------------------------------------------------------
    // Node content
    // ------------------------------------------------------------------

    /// Replace the content of a text node. No-op when the content is
    /// already equal, so callers can set unconditionally.
    pub fn set_node_text(&mut self, node_id: usize, value: &str) {
        let Some(text) = self
            .doc
            .get_node_mut(node_id)
            .and_then(|node| node.text_data_mut())
        else {
            return;
        };
        let changed = text.content != value;
        if changed {
            text.content.clear();
            text.content.push_str(value);
            self.doc.mark_changed(node_id);
        }
    }

    pub fn append_text_to_node(&mut self, node_id: usize, text: &str) -> Result<(), AppendTextErr> {
        match self
            .doc
            .get_node_mut(node_id)
            .and_then(|node| node.text_data_mut())
        {
            Some(data) => {
                data.content.push_str(text);
                self.doc.mark_changed(node_id);
                Ok(())
            }
            None => Err(AppendTextErr::NotTextNode),
        }
    }

    /// Split a text node at a character offset. Splitting at offset 0
    /// returns the node itself; splitting at (or past) the end yields a
    /// virtual node so the caller still gets an anchor on the right side.
    pub fn split_text(&mut self, node_id: usize, offset: usize) -> Option<usize> {
        let text = self.doc.get_node(node_id)?.text_data()?;
        if offset == 0 {
            return Some(node_id);
        }
        let byte_offset = text
            .content
            .char_indices()
            .nth(offset)
            .map(|(byte, _)| byte);
        let right_id = match byte_offset {
            Some(byte) => {
                let remainder = self.doc[node_id]
                    .text_data()
                    .map(|t| t.content[byte..].to_string())?;
                if let Some(text) = self
                    .doc
                    .get_node_mut(node_id)
                    .and_then(|node| node.text_data_mut())
                {
                    text.content.truncate(byte);
                }
                self.doc.mark_changed(node_id);
                self.create_text_node(&remainder)
            }
            None => self.create_virtual_node(),
        };
        self.insert_nodes_after(node_id, &[right_id]);
        Some(right_id)
    }

    pub fn set_attribute(&mut self, node_id: usize, name: QualName, value: &str) {
        let Some(element) = self
            .doc
            .get_node_mut(node_id)
            .and_then(|node| node.element_data_mut())
        else {
            return;
        };
        element.attrs.set(name, value);
        self.doc.mark_changed(node_id);
    }

    pub fn clear_attribute(&mut self, node_id: usize, name: &QualName) {
        let Some(element) = self
            .doc
            .get_node_mut(node_id)
            .and_then(|node| node.element_data_mut())
        else {
            return;
        };
        if element.attrs.remove(name).is_some() {
            self.doc.mark_changed(node_id);
        }
    }

    pub fn add_attrs_if_missing(&mut self, node_id: usize, attrs: Vec<Attribute>) {
        let Some(element) = self
            .doc
            .get_node_mut(node_id)
            .and_then(|node| node.element_data_mut())
        else {
            return;
        };
        let existing_names = element
            .attrs
            .iter()
            .map(|attr| attr.name.clone())
            .collect::<HashSet<_>>();
        element
            .attrs
            .extend(attrs.into_iter().filter(|attr| !existing_names.contains(&attr.name)));
        self.doc.mark_changed(node_id);
    }

    // ------------------------------------------------------------------
    // Snapshot import
    // ------------------------------------------------------------------

    /// Materialize a snapshot as detached nodes and return the top-level
    /// ids. A fragment (or root) snapshot contributes its children. The
    /// caller is expected to attach the nodes; whatever stays detached is
    /// swept away at commit.
    pub fn import_json(&mut self, snapshot: &NodeSnapshot) -> Vec<usize> {
        if snapshot.is_fragment() || snapshot.name.as_deref() == Some(ROOT_NAME) {
            snapshot
                .children
                .iter()
                .map(|child| self.doc.build_subtree(child))
                .collect()
        } else {
            vec![self.doc.build_subtree(snapshot)]
        }
    }
}
