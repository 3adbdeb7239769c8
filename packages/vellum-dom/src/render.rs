//! Native-tree reconciliation.
//!
//! The renderer keeps a retained copy of the last records it saw and turns
//! each batch from [`Document::take_render_diff`] into the smallest set of
//! operations on a [`NativeTree`]: attribute removals and sets, text
//! patches, and positional child moves. Unchanged nodes keep their native
//! handle, so platform state tied to node identity (focus, composition)
//! survives every update.

use std::collections::{BTreeMap, BTreeSet};

use slab::Slab;

use crate::document::Document;
use crate::json::{FRAGMENT_NAME, NodeRecord, ROOT_NAME, SPACE_NAME, TEXT_NAME, VIRTUAL_NAME};
use crate::rules::VOID_TAGS;

/// The surface a rendering backend exposes to the reconciler.
///
/// Handles are opaque `usize` values chosen by the backend. The backend owns
/// one permanent root container; everything else is created on demand.
/// `insert_child_at` must detach the child from wherever it currently sits
/// before inserting, and clamp the index to the child count.
pub trait NativeTree {
    fn root_handle(&mut self) -> usize;
    fn create_element(&mut self, name: &str) -> usize;
    fn create_text(&mut self, content: &str) -> usize;
    fn set_text(&mut self, handle: usize, content: &str);
    fn set_attribute(&mut self, handle: usize, name: &str, value: &str);
    fn remove_attribute(&mut self, handle: usize, name: &str);
    fn child_handles(&self, handle: usize) -> Vec<usize>;
    fn insert_child_at(&mut self, parent: usize, index: usize, child: usize);
    /// Unlink a node from its parent, keeping it alive for reinsertion.
    fn detach(&mut self, handle: usize);
    /// Destroy a node. It is already unlinked or about to be discarded
    /// wholesale.
    fn remove(&mut self, handle: usize);
}

/// Pending operations for one node, accumulated while a batch is merged.
#[derive(Default)]
struct Patch {
    value: Option<String>,
    /// `None` value removes the attribute.
    attributes: Vec<(String, Option<String>)>,
    child_ids: Option<Vec<usize>>,
}

impl Patch {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.attributes.is_empty() && self.child_ids.is_none()
    }

    fn set_attribute(&mut self, name: &str, value: Option<String>) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }
}

/// Reconciles record diffs against a [`NativeTree`].
///
/// One renderer instance pairs with one native tree for the lifetime of a
/// document. A handle is created at most once per id; afterwards the id only
/// ever resolves to that same handle, until the id becomes unreachable and
/// both are dropped together.
pub struct Renderer {
    records: BTreeMap<usize, NodeRecord>,
    handles: BTreeMap<usize, usize>,
    handle_ids: BTreeMap<usize, usize>,
}

impl Renderer {
    pub fn new() -> Self {
        let mut records = BTreeMap::new();
        // The root is always known, even before the first batch.
        records.insert(
            Document::ROOT_ID,
            NodeRecord {
                id: Document::ROOT_ID,
                name: Some(ROOT_NAME.to_string()),
                ..Default::default()
            },
        );
        Self {
            records,
            handles: BTreeMap::new(),
            handle_ids: BTreeMap::new(),
        }
    }

    /// The native handle currently bound to `id`.
    pub fn handle_of(&self, id: usize) -> Option<usize> {
        self.handles.get(&id).copied()
    }

    /// Reverse lookup: which document node does a native handle render?
    pub fn node_id_of(&self, handle: usize) -> Option<usize> {
        self.handle_ids.get(&handle).copied()
    }

    /// Apply one batch of committed records.
    pub fn update(&mut self, diff: &[NodeRecord], native: &mut impl NativeTree) {
        let mut patches: BTreeMap<usize, Patch> = BTreeMap::new();
        for record in diff {
            self.merge(record, &mut patches);
        }
        let doomed = self.clean(&mut patches);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            records = diff.len(),
            patched = patches.len(),
            dropped = doomed.len(),
            "applying render batch"
        );
        for (id, patch) in patches {
            self.redraw(native, id, patch);
        }
        for handle in doomed {
            native.remove(handle);
        }
    }

    /// Fold a record into the retained map and extend the node's pending
    /// patch with whatever differs. Patches accumulate: a batch may carry
    /// several records for one id and each contributes its own aspects.
    fn merge(&mut self, record: &NodeRecord, patches: &mut BTreeMap<usize, Patch>) {
        match self.records.get_mut(&record.id) {
            Some(old) => {
                let mut patch = patches.remove(&record.id).unwrap_or_default();
                if old.value != record.value {
                    patch.value = Some(record.value.clone().unwrap_or_default());
                    old.value = record.value.clone();
                }
                for (name, _) in &old.attributes {
                    if !record.attributes.iter().any(|(n, _)| n == name) {
                        patch.set_attribute(name, None);
                    }
                }
                for (name, value) in &record.attributes {
                    let unchanged = old
                        .attributes
                        .iter()
                        .any(|(n, v)| n == name && v == value);
                    if !unchanged {
                        patch.set_attribute(name, Some(value.clone()));
                    }
                }
                old.attributes = record.attributes.clone();
                if old.child_ids != record.child_ids {
                    patch.child_ids = Some(record.child_ids.clone());
                    old.child_ids = record.child_ids.clone();
                }
                if !patch.is_empty() {
                    patches.insert(record.id, patch);
                }
            }
            None => {
                let patch = Patch {
                    value: record.value.clone(),
                    attributes: record
                        .attributes
                        .iter()
                        .map(|(name, value)| (name.clone(), Some(value.clone())))
                        .collect(),
                    child_ids: Some(record.child_ids.clone()),
                };
                self.records.insert(record.id, record.clone());
                patches.insert(record.id, patch);
            }
        }
    }

    /// Drop every id no longer reachable from the root in the retained map.
    /// Returns the orphaned native handles; their nodes are destroyed after
    /// redraw so sibling positions stay meaningful while patching.
    fn clean(&mut self, patches: &mut BTreeMap<usize, Patch>) -> Vec<usize> {
        let mut alive = BTreeSet::new();
        let mut queue = vec![Document::ROOT_ID];
        while let Some(id) = queue.pop() {
            if !alive.insert(id) {
                continue;
            }
            if let Some(record) = self.records.get(&id) {
                queue.extend(record.child_ids.iter().copied());
            }
        }
        self.records.retain(|id, _| alive.contains(id));
        patches.retain(|id, _| alive.contains(id));
        let mut doomed = Vec::new();
        self.handles.retain(|id, handle| {
            if alive.contains(id) {
                true
            } else {
                doomed.push(*handle);
                false
            }
        });
        for handle in &doomed {
            self.handle_ids.remove(handle);
        }
        doomed
    }

    fn redraw(&mut self, native: &mut impl NativeTree, id: usize, patch: Patch) {
        let Some(handle) = self.ensure_handle(native, id) else {
            return;
        };
        for (name, value) in &patch.attributes {
            match value {
                // Empty and absent are the same attribute state.
                Some(value) if !value.is_empty() => native.set_attribute(handle, name, value),
                _ => native.remove_attribute(handle, name),
            }
        }
        if let Some(value) = &patch.value {
            native.set_text(handle, value);
        }
        if let Some(child_ids) = patch.child_ids {
            // First unlink native children whose id left the list; they
            // either moved to another parent (reinserted by that parent's
            // patch) or became unreachable (destroyed after redraw).
            for child_handle in native.child_handles(handle) {
                let keep = self
                    .node_id_of(child_handle)
                    .is_some_and(|child_id| child_ids.contains(&child_id));
                if !keep {
                    native.detach(child_handle);
                }
            }
            // Then walk the new list once, settling each child at its index.
            for (index, child_id) in child_ids.iter().enumerate() {
                let Some(child_handle) = self.ensure_handle(native, *child_id) else {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("render diff references unknown node {child_id}");
                    continue;
                };
                if native.child_handles(handle).get(index) != Some(&child_handle) {
                    native.insert_child_at(handle, index, child_handle);
                }
            }
        }
    }

    /// Resolve or create the native node for `id`. Virtual placeholders
    /// materialize as zero-width no-break spaces so every id occupies one
    /// native slot and positional patching stays aligned.
    fn ensure_handle(&mut self, native: &mut impl NativeTree, id: usize) -> Option<usize> {
        if let Some(&handle) = self.handles.get(&id) {
            return Some(handle);
        }
        let record = self.records.get(&id)?;
        let handle = if id == Document::ROOT_ID {
            native.root_handle()
        } else {
            match record.name.as_deref() {
                Some(TEXT_NAME) => native.create_text(record.value.as_deref().unwrap_or_default()),
                Some(VIRTUAL_NAME) => native.create_text("\u{feff}"),
                Some(SPACE_NAME) | Some(FRAGMENT_NAME) | Some(ROOT_NAME) => native.create_text(""),
                Some(tag) => native.create_element(tag),
                None => match &record.value {
                    Some(value) => native.create_text(value),
                    None => native.create_text(""),
                },
            }
        };
        self.handles.insert(id, handle);
        self.handle_ids.insert(handle, id);
        Some(handle)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

struct MirrorNode {
    /// `Some` for elements, `None` for text.
    name: Option<String>,
    text: String,
    attributes: Vec<(String, String)>,
    children: Vec<usize>,
    parent: Option<usize>,
}

impl MirrorNode {
    fn element(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            text: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn text(content: &str) -> Self {
        Self {
            name: None,
            text: content.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

/// In-memory native tree used headless and under test. Its HTML output for
/// a faithfully rendered document equals [`Document::to_html`].
pub struct MirrorTree {
    nodes: Slab<MirrorNode>,
    root: usize,
}

impl MirrorTree {
    pub fn new() -> Self {
        let mut nodes = Slab::new();
        let root = nodes.insert(MirrorNode::element(ROOT_NAME));
        Self { nodes, root }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, self.root);
        out
    }

    fn write(&self, out: &mut String, handle: usize) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        match node.name.as_deref() {
            Some(ROOT_NAME) => {
                for &child in &node.children {
                    self.write(out, child);
                }
            }
            Some(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                if VOID_TAGS.contains(&tag) {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for &child in &node.children {
                        self.write(out, child);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
            None => {
                // Placeholder characters are a caret detail, not content.
                let visible: String = node.text.chars().filter(|c| *c != '\u{feff}').collect();
                out.push_str(&html_escape::encode_text(&visible));
            }
        }
    }

    fn unlink(&mut self, handle: usize) {
        let Some(parent) = self.nodes.get(handle).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|child| *child != handle);
        }
        if let Some(node) = self.nodes.get_mut(handle) {
            node.parent = None;
        }
    }
}

impl Default for MirrorTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeTree for MirrorTree {
    fn root_handle(&mut self) -> usize {
        self.root
    }

    fn create_element(&mut self, name: &str) -> usize {
        self.nodes.insert(MirrorNode::element(name))
    }

    fn create_text(&mut self, content: &str) -> usize {
        self.nodes.insert(MirrorNode::text(content))
    }

    fn set_text(&mut self, handle: usize, content: &str) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.text = content.to_string();
        }
    }

    fn set_attribute(&mut self, handle: usize, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(handle) {
            match node.attributes.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => node.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, handle: usize, name: &str) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.attributes.retain(|(n, _)| n != name);
        }
    }

    fn child_handles(&self, handle: usize) -> Vec<usize> {
        self.nodes
            .get(handle)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn insert_child_at(&mut self, parent: usize, index: usize, child: usize) {
        if !self.nodes.contains(parent) || !self.nodes.contains(child) {
            return;
        }
        self.unlink(child);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    fn detach(&mut self, handle: usize) {
        self.unlink(handle);
    }

    fn remove(&mut self, handle: usize) {
        if handle == self.root {
            return;
        }
        self.unlink(handle);
        if self.nodes.contains(handle) {
            let node = self.nodes.remove(handle);
            // Children that survive (moved elsewhere) already re-parented;
            // the rest are doomed in their own right and cleaned by their
            // own removal.
            for child in node.children {
                if let Some(child_node) = self.nodes.get_mut(child) {
                    if child_node.parent == Some(handle) {
                        child_node.parent = None;
                    }
                }
            }
        }
    }
}

/// Backend that accepts every operation and renders nothing. Lets a headless
/// document run the full commit pipeline without retaining a second tree.
pub struct NoopNativeTree {
    next_handle: usize,
}

impl NoopNativeTree {
    pub fn new() -> Self {
        Self { next_handle: 0 }
    }
}

impl Default for NoopNativeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeTree for NoopNativeTree {
    fn root_handle(&mut self) -> usize {
        0
    }

    fn create_element(&mut self, _name: &str) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn create_text(&mut self, _content: &str) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn set_text(&mut self, _handle: usize, _content: &str) {}
    fn set_attribute(&mut self, _handle: usize, _name: &str, _value: &str) {}
    fn remove_attribute(&mut self, _handle: usize, _name: &str) {}

    fn child_handles(&self, _handle: usize) -> Vec<usize> {
        Vec::new()
    }

    fn insert_child_at(&mut self, _parent: usize, _index: usize, _child: usize) {}
    fn detach(&mut self, _handle: usize) {}
    fn remove(&mut self, _handle: usize) {}
}
