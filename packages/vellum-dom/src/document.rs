use std::collections::HashSet;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use markup5ever::{LocalName, QualName, local_name, ns};
use thiserror::Error;

use crate::config::DocumentConfig;
use crate::history::{History, HistoryRestore};
use crate::html::{HtmlParserProvider, PlainTextParserProvider};
use crate::json::{self, NodeRecord};
use crate::mutator::DocumentMutator;
use crate::node::{Attribute, Attributes, Node, NodeData};
use crate::range::{Range, RangePoint};
use crate::rules::RuleSet;

/// Errors surfaced by transaction commit and range assignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("range endpoint {0} is not attached to the document")]
    InvalidRange(usize),
    #[error("rule normalization did not converge at node {0}")]
    RuleCycle(usize),
    #[error("node {0} is unbreakable and cannot be split")]
    UnbreakableViolation(usize),
}

/// An editable document tree.
///
/// Nodes live in an arena indexed by id. The root always has id 0. Ids are
/// never reused: removing a node retires its id for the lifetime of the
/// document, which lets history restore removed nodes under their original
/// ids.
///
/// All mutation goes through [`DocumentMutator`], obtained from
/// [`Document::mutate`]. Dropping (or finishing) the mutator commits the
/// transaction: the rule engine renormalizes everything that changed, a
/// history step is recorded, and a render diff is queued for
/// [`Document::take_render_diff`].
pub struct Document {
    nodes: Vec<Option<Node>>,
    next_id: usize,
    rules: Arc<RuleSet>,
    html_provider: Arc<dyn HtmlParserProvider>,
    pub(crate) history: History,
    pub(crate) range: Range,
    pub(crate) changed: HashSet<usize>,
    pub(crate) pending_render: Vec<NodeRecord>,
    pub(crate) indent: usize,
}

impl Document {
    pub fn new(config: DocumentConfig) -> Self {
        let rules = Arc::new(config.rules.unwrap_or_default());
        let html_provider = config
            .html_parser_provider
            .unwrap_or_else(|| Arc::new(PlainTextParserProvider));
        let mut doc = Self {
            nodes: Vec::with_capacity(64),
            next_id: 0,
            rules,
            html_provider,
            history: History::new(),
            range: Range::collapsed(RangePoint { id: 0, offset: 0 }),
            changed: HashSet::new(),
            pending_render: Vec::new(),
            indent: config.indent.unwrap_or(4),
        };
        let root_id = doc.create_node(NodeData::Root);
        debug_assert_eq!(root_id, Self::ROOT_ID);
        doc.changed.clear();
        doc.clear_history();
        doc
    }

    pub const ROOT_ID: usize = 0;

    pub fn root_id(&self) -> usize {
        Self::ROOT_ID
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub(crate) fn shared_rules(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    pub(crate) fn html_provider(&self) -> Arc<dyn HtmlParserProvider> {
        Arc::clone(&self.html_provider)
    }

    pub fn get_node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id).and_then(|slot| slot.as_ref())
    }

    pub fn get_node_mut(&mut self, id: usize) -> Option<&mut Node> {
        self.nodes.get_mut(id).and_then(|slot| slot.as_mut())
    }

    /// Upper bound over all ids ever allocated.
    pub(crate) fn id_bound(&self) -> usize {
        self.next_id
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        if id >= self.nodes.len() {
            self.nodes.resize_with(id + 1, || None);
        }
        self.nodes[id] = Some(Node::new(id, data));
        self.changed.insert(id);
        id
    }

    /// Recreate a node under a previously retired id. Used when history
    /// restores content that was removed.
    pub(crate) fn restore_node(&mut self, id: usize, data: NodeData) {
        if id >= self.nodes.len() {
            self.nodes.resize_with(id + 1, || None);
        }
        self.nodes[id] = Some(Node::new(id, data));
        self.next_id = self.next_id.max(id + 1);
    }

    pub(crate) fn mark_changed(&mut self, id: usize) {
        self.changed.insert(id);
    }

    /// Whether the node's parent chain reaches the root.
    pub fn is_attached(&self, id: usize) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.get_node(current) else {
                return false;
            };
            if node.is_root() {
                return true;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Position of `id` within its parent's child list.
    pub fn child_index(&self, id: usize) -> Option<usize> {
        let parent_id = self.get_node(id)?.parent?;
        self.get_node(parent_id)?
            .children
            .iter()
            .position(|child| *child == id)
    }

    pub fn previous_sibling(&self, id: usize) -> Option<usize> {
        let index = self.child_index(id)?;
        let parent_id = self.get_node(id)?.parent?;
        if index == 0 {
            None
        } else {
            Some(self[parent_id].children[index - 1])
        }
    }

    pub fn next_sibling(&self, id: usize) -> Option<usize> {
        let index = self.child_index(id)?;
        let parent_id = self.get_node(id)?.parent?;
        self[parent_id].children.get(index + 1).copied()
    }

    /// Unlink a node from its parent without dropping it.
    pub(crate) fn detach(&mut self, id: usize) {
        let Some(parent_id) = self.get_node(id).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent) = self.get_node_mut(parent_id) {
            parent.children.retain(|child| *child != id);
        }
        if let Some(node) = self.get_node_mut(id) {
            node.parent = None;
        }
    }

    /// Retire a subtree. The ids are gone for good; history keeps enough
    /// state to restore them.
    pub(crate) fn drop_subtree(&mut self, id: usize) {
        let Some(node) = self.nodes.get_mut(id).and_then(Option::take) else {
            return;
        };
        self.changed.remove(&id);
        for child in node.children {
            self.drop_subtree(child);
        }
    }

    pub(crate) fn in_pre_context(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get_node(node_id) else {
                return false;
            };
            if node.tag_name() == Some(&local_name!("pre")) {
                return true;
            }
            current = node.parent;
        }
        false
    }

    /// Open an editing transaction.
    pub fn mutate(&mut self) -> DocumentMutator<'_> {
        DocumentMutator::new(self)
    }

    /// Commit the current transaction: sweep stray nodes, renormalize the
    /// changed set, record a history step and queue a render diff.
    pub(crate) fn commit(&mut self) -> Result<(), EditError> {
        self.sweep_unattached();
        if self.changed.is_empty() {
            return Ok(());
        }

        let roots = self.changed_roots();
        let rules = self.shared_rules();
        if let Err(err) = crate::rules::apply(self, &rules, &roots) {
            #[cfg(feature = "tracing")]
            tracing::error!("transaction aborted: {err}");
            self.changed.clear();
            return Err(err);
        }
        self.sweep_unattached();

        let mut ids: Vec<usize> = self.changed.drain().collect();
        ids.sort_unstable();
        let mut diff = Vec::with_capacity(ids.len());
        for id in ids {
            if self.is_attached(id) {
                if let Some(record) = self.record_for(id) {
                    diff.push(record);
                }
            }
        }

        self.clamp_range_after_commit();

        if !diff.is_empty() {
            self.history.record(&diff, self.range);
            self.pending_render.extend(diff);
        }
        Ok(())
    }

    /// Drop nodes that were created during the transaction but never
    /// attached anywhere (parser scaffolding, unused imports).
    fn sweep_unattached(&mut self) {
        let stray: Vec<usize> = self
            .changed
            .iter()
            .copied()
            .filter(|id| {
                self.get_node(*id)
                    .is_some_and(|node| node.parent.is_none() && !node.is_root())
            })
            .collect();
        for id in stray {
            self.drop_subtree(id);
        }
        let nodes = &self.nodes;
        self.changed
            .retain(|id| nodes.get(*id).is_some_and(|slot| slot.is_some()));
    }

    /// Minimal ancestor cover of the changed set: a changed node whose
    /// ancestor also changed is normalized by the ancestor's pass.
    fn changed_roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = self
            .changed
            .iter()
            .copied()
            .filter(|id| self.is_attached(*id))
            .filter(|id| {
                let mut current = self[*id].parent;
                while let Some(ancestor) = current {
                    if self.changed.contains(&ancestor) {
                        return false;
                    }
                    current = self[ancestor].parent;
                }
                true
            })
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Drain the queued render diff. Records accumulate across commits and
    /// undo/redo restores until the renderer consumes them.
    pub fn take_render_diff(&mut self) -> Vec<NodeRecord> {
        std::mem::take(&mut self.pending_render)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of recorded steps, including the baseline.
    pub fn history_steps(&self) -> usize {
        self.history.len()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.prepare_undo() {
            Some(restore) => {
                self.apply_history(restore);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.prepare_redo() {
            Some(restore) => {
                self.apply_history(restore);
                true
            }
            None => false,
        }
    }

    /// Reset history so the current content becomes the baseline step.
    pub fn clear_history(&mut self) {
        self.history.reset();
        let records = self.all_records();
        self.history.record_baseline(&records, self.range);
    }

    fn all_records(&self) -> Vec<NodeRecord> {
        let mut records = Vec::new();
        let mut stack = vec![Self::ROOT_ID];
        while let Some(id) = stack.pop() {
            if let Some(record) = self.record_for(id) {
                stack.extend(record.child_ids.iter().rev());
                records.push(record);
            }
        }
        records
    }

    fn apply_history(&mut self, restore: HistoryRestore) {
        let HistoryRestore {
            target,
            mut records,
            range,
        } = restore;
        self.collect_resurrections(target, &mut records);
        self.apply_records(&records);
        self.prune_unreachable();
        self.history.set_offset(target);
        self.restore_range(range);
        self.pending_render.extend(records);
    }

    /// Extend a restore diff with records for child ids that no longer have
    /// an arena node. Removal steps only record the parent; bringing the
    /// removed child back requires its own last known record.
    fn collect_resurrections(&self, step: usize, records: &mut Vec<NodeRecord>) {
        let mut seen: HashSet<usize> = records.iter().map(|record| record.id).collect();
        let mut queue: Vec<usize> = records
            .iter()
            .flat_map(|record| record.child_ids.iter().copied())
            .collect();
        while let Some(id) = queue.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.insert(id);
            if self.get_node(id).is_some() {
                continue;
            }
            let Some(record) = self.history.resolve(id, step) else {
                #[cfg(feature = "tracing")]
                tracing::warn!("no history record for node {id} at step {step}");
                continue;
            };
            queue.extend(record.child_ids.iter().copied());
            records.push(record.clone());
        }
    }

    fn apply_records(&mut self, records: &[NodeRecord]) {
        for record in records {
            match self.get_node_mut(record.id) {
                Some(node) => apply_record_data(node, record),
                None => {
                    self.restore_node(record.id, record_data(record));
                }
            }
        }
        for record in records {
            let child_ids = record.child_ids.clone();
            if let Some(node) = self.get_node_mut(record.id) {
                node.children = child_ids.clone();
            }
            for child_id in child_ids {
                if let Some(child) = self.get_node_mut(child_id) {
                    child.parent = Some(record.id);
                }
            }
        }
    }

    /// Drop every node not reachable from the root and fix parent pointers
    /// from the authoritative child lists.
    fn prune_unreachable(&mut self) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![Self::ROOT_ID];
        reachable[Self::ROOT_ID] = true;
        while let Some(id) = stack.pop() {
            let children = match self.get_node(id) {
                Some(node) => node.children.clone(),
                None => continue,
            };
            for child_id in children {
                if self.get_node(child_id).is_none() {
                    continue;
                }
                if !reachable[child_id] {
                    reachable[child_id] = true;
                    if let Some(child) = self.get_node_mut(child_id) {
                        child.parent = Some(id);
                    }
                    stack.push(child_id);
                }
            }
        }
        for id in 0..self.nodes.len() {
            if !reachable[id] && self.nodes[id].is_some() {
                self.nodes[id] = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Range
    // ------------------------------------------------------------------

    pub fn range(&self) -> Range {
        self.range
    }

    fn restore_range(&mut self, range: Range) {
        self.range = if self.is_attached(range.start.id) && self.is_attached(range.end.id) {
            range
        } else {
            Range::collapsed(RangePoint {
                id: Self::ROOT_ID,
                offset: 0,
            })
        };
    }
}

fn record_data(record: &NodeRecord) -> NodeData {
    json::node_data_from(
        record.name.as_deref(),
        record.value.as_deref(),
        &record.attributes,
    )
}

fn apply_record_data(node: &mut Node, record: &NodeRecord) {
    match &mut node.data {
        NodeData::Text(text) => {
            text.content = record.value.clone().unwrap_or_default();
        }
        NodeData::Element(element) => {
            element.attrs = record
                .attributes
                .iter()
                .map(|(attr_name, value)| Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name.as_str())),
                    value: value.clone(),
                })
                .collect::<Attributes>();
        }
        _ => {}
    }
}

impl Index<usize> for Document {
    type Output = Node;
    #[track_caller]
    fn index(&self, id: usize) -> &Node {
        match self.nodes.get(id) {
            Some(Some(node)) => node,
            _ => panic!("node {id} has been removed from the document"),
        }
    }
}

impl IndexMut<usize> for Document {
    #[track_caller]
    fn index_mut(&mut self, id: usize) -> &mut Node {
        match self.nodes.get_mut(id) {
            Some(Some(node)) => node,
            _ => panic!("node {id} has been removed from the document"),
        }
    }
}
