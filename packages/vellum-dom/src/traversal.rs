use std::cmp::Ordering;

use crate::document::Document;
use crate::node::Node;

/// Depth-first pre-order traversal of a subtree.
pub struct TreeTraverser<'a> {
    doc: &'a Document,
    stack: Vec<usize>,
}

impl<'a> TreeTraverser<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self::new_with_root(doc, doc.root_id())
    }

    pub fn new_with_root(doc: &'a Document, root: usize) -> Self {
        let mut stack = Vec::with_capacity(32);
        stack.push(root);
        TreeTraverser { doc, stack }
    }
}

impl Iterator for TreeTraverser<'_> {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        let id = self.stack.pop()?;
        let node = self.doc.get_node(id)?;
        self.stack.extend(node.children.iter().rev());
        Some(id)
    }
}

/// Walks from a node up to the root, yielding ancestors.
pub struct AncestorTraverser<'a> {
    doc: &'a Document,
    current: usize,
}

impl<'a> AncestorTraverser<'a> {
    pub fn new(doc: &'a Document, node_id: usize) -> Self {
        AncestorTraverser {
            doc,
            current: node_id,
        }
    }
}

impl Iterator for AncestorTraverser<'_> {
    type Item = usize;
    fn next(&mut self) -> Option<Self::Item> {
        let current_node = self.doc.get_node(self.current)?;
        self.current = current_node.parent?;
        Some(self.current)
    }
}

impl Document {
    /// The chain of ids from the root down to (and including) `id`.
    pub fn ancestor_chain(&self, id: usize) -> Vec<usize> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.get_node(current).and_then(|node| node.parent) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    pub fn is_ancestor_of(&self, ancestor_id: usize, id: usize) -> bool {
        AncestorTraverser::new(self, id).any(|candidate| candidate == ancestor_id)
    }

    /// Nearest ancestor-or-self satisfying the predicate.
    pub fn ancestor_matching(
        &self,
        id: usize,
        predicate: impl Fn(&Node) -> bool,
    ) -> Option<usize> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get_node(node_id)?;
            if predicate(node) {
                return Some(node_id);
            }
            current = node.parent;
        }
        None
    }

    /// Deepest node that contains both `a` and `b` (possibly one of them).
    pub fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let chain_a = self.ancestor_chain(a);
        let chain_b = self.ancestor_chain(b);
        chain_a
            .iter()
            .zip(chain_b.iter())
            .take_while(|(x, y)| x == y)
            .map(|(x, _)| *x)
            .last()
    }

    /// Document order of two attached nodes. An ancestor sorts before its
    /// descendants. Nodes in disjoint trees compare equal.
    pub fn compare_document_order(&self, a: usize, b: usize) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let chain_a = self.ancestor_chain(a);
        let chain_b = self.ancestor_chain(b);
        let common_len = chain_a
            .iter()
            .zip(chain_b.iter())
            .take_while(|(x, y)| x == y)
            .count();
        if common_len == 0 {
            return Ordering::Equal;
        }
        if common_len == chain_a.len() {
            return Ordering::Less;
        }
        if common_len == chain_b.len() {
            return Ordering::Greater;
        }
        let parent = chain_a[common_len - 1];
        let branch_a = chain_a[common_len];
        let branch_b = chain_b[common_len];
        for child in &self[parent].children {
            if *child == branch_a {
                return Ordering::Less;
            }
            if *child == branch_b {
                return Ordering::Greater;
            }
        }
        Ordering::Equal
    }

    /// Next node in document order, entering children first.
    pub fn next_in_order(&self, id: usize) -> Option<usize> {
        let node = self.get_node(id)?;
        if let Some(first_child) = node.children.first() {
            return Some(*first_child);
        }
        let mut current = id;
        loop {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.get_node(current)?.parent?;
        }
    }

    /// Previous node in document order.
    pub fn prev_in_order(&self, id: usize) -> Option<usize> {
        match self.previous_sibling(id) {
            Some(sibling) => Some(self.last_descendant(sibling)),
            None => self.get_node(id)?.parent,
        }
    }

    fn last_descendant(&self, id: usize) -> usize {
        let mut current = id;
        while let Some(last) = self.get_node(current).and_then(|node| node.children.last()) {
            current = *last;
        }
        current
    }

    pub fn first_leaf(&self, id: usize) -> usize {
        let mut current = id;
        while let Some(first) = self.get_node(current).and_then(|node| node.children.first()) {
            current = *first;
        }
        current
    }

    pub fn last_leaf(&self, id: usize) -> usize {
        self.last_descendant(id)
    }

    /// Next leaf in document order after `id`, not descending into `id`
    /// itself.
    pub fn next_leaf(&self, id: usize) -> Option<usize> {
        let mut current = id;
        loop {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(self.first_leaf(sibling));
            }
            current = self.get_node(current)?.parent?;
        }
    }

    pub fn prev_leaf(&self, id: usize) -> Option<usize> {
        let mut current = id;
        loop {
            if let Some(sibling) = self.previous_sibling(current) {
                return Some(self.last_descendant(sibling));
            }
            current = self.get_node(current)?.parent?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentConfig;
    use markup5ever::local_name;

    fn sample_doc() -> (Document, usize, usize, usize) {
        let mut doc = Document::new(DocumentConfig::default());
        let root = doc.root_id();
        let (p1, text, p2) = {
            let mut mutr = doc.mutate();
            let p1 = mutr.create_element_tag(local_name!("p"));
            let text = mutr.create_text_node("one");
            mutr.append_children(p1, &[text]);
            let p2 = mutr.create_element_tag(local_name!("p"));
            let text2 = mutr.create_text_node("two");
            mutr.append_children(p2, &[text2]);
            mutr.append_children(root, &[p1, p2]);
            (p1, text, p2)
        };
        (doc, p1, text, p2)
    }

    #[test]
    fn pre_order_traversal_visits_parents_first() {
        let (doc, p1, text, p2) = sample_doc();
        let order: Vec<usize> = TreeTraverser::new(&doc).collect();
        let pos = |id: usize| order.iter().position(|x| *x == id).unwrap();
        assert_eq!(pos(doc.root_id()), 0);
        assert!(pos(p1) < pos(text));
        assert!(pos(text) < pos(p2));
    }

    #[test]
    fn document_order_comparison() {
        let (doc, p1, text, p2) = sample_doc();
        assert_eq!(doc.compare_document_order(p1, p2), Ordering::Less);
        assert_eq!(doc.compare_document_order(p2, text), Ordering::Greater);
        assert_eq!(doc.compare_document_order(p1, text), Ordering::Less);
        assert_eq!(doc.compare_document_order(text, text), Ordering::Equal);
    }

    #[test]
    fn leaf_navigation_crosses_blocks() {
        let (doc, p1, text, p2) = sample_doc();
        let second_text = doc.first_leaf(p2);
        assert!(doc[second_text].is_text());
        assert_eq!(doc.next_leaf(text), Some(second_text));
        assert_eq!(doc.prev_leaf(second_text), Some(text));
        assert_eq!(doc.prev_leaf(doc.first_leaf(p1)), None);
    }

    #[test]
    fn in_order_stepping_descends_then_crosses() {
        let (doc, p1, text, p2) = sample_doc();
        let root = doc.root_id();
        assert_eq!(doc.next_in_order(root), Some(p1));
        assert_eq!(doc.next_in_order(p1), Some(text));
        assert_eq!(doc.next_in_order(text), Some(p2));
        assert_eq!(doc.next_in_order(doc.first_leaf(p2)), None);
        assert_eq!(doc.prev_in_order(p2), Some(text));
        assert_eq!(doc.prev_in_order(p1), Some(root));
        assert_eq!(doc.prev_in_order(root), None);
    }

    #[test]
    fn ancestry_is_strict() {
        let (doc, p1, text, p2) = sample_doc();
        assert!(doc.is_ancestor_of(doc.root_id(), text));
        assert!(doc.is_ancestor_of(p1, text));
        assert!(!doc.is_ancestor_of(p1, p2));
        assert!(!doc.is_ancestor_of(text, text));
    }

    #[test]
    fn ancestor_matching_checks_self_first() {
        let (doc, p1, text, _) = sample_doc();
        let is_p = |node: &Node| node.tag_name() == Some(&local_name!("p"));
        assert_eq!(doc.ancestor_matching(text, is_p), Some(p1));
        assert_eq!(doc.ancestor_matching(p1, is_p), Some(p1));
        assert_eq!(doc.ancestor_matching(text, |_| false), None);
    }
}
