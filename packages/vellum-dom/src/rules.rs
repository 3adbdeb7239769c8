//! The rule engine.
//!
//! After every transaction the engine renormalizes the changed part of the
//! tree. Each node goes through a fixed pipeline: custom rules first, then
//! node-level normalization (whitespace, redundant virtuals), child order
//! constraints, parent constraints, and finally recursion into children.
//! Parent constraints can synthesize wrapper elements; wrappers synthesized
//! next to each other in the same pass are merged so that sibling content
//! shares one wrapper.

use std::collections::HashSet;

use markup5ever::{LocalName, QualName, ns};

use crate::document::{Document, EditError};
use crate::json::{JsonOptions, NodeSnapshot};
use crate::node::{Attributes, ElementData, Node, NodeData};
use crate::text::{self, CollapseOutcome};

/// Hard ceiling on rule applications (wrapper synthesis and custom rule
/// replacements) within one commit. Exceeding it aborts the transaction.
const MAX_RULE_APPLICATIONS: usize = 4096;

/// Node classification used by structural rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// An element with this tag name.
    Tag(LocalName),
    /// Any text-like node (visible text, virtual, space).
    Text,
    /// The editable root, or a detached fragment standing in for it.
    Editable,
}

impl Kind {
    pub fn tag(name: &str) -> Kind {
        Kind::Tag(LocalName::from(name))
    }
}

type Predicate = Box<dyn Fn(&NodeSnapshot) -> bool + Send + Sync>;
type Transform = Box<dyn Fn(&NodeSnapshot) -> Option<NodeSnapshot> + Send + Sync>;

struct CustomRule {
    predicate: Predicate,
    transform: Transform,
}

struct ParentRule {
    /// Allowed parents for the listed children. A `None` entry means the
    /// children are allowed anywhere.
    parents: Vec<Option<Kind>>,
    children: Vec<Kind>,
}

/// The set of rules a document is normalized against.
///
/// [`RuleSet::default`] carries the HTML editing schema: table structure,
/// list structure, paragraph-level blocks, inline format tags and line
/// breaks. [`RuleSet::empty`] carries no structural rules at all, which is
/// occasionally useful in tests and for free-form trees.
pub struct RuleSet {
    parent_rules: Vec<ParentRule>,
    order_rules: Vec<Vec<Kind>>,
    custom_rules: Vec<CustomRule>,
    void_tags: HashSet<LocalName>,
    unbreakable_tags: HashSet<LocalName>,
    format_tags: HashSet<LocalName>,
    block_tags: HashSet<LocalName>,
    paragraph_tags: HashSet<LocalName>,
}

const STYLE_TAGS: &[&str] = &[
    "p", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
];

const FORMAT_TAGS: &[&str] = &[
    "abbr", "acronym", "b", "bdi", "bdo", "big", "blink", "cite", "code", "dfn", "em", "font",
    "i", "ins", "kbd", "mark", "nobr", "q", "s", "samp", "small", "span", "strike", "strong",
    "sub", "sup", "tt", "u", "var",
];

pub(crate) const VOID_TAGS: &[&str] = &["br", "img", "hr", "iframe", "button", "input"];

const UNBREAKABLE_TAGS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr", "td", "th"];

const STRUCTURAL_BLOCK_TAGS: &[&str] = &[
    "div", "ul", "ol", "li", "table", "thead", "tbody", "tfoot", "tr",
];

fn kinds(tags: &[&str]) -> Vec<Kind> {
    tags.iter().map(|tag| Kind::tag(tag)).collect()
}

fn locals<'a>(tags: &'a [&'a str]) -> impl Iterator<Item = LocalName> + 'a {
    tags.iter().map(|tag| LocalName::from(*tag))
}

impl RuleSet {
    /// A rule set with no rules registered.
    pub fn empty() -> Self {
        Self {
            parent_rules: Vec::new(),
            order_rules: Vec::new(),
            custom_rules: Vec::new(),
            void_tags: HashSet::new(),
            unbreakable_tags: HashSet::new(),
            format_tags: locals(FORMAT_TAGS).collect(),
            block_tags: locals(STYLE_TAGS).chain(locals(STRUCTURAL_BLOCK_TAGS)).collect(),
            paragraph_tags: locals(STYLE_TAGS).chain(locals(&["li"])).collect(),
        }
    }

    /// Declare that `children` may only live under one of `parents`.
    /// Several rules may constrain the same child kind; their parent lists
    /// are unioned. A `None` parent entry lifts the constraint entirely.
    pub fn add_parent_constraint(&mut self, parents: Vec<Option<Kind>>, children: Vec<Kind>) {
        self.parent_rules.push(ParentRule { parents, children });
    }

    /// Declare a relative order for children of the listed kinds. Children
    /// of kinds named by the list are stably reordered to follow it.
    pub fn add_order_constraint(&mut self, order: Vec<Kind>) {
        self.order_rules.push(order);
    }

    /// Register a custom rewrite. When `predicate` matches a node's
    /// snapshot, `transform` may return a replacement subtree; returning a
    /// fragment splices several nodes in place of the matched one.
    /// Returning `None` leaves the node alone. Rules run in registration
    /// order and the first one that rewrites wins.
    pub fn add_custom_rule(
        &mut self,
        predicate: impl Fn(&NodeSnapshot) -> bool + Send + Sync + 'static,
        transform: impl Fn(&NodeSnapshot) -> Option<NodeSnapshot> + Send + Sync + 'static,
    ) {
        self.custom_rules.push(CustomRule {
            predicate: Box::new(predicate),
            transform: Box::new(transform),
        });
    }

    pub fn add_void(&mut self, tag: LocalName) {
        self.void_tags.insert(tag);
    }

    pub fn add_unbreakable(&mut self, tag: LocalName) {
        self.unbreakable_tags.insert(tag);
    }

    pub fn is_void(&self, tag: &LocalName) -> bool {
        self.void_tags.contains(tag)
    }

    pub fn is_unbreakable(&self, tag: &LocalName) -> bool {
        self.unbreakable_tags.contains(tag)
    }

    pub fn is_format(&self, tag: &LocalName) -> bool {
        self.format_tags.contains(tag)
    }

    pub fn is_block(&self, tag: &LocalName) -> bool {
        self.block_tags.contains(tag)
    }

    /// Paragraph-level blocks: the targets of line splitting.
    pub(crate) fn is_paragraph(&self, tag: &LocalName) -> bool {
        self.paragraph_tags.contains(tag)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        let mut rules = RuleSet::empty();
        for tag in locals(VOID_TAGS) {
            rules.add_void(tag);
        }
        for tag in locals(UNBREAKABLE_TAGS) {
            rules.add_unbreakable(tag);
        }

        let style = kinds(STYLE_TAGS);
        let format = kinds(FORMAT_TAGS);

        rules.add_parent_constraint(
            vec![Some(Kind::tag("table"))],
            kinds(&["tbody", "thead", "tfoot"]),
        );
        rules.add_parent_constraint(
            kinds(&["tbody", "thead", "tfoot"]).into_iter().map(Some).collect(),
            kinds(&["tr"]),
        );
        rules.add_parent_constraint(vec![Some(Kind::tag("tr"))], kinds(&["td", "th"]));
        rules.add_parent_constraint(
            kinds(&["ul", "ol"]).into_iter().map(Some).collect(),
            kinds(&["li"]),
        );
        rules.add_parent_constraint(
            std::iter::once(Some(Kind::Editable))
                .chain(kinds(&["div", "td", "th", "li"]).into_iter().map(Some))
                .collect(),
            style.iter().cloned().chain(kinds(&["ul", "ol"])).collect(),
        );
        rules.add_parent_constraint(
            style
                .iter()
                .cloned()
                .chain(format.iter().cloned())
                .chain(kinds(&["li"]))
                .map(Some)
                .collect(),
            format.iter().cloned().chain([Kind::Text]).collect(),
        );
        rules.add_parent_constraint(
            style
                .iter()
                .cloned()
                .chain(format.iter().cloned())
                .chain(kinds(&["div", "td", "th"]))
                .map(Some)
                .collect(),
            kinds(&["br"]),
        );

        rules.add_order_constraint(kinds(&["thead", "tbody", "tfoot"]));
        rules
    }
}

/// Run the pipeline over each root of the changed set.
pub(crate) fn apply(
    doc: &mut Document,
    rules: &RuleSet,
    roots: &[usize],
) -> Result<(), EditError> {
    let mut pass = RulePass {
        rules,
        synthesized: HashSet::new(),
        applications: 0,
    };
    for &root in roots {
        if doc.get_node(root).is_none() || !doc.is_attached(root) {
            continue;
        }
        pass.pipeline(doc, root)?;
    }
    Ok(())
}

struct RulePass<'rs> {
    rules: &'rs RuleSet,
    /// Wrapper elements synthesized during this pass, eligible for merging.
    synthesized: HashSet<usize>,
    applications: usize,
}

impl RulePass<'_> {
    fn pipeline(&mut self, doc: &mut Document, id: usize) -> Result<(), EditError> {
        if doc.get_node(id).is_none() || !doc.is_attached(id) {
            return Ok(());
        }
        if self.apply_custom(doc, id)? {
            return Ok(());
        }
        self.normalize_node(doc, id);
        if doc.get_node(id).is_none() {
            return Ok(());
        }
        self.apply_order(doc, id);
        self.check_parents(doc, id)?;
        if doc.get_node(id).is_none() || !doc.is_attached(id) {
            return Ok(());
        }
        self.propagate(doc, id)
    }

    fn bump(&mut self, id: usize) -> Result<(), EditError> {
        self.applications += 1;
        if self.applications > MAX_RULE_APPLICATIONS {
            return Err(EditError::RuleCycle(id));
        }
        Ok(())
    }

    // -- custom rules --------------------------------------------------

    /// Returns true when the node was replaced.
    fn apply_custom(&mut self, doc: &mut Document, id: usize) -> Result<bool, EditError> {
        if self.rules.custom_rules.is_empty() {
            return Ok(false);
        }
        let Some(snapshot) = doc.to_json(id, JsonOptions { keep_virtual: true }) else {
            return Ok(false);
        };
        let mut replacement = None;
        for rule in &self.rules.custom_rules {
            if !(rule.predicate)(&snapshot) {
                continue;
            }
            if let Some(result) = (rule.transform)(&snapshot) {
                replacement = Some(result);
                break;
            }
        }
        let Some(replacement) = replacement else {
            return Ok(false);
        };
        if replacement.same_shape(&snapshot) {
            return Err(EditError::RuleCycle(id));
        }
        self.bump(id)?;

        let Some(parent_id) = doc[id].parent else {
            return Ok(false);
        };
        let Some(index) = doc.child_index(id) else {
            return Ok(false);
        };
        let new_ids: Vec<usize> = if replacement.is_fragment() {
            replacement
                .children
                .iter()
                .map(|child| doc.build_subtree(child))
                .collect()
        } else {
            vec![doc.build_subtree(&replacement)]
        };
        doc.detach(id);
        doc.drop_subtree(id);
        for (offset, &new_id) in new_ids.iter().enumerate() {
            doc[parent_id].children.insert(index + offset, new_id);
            doc[new_id].parent = Some(parent_id);
        }
        doc.mark_changed(parent_id);
        for &new_id in &new_ids {
            self.pipeline(doc, new_id)?;
        }
        Ok(true)
    }

    // -- node-level normalization -------------------------------------

    fn normalize_node(&mut self, doc: &mut Document, id: usize) {
        match &doc[id].data {
            NodeData::Text(_) => self.normalize_text(doc, id),
            NodeData::Virtual => self.normalize_virtual(doc, id),
            NodeData::Space => self.normalize_space(doc, id),
            _ => {}
        }
    }

    fn normalize_text(&mut self, doc: &mut Document, id: usize) {
        // Fold runs of sibling text nodes into one, shifting any range
        // endpoint that sat in either half.
        while let Some(prev) = doc.previous_sibling(id) {
            let Some(prev_text) = doc[prev].text_data().map(|t| t.content.clone()) else {
                break;
            };
            let Some(parent_id) = doc[id].parent else {
                break;
            };
            if let Some(text) = doc.get_node_mut(id).and_then(|node| node.text_data_mut()) {
                text.content.insert_str(0, &prev_text);
            }
            let prev_chars = prev_text.chars().count();
            let mut range = doc.range;
            for point in [&mut range.start, &mut range.end] {
                if point.id == id {
                    point.offset += prev_chars;
                } else if point.id == prev {
                    point.id = id;
                }
            }
            doc.range = range;
            doc.detach(prev);
            doc.drop_subtree(prev);
            doc.mark_changed(parent_id);
            doc.mark_changed(id);
        }

        if doc.in_pre_context(id) {
            return;
        }
        let Some(content) = doc[id].text_data().map(|t| t.content.clone()) else {
            return;
        };

        let prev = rendered_prev_sibling(doc, id);
        let next = rendered_next_sibling(doc, id);
        let at_block_start = match prev {
            Some(sibling) => !self.is_inline(&doc[sibling]),
            None => true,
        };
        let at_block_end = match next {
            Some(sibling) => !self.is_inline(&doc[sibling]),
            None => true,
        };
        let prev_ends_with_space = prev
            .and_then(|sibling| doc[sibling].text_data())
            .is_some_and(|text| text.content.ends_with(' '));

        match text::collapse_whitespace(&content, at_block_start, at_block_end, prev_ends_with_space)
        {
            CollapseOutcome::Keep(new_content) => {
                if new_content != content {
                    if let Some(text) = doc.get_node_mut(id).and_then(|node| node.text_data_mut())
                    {
                        text.content = new_content;
                    }
                    doc.mark_changed(id);
                }
            }
            CollapseOutcome::Drop { had_newline } => {
                let parent_id = doc[id].parent;
                if had_newline && at_block_start && at_block_end {
                    // Source layout whitespace between blocks: keep the node
                    // as an architectural space so pretty output round-trips.
                    if let Some(node) = doc.get_node_mut(id) {
                        node.data = NodeData::Space;
                    }
                    doc.mark_changed(id);
                } else {
                    doc.detach(id);
                    doc.drop_subtree(id);
                }
                if let Some(parent_id) = parent_id {
                    doc.mark_changed(parent_id);
                }
            }
        }
    }

    fn normalize_virtual(&mut self, doc: &mut Document, id: usize) {
        let prev = rendered_prev_sibling(doc, id);
        let next = rendered_next_sibling(doc, id);
        let prev_virtual = doc
            .previous_sibling(id)
            .is_some_and(|sibling| doc[sibling].is_virtual());
        let beside_text = prev.is_some_and(|sibling| doc[sibling].is_text())
            || next.is_some_and(|sibling| doc[sibling].is_text());
        if prev_virtual || beside_text {
            let parent_id = doc[id].parent;
            doc.detach(id);
            doc.drop_subtree(id);
            if let Some(parent_id) = parent_id {
                doc.mark_changed(parent_id);
            }
        }
    }

    fn normalize_space(&mut self, doc: &mut Document, id: usize) {
        let prev_space = doc
            .previous_sibling(id)
            .is_some_and(|sibling| doc[sibling].is_space());
        if prev_space || doc.in_pre_context(id) {
            let parent_id = doc[id].parent;
            doc.detach(id);
            doc.drop_subtree(id);
            if let Some(parent_id) = parent_id {
                doc.mark_changed(parent_id);
            }
        }
    }

    fn is_inline(&self, node: &Node) -> bool {
        match &node.data {
            NodeData::Text(_) => true,
            NodeData::Element(data) => self.rules.is_format(&data.name.local),
            _ => false,
        }
    }

    // -- order constraints --------------------------------------------

    fn apply_order(&mut self, doc: &mut Document, id: usize) {
        if self.rules.order_rules.is_empty() || !doc[id].is_container() {
            return;
        }
        for order in &self.rules.order_rules {
            let children = doc[id].children.clone();
            let mut governed: Vec<(usize, usize, usize)> = Vec::new();
            for (position, &child) in children.iter().enumerate() {
                if let Some(rank) = order.iter().position(|kind| *kind == doc[child].kind()) {
                    governed.push((position, rank, child));
                }
            }
            if governed.len() < 2 {
                continue;
            }
            let mut sorted = governed.clone();
            sorted.sort_by_key(|(_, rank, _)| *rank);
            if sorted.iter().map(|g| g.2).eq(governed.iter().map(|g| g.2)) {
                continue;
            }
            let mut new_children = children.clone();
            for ((position, _, _), (_, _, child)) in governed.iter().zip(sorted.iter()) {
                new_children[*position] = *child;
            }
            doc[id].children = new_children;
            doc.mark_changed(id);
        }
    }

    // -- parent constraints -------------------------------------------

    fn check_parents(&mut self, doc: &mut Document, id: usize) -> Result<(), EditError> {
        let kind = doc[id].kind();
        if kind == Kind::Editable || doc[id].is_space() {
            return Ok(());
        }

        let mut allowed: Vec<Kind> = Vec::new();
        for rule in &self.rules.parent_rules {
            if rule.children.contains(&kind) {
                if rule.parents.contains(&None) {
                    return Ok(());
                }
                allowed.extend(rule.parents.iter().flatten().cloned());
            }
        }
        if allowed.is_empty() {
            return Ok(());
        }
        let Some(parent_id) = doc[id].parent else {
            return Ok(());
        };
        let parent_kind = doc[parent_id].kind();
        if allowed.contains(&parent_kind) {
            return Ok(());
        }

        // Breadth-first search outward from the current parent kind through
        // the construction edges declared by the rules: a candidate kind
        // reaches the kinds it may contain. The first candidate that is an
        // allowed parent becomes the wrapper.
        let mut candidates: Vec<Kind> = vec![parent_kind.clone()];
        for rule in &self.rules.parent_rules {
            if rule.parents.contains(&None) {
                candidates.extend(rule.children.iter().cloned());
            }
        }
        let mut seen: HashSet<Kind> = candidates.iter().cloned().collect();
        let mut index = 0;
        while index < candidates.len() {
            let candidate = candidates[index].clone();
            index += 1;
            if candidate != parent_kind && allowed.contains(&candidate) {
                return self.generate_parent(doc, id, &candidate);
            }
            for rule in &self.rules.parent_rules {
                if rule.parents.iter().any(|p| p.as_ref() == Some(&candidate)) {
                    for child in &rule.children {
                        if seen.insert(child.clone()) {
                            candidates.push(child.clone());
                        }
                    }
                }
            }
        }

        // Nothing constructible leads to an allowed parent. Unless the
        // node may live directly under the editable root, force the first
        // allowed wrapper and let its own parent check continue the chain.
        if allowed.contains(&Kind::Editable) {
            return Ok(());
        }
        let target = allowed
            .iter()
            .find(|kind| matches!(kind, Kind::Tag(_)))
            .cloned();
        match target {
            Some(kind) => self.generate_parent(doc, id, &kind),
            None => Ok(()),
        }
    }

    fn generate_parent(
        &mut self,
        doc: &mut Document,
        id: usize,
        kind: &Kind,
    ) -> Result<(), EditError> {
        let Kind::Tag(tag) = kind else {
            return Ok(());
        };
        self.bump(id)?;
        let Some(parent_id) = doc[id].parent else {
            return Ok(());
        };
        let Some(index) = doc.child_index(id) else {
            return Ok(());
        };
        let wrapper = doc.create_node(NodeData::Element(ElementData::new(
            QualName::new(None, ns!(html), tag.clone()),
            Attributes::new(),
        )));
        doc[parent_id].children.insert(index, wrapper);
        doc[wrapper].parent = Some(parent_id);
        doc.detach(id);
        doc[wrapper].children.push(id);
        doc[id].parent = Some(wrapper);
        self.synthesized.insert(wrapper);
        doc.mark_changed(parent_id);
        doc.mark_changed(wrapper);
        self.pipeline(doc, wrapper)
    }

    // -- propagation and wrapper merging ------------------------------

    fn propagate(&mut self, doc: &mut Document, id: usize) -> Result<(), EditError> {
        let children = doc[id].children.clone();
        for child in children {
            // Skip children that another step already moved or removed.
            if doc.get_node(child).is_some_and(|node| node.parent == Some(id)) {
                self.pipeline(doc, child)?;
            }
        }
        self.merge_pass(doc, id);
        Ok(())
    }

    fn merge_pass(&mut self, doc: &mut Document, parent_id: usize) {
        let children = doc[parent_id].children.clone();
        for child in children {
            if !self.synthesized.contains(&child) {
                continue;
            }
            if doc.get_node(child).is_none() || doc[child].parent != Some(parent_id) {
                continue;
            }
            if let Some(prev) = rendered_prev_sibling(doc, child) {
                if self.mergeable(doc, prev, child) {
                    self.merge_into(doc, prev, child);
                    continue;
                }
            }
            if let Some(next) = rendered_next_sibling(doc, child) {
                if self.mergeable(doc, child, next) {
                    self.merge_into(doc, child, next);
                }
            }
        }
    }

    fn mergeable(&self, doc: &Document, left: usize, right: usize) -> bool {
        if !self.synthesized.contains(&left) || !self.synthesized.contains(&right) {
            return false;
        }
        let (Some(left_el), Some(right_el)) =
            (doc[left].element_data(), doc[right].element_data())
        else {
            return false;
        };
        left_el.name.local == right_el.name.local && left_el.attrs.same_set(&right_el.attrs)
    }

    /// Append `right`'s children to `left` and drop `right`.
    fn merge_into(&mut self, doc: &mut Document, left: usize, right: usize) {
        let children = std::mem::take(&mut doc[right].children);
        for &child in &children {
            doc[child].parent = Some(left);
        }
        doc[left].children.extend(children);
        let parent_id = doc[right].parent;
        doc.detach(right);
        doc.drop_subtree(right);
        self.synthesized.remove(&right);
        doc.mark_changed(left);
        if let Some(parent_id) = parent_id {
            doc.mark_changed(parent_id);
        }
    }
}

/// Previous sibling ignoring nodes that do not render (virtual, space).
fn rendered_prev_sibling(doc: &Document, id: usize) -> Option<usize> {
    let mut current = doc.previous_sibling(id);
    while let Some(sibling) = current {
        if doc[sibling].is_virtual() || doc[sibling].is_space() {
            current = doc.previous_sibling(sibling);
        } else {
            return Some(sibling);
        }
    }
    None
}

fn rendered_next_sibling(doc: &Document, id: usize) -> Option<usize> {
    let mut current = doc.next_sibling(id);
    while let Some(sibling) = current {
        if doc[sibling].is_virtual() || doc[sibling].is_space() {
            current = doc.next_sibling(sibling);
        } else {
            return Some(sibling);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentConfig};
    use markup5ever::local_name;

    fn doc() -> Document {
        Document::new(DocumentConfig::default())
    }

    #[test]
    fn stray_text_is_wrapped_in_a_paragraph() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let text = mutr.create_text_node("hello");
            mutr.append_children(root, &[text]);
        }
        assert_eq!(doc.to_html(), "<p>hello</p>");
    }

    #[test]
    fn adjacent_stray_texts_share_one_wrapper() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let a = mutr.create_text_node("a");
            let b = mutr.create_text_node("b");
            mutr.append_children(root, &[a, b]);
        }
        assert_eq!(doc.to_html(), "<p>ab</p>");
        let root_children = &doc[doc.root_id()].children;
        assert_eq!(root_children.len(), 1);
    }

    #[test]
    fn orphan_row_grows_its_table_chain() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let tr = mutr.create_element_tag(local_name!("tr"));
            let td = mutr.create_element_tag(local_name!("td"));
            mutr.append_children(tr, &[td]);
            mutr.append_children(root, &[tr]);
        }
        assert_eq!(doc.to_html(), "<table><tbody><tr><td></td></tr></tbody></table>");
    }

    #[test]
    fn whitespace_collapses_inside_paragraph() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let text = mutr.create_text_node("  a   b  ");
            mutr.append_children(p, &[text]);
            mutr.append_children(root, &[p]);
        }
        assert_eq!(doc.to_html(), "<p>a b</p>");
    }

    #[test]
    fn pre_content_is_left_alone() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let pre = mutr.create_element_tag(local_name!("pre"));
            let text = mutr.create_text_node("  a   b  ");
            mutr.append_children(pre, &[text]);
            mutr.append_children(root, &[pre]);
        }
        assert_eq!(doc.to_html(), "<pre>  a   b  </pre>");
    }

    #[test]
    fn text_in_list_item_is_not_rewrapped() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let ul = mutr.create_element_tag(local_name!("ul"));
            let li = mutr.create_element_tag(local_name!("li"));
            let text = mutr.create_text_node("item");
            mutr.append_children(li, &[text]);
            mutr.append_children(ul, &[li]);
            mutr.append_children(root, &[ul]);
        }
        assert_eq!(doc.to_html(), "<ul><li>item</li></ul>");
    }

    #[test]
    fn table_sections_are_reordered() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let table = mutr.create_element_tag(local_name!("table"));
            let tfoot = mutr.create_element_tag(local_name!("tfoot"));
            let thead = mutr.create_element_tag(local_name!("thead"));
            let tbody = mutr.create_element_tag(local_name!("tbody"));
            mutr.append_children(table, &[tfoot, thead, tbody]);
            mutr.append_children(root, &[table]);
        }
        assert_eq!(
            doc.to_html(),
            "<table><thead></thead><tbody></tbody><tfoot></tfoot></table>"
        );
    }

    #[test]
    fn custom_rule_rewrites_matching_nodes() {
        let mut rules = RuleSet::default();
        // Promote <b> elements to <strong>, keeping children.
        rules.add_custom_rule(
            |snapshot| snapshot.tag() == Some("b"),
            |snapshot| {
                let mut replacement = NodeSnapshot::element("strong");
                replacement.children = snapshot.children.clone();
                Some(replacement)
            },
        );
        let mut doc = Document::new(DocumentConfig {
            rules: Some(rules),
            ..Default::default()
        });
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let p = mutr.create_element_tag(local_name!("p"));
            let b = mutr.create_element_tag(local_name!("b"));
            let text = mutr.create_text_node("bold");
            mutr.append_children(b, &[text]);
            mutr.append_children(p, &[b]);
            mutr.append_children(root, &[p]);
        }
        assert_eq!(doc.to_html(), "<p><strong>bold</strong></p>");
    }

    #[test]
    fn custom_rule_returning_its_input_fails_the_commit() {
        let mut rules = RuleSet::default();
        rules.add_custom_rule(
            |snapshot| snapshot.tag() == Some("b"),
            |snapshot| Some(snapshot.clone()),
        );
        let mut doc = Document::new(DocumentConfig {
            rules: Some(rules),
            ..Default::default()
        });
        let root = doc.root_id();
        let result = {
            let mut mutr = doc.mutate();
            let b = mutr.create_element_tag(local_name!("b"));
            mutr.append_children(root, &[b]);
            mutr.finish()
        };
        assert!(matches!(result, Err(EditError::RuleCycle(_))));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut doc = doc();
        let root = doc.root_id();
        {
            let mut mutr = doc.mutate();
            let text = mutr.create_text_node("  hello   world ");
            mutr.append_children(root, &[text]);
        }
        let first = doc.to_html();
        // Touch the root again so the whole tree renormalizes.
        {
            let mut mutr = doc.mutate();
            mutr.touch(root);
        }
        assert_eq!(doc.to_html(), first);
    }
}
