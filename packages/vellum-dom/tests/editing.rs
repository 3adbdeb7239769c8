//! End-to-end editing scenarios: transactions, the rule pass, history and
//! the renderer working against one live document.

use vellum_dom::{
    Document, DocumentConfig, DocumentMutator, EditError, JsonOptions, MirrorTree, RangePoint,
    Renderer, local_name,
};

fn paragraph(mutr: &mut DocumentMutator<'_>, text: &str) -> (usize, usize) {
    let p = mutr.create_element_tag(local_name!("p"));
    let t = mutr.create_text_node(text);
    mutr.append_children(p, &[t]);
    (p, t)
}

fn sync(doc: &mut Document, renderer: &mut Renderer, mirror: &mut MirrorTree) {
    let diff = doc.take_render_diff();
    renderer.update(&diff, mirror);
    assert_eq!(mirror.to_html(), doc.to_html());
}

#[test]
fn undo_and_redo_round_trip() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    {
        let mut mutr = doc.mutate();
        let (p, _) = paragraph(&mut mutr, "one");
        mutr.append_children(root_id, &[p]);
    }
    {
        let mut mutr = doc.mutate();
        let (p, _) = paragraph(&mut mutr, "two");
        mutr.append_children(root_id, &[p]);
    }
    assert_eq!(doc.history_steps(), 3);
    let tip = doc.to_json(root_id, JsonOptions::default()).unwrap();

    assert!(doc.undo());
    assert_eq!(doc.to_html(), "<p>one</p>");
    assert!(doc.undo());
    assert_eq!(doc.to_html(), "");
    assert!(!doc.can_undo());
    assert!(!doc.undo());

    assert!(doc.redo());
    assert_eq!(doc.to_html(), "<p>one</p>");
    assert!(doc.redo());
    assert!(!doc.redo());
    assert_eq!(doc.to_html(), "<p>one</p><p>two</p>");
    assert_eq!(doc.to_json(root_id, JsonOptions::default()).unwrap(), tip);
}

#[test]
fn typing_coalesces_by_word() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    let text_id = {
        let mut mutr = doc.mutate();
        let (p, t) = paragraph(&mut mutr, "h");
        mutr.append_children(root_id, &[p]);
        t
    };
    doc.clear_history();
    {
        let mut mutr = doc.mutate();
        mutr.set_caret(text_id, 1).unwrap();
    }

    for ch in ["e", "l", "l", "o"] {
        doc.mutate().insert_text(ch);
    }
    assert_eq!(doc.to_html(), "<p>hello</p>");
    assert_eq!(doc.history_steps(), 2);

    // The space starts a new word and with it a new step; typed spaces are
    // stored as NBSP so the block-edge collapse leaves them alone.
    for ch in [" ", "w", "o", "r", "l", "d"] {
        doc.mutate().insert_text(ch);
    }
    assert_eq!(doc.to_html(), "<p>hello\u{a0}world</p>");
    assert_eq!(doc.history_steps(), 3);

    assert!(doc.undo());
    assert_eq!(doc.to_html(), "<p>hello</p>");
    assert!(doc.undo());
    assert_eq!(doc.to_html(), "<p>h</p>");
    assert!(doc.redo());
    assert!(doc.redo());
    assert_eq!(doc.to_html(), "<p>hello\u{a0}world</p>");
}

#[test]
fn undo_restores_removed_content_under_its_original_id() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    let second = {
        let mut mutr = doc.mutate();
        let (first, _) = paragraph(&mut mutr, "keep");
        let (second, _) = paragraph(&mut mutr, "drop");
        mutr.append_children(root_id, &[first, second]);
        second
    };
    {
        let mut mutr = doc.mutate();
        mutr.remove_node(second);
    }
    assert_eq!(doc.to_html(), "<p>keep</p>");
    assert!(doc.get_node(second).is_none());

    assert!(doc.undo());
    assert_eq!(doc.to_html(), "<p>keep</p><p>drop</p>");
    let restored = doc.get_node(second).unwrap();
    assert_eq!(restored.children.len(), 1);

    assert!(doc.redo());
    assert_eq!(doc.to_html(), "<p>keep</p>");
    assert!(doc.get_node(second).is_none());
}

#[test]
fn mirror_render_follows_history() {
    let mut doc = Document::new(DocumentConfig::default());
    let mut renderer = Renderer::new();
    let mut mirror = MirrorTree::new();
    let root_id = doc.root_id();

    let (p, t) = {
        let mut mutr = doc.mutate();
        let (p, t) = paragraph(&mut mutr, "alpha");
        mutr.append_children(root_id, &[p]);
        (p, t)
    };
    sync(&mut doc, &mut renderer, &mut mirror);
    let p_handle = renderer.handle_of(p);
    assert!(p_handle.is_some());

    {
        let mut mutr = doc.mutate();
        mutr.set_node_text(t, "alpha beta");
    }
    sync(&mut doc, &mut renderer, &mut mirror);
    assert_eq!(renderer.handle_of(p), p_handle);

    assert!(doc.undo());
    sync(&mut doc, &mut renderer, &mut mirror);
    assert_eq!(doc.to_html(), "<p>alpha</p>");
    assert_eq!(renderer.handle_of(p), p_handle);

    assert!(doc.redo());
    sync(&mut doc, &mut renderer, &mut mirror);
    assert_eq!(doc.to_html(), "<p>alpha beta</p>");

    assert!(doc.undo());
    assert!(doc.undo());
    sync(&mut doc, &mut renderer, &mut mirror);
    assert_eq!(doc.to_html(), "");
    assert_eq!(renderer.handle_of(p), None);
}

#[test]
fn set_range_rejects_detached_nodes() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    {
        let mut mutr = doc.mutate();
        let (p, t) = paragraph(&mut mutr, "anchor");
        mutr.append_children(root_id, &[p]);
        mutr.set_caret(t, 2).unwrap();
    }
    let before = doc.range();
    let html = doc.to_html();
    let steps = doc.history_steps();

    let stray = {
        let mut mutr = doc.mutate();
        let stray = mutr.create_text_node("stray");
        let err = mutr.set_caret(stray, 0).unwrap_err();
        assert_eq!(err, EditError::InvalidRange(stray));
        stray
    };

    // The stray node was never attached, so the commit swept it; the range
    // and the tree are exactly as before.
    assert!(doc.get_node(stray).is_none());
    assert_eq!(doc.range(), before);
    assert_eq!(doc.to_html(), html);
    assert_eq!(doc.history_steps(), steps);
}

#[test]
fn caret_in_empty_paragraph_anchors_to_one_virtual() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    let p = {
        let mut mutr = doc.mutate();
        let p = mutr.create_element_tag(local_name!("p"));
        mutr.append_children(root_id, &[p]);
        mutr.set_caret(p, 0).unwrap();
        p
    };
    assert_eq!(doc.to_html(), "<p></p>");
    let anchor = doc.range().start;
    assert!(doc[anchor.id].is_virtual());

    let virtual_children = |doc: &Document| {
        doc[p]
            .children
            .iter()
            .filter(|id| doc[**id].is_virtual())
            .count()
    };
    assert_eq!(virtual_children(&doc), 1);

    // Typing while anchored on the virtual materializes it as real text.
    let text = {
        let mut mutr = doc.mutate();
        mutr.insert_text("hi")
    };
    assert_eq!(doc.to_html(), "<p>hi</p>");
    assert_eq!(virtual_children(&doc), 0);
    assert_eq!(
        doc.range().start,
        RangePoint {
            id: text.unwrap(),
            offset: 2
        }
    );
}

#[test]
fn repeated_caret_moves_do_not_stack_anchors() {
    let mut doc = Document::new(DocumentConfig::default());
    let root_id = doc.root_id();
    let p = {
        let mut mutr = doc.mutate();
        let p = mutr.create_element_tag(local_name!("p"));
        mutr.append_children(root_id, &[p]);
        p
    };
    for _ in 0..3 {
        let mut mutr = doc.mutate();
        mutr.set_caret(p, 0).unwrap();
    }
    let virtual_children = doc[p]
        .children
        .iter()
        .filter(|id| doc[**id].is_virtual())
        .count();
    assert_eq!(virtual_children, 1);
}
