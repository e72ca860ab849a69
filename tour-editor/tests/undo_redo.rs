//! Stepping back through every edit and forward again lands on the
//! state the edits produced.

use proptest::prelude::*;
use tour_core::{EngineContext, Overlay, Place, TourDocument, TourStop, TransitionType};
use tour_editor::TourEditor;

#[derive(Debug, Clone)]
enum Edit {
    Add(String),
    Remove(usize),
    Move(usize, usize),
    Duplicate(usize),
    Caption(usize, String),
    Duration(usize, u64),
    Transition(usize),
    AddOverlay(usize, f64, f64),
    Title(String),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(Edit::Add),
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Move(a, b)),
        any::<usize>().prop_map(Edit::Duplicate),
        (any::<usize>(), "[A-Za-z ]{0,10}").prop_map(|(i, s)| Edit::Caption(i, s)),
        (any::<usize>(), 0u64..60_000).prop_map(|(i, d)| Edit::Duration(i, d)),
        any::<usize>().prop_map(Edit::Transition),
        (any::<usize>(), 0.0..1920.0f64, 0.0..1080.0f64)
            .prop_map(|(i, x, y)| Edit::AddOverlay(i, x, y)),
        "[A-Za-z]{1,8}".prop_map(Edit::Title),
    ]
}

/// Applies an edit, returning whether it recorded an undo step
fn apply(editor: &mut TourEditor, edit: &Edit) -> bool {
    let count = editor.document().tour_stop_count();
    let pick = |i: usize| i % count.max(1);
    if count == 0 && !matches!(edit, Edit::Add(_) | Edit::Title(_)) {
        return false;
    }
    match edit {
        Edit::Add(name) => editor
            .add_stop(TourStop::new(Place::sky(name, 1.0, 2.0, 3.0)))
            .is_ok(),
        Edit::Remove(i) => editor.remove_stop(pick(*i)).is_ok(),
        Edit::Move(a, b) => editor.move_stop(pick(*a), pick(*b)).is_ok(),
        Edit::Duplicate(i) => editor.duplicate_stop(pick(*i)).is_ok(),
        Edit::Caption(i, s) => editor.set_caption(pick(*i), s).is_ok(),
        Edit::Duration(i, d) => editor.set_duration(pick(*i), *d).is_ok(),
        Edit::Transition(i) => editor.set_transition(pick(*i), TransitionType::CrossFade).is_ok(),
        Edit::AddOverlay(i, x, y) => editor
            .add_overlay(pick(*i), Overlay::bitmap("img", "img.png", *x, *y, 10.0, 10.0))
            .is_ok(),
        Edit::Title(t) => {
            editor.set_title(t);
            true
        }
    }
}

fn snapshot(editor: &TourEditor) -> (String, Option<usize>) {
    let doc = editor.document();
    (doc.get_tour_xml(&EngineContext::new()), doc.current_tour_stop_index())
}

proptest! {
    #[test]
    fn undo_all_then_redo_all_restores(edits in prop::collection::vec(edit_strategy(), 1..12)) {
        let mut editor = TourEditor::new(TourDocument::new());
        let initial = snapshot(&editor);

        let mut recorded = 0;
        for edit in &edits {
            if apply(&mut editor, edit) {
                recorded += 1;
            }
        }
        let edited = snapshot(&editor);

        for _ in 0..recorded {
            editor.undo().unwrap();
        }
        prop_assert!(!editor.can_undo());
        prop_assert_eq!(&snapshot(&editor), &initial);

        for _ in 0..recorded {
            editor.redo().unwrap();
        }
        prop_assert!(!editor.can_redo());
        prop_assert_eq!(snapshot(&editor), edited);
    }

    #[test]
    fn new_edit_after_undo_drops_redo(edits in prop::collection::vec(edit_strategy(), 2..8)) {
        let mut editor = TourEditor::new(TourDocument::new());
        for edit in &edits {
            apply(&mut editor, edit);
        }
        prop_assume!(editor.can_undo());
        editor.undo().unwrap();
        prop_assert!(editor.can_redo());

        editor.set_title("fresh edit");
        prop_assert!(!editor.can_redo());
        prop_assert!(editor.redo().is_err());
    }
}

#[test]
fn test_stop_edit_then_slide_edit_interleave() {
    let mut editor = TourEditor::new(TourDocument::new());
    editor.add_stop(TourStop::new(Place::sky("a", 0.0, 0.0, 1.0))).unwrap();
    editor.set_caption(0, "first").unwrap();
    editor.add_stop(TourStop::new(Place::sky("b", 0.0, 0.0, 1.0))).unwrap();
    editor.move_stop(1, 0).unwrap();
    editor.set_caption(1, "second").unwrap();

    for _ in 0..5 {
        editor.undo().unwrap();
    }
    assert_eq!(editor.document().tour_stop_count(), 0);
    for _ in 0..5 {
        editor.redo().unwrap();
    }
    let stops = editor.document().stops();
    assert_eq!(stops[0].target().name, "b");
    assert_eq!(stops[1].caption(), "second");
}
