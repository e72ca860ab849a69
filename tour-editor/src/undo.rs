//! Undo history
//!
//! Each step snapshots only the state its edit touches: one stop, the
//! whole stop list, or the tour properties. The state to redo into is
//! taken when the step is undone, so a step that has never been undone
//! cannot be redone.

use crate::{Error, Result};
use std::fmt;
use tour_core::xml::{XmlElement, XmlWriter};
use tour_core::{TourDocument, TourProperties, TourStop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

/// A stop as saved, plus the thumbnail the XML leaves out
#[derive(Debug, Clone, PartialEq)]
pub struct StopSnapshot {
    xml: String,
    thumbnail: Option<Vec<u8>>,
}

impl StopSnapshot {
    pub fn capture(stop: &TourStop) -> Self {
        let mut w = XmlWriter::new();
        stop.save_to_xml(&mut w);
        Self {
            xml: w.into_string(),
            thumbnail: stop.thumbnail().map(<[u8]>::to_vec),
        }
    }

    pub fn restore(&self) -> Result<TourStop> {
        let el = XmlElement::parse(&self.xml)?;
        let mut stop = TourStop::try_from_xml(&el)?;
        stop.set_thumbnail(self.thumbnail.clone());
        Ok(stop)
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }
}

/// The stop list and the selection that went with it
#[derive(Debug, Clone)]
pub struct SlideListSnapshot {
    stops: Vec<TourStop>,
    cursor: Option<usize>,
}

impl SlideListSnapshot {
    pub fn capture(doc: &TourDocument) -> Self {
        Self {
            stops: doc.stops().to_vec(),
            cursor: doc.current_tour_stop_index(),
        }
    }

    fn restore(&self, doc: &mut TourDocument) -> Result<()> {
        doc.replace_stops(self.stops.clone());
        doc.set_current_tour_stop_index(self.cursor)?;
        Ok(())
    }
}

/// A reversible record of one edit
#[derive(Debug, Clone)]
pub enum UndoStep {
    /// An edit inside a single stop
    TourStop {
        description: String,
        stop_id: String,
        before: StopSnapshot,
        after: Option<StopSnapshot>,
    },
    /// Stops added, removed or reordered
    SlideList {
        description: String,
        before: SlideListSnapshot,
        after: Option<SlideListSnapshot>,
    },
    /// Tour metadata changed
    Properties {
        description: String,
        before: TourProperties,
        after: Option<TourProperties>,
    },
}

impl UndoStep {
    /// Records `stop` before it is edited
    pub fn tour_stop(description: &str, stop: &TourStop) -> Self {
        UndoStep::TourStop {
            description: description.to_string(),
            stop_id: stop.id().to_string(),
            before: StopSnapshot::capture(stop),
            after: None,
        }
    }

    /// Records the stop list before stops are added, removed or moved
    pub fn slide_list(description: &str, doc: &TourDocument) -> Self {
        UndoStep::SlideList {
            description: description.to_string(),
            before: SlideListSnapshot::capture(doc),
            after: None,
        }
    }

    /// Records the tour properties before they are edited
    pub fn properties(description: &str, doc: &TourDocument) -> Self {
        UndoStep::Properties {
            description: description.to_string(),
            before: doc.properties().clone(),
            after: None,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            UndoStep::TourStop { description, .. }
            | UndoStep::SlideList { description, .. }
            | UndoStep::Properties { description, .. } => description,
        }
    }

    /// Whether the step has been undone at least once and so can be redone
    pub fn can_redo(&self) -> bool {
        match self {
            UndoStep::TourStop { after, .. } => after.is_some(),
            UndoStep::SlideList { after, .. } => after.is_some(),
            UndoStep::Properties { after, .. } => after.is_some(),
        }
    }

    pub fn apply(&mut self, doc: &mut TourDocument, direction: Direction) -> Result<()> {
        match direction {
            Direction::Undo => self.undo(doc),
            Direction::Redo => self.redo(doc),
        }
    }

    fn undo(&mut self, doc: &mut TourDocument) -> Result<()> {
        match self {
            UndoStep::TourStop {
                stop_id,
                before,
                after,
                ..
            } => {
                let current = doc
                    .stop_by_id(stop_id)
                    .ok_or_else(|| Error::StopNotFound(stop_id.clone()))?;
                let current = StopSnapshot::capture(current);
                doc.replace_stop(before.restore()?)?;
                *after = Some(current);
            }
            UndoStep::SlideList { before, after, .. } => {
                let current = SlideListSnapshot::capture(doc);
                before.restore(doc)?;
                *after = Some(current);
            }
            UndoStep::Properties { before, after, .. } => {
                let current = doc.properties().clone();
                doc.set_properties(before.clone());
                *after = Some(current);
            }
        }
        Ok(())
    }

    fn redo(&mut self, doc: &mut TourDocument) -> Result<()> {
        match self {
            UndoStep::TourStop {
                description,
                stop_id,
                after,
                ..
            } => {
                let after = after
                    .as_ref()
                    .ok_or_else(|| Error::RedoBeforeUndo(description.clone()))?;
                if doc.index_of(stop_id).is_none() {
                    return Err(Error::StopNotFound(stop_id.clone()));
                }
                doc.replace_stop(after.restore()?)?;
            }
            UndoStep::SlideList {
                description, after, ..
            } => {
                let after = after
                    .as_ref()
                    .ok_or_else(|| Error::RedoBeforeUndo(description.clone()))?;
                after.restore(doc)?;
            }
            UndoStep::Properties {
                description, after, ..
            } => {
                let after = after
                    .as_ref()
                    .ok_or_else(|| Error::RedoBeforeUndo(description.clone()))?;
                doc.set_properties(after.clone());
            }
        }
        Ok(())
    }
}

impl fmt::Display for UndoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Linear undo history. Pushing a new step discards everything that
/// could have been redone.
#[derive(Debug, Default)]
pub struct UndoManager {
    undo: Vec<UndoStep>,
    redo: Vec<UndoStep>,
    max_depth: Option<usize>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history that forgets its oldest steps beyond `max_depth`
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn push(&mut self, step: UndoStep) {
        log::debug!("undo push: {}", step);
        self.redo.clear();
        self.undo.push(step);
        if let Some(max) = self.max_depth {
            if self.undo.len() > max {
                let excess = self.undo.len() - max;
                self.undo.drain(..excess);
            }
        }
    }

    /// Undoes the most recent step. A step that fails to apply stays where
    /// it was.
    pub fn step_back(&mut self, doc: &mut TourDocument) -> Result<()> {
        let mut step = self.undo.pop().ok_or(Error::NothingToUndo)?;
        if let Err(e) = step.apply(doc, Direction::Undo) {
            self.undo.push(step);
            return Err(e);
        }
        log::debug!("undo: {}", step);
        self.redo.push(step);
        Ok(())
    }

    /// Redoes the most recently undone step
    pub fn step_forward(&mut self, doc: &mut TourDocument) -> Result<()> {
        let mut step = self.redo.pop().ok_or(Error::NothingToRedo)?;
        if let Err(e) = step.apply(doc, Direction::Redo) {
            self.redo.push(step);
            return Err(e);
        }
        log::debug!("redo: {}", step);
        self.undo.push(step);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Description of the step `step_back` would undo, for menus
    pub fn peek_undo(&self) -> Option<&str> {
        self.undo.last().map(UndoStep::description)
    }

    /// Description of the step `step_forward` would redo
    pub fn peek_redo(&self) -> Option<&str> {
        self.redo.last().map(UndoStep::description)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tour_core::Place;

    fn doc_with_stops(n: usize) -> TourDocument {
        let mut doc = TourDocument::new();
        for i in 0..n {
            let mut stop = TourStop::new(Place::sky(&format!("s{}", i), i as f64, 0.0, 10.0));
            stop.set_caption(&format!("stop {}", i));
            doc.add_tour_stop(stop);
        }
        doc
    }

    #[test]
    fn test_redo_before_undo_is_an_error() {
        let mut doc = doc_with_stops(1);
        let mut step = UndoStep::tour_stop("Edit caption", &doc.stops()[0]);
        assert!(!step.can_redo());
        let err = step.apply(&mut doc, Direction::Redo).unwrap_err();
        assert!(matches!(err, Error::RedoBeforeUndo(ref d) if d == "Edit caption"));
    }

    #[test]
    fn test_stop_step_restores_both_ways() {
        let mut doc = doc_with_stops(2);
        let mut step = UndoStep::tour_stop("Edit caption", &doc.stops()[1]);
        doc.stop_mut(1).unwrap().set_caption("changed");

        step.apply(&mut doc, Direction::Undo).unwrap();
        assert_eq!(doc.stops()[1].caption(), "stop 1");
        assert!(step.can_redo());

        step.apply(&mut doc, Direction::Redo).unwrap();
        assert_eq!(doc.stops()[1].caption(), "changed");
    }

    #[test]
    fn test_stop_step_keeps_thumbnail() {
        let mut doc = doc_with_stops(1);
        doc.stop_mut(0).unwrap().set_thumbnail(Some(vec![9, 9]));
        let mut step = UndoStep::tour_stop("Thumbnail", &doc.stops()[0]);
        doc.stop_mut(0).unwrap().set_thumbnail(Some(vec![1]));

        step.apply(&mut doc, Direction::Undo).unwrap();
        assert_eq!(doc.stops()[0].thumbnail(), Some(&[9u8, 9][..]));
        step.apply(&mut doc, Direction::Redo).unwrap();
        assert_eq!(doc.stops()[0].thumbnail(), Some(&[1u8][..]));
    }

    #[test]
    fn test_stop_step_for_removed_stop_fails() {
        let mut doc = doc_with_stops(1);
        let mut step = UndoStep::tour_stop("Edit", &doc.stops()[0]);
        doc.remove_tour_stop(0).unwrap();
        assert!(matches!(
            step.apply(&mut doc, Direction::Undo),
            Err(Error::StopNotFound(_))
        ));
    }

    #[test]
    fn test_slide_list_step_restores_order_and_cursor() {
        let mut doc = doc_with_stops(3);
        doc.set_current_tour_stop_index(Some(0)).unwrap();
        let mut step = UndoStep::slide_list("Move slide", &doc);
        doc.move_tour_stop(0, 2).unwrap();

        step.apply(&mut doc, Direction::Undo).unwrap();
        assert_eq!(doc.stops()[0].caption(), "stop 0");
        assert_eq!(doc.current_tour_stop_index(), Some(0));

        step.apply(&mut doc, Direction::Redo).unwrap();
        assert_eq!(doc.stops()[2].caption(), "stop 0");
        assert_eq!(doc.current_tour_stop_index(), Some(2));
    }

    #[test]
    fn test_properties_step() {
        let mut doc = doc_with_stops(0);
        doc.set_title("Before");
        let mut step = UndoStep::properties("Edit properties", &doc);
        doc.set_title("After");

        step.apply(&mut doc, Direction::Undo).unwrap();
        assert_eq!(doc.title(), "Before");
        step.apply(&mut doc, Direction::Redo).unwrap();
        assert_eq!(doc.title(), "After");
    }

    #[test]
    fn test_push_after_step_back_clears_redo() {
        let mut doc = doc_with_stops(1);
        let mut undo = UndoManager::new();

        undo.push(UndoStep::properties("First", &doc));
        doc.set_title("one");
        undo.step_back(&mut doc).unwrap();
        assert!(undo.can_redo());
        assert_eq!(undo.peek_redo(), Some("First"));

        undo.push(UndoStep::properties("Second", &doc));
        doc.set_title("two");
        assert!(!undo.can_redo());
        assert!(matches!(undo.step_forward(&mut doc), Err(Error::NothingToRedo)));
    }

    #[test]
    fn test_max_depth_drops_oldest() {
        let doc = doc_with_stops(0);
        let mut undo = UndoManager::with_max_depth(Some(2));
        for name in ["a", "b", "c"] {
            undo.push(UndoStep::properties(name, &doc));
        }
        assert_eq!(undo.undo_depth(), 2);
        assert_eq!(undo.peek_undo(), Some("c"));
    }

    #[test]
    fn test_failed_undo_keeps_step() {
        let mut doc = doc_with_stops(1);
        let mut undo = UndoManager::new();
        undo.push(UndoStep::tour_stop("Edit", &doc.stops()[0]));
        doc.remove_tour_stop(0).unwrap();

        assert!(undo.step_back(&mut doc).is_err());
        assert_eq!(undo.undo_depth(), 1);
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_empty_history() {
        let mut doc = doc_with_stops(0);
        let mut undo = UndoManager::new();
        assert!(matches!(undo.step_back(&mut doc), Err(Error::NothingToUndo)));
        assert!(undo.peek_undo().is_none());
    }
}
