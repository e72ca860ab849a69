//! Command layer over a tour document. Every mutating command records the
//! narrowest undo step for what it changes before changing it.

use crate::media::{self, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use crate::undo::{UndoManager, UndoStep};
use crate::{Error, Result};
use image::RgbaImage;
use tour_core::{
    EngineContext, Overlay, Place, TourDocument, TourProperties, TourStop, TransitionType,
};

/// Configuration for the tour editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    /// Oldest steps beyond this are forgotten. `None` keeps everything.
    pub max_undo_depth: Option<usize>,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: None,
            thumbnail_width: THUMBNAIL_WIDTH,
            thumbnail_height: THUMBNAIL_HEIGHT,
        }
    }
}

/// A tour document with an undo history
#[derive(Debug)]
pub struct TourEditor {
    doc: TourDocument,
    history: UndoManager,
    config: EditorConfig,
}

impl TourEditor {
    pub fn new(doc: TourDocument) -> Self {
        Self::with_config(doc, EditorConfig::default())
    }

    pub fn with_config(doc: TourDocument, config: EditorConfig) -> Self {
        Self {
            doc,
            history: UndoManager::with_max_depth(config.max_undo_depth),
            config,
        }
    }

    pub fn document(&self) -> &TourDocument {
        &self.doc
    }

    /// Direct access for changes that should not be undoable, such as
    /// saving or selection
    pub fn document_mut(&mut self) -> &mut TourDocument {
        &mut self.doc
    }

    pub fn into_document(self) -> TourDocument {
        self.doc
    }

    pub fn history(&self) -> &UndoManager {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn undo(&mut self) -> Result<()> {
        self.history.step_back(&mut self.doc)
    }

    pub fn redo(&mut self) -> Result<()> {
        self.history.step_forward(&mut self.doc)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn edit_slide_list<R>(
        &mut self,
        description: &str,
        f: impl FnOnce(&mut TourDocument) -> tour_core::Result<R>,
    ) -> Result<R> {
        let step = UndoStep::slide_list(description, &self.doc);
        let result = f(&mut self.doc)?;
        self.history.push(step);
        Ok(result)
    }

    fn edit_properties(&mut self, description: &str, f: impl FnOnce(&mut TourDocument)) {
        let step = UndoStep::properties(description, &self.doc);
        f(&mut self.doc);
        self.history.push(step);
    }

    /// Runs `f` on one stop, recording the stop first
    pub fn edit_stop<R>(
        &mut self,
        index: usize,
        description: &str,
        f: impl FnOnce(&mut TourStop) -> R,
    ) -> Result<R> {
        let stop = self
            .doc
            .stop(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        let step = UndoStep::tour_stop(description, stop);
        let stop = self
            .doc
            .stop_mut(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        let result = f(stop);
        self.history.push(step);
        Ok(result)
    }

    // Slide list

    /// Appends a stop and returns its id
    pub fn add_stop(&mut self, stop: TourStop) -> Result<String> {
        let id = stop.id().to_string();
        self.edit_slide_list("Add Slide", |doc| {
            doc.add_tour_stop(stop);
            Ok(())
        })?;
        Ok(id)
    }

    /// Appends a stop at `target` carrying the engine's current settings
    pub fn capture_stop(&mut self, target: Place, ctx: &EngineContext) -> Result<String> {
        self.add_stop(TourStop::capture(target, ctx))
    }

    /// Inserts a stop before the selection
    pub fn insert_stop(&mut self, stop: TourStop) -> Result<String> {
        let id = stop.id().to_string();
        self.edit_slide_list("Insert Slide", |doc| {
            doc.insert_tour_stop(stop);
            Ok(())
        })?;
        Ok(id)
    }

    /// Inserts a stop after the selection
    pub fn insert_stop_after(&mut self, stop: TourStop) -> Result<String> {
        let id = stop.id().to_string();
        self.edit_slide_list("Insert Slide", |doc| {
            doc.insert_after_tour_stop(stop);
            Ok(())
        })?;
        Ok(id)
    }

    pub fn remove_stop(&mut self, index: usize) -> Result<TourStop> {
        self.edit_slide_list("Delete Slide", |doc| doc.remove_tour_stop(index))
    }

    pub fn move_stop(&mut self, from: usize, to: usize) -> Result<()> {
        self.edit_slide_list("Move Slide", |doc| doc.move_tour_stop(from, to))
    }

    /// Inserts a copy of a stop right after it and returns the copy's id
    pub fn duplicate_stop(&mut self, index: usize) -> Result<String> {
        let copy = self
            .doc
            .stop(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?
            .copy();
        let id = copy.id().to_string();
        self.edit_slide_list("Duplicate Slide", |doc| {
            doc.set_current_tour_stop_index(Some(index))?;
            doc.insert_after_tour_stop(copy);
            Ok(())
        })?;
        Ok(id)
    }

    // Properties

    pub fn set_properties(&mut self, properties: TourProperties) {
        self.edit_properties("Edit Tour Properties", |doc| doc.set_properties(properties));
    }

    pub fn set_title(&mut self, title: &str) {
        self.edit_properties("Edit Tour Title", |doc| doc.set_title(title));
    }

    // Stops

    pub fn set_caption(&mut self, index: usize, caption: &str) -> Result<()> {
        self.edit_stop(index, "Edit Caption", |stop| stop.set_caption(caption))
    }

    pub fn set_duration(&mut self, index: usize, duration_ms: u64) -> Result<()> {
        self.edit_stop(index, "Edit Duration", |stop| stop.set_duration_ms(duration_ms))
    }

    pub fn set_transition(&mut self, index: usize, transition: TransitionType) -> Result<()> {
        self.edit_stop(index, "Edit Transition", |stop| stop.set_transition(transition))
    }

    pub fn set_next_slide(&mut self, index: usize, next_slide: &str) -> Result<()> {
        self.edit_stop(index, "Edit Slide Link", |stop| stop.set_next_slide(next_slide))
    }

    pub fn set_target(&mut self, index: usize, target: Place) -> Result<()> {
        self.edit_stop(index, "Edit Target", |stop| stop.set_target(target))
    }

    /// Makes the stop keyframed, ending at `end`
    pub fn set_end_target(&mut self, index: usize, end: Option<Place>) -> Result<()> {
        self.edit_stop(index, "Edit End Target", |stop| stop.set_end_target(end))
    }

    /// Adds an overlay to a stop and returns its id
    pub fn add_overlay(&mut self, index: usize, overlay: Overlay) -> Result<String> {
        let id = overlay.id.clone();
        self.edit_stop(index, "Add Overlay", |stop| stop.add_overlay(overlay))?;
        Ok(id)
    }

    /// Adds an image overlay at its natural pixel size, caching the image
    /// in the document so it is packed on save
    pub fn add_bitmap_overlay(
        &mut self,
        index: usize,
        filename: &str,
        data: Vec<u8>,
        x: f64,
        y: f64,
    ) -> Result<String> {
        let (width, height) = media::image_dimensions(&data)?;
        let overlay = Overlay::bitmap(filename, filename, x, y, width as f64, height as f64);
        let id = self.add_overlay(index, overlay)?;
        self.doc.add_cached_file(filename, data);
        log::debug!("added {} ({}x{}) to stop {}", filename, width, height, index);
        Ok(id)
    }

    pub fn remove_overlay(&mut self, index: usize, overlay_id: &str) -> Result<Overlay> {
        self.require_overlay(index, overlay_id)?;
        self.edit_stop(index, "Delete Overlay", |stop| stop.remove_overlay(overlay_id))?
            .ok_or_else(|| Error::OverlayNotFound(overlay_id.to_string()))
    }

    /// Runs `f` on one overlay of a stop
    pub fn edit_overlay<R>(
        &mut self,
        index: usize,
        overlay_id: &str,
        description: &str,
        f: impl FnOnce(&mut Overlay) -> R,
    ) -> Result<R> {
        self.require_overlay(index, overlay_id)?;
        self.edit_stop(index, description, |stop| stop.overlay_mut(overlay_id).map(f))?
            .ok_or_else(|| Error::OverlayNotFound(overlay_id.to_string()))
    }

    pub fn bring_to_front(&mut self, index: usize, overlay_id: &str) -> Result<()> {
        self.require_overlay(index, overlay_id)?;
        self.edit_stop(index, "Bring to Front", |stop| {
            stop.bring_to_front(overlay_id);
        })
    }

    pub fn send_to_back(&mut self, index: usize, overlay_id: &str) -> Result<()> {
        self.require_overlay(index, overlay_id)?;
        self.edit_stop(index, "Send to Back", |stop| {
            stop.send_to_back(overlay_id);
        })
    }

    fn require_overlay(&self, index: usize, overlay_id: &str) -> Result<()> {
        let stop = self
            .doc
            .stop(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        if stop.overlay(overlay_id).is_none() {
            return Err(Error::OverlayNotFound(overlay_id.to_string()));
        }
        Ok(())
    }

    /// Stores a thumbnail rendered from the current view. Thumbnails follow
    /// the view and are not part of the undo history.
    pub fn update_thumbnail(&mut self, index: usize, frame: &RgbaImage) -> Result<()> {
        let png = media::render_thumbnail(
            frame,
            self.config.thumbnail_width,
            self.config.thumbnail_height,
        )?;
        let stop = self
            .doc
            .stop_mut(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        stop.set_thumbnail(Some(png));
        Ok(())
    }

    /// Stores a thumbnail rendered from an encoded image
    pub fn update_thumbnail_from_bytes(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let png = media::thumbnail_from_bytes(
            data,
            self.config.thumbnail_width,
            self.config.thumbnail_height,
        )?;
        let stop = self
            .doc
            .stop_mut(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        stop.set_thumbnail(Some(png));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn editor_with_stops(n: usize) -> TourEditor {
        let mut doc = TourDocument::new();
        for i in 0..n {
            let mut stop = TourStop::new(Place::sky(&format!("s{}", i), 0.0, 0.0, 10.0));
            stop.set_caption(&format!("stop {}", i));
            doc.add_tour_stop(stop);
        }
        TourEditor::new(doc)
    }

    fn captions(editor: &TourEditor) -> Vec<String> {
        editor
            .document()
            .stops()
            .iter()
            .map(|s| s.caption().to_string())
            .collect()
    }

    #[test]
    fn test_remove_stop_undo_redo() {
        let mut editor = editor_with_stops(3);
        editor.remove_stop(1).unwrap();
        assert_eq!(captions(&editor), ["stop 0", "stop 2"]);
        assert_eq!(editor.history().peek_undo(), Some("Delete Slide"));

        editor.undo().unwrap();
        assert_eq!(captions(&editor), ["stop 0", "stop 1", "stop 2"]);
        editor.redo().unwrap();
        assert_eq!(captions(&editor), ["stop 0", "stop 2"]);
    }

    #[test]
    fn test_failed_command_records_nothing() {
        let mut editor = editor_with_stops(1);
        assert!(editor.remove_stop(5).is_err());
        assert!(editor.move_stop(0, 3).is_err());
        assert!(editor.set_caption(2, "x").is_err());
        assert!(editor.remove_overlay(0, "missing").is_err());
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_duplicate_stop_goes_after_original() {
        let mut editor = editor_with_stops(2);
        let id = editor.duplicate_stop(0).unwrap();
        let doc = editor.document();
        assert_eq!(doc.tour_stop_count(), 3);
        assert_eq!(doc.stops()[1].id(), id);
        assert_eq!(doc.stops()[1].caption(), "stop 0");
        assert_ne!(doc.stops()[0].id(), id);
        assert_eq!(doc.current_tour_stop_index(), Some(1));
    }

    #[test]
    fn test_overlay_edits_are_undoable() {
        let mut editor = editor_with_stops(1);
        let id = editor
            .add_overlay(0, Overlay::bitmap("img", "a.png", 10.0, 10.0, 5.0, 5.0))
            .unwrap();
        editor
            .edit_overlay(0, &id, "Move Overlay", |o| o.set_x(200.0))
            .unwrap();
        assert_eq!(editor.document().stops()[0].overlay(&id).unwrap().x(), 200.0);

        editor.undo().unwrap();
        assert_eq!(editor.document().stops()[0].overlay(&id).unwrap().x(), 10.0);
        editor.undo().unwrap();
        assert!(editor.document().stops()[0].overlays().is_empty());
    }

    #[test]
    fn test_bitmap_overlay_takes_natural_size() {
        let mut editor = editor_with_stops(1);
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([1, 2, 3, 255])))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let id = editor.add_bitmap_overlay(0, "logo.png", png.clone(), 100.0, 50.0).unwrap();
        let overlay = editor.document().stops()[0].overlay(&id).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (64.0, 32.0));
        assert_eq!(editor.document().get_cached_blob("logo.png"), Some(&png[..]));
    }

    #[test]
    fn test_properties_edit() {
        let mut editor = editor_with_stops(0);
        editor.set_title("First");
        editor.set_title("Second");
        editor.undo().unwrap();
        assert_eq!(editor.document().title(), "First");
    }

    #[test]
    fn test_undo_depth_limit() {
        let config = EditorConfig {
            max_undo_depth: Some(1),
            ..EditorConfig::default()
        };
        let mut editor = TourEditor::with_config(TourDocument::new(), config);
        editor.set_title("a");
        editor.set_title("b");
        editor.undo().unwrap();
        assert!(!editor.can_undo());
        assert_eq!(editor.document().title(), "a");
    }

    #[test]
    fn test_update_thumbnail() {
        let mut editor = editor_with_stops(1);
        let frame = RgbaImage::from_pixel(320, 180, Rgba([0, 0, 255, 255]));
        editor.update_thumbnail(0, &frame).unwrap();
        let thumb = editor.document().stops()[0].thumbnail().unwrap();
        assert_eq!(media::image_dimensions(thumb).unwrap(), (96, 45));
        assert!(!editor.can_undo());
    }
}
