//! A single stop ("slide") of a tour

use crate::context::EngineContext;
use crate::interpolation::InterpolationType;
use crate::overlay::Overlay;
use crate::place::{CameraParameters, Place};
use crate::settings::Settings;
use crate::util;
use crate::xml::{XmlElement, XmlWriter};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Duration of a new stop
pub const DEFAULT_DURATION_MS: u64 = 10_000;

/// Where playback goes when a stop ends or an overlay link is followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideLink {
    Next,
    /// Back to the stop that linked here
    Return,
    Stop(String),
}

impl SlideLink {
    /// Parses a link id. Empty means no link.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "" => None,
            "Next" => Some(SlideLink::Next),
            "Return" => Some(SlideLink::Return),
            other => Some(SlideLink::Stop(other.to_string())),
        }
    }
}

impl fmt::Display for SlideLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideLink::Next => f.write_str("Next"),
            SlideLink::Return => f.write_str("Return"),
            SlideLink::Stop(id) => f.write_str(id),
        }
    }
}

/// How the view moves into a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionType {
    #[default]
    Slew,
    CrossFade,
    CrossCut,
    FadeOutIn,
    FadeIn,
    FadeOut,
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionType::Slew => "Slew",
            TransitionType::CrossFade => "CrossFade",
            TransitionType::CrossCut => "CrossCut",
            TransitionType::FadeOutIn => "FadeOutIn",
            TransitionType::FadeIn => "FadeIn",
            TransitionType::FadeOut => "FadeOut",
        })
    }
}

impl FromStr for TransitionType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Slew" => Ok(TransitionType::Slew),
            "CrossFade" => Ok(TransitionType::CrossFade),
            "CrossCut" => Ok(TransitionType::CrossCut),
            "FadeOutIn" => Ok(TransitionType::FadeOutIn),
            "FadeIn" => Ok(TransitionType::FadeIn),
            "FadeOut" => Ok(TransitionType::FadeOut),
            _ => Err(()),
        }
    }
}

/// Visibility of one layer over a stop. Parameters are layer-type
/// specific, stored as (start, end) pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerInfo {
    pub start_opacity: f64,
    pub end_opacity: f64,
    pub params: Vec<(f64, f64)>,
}

impl LayerInfo {
    pub fn new(start_opacity: f64, end_opacity: f64) -> Self {
        Self {
            start_opacity,
            end_opacity,
            params: Vec::new(),
        }
    }

    pub fn opacity_at(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        self.start_opacity + (self.end_opacity - self.start_opacity) * t
    }

    pub fn params_at(&self, t: f64) -> Vec<f64> {
        let t = t.clamp(0.0, 1.0);
        self.params.iter().map(|(a, b)| a + (b - a) * t).collect()
    }

    fn save_to_xml(&self, id: &str, w: &mut XmlWriter) {
        w.write_start_element("Layer");
        w.write_attribute("StartOpacity", self.start_opacity);
        w.write_attribute("EndOpacity", self.end_opacity);
        w.write_attribute("ParamCount", self.params.len());
        for (i, (start, _)) in self.params.iter().enumerate() {
            w.write_attribute(&format!("Param{}", i), start);
        }
        for (i, (_, end)) in self.params.iter().enumerate() {
            w.write_attribute(&format!("EndParam{}", i), end);
        }
        w.write_string(id);
        w.write_end_element();
    }

    fn from_xml(el: &XmlElement) -> Self {
        let count: usize = el.attr_or("ParamCount", 0);
        let params = (0..count)
            .map(|i| {
                let start = el.attr_or(&format!("Param{}", i), 0.0);
                (start, el.attr_or(&format!("EndParam{}", i), start))
            })
            .collect();
        Self {
            start_opacity: el.attr_or("StartOpacity", 1.0),
            end_opacity: el.attr_or("EndOpacity", 1.0),
            params,
        }
    }
}

/// One stop of a tour: camera target, timing, transition, a snapshot of
/// the renderer settings and the overlays shown over it.
///
/// Setters mark the stop dirty and bump its revision; the owning document
/// reads both to know it has unsaved changes and when cached timing is
/// stale. The tween position is playback state and does neither.
#[derive(Debug, Clone, PartialEq)]
pub struct TourStop {
    id: String,
    caption: String,
    description: String,
    duration_ms: u64,
    transition: TransitionType,
    /// Seconds
    transition_time: f64,
    transition_hold_time: f64,
    transition_out_time: f64,
    has_time: bool,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    next_slide: String,
    interpolation_type: InterpolationType,
    is_linked: bool,
    master_slide: bool,
    target: Place,
    end_target: Option<Place>,
    settings: Settings,
    overlays: Vec<Overlay>,
    music_track: Option<Overlay>,
    voice_track: Option<Overlay>,
    layers: BTreeMap<String, LayerInfo>,
    thumbnail: Option<Vec<u8>>,
    tween_position: f64,
    dirty: bool,
    revision: u64,
}

impl Default for TourStop {
    fn default() -> Self {
        Self::new(Place::default())
    }
}

macro_rules! copy_property {
    ($($(#[$doc:meta])* $field:ident, $setter:ident: $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $field(&self) -> $ty {
                self.$field
            }

            pub fn $setter(&mut self, value: $ty) {
                self.$field = value;
                self.touch();
            }
        )*
    };
}

impl TourStop {
    /// A stop at `target` with a fresh id and default settings
    pub fn new(target: Place) -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            id: util::new_guid(),
            caption: String::new(),
            description: String::new(),
            duration_ms: DEFAULT_DURATION_MS,
            transition: TransitionType::Slew,
            transition_time: 2.0,
            transition_hold_time: 4.0,
            transition_out_time: 2.0,
            has_time: false,
            start_time: epoch,
            end_time: epoch,
            next_slide: "Next".to_string(),
            interpolation_type: InterpolationType::Linear,
            is_linked: false,
            master_slide: false,
            target,
            end_target: None,
            settings: Settings::default(),
            overlays: Vec::new(),
            music_track: None,
            voice_track: None,
            layers: BTreeMap::new(),
            thumbnail: None,
            tween_position: 0.0,
            dirty: false,
            revision: 0,
        }
    }

    /// A new stop at `target` that records the engine's current settings
    pub fn capture(target: Place, ctx: &EngineContext) -> Self {
        let mut stop = Self::new(target);
        stop.capture_settings(ctx);
        stop
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Counter bumped by every change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn set_caption(&mut self, caption: &str) {
        self.caption = caption.to_string();
        self.touch();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.touch();
    }

    copy_property! {
        /// Milliseconds the stop is shown for
        duration_ms, set_duration_ms: u64;
        transition, set_transition: TransitionType;
        transition_time, set_transition_time: f64;
        transition_hold_time, set_transition_hold_time: f64;
        transition_out_time, set_transition_out_time: f64;
        /// Whether the stop pins the simulated clock
        has_time, set_has_time: bool;
        start_time, set_start_time: DateTime<Utc>;
        end_time, set_end_time: DateTime<Utc>;
        interpolation_type, set_interpolation_type: InterpolationType;
        is_linked, set_is_linked: bool;
        /// Anchor for elapsed-since-last-master queries
        master_slide, set_master_slide: bool;
    }

    /// Raw link id: "Next", "Return" or a stop id
    pub fn next_slide(&self) -> &str {
        &self.next_slide
    }

    pub fn set_next_slide(&mut self, next_slide: &str) {
        self.next_slide = next_slide.to_string();
        self.touch();
    }

    /// The link followed when the stop ends. An empty link means "Next".
    pub fn next_link(&self) -> SlideLink {
        SlideLink::from_id(&self.next_slide).unwrap_or(SlideLink::Next)
    }

    pub fn target(&self) -> &Place {
        &self.target
    }

    pub fn set_target(&mut self, target: Place) {
        self.target = target;
        self.touch();
    }

    pub fn end_target(&self) -> Option<&Place> {
        self.end_target.as_ref()
    }

    /// Setting an end target makes the stop keyframed
    pub fn set_end_target(&mut self, end_target: Option<Place>) {
        self.end_target = end_target;
        self.touch();
    }

    pub fn is_keyframed(&self) -> bool {
        self.end_target.is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        self.touch();
        &mut self.settings
    }

    /// Copies the engine's live settings into this stop and stamps the
    /// start time with the simulated clock
    pub fn capture_settings(&mut self, ctx: &EngineContext) {
        self.settings = ctx.settings.clone();
        self.start_time = ctx.now;
        self.touch();
    }

    /// Pushes this stop's settings into the engine
    pub fn sync_settings(&self, ctx: &mut EngineContext) {
        ctx.settings = self.settings.clone();
        if self.has_time {
            ctx.now = self.time_at(self.tween_position);
        }
    }

    /// Simulated time at a tween position
    pub fn time_at(&self, t: f64) -> DateTime<Utc> {
        let span = self.end_time - self.start_time;
        let offset_ms = (span.num_milliseconds() as f64 * t.clamp(0.0, 1.0)).round() as i64;
        self.start_time + chrono::Duration::milliseconds(offset_ms)
    }

    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    pub fn set_thumbnail(&mut self, png: Option<Vec<u8>>) {
        self.thumbnail = png;
        self.touch();
    }

    /// Archive name of the thumbnail
    pub fn thumbnail_filename(&self) -> String {
        format!("{}.thumb.png", self.id)
    }

    pub fn music_track(&self) -> Option<&Overlay> {
        self.music_track.as_ref()
    }

    pub fn set_music_track(&mut self, track: Option<Overlay>) {
        self.music_track = track;
        self.touch();
    }

    pub fn voice_track(&self) -> Option<&Overlay> {
        self.voice_track.as_ref()
    }

    pub fn set_voice_track(&mut self, track: Option<Overlay>) {
        self.voice_track = track;
        self.touch();
    }

    /// Music then voice, whichever are set. For playback; changes made
    /// through this do not mark the stop changed.
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Overlay> {
        self.music_track.iter_mut().chain(self.voice_track.iter_mut())
    }

    pub fn layers(&self) -> &BTreeMap<String, LayerInfo> {
        &self.layers
    }

    pub fn layer_info(&self, layer_id: &str) -> Option<&LayerInfo> {
        self.layers.get(layer_id)
    }

    pub fn set_layer_info(&mut self, layer_id: &str, info: LayerInfo) {
        self.layers.insert(layer_id.to_string(), info);
        self.touch();
    }

    pub fn remove_layer_info(&mut self, layer_id: &str) -> Option<LayerInfo> {
        let removed = self.layers.remove(layer_id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    // Overlays. The list order is the z-order, first drawn first.

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut Vec<Overlay> {
        self.touch();
        &mut self.overlays
    }

    pub fn overlay(&self, id: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    pub fn overlay_mut(&mut self, id: &str) -> Option<&mut Overlay> {
        let index = self.overlay_index(id)?;
        self.touch();
        self.overlays.get_mut(index)
    }

    pub fn overlay_index(&self, id: &str) -> Option<usize> {
        self.overlays.iter().position(|o| o.id == id)
    }

    pub fn add_overlay(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
        self.touch();
    }

    /// Inserts at `index`, clamped to the end of the list
    pub fn insert_overlay(&mut self, index: usize, overlay: Overlay) {
        let index = index.min(self.overlays.len());
        self.overlays.insert(index, overlay);
        self.touch();
    }

    pub fn remove_overlay(&mut self, id: &str) -> Option<Overlay> {
        let index = self.overlay_index(id)?;
        self.touch();
        Some(self.overlays.remove(index))
    }

    fn move_overlay(&mut self, id: &str, to: impl FnOnce(usize, usize) -> usize) -> bool {
        let Some(from) = self.overlay_index(id) else {
            return false;
        };
        let last = self.overlays.len() - 1;
        let target = to(from, last).min(last);
        if target == from {
            return false;
        }
        let overlay = self.overlays.remove(from);
        self.overlays.insert(target, overlay);
        self.touch();
        true
    }

    /// Moves an overlay to the bottom of the z-order
    pub fn send_to_back(&mut self, id: &str) -> bool {
        self.move_overlay(id, |_, _| 0)
    }

    /// Moves an overlay to the top of the z-order
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        self.move_overlay(id, |_, last| last)
    }

    pub fn bring_forward(&mut self, id: &str) -> bool {
        self.move_overlay(id, |from, _| from + 1)
    }

    pub fn send_backward(&mut self, id: &str) -> bool {
        self.move_overlay(id, |from, _| from.saturating_sub(1))
    }

    /// Topmost overlay under a point
    pub fn overlay_at(&self, x: f64, y: f64) -> Option<&Overlay> {
        self.overlays.iter().rev().find(|o| o.hit_test(x, y))
    }

    pub fn tween_position(&self) -> f64 {
        self.tween_position
    }

    /// Moves the stop to a point between its start (0) and end (1). Each
    /// overlay gets the position eased by its own interpolation type, or
    /// by the stop's when the overlay uses the default.
    pub fn set_tween_position(&mut self, position: f64) {
        let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
        self.tween_position = position;
        let stop_type = self.interpolation_type;
        for overlay in &mut self.overlays {
            let eased = overlay.interpolation_type.resolve(stop_type).ease(position);
            overlay.set_tween_factor(eased);
        }
    }

    /// Camera at the current tween position. Keyframed stops move from
    /// the start target to the end target.
    pub fn current_camera(&self) -> CameraParameters {
        let start = self.target.camera_params();
        match &self.end_target {
            Some(end) => CameraParameters::interpolate(
                &start,
                &end.camera_params(),
                self.interpolation_type.ease(self.tween_position),
            ),
            None => start,
        }
    }

    /// Starts overlay media: flipbooks and audio
    pub fn play(&mut self) {
        for overlay in &mut self.overlays {
            overlay.play();
        }
    }

    pub fn pause(&mut self) {
        for overlay in &mut self.overlays {
            overlay.pause();
        }
    }

    pub fn stop(&mut self) {
        for overlay in self.media_mut() {
            overlay.stop();
        }
    }

    /// Releases transient media state of every overlay and track
    pub fn clean_up(&mut self) {
        for overlay in self.media_mut() {
            overlay.clean_up();
        }
    }

    /// Every overlay and track, for playback bookkeeping. Changes made
    /// through this do not mark the stop changed.
    pub fn media_mut(&mut self) -> impl Iterator<Item = &mut Overlay> {
        self.overlays
            .iter_mut()
            .chain(self.music_track.iter_mut())
            .chain(self.voice_track.iter_mut())
    }

    /// Deep copy with a fresh id. Playback state is reset, so the copy is
    /// what saving and reloading this stop would give.
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = util::new_guid();
        copy.tween_position = 0.0;
        for overlay in copy.media_mut() {
            overlay.set_tween_factor(0.0);
            overlay.clean_up();
        }
        copy.dirty = false;
        copy.revision = 0;
        copy
    }

    /// Archive files this stop needs besides its thumbnail: track audio
    /// and overlay media
    pub fn referenced_files(&self) -> Vec<&str> {
        let mut files = Vec::new();
        for overlay in self
            .overlays
            .iter()
            .chain(self.music_track.iter())
            .chain(self.voice_track.iter())
        {
            for file in overlay.files() {
                if !files.contains(&file) {
                    files.push(file);
                }
            }
        }
        files
    }

    pub fn save_to_xml(&self, w: &mut XmlWriter) {
        w.write_start_element("TourStop");
        w.write_attribute_string("Id", &self.id);
        w.write_attribute_string("Caption", &self.caption);
        w.write_attribute_string("Description", &self.description);
        w.write_attribute_string("Duration", &util::format_duration(self.duration_ms));
        w.write_attribute("Transition", self.transition);
        w.write_attribute_bool("HasTime", self.has_time);
        w.write_attribute_string("StartTime", &util::format_date(&self.start_time));
        w.write_attribute_string("EndTime", &util::format_date(&self.end_time));
        self.settings.write_xml_attributes(w);
        w.write_attribute_bool("KeyFramed", self.is_keyframed());
        w.write_attribute_string("NextSlide", &self.next_slide);
        w.write_attribute("InterpolationType", self.interpolation_type);
        w.write_attribute_bool("IsLinked", self.is_linked);
        w.write_attribute_bool("MasterSlide", self.master_slide);
        w.write_attribute("TransitionTime", self.transition_time);
        w.write_attribute("TransitionHoldTime", self.transition_hold_time);
        w.write_attribute("TransitionOutTime", self.transition_out_time);

        self.target.save_to_xml(w, "Place");
        if let Some(end) = &self.end_target {
            end.save_to_xml(w, "EndTarget");
        }

        w.write_start_element("Overlays");
        for overlay in &self.overlays {
            overlay.save_to_xml(w);
        }
        w.write_end_element();

        if let Some(track) = &self.music_track {
            w.write_start_element("MusicTrack");
            track.save_to_xml(w);
            w.write_end_element();
        }
        if let Some(track) = &self.voice_track {
            w.write_start_element("VoiceTrack");
            track.save_to_xml(w);
            w.write_end_element();
        }

        if !self.layers.is_empty() {
            w.write_start_element("VisibleLayers");
            for (id, info) in &self.layers {
                info.save_to_xml(id, w);
            }
            w.write_end_element();
        }

        w.write_end_element();
    }

    /// Reads a stop, reporting any failure to the engine's error sink and
    /// returning `None` rather than a partial stop
    pub fn from_xml(el: &XmlElement, ctx: &mut EngineContext) -> Option<Self> {
        match Self::try_from_xml(el) {
            Ok(stop) => Some(stop),
            Err(e) => {
                let id = el.attr("Id").unwrap_or("?");
                ctx.report_error(format!("failed to load tour stop {}: {}", id, e));
                None
            }
        }
    }

    /// Reads a stop. Missing attributes take their defaults; a missing
    /// `Place` or an unreadable overlay is an error.
    pub fn try_from_xml(el: &XmlElement) -> Result<Self> {
        if el.name != "TourStop" {
            return Err(Error::MalformedXml(format!("expected <TourStop>, found <{}>", el.name)));
        }
        let place = el.child("Place").ok_or(Error::MissingElement("Place"))?;
        let mut stop = TourStop::new(Place::from_xml(place));
        let d = TourStop::default();

        if let Some(id) = el.attr("Id") {
            stop.id = id.to_string();
        }
        stop.caption = el.attr_string("Caption", "");
        stop.description = el.attr_string("Description", "");
        stop.duration_ms = el
            .attr("Duration")
            .and_then(util::parse_duration)
            .unwrap_or(d.duration_ms);
        stop.transition = el.attr_or("Transition", d.transition);
        stop.has_time = el.attr_bool("HasTime", d.has_time);
        stop.start_time = el.attr("StartTime").and_then(util::parse_date).unwrap_or(d.start_time);
        stop.end_time = el.attr("EndTime").and_then(util::parse_date).unwrap_or(d.end_time);
        stop.settings = Settings::from_xml_attributes(el);
        stop.next_slide = el.attr_string("NextSlide", &d.next_slide);
        stop.interpolation_type = el.attr_or("InterpolationType", d.interpolation_type);
        stop.is_linked = el.attr_bool("IsLinked", d.is_linked);
        stop.master_slide = el.attr_bool("MasterSlide", d.master_slide);
        stop.transition_time = el.attr_or("TransitionTime", d.transition_time);
        stop.transition_hold_time = el.attr_or("TransitionHoldTime", d.transition_hold_time);
        stop.transition_out_time = el.attr_or("TransitionOutTime", d.transition_out_time);

        stop.end_target = el.child("EndTarget").map(Place::from_xml);

        if let Some(overlays) = el.child("Overlays") {
            for overlay in overlays.children_named("Overlay") {
                stop.overlays.push(Overlay::from_xml(overlay)?);
            }
        }
        stop.music_track = read_track(el, "MusicTrack")?;
        stop.voice_track = read_track(el, "VoiceTrack")?;

        if let Some(layers) = el.child("VisibleLayers") {
            for layer in layers.children_named("Layer") {
                let id = layer.text.trim();
                if id.is_empty() {
                    log::warn!("stop {} has a visible layer without an id", stop.id);
                    continue;
                }
                stop.layers.insert(id.to_string(), LayerInfo::from_xml(layer));
            }
        }

        log::debug!("loaded stop {} with {} overlays", stop.id, stop.overlays.len());
        Ok(stop)
    }
}

fn read_track(el: &XmlElement, name: &str) -> Result<Option<Overlay>> {
    match el.child(name).and_then(|t| t.child("Overlay")) {
        Some(overlay) => Ok(Some(Overlay::from_xml(overlay)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{AudioType, OverlayKind, ShapeType, TextObject};
    use crate::Color;
    use chrono::TimeZone;

    fn sample() -> TourStop {
        let mut stop = TourStop::new(Place::sky("M42", 5.5, -5.4, 3.0));
        stop.set_caption("Orion & friends");
        stop.set_duration_ms(7_250);
        stop.set_transition(TransitionType::CrossFade);
        stop.set_has_time(true);
        stop.set_start_time(Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap());
        stop.set_end_time(Utc.with_ymd_and_hms(2021, 1, 2, 4, 4, 5).unwrap());
        stop.set_end_target(Some(Place::sky("M43", 5.6, -5.3, 1.0)));
        stop.set_interpolation_type(InterpolationType::EaseInOut);
        stop.set_master_slide(true);
        stop.settings_mut().show_grid = true;
        stop.settings_mut().constellation_figure_color = Color::from_argb(255, 1, 2, 3);
        stop.add_overlay(Overlay::bitmap("Image 1", "img.png", 960.0, 600.0, 100.0, 100.0));
        stop.add_overlay(Overlay::text("Title", TextObject::new("Orion"), 200.0, 100.0));
        stop.add_overlay(Overlay::shape("Box", ShapeType::Rectangle, 50.0, 50.0, 20.0, 20.0));
        stop.set_music_track(Some(Overlay::audio("music", "music.mp3", AudioType::Music)));
        stop.set_voice_track(Some(Overlay::audio("voice", "voice.mp3", AudioType::Voice)));
        let mut info = LayerInfo::new(0.25, 1.0);
        info.params = vec![(1.0, 2.0), (0.5, 0.5)];
        stop.set_layer_info("6f1c1c3e-2d4b-4a5e-9b0e-0e9c0d6b2f11", info);
        stop
    }

    fn roundtrip(stop: &TourStop) -> TourStop {
        let mut w = XmlWriter::new();
        stop.save_to_xml(&mut w);
        TourStop::try_from_xml(&XmlElement::parse(&w.into_string()).unwrap()).unwrap()
    }

    #[test]
    fn test_xml_roundtrip_preserves_id() {
        let mut stop = sample();
        stop.clear_dirty();
        let parsed = roundtrip(&stop);
        assert_eq!(parsed.id(), stop.id());
        assert_eq!(parsed.overlays(), stop.overlays());
        assert_eq!(parsed.settings(), stop.settings());
        assert_eq!(parsed.layers(), stop.layers());
        assert_eq!(parsed.end_target(), stop.end_target());
        assert_eq!(parsed.start_time(), stop.start_time());
        assert_eq!(parsed.duration_ms(), 7_250);
        assert_eq!(parsed.music_track(), stop.music_track());
    }

    #[test]
    fn test_copy_gets_fresh_id() {
        let stop = sample();
        let copy = stop.copy();
        assert_ne!(copy.id(), stop.id());
        assert_eq!(copy.overlays(), stop.overlays());
        assert_eq!(copy.caption(), stop.caption());
    }

    #[test]
    fn test_missing_attributes_use_defaults() {
        let el = XmlElement::parse("<TourStop Id=\"a\"><Place/></TourStop>").unwrap();
        let stop = TourStop::try_from_xml(&el).unwrap();
        assert_eq!(stop.id(), "a");
        assert_eq!(stop.duration_ms(), DEFAULT_DURATION_MS);
        assert_eq!(stop.settings(), &Settings::default());
        assert_eq!(stop.next_link(), SlideLink::Next);
        assert!(stop.overlays().is_empty());
    }

    #[test]
    fn test_bad_stop_reported_not_returned() {
        let mut ctx = EngineContext::new();
        let el = XmlElement::parse(
            "<TourStop Id=\"bad\"><Place/><Overlays><Overlay Type=\"Nope\"/></Overlays></TourStop>",
        )
        .unwrap();
        assert!(TourStop::from_xml(&el, &mut ctx).is_none());
        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.errors()[0].contains("bad"));

        let el = XmlElement::parse("<TourStop Id=\"noplace\"/>").unwrap();
        assert!(TourStop::from_xml(&el, &mut ctx).is_none());
        assert_eq!(ctx.errors().len(), 2);
    }

    #[test]
    fn test_overlay_ordering() {
        let mut stop = sample();
        let ids: Vec<String> = stop.overlays().iter().map(|o| o.id.clone()).collect();
        let order = |s: &TourStop| s.overlays().iter().map(|o| o.id.clone()).collect::<Vec<_>>();

        assert!(stop.bring_to_front(&ids[0]));
        assert_eq!(order(&stop), vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]);
        assert!(stop.send_to_back(&ids[0]));
        assert_eq!(order(&stop), ids);
        assert!(stop.bring_forward(&ids[1]));
        assert_eq!(order(&stop), vec![ids[0].clone(), ids[2].clone(), ids[1].clone()]);
        assert!(stop.send_backward(&ids[1]));
        assert_eq!(order(&stop), ids);
        assert!(!stop.send_backward(&ids[0]));
        assert!(!stop.bring_forward(&ids[2]));
        assert!(!stop.bring_to_front("missing"));
    }

    #[test]
    fn test_tween_position_clamps_and_eases() {
        let mut stop = sample();
        stop.set_tween_position(4.0);
        assert_eq!(stop.tween_position(), 1.0);
        stop.set_tween_position(-1.0);
        assert_eq!(stop.tween_position(), 0.0);

        stop.set_tween_position(0.5);
        // EaseInOut is symmetric about the midpoint
        assert_eq!(stop.overlays()[0].tween_factor(), 0.5);
        stop.set_tween_position(0.25);
        assert!(stop.overlays()[0].tween_factor() < 0.25);

        stop.overlays_mut()[0].interpolation_type = InterpolationType::Linear;
        stop.set_tween_position(0.25);
        assert_eq!(stop.overlays()[0].tween_factor(), 0.25);
    }

    #[test]
    fn test_current_camera_follows_end_target() {
        let mut stop = sample();
        stop.set_tween_position(0.0);
        assert_eq!(stop.current_camera(), stop.target().camera_params());
        stop.set_tween_position(1.0);
        let end = stop.end_target().unwrap().camera_params();
        let cam = stop.current_camera();
        assert!((cam.lng - end.lng).abs() < 1e-9);
        assert!((cam.zoom - end.zoom).abs() < 1e-9);
    }

    #[test]
    fn test_capture_and_sync_settings() {
        let now = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        let mut ctx = EngineContext::at(now);
        ctx.settings.show_ecliptic = true;
        let mut stop = TourStop::capture(Place::default(), &ctx);
        assert!(stop.settings().show_ecliptic);
        assert_eq!(stop.start_time(), now);

        stop.settings_mut().show_ecliptic = false;
        stop.sync_settings(&mut ctx);
        assert!(!ctx.settings.show_ecliptic);
    }

    #[test]
    fn test_setters_mark_dirty_but_tween_does_not() {
        let mut stop = sample();
        stop.clear_dirty();
        let revision = stop.revision();
        stop.set_tween_position(0.3);
        assert!(!stop.is_dirty());
        assert_eq!(stop.revision(), revision);
        stop.set_caption("x");
        assert!(stop.is_dirty());
        assert!(stop.revision() > revision);
    }

    #[test]
    fn test_referenced_files() {
        let mut stop = sample();
        let bitmap = crate::overlay::BitmapOverlay::new("img.png");
        stop.add_overlay(Overlay::new("again", OverlayKind::Bitmap(bitmap)));
        assert_eq!(stop.referenced_files(), vec!["img.png", "music.mp3", "voice.mp3"]);
    }

    #[test]
    fn test_layer_info_interpolates() {
        let mut info = LayerInfo::new(0.0, 1.0);
        info.params = vec![(10.0, 20.0)];
        assert_eq!(info.opacity_at(0.5), 0.5);
        assert_eq!(info.params_at(1.0), vec![20.0]);
    }
}
