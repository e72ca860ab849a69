//! Overlays: images, text, shapes, audio and flipbooks attached to a stop
//!
//! Geometry is stored twice, as a start state and an end state, with a tween
//! factor between them. Getters interpolate; setters write the start state
//! while the factor is below one half and the end state from one half on.
//! An overlay that does not animate keeps both states identical.

mod audio;
mod bitmap;
mod flipbook;
mod shape;
mod text;

pub use audio::{AudioOverlay, AudioType, MediaState};
pub use bitmap::BitmapOverlay;
pub use flipbook::{frame_index, FlipbookOverlay, LoopType};
pub use shape::{ShapeOverlay, ShapeType};
pub use text::{TextObject, TextOverlay};

use crate::interpolation::InterpolationType;
use crate::tour_stop::SlideLink;
use crate::xml::{XmlElement, XmlWriter};
use crate::{Color, Error, Result};
use std::fmt;
use std::str::FromStr;

/// Smallest non-zero width or height an overlay may have
pub const MIN_OVERLAY_SIZE: f64 = 5.0;

/// Per-variant behavior: the type-named XML payload and media lifecycle
pub trait OverlayPayload {
    /// Value of the `Type` attribute
    fn type_name(&self) -> &'static str;

    /// Name of the payload child element
    fn element_name(&self) -> &'static str;

    /// Writes attributes (and any content) of the already-open payload element
    fn write_overlay_properties(&self, w: &mut XmlWriter);

    /// Reads the payload element
    fn initialize_from_xml(&mut self, el: &XmlElement);

    /// Files in the tour archive this overlay needs
    fn files(&self) -> Vec<&str> {
        Vec::new()
    }

    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn seek(&mut self, _seconds: f64) {}
    fn stop(&mut self) {}

    /// Drops transient playback resources
    fn clean_up(&mut self) {}
}

/// Where an overlay is positioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayAnchor {
    Sky,
    #[default]
    Screen,
}

impl fmt::Display for OverlayAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverlayAnchor::Sky => "Sky",
            OverlayAnchor::Screen => "Screen",
        })
    }
}

impl FromStr for OverlayAnchor {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Sky" => Ok(OverlayAnchor::Sky),
            "Screen" => Ok(OverlayAnchor::Screen),
            _ => Err(()),
        }
    }
}

/// The variant-specific part of an overlay
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayKind {
    Bitmap(BitmapOverlay),
    Text(TextOverlay),
    Shape(ShapeOverlay),
    Audio(AudioOverlay),
    Flipbook(FlipbookOverlay),
}

impl OverlayKind {
    /// Empty payload for a `Type` attribute value
    pub fn for_type_name(type_name: &str) -> Option<Self> {
        let short = type_name.rsplit('.').next().unwrap_or(type_name);
        match short {
            "BitmapOverlay" => Some(OverlayKind::Bitmap(BitmapOverlay::default())),
            "TextOverlay" => Some(OverlayKind::Text(TextOverlay::default())),
            "ShapeOverlay" => Some(OverlayKind::Shape(ShapeOverlay::default())),
            "AudioOverlay" => Some(OverlayKind::Audio(AudioOverlay::default())),
            "FlipbookOverlay" => Some(OverlayKind::Flipbook(FlipbookOverlay::default())),
            _ => None,
        }
    }

    pub fn payload(&self) -> &dyn OverlayPayload {
        match self {
            OverlayKind::Bitmap(p) => p,
            OverlayKind::Text(p) => p,
            OverlayKind::Shape(p) => p,
            OverlayKind::Audio(p) => p,
            OverlayKind::Flipbook(p) => p,
        }
    }

    pub fn payload_mut(&mut self) -> &mut dyn OverlayPayload {
        match self {
            OverlayKind::Bitmap(p) => p,
            OverlayKind::Text(p) => p,
            OverlayKind::Shape(p) => p,
            OverlayKind::Audio(p) => p,
            OverlayKind::Flipbook(p) => p,
        }
    }
}

/// One end of an overlay's tween
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayState {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub color: Color,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            rotation: 0.0,
            color: Color::WHITE,
        }
    }
}

impl OverlayState {
    fn lerp(&self, end: &OverlayState, t: f64) -> OverlayState {
        let mix = |a: f64, b: f64| {
            if t == 0.0 {
                a
            } else if t == 1.0 {
                b
            } else {
                a + (b - a) * t
            }
        };
        OverlayState {
            x: mix(self.x, end.x),
            y: mix(self.y, end.y),
            width: mix(self.width, end.width),
            height: mix(self.height, end.height),
            rotation: mix(self.rotation, end.rotation),
            color: self.color.lerp(end.color, t),
        }
    }
}

fn clamp_size(value: f64) -> f64 {
    if value != 0.0 && value < MIN_OVERLAY_SIZE {
        MIN_OVERLAY_SIZE
    } else {
        value
    }
}

/// A visual or audio element on a tour stop
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: String,
    pub name: String,
    start: OverlayState,
    end: OverlayState,
    animate: bool,
    tween_factor: f64,
    pub interpolation_type: InterpolationType,
    pub url: String,
    /// Empty for no link, otherwise "Next", "Return" or a stop id
    pub link_id: String,
    pub anchor: OverlayAnchor,
    pub kind: OverlayKind,
}

impl Overlay {
    /// Creates an overlay with a fresh id
    pub fn new(name: &str, kind: OverlayKind) -> Self {
        Self {
            id: crate::util::new_guid(),
            name: name.to_string(),
            start: OverlayState::default(),
            end: OverlayState::default(),
            animate: false,
            tween_factor: 0.0,
            interpolation_type: InterpolationType::DefaultV,
            url: String::new(),
            link_id: String::new(),
            anchor: OverlayAnchor::Screen,
            kind,
        }
    }

    /// Bitmap overlay centered at (x, y)
    pub fn bitmap(name: &str, filename: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut overlay = Self::new(name, OverlayKind::Bitmap(BitmapOverlay::new(filename)));
        overlay.set_geometry(x, y, width, height);
        overlay
    }

    /// Text overlay centered at (x, y)
    pub fn text(name: &str, text_object: TextObject, x: f64, y: f64) -> Self {
        let mut overlay = Self::new(name, OverlayKind::Text(TextOverlay::new(text_object)));
        overlay.set_geometry(x, y, 0.0, 0.0);
        overlay
    }

    /// Shape overlay centered at (x, y)
    pub fn shape(
        name: &str,
        shape_type: ShapeType,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        let mut overlay = Self::new(name, OverlayKind::Shape(ShapeOverlay::new(shape_type)));
        overlay.set_geometry(x, y, width, height);
        overlay
    }

    /// Audio overlay for a music or voice track
    pub fn audio(name: &str, filename: &str, track_type: AudioType) -> Self {
        Self::new(name, OverlayKind::Audio(AudioOverlay::new(filename, track_type)))
    }

    fn set_geometry(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.set_x(x);
        self.set_y(y);
        self.set_width(width);
        self.set_height(height);
    }

    pub fn animate(&self) -> bool {
        self.animate
    }

    /// Switches between the static and keyframed representations.
    /// Turning animation on seeds the end state from the start state;
    /// turning it off collapses both to the current tweened values.
    pub fn set_animate(&mut self, value: bool) {
        if self.animate == value {
            return;
        }
        if value {
            self.end = self.start;
        } else {
            let current = self.current_state();
            self.start = current;
            self.end = current;
            self.tween_factor = 0.0;
        }
        self.animate = value;
    }

    pub fn tween_factor(&self) -> f64 {
        self.tween_factor
    }

    /// Sets the tween factor, clamped to [0,1]
    pub fn set_tween_factor(&mut self, value: f64) {
        self.tween_factor = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    }

    /// Interpolated state at the current tween factor
    pub fn current_state(&self) -> OverlayState {
        self.start.lerp(&self.end, self.tween_factor)
    }

    pub fn start_state(&self) -> &OverlayState {
        &self.start
    }

    pub fn end_state(&self) -> &OverlayState {
        &self.end
    }

    fn write_state(&mut self, update: impl Fn(&mut OverlayState)) {
        if !self.animate {
            update(&mut self.start);
            update(&mut self.end);
        } else if self.tween_factor < 0.5 {
            update(&mut self.start);
        } else {
            update(&mut self.end);
        }
    }

    pub fn x(&self) -> f64 {
        self.current_state().x
    }

    pub fn y(&self) -> f64 {
        self.current_state().y
    }

    pub fn width(&self) -> f64 {
        self.current_state().width
    }

    pub fn height(&self) -> f64 {
        self.current_state().height
    }

    pub fn rotation(&self) -> f64 {
        self.current_state().rotation
    }

    pub fn color(&self) -> Color {
        self.current_state().color
    }

    /// Opacity in [0,1], taken from the color's alpha
    pub fn opacity(&self) -> f64 {
        self.color().a as f64 / 255.0
    }

    pub fn set_x(&mut self, value: f64) {
        self.write_state(|s| s.x = value);
    }

    pub fn set_y(&mut self, value: f64) {
        self.write_state(|s| s.y = value);
    }

    pub fn set_width(&mut self, value: f64) {
        let value = clamp_size(value);
        self.write_state(|s| s.width = value);
    }

    pub fn set_height(&mut self, value: f64) {
        let value = clamp_size(value);
        self.write_state(|s| s.height = value);
    }

    pub fn set_rotation(&mut self, value: f64) {
        self.write_state(|s| s.rotation = value);
    }

    pub fn set_color(&mut self, value: Color) {
        self.write_state(|s| s.color = value);
    }

    pub fn set_opacity(&mut self, value: f64) {
        let alpha = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.write_state(|s| s.color = s.color.with_alpha(alpha));
    }

    /// Parsed link target, if any
    pub fn link(&self) -> Option<SlideLink> {
        SlideLink::from_id(&self.link_id)
    }

    /// Whether a point falls inside the overlay. The point is rotated
    /// back about the overlay's center before a box test.
    pub fn hit_test(&self, px: f64, py: f64) -> bool {
        let s = self.current_state();
        let (sin, cos) = (-s.rotation).to_radians().sin_cos();
        let (dx, dy) = (px - s.x, py - s.y);
        let lx = dx * cos - dy * sin;
        let ly = dx * sin + dy * cos;
        lx.abs() <= s.width / 2.0 && ly.abs() <= s.height / 2.0
    }

    pub fn play(&mut self) {
        self.kind.payload_mut().play();
    }

    pub fn pause(&mut self) {
        self.kind.payload_mut().pause();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.kind.payload_mut().seek(seconds);
    }

    pub fn stop(&mut self) {
        self.kind.payload_mut().stop();
    }

    pub fn clean_up(&mut self) {
        self.kind.payload_mut().clean_up();
    }

    /// Archive files this overlay references
    pub fn files(&self) -> Vec<&str> {
        self.kind.payload().files()
    }

    pub fn save_to_xml(&self, w: &mut XmlWriter) {
        self.save_to_xml_named(w, "Overlay");
    }

    /// Writes the overlay under a custom element name (music and voice
    /// tracks nest their overlay this way)
    pub fn save_to_xml_named(&self, w: &mut XmlWriter, element_name: &str) {
        let payload = self.kind.payload();
        w.write_start_element(element_name);
        w.write_attribute_string("Id", &self.id);
        w.write_attribute_string("Type", payload.type_name());
        w.write_attribute_string("Name", &self.name);
        w.write_attribute("X", self.start.x);
        w.write_attribute("Y", self.start.y);
        w.write_attribute("Width", self.start.width);
        w.write_attribute("Height", self.start.height);
        w.write_attribute("Rotation", self.start.rotation);
        w.write_attribute("Color", self.start.color);
        w.write_attribute_string("Url", &self.url);
        w.write_attribute_string("LinkID", &self.link_id);
        w.write_attribute_bool("Animate", self.animate);
        if self.animate {
            w.write_attribute("EndX", self.end.x);
            w.write_attribute("EndY", self.end.y);
            w.write_attribute("EndWidth", self.end.width);
            w.write_attribute("EndHeight", self.end.height);
            w.write_attribute("EndRotation", self.end.rotation);
            w.write_attribute("EndColor", self.end.color);
            w.write_attribute("InterpolationType", self.interpolation_type);
        }
        w.write_attribute("Anchor", self.anchor);

        w.write_start_element(payload.element_name());
        payload.write_overlay_properties(w);
        w.write_end_element();

        w.write_end_element();
    }

    /// Builds an overlay from its XML element. The `Type` attribute picks
    /// the variant; everything else is optional.
    pub fn from_xml(el: &XmlElement) -> Result<Self> {
        let type_name = el.require_attr("Type")?;
        let kind = OverlayKind::for_type_name(type_name).ok_or_else(|| Error::InvalidValue {
            attribute: "Type".into(),
            value: type_name.to_string(),
        })?;
        let mut overlay = Overlay::new("", kind);
        overlay.init_overlay_from_xml(el);

        let element_name = overlay.kind.payload().element_name();
        match el.child(element_name) {
            Some(payload) => overlay.kind.payload_mut().initialize_from_xml(payload),
            None => log::warn!("overlay {} has no <{}> payload", overlay.id, element_name),
        }
        Ok(overlay)
    }

    fn init_overlay_from_xml(&mut self, el: &XmlElement) {
        if let Some(id) = el.attr("Id") {
            self.id = id.to_string();
        }
        self.name = el.attr_string("Name", "");
        let start = OverlayState {
            x: el.attr_or("X", 0.0),
            y: el.attr_or("Y", 0.0),
            width: el.attr_or("Width", 0.0),
            height: el.attr_or("Height", 0.0),
            rotation: el.attr_or("Rotation", 0.0),
            color: Color::parse_or(el.attr("Color"), Color::WHITE),
        };
        self.start = start;
        self.url = el.attr_string("Url", "");
        self.link_id = el.attr_string("LinkID", "");
        self.animate = el.attr_bool("Animate", false);
        self.anchor = el.attr_or("Anchor", OverlayAnchor::Screen);
        if self.animate {
            self.end = OverlayState {
                x: el.attr_or("EndX", start.x),
                y: el.attr_or("EndY", start.y),
                width: el.attr_or("EndWidth", start.width),
                height: el.attr_or("EndHeight", start.height),
                rotation: el.attr_or("EndRotation", start.rotation),
                color: Color::parse_or(el.attr("EndColor"), start.color),
            };
            self.interpolation_type = el.attr_or("InterpolationType", InterpolationType::DefaultV);
        } else {
            self.end = start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animated() -> Overlay {
        let mut o = Overlay::bitmap("Image 1", "img.png", 100.0, 200.0, 50.0, 40.0);
        o.set_color(Color::from_argb(0, 0, 0, 0));
        o.set_animate(true);
        o.set_tween_factor(1.0);
        o.set_x(300.0);
        o.set_y(0.0);
        o.set_width(150.0);
        o.set_height(80.0);
        o.set_rotation(90.0);
        o.set_color(Color::from_argb(255, 200, 100, 50));
        o.set_tween_factor(0.0);
        o
    }

    #[test]
    fn test_tween_endpoints_and_midpoint() {
        let mut o = animated();
        o.set_tween_factor(0.0);
        let geometry = |o: &Overlay| (o.x(), o.y(), o.width(), o.height(), o.rotation());
        assert_eq!(geometry(&o), (100.0, 200.0, 50.0, 40.0, 0.0));
        assert_eq!(o.color(), Color::from_argb(0, 0, 0, 0));

        o.set_tween_factor(1.0);
        assert_eq!(geometry(&o), (300.0, 0.0, 150.0, 80.0, 90.0));
        assert_eq!(o.color(), Color::from_argb(255, 200, 100, 50));

        o.set_tween_factor(0.25);
        assert_eq!(o.x(), 150.0);
        assert_eq!(o.y(), 150.0);
        assert_eq!(o.rotation(), 22.5);
    }

    #[test]
    fn test_tween_factor_clamps() {
        let mut o = animated();
        o.set_tween_factor(-2.0);
        assert_eq!(o.tween_factor(), 0.0);
        o.set_tween_factor(9.0);
        assert_eq!(o.tween_factor(), 1.0);
    }

    #[test]
    fn test_setter_targets_nearest_end() {
        let mut o = animated();
        o.set_tween_factor(0.49);
        o.set_x(10.0);
        assert_eq!(o.start_state().x, 10.0);
        assert_eq!(o.end_state().x, 300.0);
        o.set_tween_factor(0.5);
        o.set_x(20.0);
        assert_eq!(o.end_state().x, 20.0);
    }

    #[test]
    fn test_static_overlay_keeps_states_identical() {
        let mut o = Overlay::bitmap("b", "b.png", 1.0, 2.0, 30.0, 40.0);
        o.set_tween_factor(0.9);
        o.set_x(5.0);
        assert_eq!(o.start_state(), o.end_state());
    }

    #[test]
    fn test_animate_toggle() {
        let mut o = animated();
        o.set_tween_factor(0.5);
        o.set_animate(false);
        assert_eq!(o.start_state(), o.end_state());
        assert_eq!(o.x(), 200.0);
        o.set_animate(true);
        assert_eq!(o.start_state(), o.end_state());
    }

    #[test]
    fn test_minimum_size() {
        let mut o = Overlay::bitmap("b", "b.png", 0.0, 0.0, 2.0, 0.0);
        assert_eq!(o.width(), MIN_OVERLAY_SIZE);
        assert_eq!(o.height(), 0.0);
        o.set_height(4.9);
        assert_eq!(o.height(), MIN_OVERLAY_SIZE);
        o.set_height(6.0);
        assert_eq!(o.height(), 6.0);
    }

    #[test]
    fn test_opacity_is_alpha() {
        let mut o = Overlay::bitmap("b", "b.png", 0.0, 0.0, 10.0, 10.0);
        o.set_opacity(0.0);
        assert_eq!(o.color().a, 0);
        o.set_opacity(1.0);
        assert_eq!(o.opacity(), 1.0);
        assert_eq!(o.color(), Color::WHITE);
    }

    #[test]
    fn test_hit_test_rotated() {
        let mut o = Overlay::shape("r", ShapeType::Rectangle, 100.0, 100.0, 100.0, 20.0);
        assert!(o.hit_test(140.0, 105.0));
        assert!(!o.hit_test(100.0, 140.0));
        o.set_rotation(90.0);
        assert!(o.hit_test(100.0, 140.0));
        assert!(!o.hit_test(140.0, 105.0));
    }

    #[test]
    fn test_xml_roundtrip_each_kind() {
        let flipbook = FlipbookOverlay::new("f.png", 8, 4, 2);
        let mut flip = Overlay::new("f", OverlayKind::Flipbook(flipbook));
        flip.link_id = "Return".into();
        let overlays = vec![
            animated(),
            Overlay::text("t", TextObject::new("Hello {$DATE}"), 10.0, 20.0),
            Overlay::shape("s", ShapeType::Star, 1.0, 2.0, 30.0, 30.0),
            Overlay::audio("a", "music.mp3", AudioType::Music),
            flip,
        ];
        for o in overlays {
            let mut w = XmlWriter::new();
            o.save_to_xml(&mut w);
            let parsed = Overlay::from_xml(&XmlElement::parse(&w.into_string()).unwrap()).unwrap();
            assert_eq!(parsed, o);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let el = XmlElement::parse("<Overlay Type=\"TerraViewer.Mystery\"/>").unwrap();
        assert!(Overlay::from_xml(&el).is_err());
    }
}
