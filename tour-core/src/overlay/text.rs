//! Text overlays and the styled text they carry

use super::OverlayPayload;
use crate::context::ViewSnapshot;
use crate::xml::{XmlElement, XmlWriter};
use crate::Color;
use chrono::{DateTime, Utc};

/// Border drawn behind a text object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBorderStyle {
    #[default]
    None,
    Tight,
    Small,
    Medium,
    Large,
}

impl TextBorderStyle {
    fn index(self) -> i32 {
        match self {
            TextBorderStyle::None => 0,
            TextBorderStyle::Tight => 1,
            TextBorderStyle::Small => 2,
            TextBorderStyle::Medium => 3,
            TextBorderStyle::Large => 4,
        }
    }

    fn from_index(i: i32) -> Self {
        match i {
            1 => TextBorderStyle::Tight,
            2 => TextBorderStyle::Small,
            3 => TextBorderStyle::Medium,
            4 => TextBorderStyle::Large,
            _ => TextBorderStyle::None,
        }
    }
}

/// A run of styled text. The text may contain `{$NAME}` templates that are
/// filled in from the live view when the text is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_size: f64,
    pub font_name: String,
    pub foreground_color: Color,
    pub background_color: Color,
    pub border_style: TextBorderStyle,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            text: String::new(),
            bold: false,
            italic: false,
            underline: false,
            font_size: 24.0,
            font_name: "Arial".to_string(),
            foreground_color: Color::WHITE,
            background_color: Color::BLACK.with_alpha(0),
            border_style: TextBorderStyle::None,
        }
    }
}

impl TextObject {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// The text with every known template replaced
    pub fn resolve(&self, view: &ViewSnapshot, now: &DateTime<Utc>) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find("{$") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match tail.find('}') {
                Some(end) => {
                    let name = &tail[2..end];
                    match expand_template(name, view, now) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    pub fn save_to_xml(&self, w: &mut XmlWriter) {
        w.write_start_element("TextObject");
        w.write_attribute_bool("Bold", self.bold);
        w.write_attribute_bool("Italic", self.italic);
        w.write_attribute_bool("Underline", self.underline);
        w.write_attribute("FontSize", self.font_size);
        w.write_attribute_string("FontName", &self.font_name);
        w.write_attribute("ForgroundColor", self.foreground_color);
        w.write_attribute("BackgroundColor", self.background_color);
        w.write_attribute("BorderStyle", self.border_style.index());
        w.write_string(&self.text);
        w.write_end_element();
    }

    pub fn from_xml(el: &XmlElement) -> Self {
        let d = Self::default();
        Self {
            text: el.text.clone(),
            bold: el.attr_bool("Bold", d.bold),
            italic: el.attr_bool("Italic", d.italic),
            underline: el.attr_bool("Underline", d.underline),
            font_size: el.attr_or("FontSize", d.font_size),
            font_name: el.attr_string("FontName", &d.font_name),
            // both spellings have been written over the years
            foreground_color: Color::parse_or(
                el.attr("ForgroundColor").or_else(|| el.attr("ForegroundColor")),
                d.foreground_color,
            ),
            background_color: Color::parse_or(el.attr("BackgroundColor"), d.background_color),
            border_style: TextBorderStyle::from_index(el.attr_or("BorderStyle", 0)),
        }
    }
}

fn expand_template(name: &str, view: &ViewSnapshot, now: &DateTime<Utc>) -> Option<String> {
    let value = match name {
        "DATE" => now.format("%Y/%m/%d").to_string(),
        "TIME" => now.format("%H:%M:%S").to_string(),
        "DIST" => format_distance(view.distance_au),
        "LAT" => format_degrees(view.lat, true),
        "LNG" => format_degrees(view.lng, true),
        "RA" => format_hours(view.ra),
        "DEC" => format_degrees(view.dec, true),
        "FOV" => format_degrees(view.fov, false),
        _ => return None,
    };
    Some(value)
}

fn split_sexagesimal(value: f64) -> (u32, u32, f64) {
    let v = value.abs();
    let whole = v.trunc();
    let minutes = ((v - whole) * 60.0).trunc();
    let seconds = ((v - whole) * 60.0 - minutes) * 60.0;
    (whole as u32, minutes as u32, seconds)
}

/// `12h 30m 15s`
fn format_hours(hours: f64) -> String {
    let (h, m, s) = split_sexagesimal(hours.rem_euclid(24.0));
    format!("{:02}h {:02}m {:02.0}s", h, m, s)
}

/// `+41° 16' 09"`
fn format_degrees(degrees: f64, signed: bool) -> String {
    let (d, m, s) = split_sexagesimal(degrees);
    let sign = if degrees < 0.0 {
        "-"
    } else if signed {
        "+"
    } else {
        ""
    };
    format!("{}{:02}\u{b0} {:02}' {:02.0}\"", sign, d, m, s)
}

const KM_PER_AU: f64 = 149_597_870.7;
const AU_PER_LIGHT_YEAR: f64 = 63_241.077;

fn format_distance(au: f64) -> String {
    if au < 0.1 {
        format!("{:.0} km", au * KM_PER_AU)
    } else if au < 10_000.0 {
        format!("{:.2} au", au)
    } else {
        format!("{:.2} ly", au / AU_PER_LIGHT_YEAR)
    }
}

/// An overlay showing a text object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextOverlay {
    pub text_object: TextObject,
}

impl TextOverlay {
    pub fn new(text_object: TextObject) -> Self {
        Self { text_object }
    }
}

impl OverlayPayload for TextOverlay {
    fn type_name(&self) -> &'static str {
        "TerraViewer.TextOverlay"
    }

    fn element_name(&self) -> &'static str {
        "Text"
    }

    fn write_overlay_properties(&self, w: &mut XmlWriter) {
        self.text_object.save_to_xml(w);
    }

    fn initialize_from_xml(&mut self, el: &XmlElement) {
        if let Some(text) = el.child("TextObject") {
            self.text_object = TextObject::from_xml(text);
        }
    }
}
