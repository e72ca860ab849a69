//! Vector shape overlays and their outlines

use super::OverlayPayload;
use crate::xml::{XmlElement, XmlWriter};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::str::FromStr;

const ELLIPSE_SEGMENTS: usize = 72;
const STAR_POINTS: usize = 5;
const STAR_INNER_RATIO: f64 = 0.382;
const DONUT_INNER_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeType {
    #[default]
    Circle,
    Rectangle,
    Star,
    Donut,
    Arrow,
    Line,
    OpenRectangle,
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShapeType::Circle => "Circle",
            ShapeType::Rectangle => "Rectagle",
            ShapeType::Star => "Star",
            ShapeType::Donut => "Donut",
            ShapeType::Arrow => "Arrow",
            ShapeType::Line => "Line",
            ShapeType::OpenRectangle => "OpenRectagle",
        })
    }
}

impl FromStr for ShapeType {
    type Err = ();

    // The desktop client spells "Rectagle"; both spellings are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Circle" => Ok(ShapeType::Circle),
            "Rectagle" | "Rectangle" => Ok(ShapeType::Rectangle),
            "Star" => Ok(ShapeType::Star),
            "Donut" => Ok(ShapeType::Donut),
            "Arrow" => Ok(ShapeType::Arrow),
            "Line" => Ok(ShapeType::Line),
            "OpenRectagle" | "OpenRectangle" => Ok(ShapeType::OpenRectangle),
            _ => Err(()),
        }
    }
}

/// A filled or outlined shape
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeOverlay {
    pub shape_type: ShapeType,
}

/// A point relative to the overlay's center, before rotation
pub type Point = (f64, f64);

fn ellipse(rx: f64, ry: f64) -> Vec<Point> {
    (0..ELLIPSE_SEGMENTS)
        .map(|i| {
            let a = TAU * i as f64 / ELLIPSE_SEGMENTS as f64;
            (rx * a.cos(), ry * a.sin())
        })
        .collect()
}

impl ShapeOverlay {
    pub fn new(shape_type: ShapeType) -> Self {
        Self { shape_type }
    }

    /// Outline contours for a shape of the given size, centered on the
    /// origin. Donuts produce an outer and an inner contour; lines and open
    /// rectangles are open paths.
    pub fn contours(&self, width: f64, height: f64) -> Vec<Vec<Point>> {
        let (hw, hh) = (width / 2.0, height / 2.0);
        match self.shape_type {
            ShapeType::Circle => vec![ellipse(hw, hh)],
            ShapeType::Rectangle | ShapeType::OpenRectangle => {
                vec![vec![(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]]
            }
            ShapeType::Star => {
                let points = (0..STAR_POINTS * 2)
                    .map(|i| {
                        let a = -FRAC_PI_2 + TAU * i as f64 / (STAR_POINTS * 2) as f64;
                        let r = if i % 2 == 0 { 1.0 } else { STAR_INNER_RATIO };
                        (hw * r * a.cos(), hh * r * a.sin())
                    })
                    .collect();
                vec![points]
            }
            ShapeType::Donut => vec![
                ellipse(hw, hh),
                ellipse(hw * DONUT_INNER_RATIO, hh * DONUT_INNER_RATIO),
            ],
            ShapeType::Arrow => vec![vec![
                (-hw, -hh / 2.0),
                (0.0, -hh / 2.0),
                (0.0, -hh),
                (hw, 0.0),
                (0.0, hh),
                (0.0, hh / 2.0),
                (-hw, hh / 2.0),
            ]],
            ShapeType::Line => vec![vec![(-hw, 0.0), (hw, 0.0)]],
        }
    }

    /// Whether the contours are closed polygons
    pub fn is_closed(&self) -> bool {
        !matches!(self.shape_type, ShapeType::Line | ShapeType::OpenRectangle)
    }
}

impl OverlayPayload for ShapeOverlay {
    fn type_name(&self) -> &'static str {
        "TerraViewer.ShapeOverlay"
    }

    fn element_name(&self) -> &'static str {
        "Shape"
    }

    fn write_overlay_properties(&self, w: &mut XmlWriter) {
        w.write_attribute("ShapeType", self.shape_type);
    }

    fn initialize_from_xml(&mut self, el: &XmlElement) {
        self.shape_type = el.attr_or("ShapeType", ShapeType::Circle);
    }
}
