//! Camera targets ("places") and the camera math tours need from them

use crate::xml::{XmlElement, XmlWriter};
use std::fmt;
use std::str::FromStr;

/// The kind of data a view is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImageSetType {
    Earth,
    Planet,
    #[default]
    Sky,
    Panorama,
    SolarSystem,
    Sandbox,
}

impl fmt::Display for ImageSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageSetType::Earth => "Earth",
            ImageSetType::Planet => "Planet",
            ImageSetType::Sky => "Sky",
            ImageSetType::Panorama => "Panorama",
            ImageSetType::SolarSystem => "SolarSystem",
            ImageSetType::Sandbox => "Sandbox",
        };
        f.write_str(s)
    }
}

impl FromStr for ImageSetType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earth" => Ok(ImageSetType::Earth),
            "planet" => Ok(ImageSetType::Planet),
            "sky" => Ok(ImageSetType::Sky),
            "panorama" => Ok(ImageSetType::Panorama),
            "solarsystem" => Ok(ImageSetType::SolarSystem),
            "sandbox" => Ok(ImageSetType::Sandbox),
            _ => Err(()),
        }
    }
}

/// Reference to a background imageset by name and url
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageSetRef {
    pub name: String,
    pub url: String,
    pub data_set_type: ImageSetType,
    pub projection: String,
    pub file_type: String,
}

impl ImageSetRef {
    fn write(&self, w: &mut XmlWriter) {
        w.write_start_element("ImageSet");
        w.write_attribute_string("Name", &self.name);
        w.write_attribute_string("Url", &self.url);
        w.write_attribute("DataSetType", self.data_set_type);
        w.write_attribute_string("Projection", &self.projection);
        w.write_attribute_string("FileType", &self.file_type);
        w.write_end_element();
    }

    /// Reads an `ImageSet` element
    pub fn from_xml(el: &XmlElement) -> Self {
        Self {
            name: el.attr_string("Name", ""),
            url: el.attr_string("Url", ""),
            data_set_type: el.attr_or("DataSetType", ImageSetType::Sky),
            projection: el.attr_string("Projection", ""),
            file_type: el.attr_string("FileType", ""),
        }
    }
}

/// Camera position in the engine's terms
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraParameters {
    /// Latitude, or declination for sky views, in degrees
    pub lat: f64,
    /// Longitude, or right ascension in degrees for sky views
    pub lng: f64,
    pub zoom: f64,
    pub rotation: f64,
    pub angle: f64,
    pub opacity: f64,
}

const MAX_SLEW_ZOOM: f64 = 360.0;
const SECONDS_PER_ZOOM_DOUBLING: f64 = 0.75;
const SECONDS_PER_HALF_TURN: f64 = 2.0;

impl CameraParameters {
    /// Interpolates between two cameras. Zoom moves geometrically so that
    /// equal steps of `t` feel like equal magnification changes.
    pub fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        let zoom = if from.zoom > 0.0 && to.zoom > 0.0 {
            from.zoom * (to.zoom / from.zoom).powf(t)
        } else {
            lerp(from.zoom, to.zoom)
        };
        Self {
            lat: lerp(from.lat, to.lat),
            lng: lerp(from.lng, to.lng),
            zoom,
            rotation: lerp(from.rotation, to.rotation),
            angle: lerp(from.angle, to.angle),
            opacity: lerp(from.opacity, to.opacity),
        }
    }

    /// Great-circle distance to another camera position, in degrees
    pub fn angular_distance(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
    }

    /// Estimated seconds for a slew from `self` to `to`: zoom out far enough
    /// to see both ends, travel, zoom back in.
    pub fn slew_time(&self, to: &Self) -> f64 {
        let distance = self.angular_distance(to);
        if distance < 1e-9 && (self.zoom - to.zoom).abs() < 1e-9 {
            return 0.0;
        }
        let from_zoom = self.zoom.max(f64::EPSILON);
        let to_zoom = to.zoom.max(f64::EPSILON);
        let mid = from_zoom.max(to_zoom).max(distance * 3.0).min(MAX_SLEW_ZOOM);
        let up = (mid / from_zoom).log2().max(0.0) * SECONDS_PER_ZOOM_DOUBLING;
        let down = (mid / to_zoom).log2().max(0.0) * SECONDS_PER_ZOOM_DOUBLING;
        let travel = distance / 180.0 * SECONDS_PER_HALF_TURN;
        up + travel + down
    }
}

/// A camera target: where the view points and what it shows
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub data_set_type: ImageSetType,
    /// Right ascension in hours
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    pub lat: f64,
    pub lng: f64,
    pub constellation: String,
    pub classification: String,
    pub magnitude: f64,
    pub distance: f64,
    pub zoom_level: f64,
    pub rotation: f64,
    pub angle: f64,
    pub opacity: f64,
    /// Solar system body the view is locked to, "Undefined" otherwise
    pub target: String,
    pub background: Option<ImageSetRef>,
}

impl Default for Place {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_set_type: ImageSetType::Sky,
            ra: 0.0,
            dec: 0.0,
            lat: 0.0,
            lng: 0.0,
            constellation: String::new(),
            classification: "Unidentified".to_string(),
            magnitude: 0.0,
            distance: 0.0,
            zoom_level: 360.0,
            rotation: 0.0,
            angle: 0.0,
            opacity: 100.0,
            target: "Undefined".to_string(),
            background: None,
        }
    }
}

impl Place {
    /// A sky place at the given coordinates
    pub fn sky(name: &str, ra: f64, dec: f64, zoom_level: f64) -> Self {
        Self {
            name: name.to_string(),
            ra,
            dec,
            zoom_level,
            ..Self::default()
        }
    }

    /// Camera parameters for this place
    pub fn camera_params(&self) -> CameraParameters {
        let (lat, lng) = match self.data_set_type {
            ImageSetType::Sky | ImageSetType::Panorama => (self.dec, self.ra * 15.0),
            _ => (self.lat, self.lng),
        };
        CameraParameters {
            lat,
            lng,
            zoom: self.zoom_level,
            rotation: self.rotation,
            angle: self.angle,
            opacity: self.opacity,
        }
    }

    /// The data-set type of the background imageset, if any
    pub fn background_type(&self) -> Option<ImageSetType> {
        self.background.as_ref().map(|b| b.data_set_type)
    }

    /// Writes this place as an element with the given name
    /// ("Place" for start targets, "EndTarget" for end targets)
    pub fn save_to_xml(&self, w: &mut XmlWriter, element_name: &str) {
        w.write_start_element(element_name);
        w.write_attribute_string("Name", &self.name);
        w.write_attribute("DataSetType", self.data_set_type);
        w.write_attribute("RA", self.ra);
        w.write_attribute("Dec", self.dec);
        w.write_attribute("Lat", self.lat);
        w.write_attribute("Lng", self.lng);
        w.write_attribute_string("Constellation", &self.constellation);
        w.write_attribute_string("Classification", &self.classification);
        w.write_attribute("Magnitude", self.magnitude);
        w.write_attribute("Distance", self.distance);
        w.write_attribute("ZoomLevel", self.zoom_level);
        w.write_attribute("Rotation", self.rotation);
        w.write_attribute("Angle", self.angle);
        w.write_attribute("Opacity", self.opacity);
        w.write_attribute_string("Target", &self.target);
        if let Some(background) = &self.background {
            w.write_start_element("BackgroundImageSet");
            background.write(w);
            w.write_end_element();
        }
        w.write_end_element();
    }

    /// Reads a place element; every attribute is optional
    pub fn from_xml(el: &XmlElement) -> Self {
        let d = Self::default();
        Self {
            name: el.attr_string("Name", ""),
            data_set_type: el.attr_or("DataSetType", d.data_set_type),
            ra: el.attr_or("RA", d.ra),
            dec: el.attr_or("Dec", d.dec),
            lat: el.attr_or("Lat", d.lat),
            lng: el.attr_or("Lng", d.lng),
            constellation: el.attr_string("Constellation", ""),
            classification: el.attr_string("Classification", &d.classification),
            magnitude: el.attr_or("Magnitude", d.magnitude),
            distance: el.attr_or("Distance", d.distance),
            zoom_level: el.attr_or("ZoomLevel", d.zoom_level),
            rotation: el.attr_or("Rotation", d.rotation),
            angle: el.attr_or("Angle", d.angle),
            opacity: el.attr_or("Opacity", d.opacity),
            target: el.attr_string("Target", &d.target),
            background: el
                .child("BackgroundImageSet")
                .and_then(|b| b.child("ImageSet"))
                .map(ImageSetRef::from_xml),
        }
    }
}
