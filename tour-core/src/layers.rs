//! Layers and reference frames a tour can carry with it

use crate::cabinet::FileCabinet;
use crate::xml::{XmlElement, XmlWriter};
use crate::Color;

const LAYER_ATTRIBUTES: &[&str] = &[
    "Id",
    "Name",
    "Type",
    "ReferenceFrame",
    "Opacity",
    "Enabled",
    "Color",
];

/// A persisted layer: the fields every layer type shares, plus whatever
/// type-specific attributes and child elements it was saved with.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: String,
    pub name: String,
    /// Fully-qualified layer type, e.g. `TerraViewer.SpreadSheetLayer`
    pub layer_type: String,
    pub reference_frame: String,
    pub opacity: f64,
    pub enabled: bool,
    pub color: Color,
    pub extra_attributes: Vec<(String, String)>,
    pub extra_children: Vec<XmlElement>,
    /// Data files stored under `{id}\{name}` in the archive
    pub data_files: Vec<(String, Vec<u8>)>,
}

impl Layer {
    /// Creates an enabled, opaque layer with a fresh id
    pub fn new(name: &str, layer_type: &str, reference_frame: &str) -> Self {
        Self {
            id: crate::util::new_guid(),
            name: name.to_string(),
            layer_type: layer_type.to_string(),
            reference_frame: reference_frame.to_string(),
            opacity: 1.0,
            enabled: true,
            color: Color::WHITE,
            extra_attributes: Vec::new(),
            extra_children: Vec::new(),
            data_files: Vec::new(),
        }
    }

    /// True for imageset layers wrapping a HEALPix catalog (a HiPS
    /// progressive catalog served as `.tsv` tiles). These register into the
    /// catalog registry rather than the generic layer list.
    pub fn is_catalog_hips(&self) -> bool {
        self.layer_type.ends_with("ImageSetLayer")
            && self.extra_children.iter().any(|c| {
                c.name == "ImageSet"
                    && c.attr("Projection").is_some_and(|p| p.eq_ignore_ascii_case("healpix"))
                    && c.attr("FileType").is_some_and(|f| f.eq_ignore_ascii_case(".tsv"))
            })
    }

    pub fn save_to_xml(&self, w: &mut XmlWriter) {
        w.write_start_element("Layer");
        w.write_attribute_string("Id", &self.id);
        w.write_attribute_string("Name", &self.name);
        w.write_attribute_string("Type", &self.layer_type);
        w.write_attribute_string("ReferenceFrame", &self.reference_frame);
        w.write_attribute("Opacity", self.opacity);
        w.write_attribute_bool("Enabled", self.enabled);
        w.write_attribute("Color", self.color);
        for (k, v) in &self.extra_attributes {
            w.write_attribute_string(k, v);
        }
        for child in &self.extra_children {
            child.write_to(w);
        }
        w.write_end_element();
    }

    /// Reads a `Layer` element. The id is the only required attribute.
    pub fn from_xml(el: &XmlElement) -> crate::Result<Self> {
        let id = el.require_attr("Id")?.to_string();
        Ok(Self {
            id,
            name: el.attr_string("Name", ""),
            layer_type: el.attr_string("Type", ""),
            reference_frame: el.attr_string("ReferenceFrame", "Sky"),
            opacity: el.attr_or("Opacity", 1.0),
            enabled: el.attr_bool("Enabled", true),
            color: Color::parse_or(el.attr("Color"), Color::WHITE),
            extra_attributes: el
                .attributes
                .iter()
                .filter(|(k, _)| !LAYER_ATTRIBUTES.contains(&k.as_str()))
                .cloned()
                .collect(),
            extra_children: el.children.clone(),
            data_files: Vec::new(),
        })
    }

    fn file_prefix(&self) -> String {
        format!("{}\\", self.id)
    }

    /// Adds this layer's data files to an archive being packed
    pub fn add_files_to_cabinet(&self, fc: &mut FileCabinet) {
        let prefix = self.file_prefix();
        for (name, data) in &self.data_files {
            fc.add_file(&format!("{}{}", prefix, name), data.clone());
        }
    }

    /// Picks up this layer's data files from a loaded archive
    pub fn load_data(&mut self, fc: &FileCabinet) {
        let prefix = self.file_prefix();
        let names: Vec<String> = fc
            .entries()
            .iter()
            .filter(|e| e.filename.starts_with(&prefix))
            .map(|e| e.filename.clone())
            .collect();
        for name in names {
            if let Some(blob) = fc.get_file_blob(&name) {
                let short = name[prefix.len()..].to_string();
                self.data_files.push((short, blob.data.to_vec()));
            }
        }
    }
}

/// The engine's live layers
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
    catalog_hips: Vec<Layer>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer unless one with the same id is already registered.
    /// Returns whether it was added.
    pub fn add(&mut self, layer: Layer) -> bool {
        if self.contains(&layer.id) {
            log::debug!("layer {} already registered", layer.id);
            return false;
        }
        self.layers.push(layer);
        true
    }

    /// Registers a catalog HiPS layer, replacing any with the same name
    pub fn register_catalog_hips(&mut self, layer: Layer) {
        self.catalog_hips.retain(|l| l.name != layer.name);
        self.catalog_hips.push(layer);
    }

    /// Whether a layer id is live in either registry
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .chain(self.catalog_hips.iter())
            .find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.layers
            .iter_mut()
            .chain(self.catalog_hips.iter_mut())
            .find(|l| l.id == id)
    }

    /// Live catalog HiPS layer with the given name
    pub fn catalog_by_name(&self, name: &str) -> Option<&Layer> {
        self.catalog_hips.iter().find(|l| l.name == name)
    }

    pub fn remove(&mut self, id: &str) -> Option<Layer> {
        if let Some(pos) = self.layers.iter().position(|l| l.id == id) {
            return Some(self.layers.remove(pos));
        }
        let pos = self.catalog_hips.iter().position(|l| l.id == id)?;
        Some(self.catalog_hips.remove(pos))
    }

    /// Generic layers in registration order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn catalog_layers(&self) -> &[Layer] {
        &self.catalog_hips
    }
}

/// How a reference frame moves relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceFrameType {
    #[default]
    FixedSherical,
    Orbital,
    Trajectory,
    Synodic,
}

impl std::fmt::Display for ReferenceFrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceFrameType::FixedSherical => "FixedSherical",
            ReferenceFrameType::Orbital => "Orbital",
            ReferenceFrameType::Trajectory => "Trajectory",
            ReferenceFrameType::Synodic => "Synodic",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ReferenceFrameType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FixedSherical" => Ok(ReferenceFrameType::FixedSherical),
            "Orbital" => Ok(ReferenceFrameType::Orbital),
            "Trajectory" => Ok(ReferenceFrameType::Trajectory),
            "Synodic" => Ok(ReferenceFrameType::Synodic),
            _ => Err(()),
        }
    }
}

const FRAME_ATTRIBUTES: &[&str] = &[
    "Name",
    "Parent",
    "ReferenceFrameType",
    "MeanRadius",
    "Oblateness",
    "Lat",
    "Lng",
    "Altitude",
    "Scale",
];

/// A named coordinate frame layers can be attached to
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    pub name: String,
    pub parent: String,
    pub frame_type: ReferenceFrameType,
    pub mean_radius: f64,
    pub oblateness: f64,
    pub lat: f64,
    pub lng: f64,
    pub altitude: f64,
    pub scale: f64,
    /// Frames the engine creates for its own bookkeeping
    pub system_generated: bool,
    pub extra_attributes: Vec<(String, String)>,
}

impl ReferenceFrame {
    pub fn new(name: &str, parent: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.to_string(),
            frame_type: ReferenceFrameType::FixedSherical,
            mean_radius: 6_371_000.0,
            oblateness: 0.0,
            lat: 0.0,
            lng: 0.0,
            altitude: 0.0,
            scale: 1.0,
            system_generated: false,
            extra_attributes: Vec::new(),
        }
    }

    fn builtin(name: &str, parent: &str) -> Self {
        Self {
            system_generated: true,
            ..Self::new(name, parent)
        }
    }

    pub fn save_to_xml(&self, w: &mut XmlWriter) {
        w.write_start_element("ReferenceFrame");
        w.write_attribute_string("Name", &self.name);
        w.write_attribute_string("Parent", &self.parent);
        w.write_attribute("ReferenceFrameType", self.frame_type);
        w.write_attribute("MeanRadius", self.mean_radius);
        w.write_attribute("Oblateness", self.oblateness);
        w.write_attribute("Lat", self.lat);
        w.write_attribute("Lng", self.lng);
        w.write_attribute("Altitude", self.altitude);
        w.write_attribute("Scale", self.scale);
        for (k, v) in &self.extra_attributes {
            w.write_attribute_string(k, v);
        }
        w.write_end_element();
    }

    pub fn from_xml(el: &XmlElement) -> crate::Result<Self> {
        let name = el.require_attr("Name")?;
        let d = Self::new(name, "Sky");
        Ok(Self {
            name: name.to_string(),
            parent: el.attr_string("Parent", &d.parent),
            frame_type: el.attr_or("ReferenceFrameType", d.frame_type),
            mean_radius: el.attr_or("MeanRadius", d.mean_radius),
            oblateness: el.attr_or("Oblateness", d.oblateness),
            lat: el.attr_or("Lat", d.lat),
            lng: el.attr_or("Lng", d.lng),
            altitude: el.attr_or("Altitude", d.altitude),
            scale: el.attr_or("Scale", d.scale),
            system_generated: false,
            extra_attributes: el
                .attributes
                .iter()
                .filter(|(k, _)| !FRAME_ATTRIBUTES.contains(&k.as_str()))
                .cloned()
                .collect(),
        })
    }
}

const BUILTIN_FRAMES: &[(&str, &str)] = &[
    ("Sky", ""),
    ("Sun", ""),
    ("Mercury", "Sun"),
    ("Venus", "Sun"),
    ("Earth", "Sun"),
    ("Moon", "Earth"),
    ("Mars", "Sun"),
    ("Jupiter", "Sun"),
    ("Saturn", "Sun"),
    ("Uranus", "Sun"),
    ("Neptune", "Sun"),
    ("Pluto", "Sun"),
];

const MAX_FRAME_DEPTH: usize = 64;

/// Named reference frames, seeded with the sky and solar system bodies
#[derive(Debug, Clone)]
pub struct ReferenceFrameRegistry {
    frames: Vec<ReferenceFrame>,
}

impl Default for ReferenceFrameRegistry {
    fn default() -> Self {
        Self {
            frames: BUILTIN_FRAMES
                .iter()
                .map(|(name, parent)| ReferenceFrame::builtin(name, parent))
                .collect(),
        }
    }
}

impl ReferenceFrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a frame by name
    pub fn register(&mut self, frame: ReferenceFrame) {
        match self.frames.iter_mut().find(|f| f.name == frame.name) {
            Some(existing) => *existing = frame,
            None => self.frames.push(frame),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceFrame> {
        self.frames.iter().find(|f| f.name == name)
    }

    pub fn frames(&self) -> &[ReferenceFrame] {
        &self.frames
    }

    /// Whether the frame's ancestry ends at the sky or the sun
    pub fn is_rooted(&self, frame: &ReferenceFrame) -> bool {
        let mut current = frame;
        for _ in 0..MAX_FRAME_DEPTH {
            if current.name == "Sky" || current.name == "Sun" {
                return true;
            }
            match self.get(&current.parent) {
                Some(parent) if parent.name != current.name => current = parent,
                _ => return false,
            }
        }
        false
    }

    /// Frames that belong in a saved tour: user-created and attached to
    /// the sky or solar system
    pub fn user_frames(&self) -> impl Iterator<Item = &ReferenceFrame> {
        self.frames
            .iter()
            .filter(|f| !f.system_generated && self.is_rooted(f))
    }
}
