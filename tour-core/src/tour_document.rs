//! The tour document: metadata, the ordered stop list and the archive
//! entry points

use crate::cabinet::FileCabinet;
use crate::context::EngineContext;
use crate::layers::{Layer, ReferenceFrame};
use crate::loader::{LoadOptions, LoadStatus, LoadSummary};
use crate::place::{ImageSetType, Place};
use crate::tour_stop::{TourStop, TransitionType};
use crate::util;
use crate::xml::{XmlElement, XmlWriter};
use crate::{Error, Result};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Archive name of the tour manifest. Always the first file.
pub const MASTER_FILE_NAME: &str = "Tour.wwtxml";

/// Audience a tour is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum UserLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Educator,
    Professional,
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserLevel::Beginner => "Beginner",
            UserLevel::Intermediate => "Intermediate",
            UserLevel::Advanced => "Advanced",
            UserLevel::Educator => "Educator",
            UserLevel::Professional => "Professional",
        })
    }
}

impl FromStr for UserLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Beginner" => Ok(UserLevel::Beginner),
            "Intermediate" => Ok(UserLevel::Intermediate),
            "Advanced" => Ok(UserLevel::Advanced),
            "Educator" => Ok(UserLevel::Educator),
            "Professional" => Ok(UserLevel::Professional),
            _ => Err(()),
        }
    }
}

/// Tour-level metadata edited through the properties dialog
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TourProperties {
    pub title: String,
    pub description: String,
    pub author: String,
    pub author_email: String,
    pub organization_url: String,
    pub organization_name: String,
    pub keywords: String,
    pub user_level: UserLevel,
    pub classification: String,
    pub taxonomy: String,
    pub time_line_tour: bool,
}

impl Default for TourProperties {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            author: String::new(),
            author_email: String::new(),
            organization_url: String::new(),
            organization_name: String::new(),
            keywords: String::new(),
            user_level: UserLevel::Beginner,
            classification: "Unidentified".to_string(),
            taxonomy: String::new(),
            time_line_tour: false,
        }
    }
}

impl TourProperties {
    fn write_xml_attributes(&self, w: &mut XmlWriter) {
        w.write_attribute_string("Title", &self.title);
        // misspelled twin kept for older readers
        w.write_attribute_string("Descirption", &self.description);
        w.write_attribute_string("Description", &self.description);
        w.write_attribute_string("Author", &self.author);
        w.write_attribute_string("AuthorEmail", &self.author_email);
        w.write_attribute_string("OrganizationUrl", &self.organization_url);
        w.write_attribute_string("OrganizationName", &self.organization_name);
        w.write_attribute_string("Keywords", &self.keywords);
        w.write_attribute("UserLevel", self.user_level);
        w.write_attribute_string("Classification", &self.classification);
        w.write_attribute_string("Taxonomy", &self.taxonomy);
        w.write_attribute_bool("TimeLineTour", self.time_line_tour);
    }

    fn from_xml_attributes(el: &XmlElement) -> Self {
        let d = Self::default();
        let description = el
            .attr("Description")
            .or_else(|| el.attr("Descirption"))
            .unwrap_or_default()
            .to_string();
        Self {
            title: el.attr_string("Title", ""),
            description,
            author: el.attr_string("Author", ""),
            author_email: el.attr_string("AuthorEmail", ""),
            organization_url: el.attr_string("OrganizationUrl", ""),
            organization_name: el.attr_string("OrganizationName", ""),
            keywords: el.attr_string("Keywords", ""),
            user_level: el.attr_or("UserLevel", d.user_level),
            classification: el.attr_string("Classification", &d.classification),
            taxonomy: el.attr_string("Taxonomy", ""),
            time_line_tour: el.attr_bool("TimeLineTour", d.time_line_tour),
        }
    }
}

/// An ordered list of tour stops plus metadata, dirty tracking and the
/// files the tour carries.
///
/// Mutators on the document bump a dirty counter. Stops track their own
/// changes; the document is dirty while either says so. Saving or loading
/// clears both.
#[derive(Debug, Clone)]
pub struct TourDocument {
    id: String,
    properties: TourProperties,
    stops: Vec<TourStop>,
    current_index: Option<usize>,
    dirty_count: u64,
    revision: u64,
    /// (document revision, sum of stop revisions) -> run time
    run_time_cache: Cell<Option<((u64, u64), u64)>>,
    /// Media added or replaced since the archive was opened
    file_cache: HashMap<String, Vec<u8>>,
    cabinet: Option<FileCabinet>,
    url: String,
    status: LoadStatus,
    summary: LoadSummary,
}

impl Default for TourDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TourDocument {
    /// An empty tour with a fresh id
    pub fn new() -> Self {
        Self {
            id: util::new_guid(),
            properties: TourProperties::default(),
            stops: Vec::new(),
            current_index: None,
            dirty_count: 0,
            revision: 0,
            run_time_cache: Cell::new(None),
            file_cache: HashMap::new(),
            cabinet: None,
            url: String::new(),
            status: LoadStatus::Ready,
            summary: LoadSummary::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: LoadStatus) {
        self.status = status;
    }

    /// Stops kept and dropped by the load that built this document
    pub fn load_summary(&self) -> LoadSummary {
        self.summary
    }

    // Dirty tracking

    fn touch(&mut self) {
        self.dirty_count += 1;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Unsaved changes in the document or any of its stops
    pub fn tour_dirty(&self) -> bool {
        self.dirty_count > 0 || self.stops.iter().any(TourStop::is_dirty)
    }

    /// Marks the document dirty, or clears the document and every stop
    pub fn set_tour_dirty(&mut self, dirty: bool) {
        if dirty {
            self.touch();
        } else {
            self.dirty_count = 0;
            for stop in &mut self.stops {
                stop.clear_dirty();
            }
        }
    }

    // Metadata

    pub fn properties(&self) -> &TourProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: TourProperties) {
        self.properties = properties;
        self.touch();
    }

    pub fn title(&self) -> &str {
        &self.properties.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.properties.title = title.to_string();
        self.touch();
    }

    pub fn set_author(&mut self, author: &str) {
        self.properties.author = author.to_string();
        self.touch();
    }

    pub fn set_description(&mut self, description: &str) {
        self.properties.description = description.to_string();
        self.touch();
    }

    // Stops

    pub fn stops(&self) -> &[TourStop] {
        &self.stops
    }

    pub fn tour_stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn stop(&self, index: usize) -> Option<&TourStop> {
        self.stops.get(index)
    }

    /// Mutable access to a stop. Edits made through the stop's setters
    /// mark it dirty on their own.
    pub fn stop_mut(&mut self, index: usize) -> Option<&mut TourStop> {
        self.stops.get_mut(index)
    }

    pub fn stop_by_id(&self, id: &str) -> Option<&TourStop> {
        self.stops.iter().find(|s| s.id() == id)
    }

    /// Position of a stop by id, without side effects
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stops.iter().position(|s| s.id() == id)
    }

    /// The selected stop index, `None` when nothing is selected
    pub fn current_tour_stop_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn set_current_tour_stop_index(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            if i >= self.stops.len() {
                return Err(Error::StopIndexOutOfRange(i));
            }
        }
        self.current_index = index;
        Ok(())
    }

    pub fn current_tour_stop(&self) -> Option<&TourStop> {
        self.current_index.and_then(|i| self.stops.get(i))
    }

    pub fn current_tour_stop_mut(&mut self) -> Option<&mut TourStop> {
        let index = self.current_index?;
        self.stops.get_mut(index)
    }

    /// Appends a stop and selects it
    pub fn add_tour_stop(&mut self, stop: TourStop) {
        self.stops.push(stop);
        self.current_index = Some(self.stops.len() - 1);
        self.touch();
    }

    /// Inserts a stop before the selected one (or appends when nothing is
    /// selected) and selects it
    pub fn insert_tour_stop(&mut self, stop: TourStop) {
        let index = match self.current_index {
            Some(i) => i.min(self.stops.len()),
            None => self.stops.len(),
        };
        self.stops.insert(index, stop);
        self.current_index = Some(index);
        self.touch();
    }

    /// Inserts a stop after the selected one (or appends when nothing is
    /// selected) and selects it
    pub fn insert_after_tour_stop(&mut self, stop: TourStop) {
        let index = match self.current_index {
            Some(i) => (i + 1).min(self.stops.len()),
            None => self.stops.len(),
        };
        self.stops.insert(index, stop);
        self.current_index = Some(index);
        self.touch();
    }

    /// Removes a stop, pulling the selection back inside the list
    pub fn remove_tour_stop(&mut self, index: usize) -> Result<TourStop> {
        if index >= self.stops.len() {
            return Err(Error::StopIndexOutOfRange(index));
        }
        let stop = self.stops.remove(index);
        self.clamp_cursor();
        self.touch();
        Ok(stop)
    }

    /// Swaps in a whole stop list (slide reordering, undo)
    pub fn replace_stops(&mut self, stops: Vec<TourStop>) -> Vec<TourStop> {
        let old = std::mem::replace(&mut self.stops, stops);
        self.clamp_cursor();
        self.touch();
        old
    }

    /// Replaces the stop with the same id, returning the old one
    pub fn replace_stop(&mut self, stop: TourStop) -> Result<TourStop> {
        let index = self
            .index_of(stop.id())
            .ok_or_else(|| Error::InvalidValue {
                attribute: "TourStop.Id".into(),
                value: stop.id().to_string(),
            })?;
        let old = std::mem::replace(&mut self.stops[index], stop);
        self.touch();
        Ok(old)
    }

    /// Moves a stop to a new position, keeping it selected
    pub fn move_tour_stop(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.stops.len() {
            return Err(Error::StopIndexOutOfRange(from));
        }
        if to >= self.stops.len() {
            return Err(Error::StopIndexOutOfRange(to));
        }
        let stop = self.stops.remove(from);
        self.stops.insert(to, stop);
        self.current_index = Some(to);
        self.touch();
        Ok(())
    }

    fn clamp_cursor(&mut self) {
        self.current_index = match (self.current_index, self.stops.len()) {
            (_, 0) => None,
            (Some(i), len) if i >= len => Some(len - 1),
            (other, _) => other,
        };
    }

    /// Looks a stop up by id. An empty id or "Next" instead advances the
    /// selection by one and returns where it was.
    pub fn get_tour_stop_index_by_id(&mut self, id: &str) -> Option<usize> {
        if id.is_empty() || id == "Next" {
            let previous = self.current_index;
            let next = previous.map_or(0, |i| i + 1);
            if next < self.stops.len() {
                self.current_index = Some(next);
            }
            return previous;
        }
        self.index_of(id)
    }

    // Timing

    /// Extra time spent slewing into `next` from `prev`. Only slews between
    /// views of the same kind count; other transitions time themselves.
    pub fn slew_time_ms(prev: &TourStop, next: &TourStop) -> u64 {
        if next.transition() != TransitionType::Slew {
            return 0;
        }
        let from = prev.end_target().unwrap_or(prev.target());
        let to = next.target();
        if view_kind(from) != view_kind(to) {
            return 0;
        }
        if view_kind(to) == ImageSetType::SolarSystem && from.target != to.target {
            return 0;
        }
        let seconds = from.camera_params().slew_time(&to.camera_params());
        (seconds * 1000.0).round() as u64
    }

    /// Milliseconds from the start of the tour to the start of stop `index`
    pub fn elapsed_time_till_tour_stop(&self, index: usize) -> u64 {
        let end = index.min(self.stops.len());
        let mut total = 0;
        for i in 0..end {
            if i > 0 {
                total += Self::slew_time_ms(&self.stops[i - 1], &self.stops[i]);
            }
            total += self.stops[i].duration_ms();
        }
        total
    }

    /// Milliseconds from the last master stop before `index` to the start
    /// of `index`, and that master stop
    pub fn elapsed_time_since_last_master(&self, index: usize) -> (u64, Option<&TourStop>) {
        let end = index.min(self.stops.len());
        let mut total = 0;
        let mut master = None;
        for i in 0..end {
            let stop = &self.stops[i];
            if stop.master_slide() {
                total = 0;
                master = Some(stop);
            } else if i > 0 {
                total += Self::slew_time_ms(&self.stops[i - 1], stop);
            }
            total += stop.duration_ms();
        }
        (total, master)
    }

    /// Total running time in milliseconds, cached until something changes
    pub fn run_time(&self) -> u64 {
        let key = (
            self.revision,
            self.stops.iter().fold(0u64, |acc, s| acc.wrapping_add(s.revision())),
        );
        if let Some((cached_key, value)) = self.run_time_cache.get() {
            if cached_key == key {
                return value;
            }
        }
        let value = self.elapsed_time_till_tour_stop(self.stops.len());
        self.run_time_cache.set(Some((key, value)));
        value
    }

    // Files

    /// Adds or replaces a media file carried by the tour
    pub fn add_cached_file(&mut self, filename: &str, data: Vec<u8>) {
        if self.file_cache.insert(filename.to_string(), data).is_some() {
            log::debug!("replaced cached file {}", filename);
        }
        self.touch();
    }

    /// Bytes of a media file, from local edits first and then the archive
    pub fn get_cached_blob(&self, filename: &str) -> Option<&[u8]> {
        if let Some(data) = self.file_cache.get(filename) {
            return Some(data);
        }
        self.cabinet
            .as_ref()
            .and_then(|fc| fc.get_file_blob(filename))
            .map(|blob| blob.data)
    }

    /// The archive this document was opened from
    pub fn cabinet(&self) -> Option<&FileCabinet> {
        self.cabinet.as_ref()
    }

    /// Releases transient media state held by overlays
    pub fn clean_up(&mut self) {
        for stop in &mut self.stops {
            stop.clean_up();
        }
    }

    // Layers

    /// Ids of layers referenced by any stop that the engine still knows,
    /// in first-use order
    pub fn master_layer_ids(&self, ctx: &EngineContext) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for stop in &self.stops {
            for id in stop.layers().keys() {
                if ctx.layers.contains(id) && !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// Layers to save. A live catalog layer shadows a registered layer of
    /// the same name.
    fn master_layers<'a>(&self, ctx: &'a EngineContext) -> Vec<&'a Layer> {
        self.master_layer_ids(ctx)
            .iter()
            .filter_map(|id| ctx.layers.get(id))
            .map(|layer| ctx.layers.catalog_by_name(&layer.name).unwrap_or(layer))
            .collect()
    }

    // Serialization

    /// The full tour manifest
    pub fn get_tour_xml(&self, ctx: &EngineContext) -> String {
        let mut w = XmlWriter::new();
        w.write_processing_instruction();
        w.write_start_element("Tour");
        w.write_attribute_string("ID", &self.id);
        self.properties.write_xml_attributes(&mut w);
        w.write_attribute("RunTime", self.run_time() as f64 / 1000.0);

        w.write_start_element("TourStops");
        for stop in &self.stops {
            stop.save_to_xml(&mut w);
        }
        w.write_end_element();

        let frames: Vec<&ReferenceFrame> = ctx.frames.user_frames().collect();
        if !frames.is_empty() {
            w.write_start_element("ReferenceFrames");
            for frame in frames {
                frame.save_to_xml(&mut w);
            }
            w.write_end_element();
        }

        let layers = self.master_layers(ctx);
        if !layers.is_empty() {
            w.write_start_element("Layers");
            for layer in layers {
                layer.save_to_xml(&mut w);
            }
            w.write_end_element();
        }

        w.write_end_element();
        w.into_string()
    }

    /// Packs the tour into an archive: manifest first, then thumbnails,
    /// stop media and layer data. Clears the dirty state.
    pub fn save_to_blob(&mut self, ctx: &EngineContext) -> Vec<u8> {
        self.clean_up();
        let xml = self.get_tour_xml(ctx);

        let mut fc = FileCabinet::new();
        fc.add_file(MASTER_FILE_NAME, xml.into_bytes());
        for stop in &self.stops {
            if let Some(thumbnail) = stop.thumbnail() {
                fc.add_file(&stop.thumbnail_filename(), thumbnail.to_vec());
            }
            for file in stop.referenced_files() {
                match self.get_cached_blob(file) {
                    Some(data) => fc.add_file(file, data.to_vec()),
                    None => log::warn!("stop {} references missing file {}", stop.id(), file),
                }
            }
        }
        for layer in self.master_layers(ctx) {
            layer.add_files_to_cabinet(&mut fc);
        }

        self.set_tour_dirty(false);
        let packed = fc.package_files();
        log::info!(
            "saved tour {} with {} stops, {} files, {} bytes",
            self.id,
            self.stops.len(),
            fc.entries().len(),
            packed.len()
        );
        packed
    }

    /// Builds a document from a tour manifest
    pub fn from_xml(
        el: &XmlElement,
        ctx: &mut EngineContext,
        options: &LoadOptions,
    ) -> Result<Self> {
        let mut doc = TourDocument::new();
        doc.read_xml(el, ctx, options)?;
        Ok(doc)
    }

    /// Parses manifest text and builds a document
    pub fn from_xml_str(xml: &str, ctx: &mut EngineContext, options: &LoadOptions) -> Result<Self> {
        Self::from_xml(&XmlElement::parse(xml)?, ctx, options)
    }

    /// Opens a packed archive
    pub fn from_blob(
        data: Vec<u8>,
        ctx: &mut EngineContext,
        options: &LoadOptions,
    ) -> Result<Self> {
        let fc = FileCabinet::from_bytes(data, options.extract_mode)?;
        let mut doc = TourDocument::new();

        let manifest = match fc.master_file().and_then(|m| fc.get_file_blob(&m.filename)) {
            Some(blob) => XmlElement::parse_bytes(blob.data),
            None => Err(Error::FileNotFound(MASTER_FILE_NAME.to_string())),
        };
        match manifest {
            Ok(el) => {
                doc.cabinet = Some(fc);
                doc.read_xml(&el, ctx, options)?;
            }
            Err(e) if options.drop_unparseable_stops => {
                ctx.report_error(format!("tour archive has no readable manifest: {}", e));
                doc.cabinet = Some(fc);
            }
            Err(e) => return Err(e),
        }
        Ok(doc)
    }

    fn read_xml(
        &mut self,
        el: &XmlElement,
        ctx: &mut EngineContext,
        options: &LoadOptions,
    ) -> Result<()> {
        if el.name != "Tour" {
            return Err(Error::MalformedXml(format!("expected <Tour>, found <{}>", el.name)));
        }
        if let Some(id) = el.attr("ID") {
            self.id = id.to_string();
        }
        self.properties = TourProperties::from_xml_attributes(el);

        let mut summary = LoadSummary::default();
        self.stops.clear();
        if let Some(stops) = el.child("TourStops") {
            for stop_el in stops.children_named("TourStop") {
                let stop = if options.drop_unparseable_stops {
                    TourStop::from_xml(stop_el, ctx)
                } else {
                    Some(TourStop::try_from_xml(stop_el)?)
                };
                match stop {
                    Some(mut stop) => {
                        let thumbnail = self.cabinet.as_ref().and_then(|fc| {
                            fc.get_file_blob(&stop.thumbnail_filename()).map(|b| b.data.to_vec())
                        });
                        if thumbnail.is_some() {
                            stop.set_thumbnail(thumbnail);
                        }
                        self.stops.push(stop);
                        summary.stops_loaded += 1;
                    }
                    None => summary.stops_dropped += 1,
                }
            }
        }

        if let Some(frames) = el.child("ReferenceFrames") {
            for frame_el in frames.children_named("ReferenceFrame") {
                match ReferenceFrame::from_xml(frame_el) {
                    Ok(frame) => ctx.frames.register(frame),
                    Err(e) => ctx.report_error(format!("failed to load reference frame: {}", e)),
                }
            }
        }

        if let Some(layers) = el.child("Layers") {
            for layer_el in layers.children_named("Layer") {
                let mut layer = match Layer::from_xml(layer_el) {
                    Ok(layer) => layer,
                    Err(e) => {
                        ctx.report_error(format!("failed to load layer: {}", e));
                        continue;
                    }
                };
                if let Some(fc) = &self.cabinet {
                    layer.load_data(fc);
                }
                if layer.is_catalog_hips() {
                    ctx.layers.register_catalog_hips(layer);
                } else {
                    ctx.layers.add(layer);
                }
            }
        }

        self.current_index = if self.stops.is_empty() { None } else { Some(0) };
        self.summary = summary;
        self.status = LoadStatus::Ready;
        self.set_tour_dirty(false);
        if summary.is_complete() {
            log::info!("loaded tour {} with {} stops", self.id, summary.stops_loaded);
        } else {
            log::warn!(
                "loaded tour {} with {} stops, dropped {}",
                self.id,
                summary.stops_loaded,
                summary.stops_dropped
            );
        }
        Ok(())
    }
}

/// What a place shows, for deciding whether a slew between two stops is
/// meaningful
fn view_kind(place: &Place) -> ImageSetType {
    place.background_type().unwrap_or(place.data_set_type)
}
