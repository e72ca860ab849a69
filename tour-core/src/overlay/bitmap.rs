//! Image overlays

use super::OverlayPayload;
use crate::xml::{XmlElement, XmlWriter};

/// An image stored in the tour archive
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitmapOverlay {
    pub filename: String,
}

impl BitmapOverlay {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
        }
    }
}

impl OverlayPayload for BitmapOverlay {
    fn type_name(&self) -> &'static str {
        "TerraViewer.BitmapOverlay"
    }

    fn element_name(&self) -> &'static str {
        "Bitmap"
    }

    fn write_overlay_properties(&self, w: &mut XmlWriter) {
        w.write_attribute_string("Filename", &self.filename);
    }

    fn initialize_from_xml(&mut self, el: &XmlElement) {
        self.filename = el.attr_string("Filename", "");
    }

    fn files(&self) -> Vec<&str> {
        if self.filename.is_empty() {
            Vec::new()
        } else {
            vec![self.filename.as_str()]
        }
    }
}
