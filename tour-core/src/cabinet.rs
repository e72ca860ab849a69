//! File cabinet archive: an XML manifest followed by the raw file blobs
//!
//! Layout:
//!
//! ```text
//! [0, N)            manifest XML with HeaderSize="0xHHHHHHHH" where HHHHHHHH = N
//! [N, N+s1)         first file
//! [N+s1, N+s1+s2)   second file
//! ...
//! ```
//!
//! Offsets are never trusted from the manifest on read; they are recomputed
//! as a running sum of sizes starting at the header size.

use crate::xml::{XmlElement, XmlWriter};
use crate::{Error, Result};
use std::io::Read;

/// Stand-in for the header size while the manifest is serialized. Same
/// width as the real `0x%08X` value so substituting it does not change
/// the manifest length.
const HEADER_SIZE_TOKEN: &str = "0x0BADFOOD";

/// How much of the archive is scanned for the header size token
const HEADER_PROBE_LEN: usize = 255;

/// What to do when the manifest or file list is damaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExtractMode {
    /// Keep whatever was read before the damage and carry on
    #[default]
    Lenient,
    /// Fail with a typed error
    Strict,
}

/// One file stored in the cabinet
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileEntry {
    pub filename: String,
    pub size: usize,
    /// Byte offset within the cabinet's data
    pub offset: usize,
}

impl FileEntry {
    pub fn new(filename: &str, size: usize, offset: usize) -> Self {
        Self {
            filename: filename.to_string(),
            size,
            offset,
        }
    }

    /// One past the last byte, or `None` if that overflows
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.size)
    }
}

/// A slice of the cabinet tagged with a MIME type guessed from its name
#[derive(Debug, Clone, Copy)]
pub struct FileBlob<'a> {
    pub filename: &'a str,
    pub data: &'a [u8],
    pub mime_type: Option<&'static str>,
}

impl FileBlob<'_> {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// MIME type for the extensions tours use
pub fn mime_type_for(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "mp3" => Some("audio/mpeg"),
        "txt" => Some("text/plain"),
        "fits" => Some("application/octet-stream"),
        _ => None,
    }
}

/// An archive, either being built for packing or loaded from bytes
#[derive(Debug, Clone, Default)]
pub struct FileCabinet {
    entries: Vec<FileEntry>,
    /// For loaded cabinets the whole archive, for new ones just the file data
    data: Vec<u8>,
    /// Where file data starts within `data`
    header_size: usize,
}

impl FileCabinet {
    /// Creates an empty cabinet for packing
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a file. Entries keep insertion order, so the first file
    /// added is the master file readers look for.
    pub fn add_file(&mut self, filename: &str, data: Vec<u8>) {
        if self.entries.iter().any(|e| e.filename == filename) {
            log::debug!("cabinet already holds {}, skipping duplicate", filename);
            return;
        }
        let offset = self.data.len();
        self.entries.push(FileEntry::new(filename, data.len(), offset));
        self.data.extend_from_slice(&data);
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// The first entry, which by convention holds the document
    pub fn master_file(&self) -> Option<&FileEntry> {
        self.entries.first()
    }

    /// Byte offset where file data begins
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn clear_file_list(&mut self) {
        self.entries.clear();
    }

    fn manifest_xml(&self) -> String {
        let mut w = XmlWriter::new();
        w.write_processing_instruction();
        w.write_start_element("FileCabinet");
        w.write_attribute_string("HeaderSize", HEADER_SIZE_TOKEN);
        w.write_start_element("Files");
        let mut relative = 0usize;
        for entry in &self.entries {
            w.write_start_element("File");
            w.write_attribute_string("Name", &entry.filename);
            w.write_attribute("Size", entry.size);
            w.write_attribute("Offset", relative);
            w.write_end_element();
            relative += entry.size;
        }
        w.write_end_element();
        w.write_end_element();
        w.into_string()
    }

    /// Serializes the manifest, patches in its own length and appends the
    /// file blobs in entry order.
    pub fn package_files(&self) -> Vec<u8> {
        let manifest = self.manifest_xml();
        let header_size = manifest.len();
        // HeaderSize is the first attribute written, so the first
        // occurrence is always ours even if a file name contains the token
        let manifest =
            manifest.replacen(HEADER_SIZE_TOKEN, &format!("0x{:08X}", header_size), 1);
        debug_assert_eq!(manifest.len(), header_size);

        let payload: usize = self.entries.iter().map(|e| e.size).sum();
        let mut out = Vec::with_capacity(header_size + payload);
        out.extend_from_slice(manifest.as_bytes());
        for entry in &self.entries {
            match entry.end().and_then(|end| self.data.get(entry.offset..end)) {
                Some(bytes) => out.extend_from_slice(bytes),
                None => log::error!("cabinet entry {} points outside its data", entry.filename),
            }
        }
        log::debug!(
            "packed {} files, header {} bytes, total {} bytes",
            self.entries.len(),
            header_size,
            out.len()
        );
        out
    }

    /// Rebuilds the entry list from a parsed manifest, computing offsets as
    /// a running sum from `header_size`.
    ///
    /// In lenient mode a bad `File` element stops extraction and the entries
    /// read so far are kept.
    pub fn extract(
        &mut self,
        manifest: &XmlElement,
        header_size: usize,
        mode: ExtractMode,
    ) -> Result<()> {
        self.entries.clear();
        self.header_size = header_size;
        match self.extract_entries(manifest, header_size) {
            Ok(()) => Ok(()),
            Err(e) if mode == ExtractMode::Lenient => {
                log::warn!(
                    "archive file list damaged after {} entries: {}",
                    self.entries.len(),
                    e
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn extract_entries(&mut self, manifest: &XmlElement, header_size: usize) -> Result<()> {
        let files = manifest.child("Files").ok_or(Error::MissingElement("Files"))?;
        let mut offset = header_size;
        for file in files.children_named("File") {
            let name = file.require_attr("Name")?;
            let size: usize = file
                .parse_attr("Size")?
                .ok_or_else(|| Error::MissingAttribute {
                    element: "File".into(),
                    attribute: "Size",
                })?;
            let end = offset
                .checked_add(size)
                .ok_or_else(|| Error::SizeOverflow(name.to_string()))?;
            if end > self.data.len() {
                return Err(Error::Truncated {
                    filename: name.to_string(),
                    end,
                    len: self.data.len(),
                });
            }
            self.entries.push(FileEntry::new(name, size, offset));
            offset = end;
        }
        Ok(())
    }

    /// Loads a packed archive: probes the first bytes for the header size
    /// token, parses exactly that many bytes as the manifest, then
    /// extracts the entries.
    pub fn from_bytes(data: Vec<u8>, mode: ExtractMode) -> Result<Self> {
        let mut fc = FileCabinet {
            entries: Vec::new(),
            data,
            header_size: 0,
        };

        let header_size = match find_header_size(&fc.data) {
            Some(size) if size <= fc.data.len() => size,
            Some(size) => {
                let err = Error::HeaderOutOfRange {
                    header_size: size,
                    len: fc.data.len(),
                };
                return fc.degrade(mode, err);
            }
            None => return fc.degrade(mode, Error::MissingHeaderSize),
        };

        let manifest = match XmlElement::parse_bytes(&fc.data[..header_size]) {
            Ok(m) => m,
            Err(e) => return fc.degrade(mode, e),
        };
        fc.extract(&manifest, header_size, mode)?;
        log::info!(
            "opened cabinet: {} files, header {} bytes",
            fc.entries.len(),
            header_size
        );
        Ok(fc)
    }

    /// Reads an archive to the end and loads it
    pub fn from_reader<R: Read>(mut reader: R, mode: ExtractMode) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data, mode)
    }

    fn degrade(self, mode: ExtractMode, err: Error) -> Result<Self> {
        match mode {
            ExtractMode::Strict => Err(err),
            ExtractMode::Lenient => {
                log::warn!("treating archive as empty: {}", err);
                Ok(self)
            }
        }
    }

    /// The bytes of a stored file
    pub fn get_file_blob(&self, filename: &str) -> Option<FileBlob<'_>> {
        let entry = self.entries.iter().find(|e| e.filename == filename)?;
        let data = self.data.get(entry.offset..entry.end()?)?;
        Some(FileBlob {
            filename: &entry.filename,
            data,
            mime_type: mime_type_for(&entry.filename),
        })
    }
}

/// Finds the first `0x` followed by eight hex digits in the probe window
fn find_header_size(data: &[u8]) -> Option<usize> {
    let probe = &data[..data.len().min(HEADER_PROBE_LEN)];
    probe.windows(10).find_map(|w| {
        if &w[..2] != b"0x" {
            return None;
        }
        let hex = std::str::from_utf8(&w[2..]).ok()?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        usize::from_str_radix(hex, 16).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileCabinet {
        let mut fc = FileCabinet::new();
        fc.add_file("Tour.wwtxml", b"<Tour/>".to_vec());
        fc.add_file("a.png", vec![7u8; 37]);
        fc.add_file("b.txt", vec![b'x'; 1024]);
        fc
    }

    #[test]
    fn test_header_size_matches_manifest_length() {
        let packed = sample().package_files();
        let n = find_header_size(&packed).unwrap();
        let manifest = std::str::from_utf8(&packed[..n]).unwrap();
        assert!(manifest.trim_end().ends_with("</FileCabinet>"));
        assert!(manifest.contains(&format!("HeaderSize=\"0x{:08X}\"", n)));
        assert_eq!(packed.len(), n + 7 + 37 + 1024);
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let fc = FileCabinet::from_bytes(sample().package_files(), ExtractMode::Strict).unwrap();
        let entries = fc.entries();
        assert_eq!(entries[0].offset, fc.header_size());
        for pair in entries.windows(2) {
            assert_eq!(pair[1].offset, pair[0].offset + pair[0].size);
        }
        assert_eq!(fc.master_file().unwrap().filename, "Tour.wwtxml");
    }

    #[test]
    fn test_blob_mime_types() {
        let fc = FileCabinet::from_bytes(sample().package_files(), ExtractMode::Strict).unwrap();
        let png = fc.get_file_blob("a.png").unwrap();
        assert_eq!(png.mime_type, Some("image/png"));
        assert!(png.data.iter().all(|b| *b == 7));
        assert_eq!(fc.get_file_blob("Tour.wwtxml").unwrap().mime_type, None);
        assert!(fc.get_file_blob("missing.png").is_none());
        assert_eq!(mime_type_for("song.MP3"), Some("audio/mpeg"));
        assert_eq!(mime_type_for("noext"), None);
    }

    #[test]
    fn test_token_in_file_name_is_left_alone() {
        let mut fc = FileCabinet::new();
        fc.add_file("0x0BADFOOD.txt", b"hi".to_vec());
        let loaded = FileCabinet::from_bytes(fc.package_files(), ExtractMode::Strict).unwrap();
        assert_eq!(loaded.get_file_blob("0x0BADFOOD.txt").unwrap().data, b"hi");
    }

    #[test]
    fn test_missing_header_lenient_vs_strict() {
        let junk = b"<FileCabinet><Files/></FileCabinet>".to_vec();
        let lenient = FileCabinet::from_bytes(junk.clone(), ExtractMode::Lenient).unwrap();
        assert!(lenient.entries().is_empty());
        assert!(matches!(
            FileCabinet::from_bytes(junk, ExtractMode::Strict),
            Err(Error::MissingHeaderSize)
        ));
    }

    #[test]
    fn test_truncated_archive_keeps_prefix_when_lenient() {
        let mut packed = sample().package_files();
        packed.truncate(packed.len() - 10);

        let lenient = FileCabinet::from_bytes(packed.clone(), ExtractMode::Lenient).unwrap();
        let names: Vec<&str> = lenient.entries().iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["Tour.wwtxml", "a.png"]);

        assert!(FileCabinet::from_bytes(packed, ExtractMode::Strict).is_err());
    }

    #[test]
    fn test_duplicate_names_ignored() {
        let mut fc = FileCabinet::new();
        fc.add_file("x.png", vec![1, 2]);
        fc.add_file("x.png", vec![3]);
        assert_eq!(fc.entries().len(), 1);
    }
}
