//! Loading tours from archives on disk or behind a URL

use crate::cabinet::ExtractMode;
use crate::context::EngineContext;
use crate::tour_document::TourDocument;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// How forgiving a load is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub extract_mode: ExtractMode,
    /// Skip stops that fail to parse instead of failing the load
    pub drop_unparseable_stops: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extract_mode: ExtractMode::Lenient,
            drop_unparseable_stops: true,
        }
    }
}

impl LoadOptions {
    /// Every problem is an error
    pub fn strict() -> Self {
        Self {
            extract_mode: ExtractMode::Strict,
            drop_unparseable_stops: false,
        }
    }
}

/// Where an asynchronous load stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LoadStatus {
    #[default]
    Pending,
    Ready,
    Error,
}

/// What a load kept and what it had to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoadSummary {
    pub stops_loaded: usize,
    pub stops_dropped: usize,
}

impl LoadSummary {
    /// Every stop in the file made it into the document
    pub fn is_complete(&self) -> bool {
        self.stops_dropped == 0
    }
}

/// Source of archive bytes
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Reads archives from the local filesystem. Relative paths and
/// `file://` URLs resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsFetcher {
    root: Option<PathBuf>,
}

impl FsFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Fetcher for FsFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url);
        log::debug!("reading tour archive {}", path.display());
        std::fs::read(&path).map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl TourDocument {
    /// Fetches and opens a tour archive, reporting completion through
    /// `on_complete`. The returned document carries the same status; on
    /// error it is empty and the error has been sent to the engine's sink.
    pub fn from_url<F>(
        url: &str,
        fetcher: &dyn Fetcher,
        ctx: &mut EngineContext,
        options: &LoadOptions,
        on_complete: F,
    ) -> TourDocument
    where
        F: FnOnce(&TourDocument, LoadStatus),
    {
        let mut doc = match Self::load(url, fetcher, ctx, options) {
            Ok(doc) => doc,
            Err(e) => {
                ctx.report_error(format!("failed to load tour {}: {}", url, e));
                let mut doc = TourDocument::new();
                doc.set_status(LoadStatus::Error);
                doc
            }
        };
        doc.set_url(url);
        on_complete(&doc, doc.status());
        doc
    }

    /// Fetches and opens a tour archive
    pub fn load(
        url: &str,
        fetcher: &dyn Fetcher,
        ctx: &mut EngineContext,
        options: &LoadOptions,
    ) -> Result<TourDocument> {
        let data = fetcher.fetch(url)?;
        log::info!("fetched {} ({} bytes)", url, data.len());
        let mut doc = TourDocument::from_blob(data, ctx, options)?;
        doc.set_url(url);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::Place;
    use crate::tour_stop::TourStop;
    use std::cell::Cell;

    fn write_tour(dir: &Path) -> PathBuf {
        let mut ctx = EngineContext::new();
        let mut doc = TourDocument::new();
        doc.set_title("Fetched");
        doc.add_tour_stop(TourStop::new(Place::sky("Vega", 18.6, 38.8, 10.0)));
        let path = dir.join("fetched.wtt");
        std::fs::write(&path, doc.save_to_blob(&mut ctx)).unwrap();
        path
    }

    #[test]
    fn test_fs_fetcher_roots_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_tour(dir.path());
        let fetcher = FsFetcher::with_root(dir.path());
        assert!(fetcher.fetch("fetched.wtt").is_ok());
        assert!(fetcher.fetch("file://fetched.wtt").is_ok());
        assert!(matches!(fetcher.fetch("missing.wtt"), Err(Error::Fetch { .. })));
    }

    #[test]
    fn test_from_url_reports_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tour(dir.path());
        let mut ctx = EngineContext::new();
        let called = Cell::new(None);
        let doc = TourDocument::from_url(
            path.to_str().unwrap(),
            &FsFetcher::new(),
            &mut ctx,
            &LoadOptions::default(),
            |doc, status| called.set(Some((status, doc.tour_stop_count()))),
        );
        assert_eq!(called.get(), Some((LoadStatus::Ready, 1)));
        assert_eq!(doc.properties().title, "Fetched");
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn test_from_url_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = EngineContext::new();
        let url = dir.path().join("nope.wtt");
        let doc = TourDocument::from_url(
            url.to_str().unwrap(),
            &FsFetcher::new(),
            &mut ctx,
            &LoadOptions::default(),
            |_, status| assert_eq!(status, LoadStatus::Error),
        );
        assert_eq!(doc.status(), LoadStatus::Error);
        assert_eq!(doc.tour_stop_count(), 0);
        assert_eq!(ctx.errors().len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_summary_serializes() {
        let summary = LoadSummary {
            stops_loaded: 3,
            stops_dropped: 1,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(json, r#"{"stops_loaded":3,"stops_dropped":1}"#);
        assert_eq!(serde_json::to_string(&LoadStatus::Ready).unwrap(), r#""Ready""#);
    }
}
