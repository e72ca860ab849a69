//! Engine state shared by documents while they load, save and play

use crate::layers::{LayerRegistry, ReferenceFrameRegistry};
use crate::settings::Settings;
use chrono::{DateTime, Utc};

/// What the live view currently shows, as text templates see it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewSnapshot {
    /// Right ascension in hours
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    pub lat: f64,
    pub lng: f64,
    /// Field of view in degrees
    pub fov: f64,
    /// Distance from the observer to the view target, in astronomical units
    pub distance_au: f64,
}

/// The live renderer settings, layer and frame registries, simulated
/// clock and error sink that a tour reads from and writes into.
///
/// Documents take this by reference for every operation that touches
/// engine state, so several engines (or tests) can coexist.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub settings: Settings,
    pub layers: LayerRegistry,
    pub frames: ReferenceFrameRegistry,
    /// Simulated clock
    pub now: DateTime<Utc>,
    pub view: ViewSnapshot,
    errors: Vec<String>,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            layers: LayerRegistry::new(),
            frames: ReferenceFrameRegistry::new(),
            now: Utc::now(),
            view: ViewSnapshot::default(),
            errors: Vec::new(),
        }
    }
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the simulated clock fixed at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Records a recovered error for the host to surface
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.errors.push(message);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Drains the recorded errors
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_sink() {
        let mut ctx = EngineContext::new();
        ctx.report_error("bad stop");
        ctx.report_error(String::from("bad layer"));
        assert_eq!(ctx.errors().len(), 2);
        assert_eq!(ctx.take_errors(), vec!["bad stop", "bad layer"]);
        assert!(ctx.errors().is_empty());
    }
}
