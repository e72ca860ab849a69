//! Audio overlays and the deferred playback latch

use super::OverlayPayload;
use crate::xml::{XmlElement, XmlWriter};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioType {
    #[default]
    Music,
    Voice,
}

impl fmt::Display for AudioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AudioType::Music => "Music",
            AudioType::Voice => "Voice",
        })
    }
}

impl FromStr for AudioType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Music" => Ok(AudioType::Music),
            "Voice" => Ok(AudioType::Voice),
            _ => Err(()),
        }
    }
}

/// Playback state of the media element behind an audio overlay.
///
/// The element is created on the first command. Until it reports that it
/// can play through, play/pause/seek are latched and replayed from
/// [`MediaState::on_can_play_through`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaState {
    element_created: bool,
    ready: bool,
    playing: bool,
    want_playing: bool,
    position: f64,
    pending_seek: Option<f64>,
}

impl MediaState {
    fn ensure_element(&mut self) {
        if !self.element_created {
            log::debug!("creating media element");
            self.element_created = true;
        }
    }

    pub fn play(&mut self) {
        self.ensure_element();
        if self.ready {
            self.playing = true;
        } else {
            self.want_playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.ensure_element();
        if self.ready {
            self.playing = false;
        } else {
            self.want_playing = false;
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        self.ensure_element();
        if self.ready {
            self.position = seconds.max(0.0);
        } else {
            self.pending_seek = Some(seconds.max(0.0));
        }
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.want_playing = false;
        self.pending_seek = None;
        self.position = 0.0;
    }

    /// The element has buffered enough; apply latched commands
    pub fn on_can_play_through(&mut self) {
        if !self.element_created {
            return;
        }
        self.ready = true;
        if let Some(seconds) = self.pending_seek.take() {
            self.position = seconds;
        }
        if self.want_playing {
            self.want_playing = false;
            self.playing = true;
        }
    }

    /// Releases the element; the next command recreates it
    pub fn release(&mut self) {
        *self = MediaState::default();
    }

    pub fn element_created(&self) -> bool {
        self.element_created
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// A play request waiting for the element to become ready
    pub fn wants_playing(&self) -> bool {
        self.want_playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}

/// A sound file played while a stop is showing
#[derive(Debug, Clone, PartialEq)]
pub struct AudioOverlay {
    pub filename: String,
    /// 0 to 100
    pub volume: i32,
    pub mute: bool,
    pub track_type: AudioType,
    pub media: MediaState,
}

impl Default for AudioOverlay {
    fn default() -> Self {
        Self {
            filename: String::new(),
            volume: 100,
            mute: false,
            track_type: AudioType::Music,
            media: MediaState::default(),
        }
    }
}

impl AudioOverlay {
    pub fn new(filename: &str, track_type: AudioType) -> Self {
        Self {
            filename: filename.to_string(),
            track_type,
            ..Self::default()
        }
    }

    /// Effective volume in [0,1]
    pub fn effective_volume(&self) -> f64 {
        if self.mute {
            0.0
        } else {
            self.volume.clamp(0, 100) as f64 / 100.0
        }
    }
}

impl OverlayPayload for AudioOverlay {
    fn type_name(&self) -> &'static str {
        "TerraViewer.AudioOverlay"
    }

    fn element_name(&self) -> &'static str {
        "Audio"
    }

    fn write_overlay_properties(&self, w: &mut XmlWriter) {
        w.write_attribute_string("Filename", &self.filename);
        w.write_attribute("Volume", self.volume);
        w.write_attribute_bool("Mute", self.mute);
        w.write_attribute("TrackType", self.track_type);
    }

    fn initialize_from_xml(&mut self, el: &XmlElement) {
        self.filename = el.attr_string("Filename", "");
        self.volume = el.attr_or("Volume", 100);
        self.mute = el.attr_bool("Mute", false);
        self.track_type = el.attr_or("TrackType", AudioType::Music);
    }

    fn files(&self) -> Vec<&str> {
        if self.filename.is_empty() {
            Vec::new()
        } else {
            vec![self.filename.as_str()]
        }
    }

    fn play(&mut self) {
        self.media.play();
    }

    fn pause(&mut self) {
        self.media.pause();
    }

    fn seek(&mut self, seconds: f64) {
        self.media.seek(seconds);
    }

    fn stop(&mut self) {
        self.media.stop();
    }

    fn clean_up(&mut self) {
        self.media.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_before_ready_is_latched() {
        let mut m = MediaState::default();
        assert!(!m.element_created());
        m.play();
        assert!(m.element_created());
        assert!(!m.is_playing());
        assert!(m.wants_playing());

        m.on_can_play_through();
        assert!(m.is_playing());
        assert!(!m.wants_playing());
    }

    #[test]
    fn test_pause_cancels_latched_play() {
        let mut m = MediaState::default();
        m.play();
        m.pause();
        m.seek(12.5);
        m.on_can_play_through();
        assert!(!m.is_playing());
        assert_eq!(m.position(), 12.5);
    }

    #[test]
    fn test_commands_after_ready_apply_directly() {
        let mut m = MediaState::default();
        m.pause();
        m.on_can_play_through();
        m.play();
        assert!(m.is_playing());
        m.seek(3.0);
        assert_eq!(m.position(), 3.0);
        m.stop();
        assert!(!m.is_playing());
        assert_eq!(m.position(), 0.0);
    }

    #[test]
    fn test_ready_without_element_is_ignored() {
        let mut m = MediaState::default();
        m.on_can_play_through();
        assert!(!m.is_ready());
    }

    #[test]
    fn test_clean_up_releases_element() {
        let mut a = AudioOverlay::new("voice.mp3", AudioType::Voice);
        a.play();
        a.clean_up();
        assert_eq!(a.media, MediaState::default());
    }

    #[test]
    fn test_effective_volume() {
        let mut a = AudioOverlay::new("x.mp3", AudioType::Music);
        a.volume = 50;
        assert_eq!(a.effective_volume(), 0.5);
        a.mute = true;
        assert_eq!(a.effective_volume(), 0.0);
    }
}
