//! Sprite-sheet animations

use super::OverlayPayload;
use crate::xml::{XmlElement, XmlWriter};
use std::fmt;
use std::str::FromStr;

/// Flipbooks advance at a fixed rate
pub const FRAMES_PER_SECOND: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopType {
    #[default]
    Loop,
    UpDown,
    Down,
    UpDownOnce,
    Once,
    Begin,
    End,
}

impl fmt::Display for LoopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopType::Loop => "Loop",
            LoopType::UpDown => "UpDown",
            LoopType::Down => "Down",
            LoopType::UpDownOnce => "UpDownOnce",
            LoopType::Once => "Once",
            LoopType::Begin => "Begin",
            LoopType::End => "End",
        })
    }
}

impl FromStr for LoopType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Loop" => Ok(LoopType::Loop),
            "UpDown" => Ok(LoopType::UpDown),
            "Down" => Ok(LoopType::Down),
            "UpDownOnce" => Ok(LoopType::UpDownOnce),
            "Once" => Ok(LoopType::Once),
            "Begin" => Ok(LoopType::Begin),
            "End" => Ok(LoopType::End),
            _ => Err(()),
        }
    }
}

/// Index into a run of `frame_count` frames after `elapsed_ms` of play
pub fn frame_index(loop_type: LoopType, frame_count: u32, elapsed_ms: u64) -> u32 {
    if frame_count == 0 {
        return 0;
    }
    let count = frame_count as u64;
    let last = count - 1;
    let period = 2 * last;
    let n = elapsed_ms.saturating_mul(FRAMES_PER_SECOND) / 1000;

    let index = match loop_type {
        LoopType::Loop => n % count,
        LoopType::UpDown => {
            if period == 0 {
                0
            } else {
                let p = n % period;
                p.min(period - p)
            }
        }
        LoopType::Down => last - n % count,
        LoopType::UpDownOnce => {
            if n >= period {
                0
            } else {
                n.min(period - n)
            }
        }
        LoopType::Once => n.min(last),
        LoopType::Begin => 0,
        LoopType::End => last,
    };
    index as u32
}

/// An animation cut from a grid of frames in one image
#[derive(Debug, Clone, PartialEq)]
pub struct FlipbookOverlay {
    pub filename: String,
    /// Total frames in the sheet
    pub frames: u32,
    pub loop_type: LoopType,
    pub frames_x: u32,
    pub frames_y: u32,
    pub start_frame: u32,
    /// Optional comma-separated list of frames to play instead of 0..frames
    pub frame_sequence: String,
    playing: bool,
    time_start_ms: Option<u64>,
    current_frame: u32,
}

impl Default for FlipbookOverlay {
    fn default() -> Self {
        Self {
            filename: String::new(),
            frames: 1,
            loop_type: LoopType::UpDown,
            frames_x: 8,
            frames_y: 8,
            start_frame: 0,
            frame_sequence: String::new(),
            playing: false,
            time_start_ms: None,
            current_frame: 0,
        }
    }
}

impl FlipbookOverlay {
    pub fn new(filename: &str, frames: u32, frames_x: u32, frames_y: u32) -> Self {
        Self {
            filename: filename.to_string(),
            frames,
            frames_x,
            frames_y,
            ..Self::default()
        }
    }

    /// Parsed explicit frame sequence, empty when not set
    pub fn sequence(&self) -> Vec<u32> {
        self.frame_sequence
            .split([',', ' '])
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    /// Frame to show after `elapsed_ms` of play
    pub fn frame_at(&self, elapsed_ms: u64) -> u32 {
        let sequence = self.sequence();
        if sequence.is_empty() {
            return frame_index(self.loop_type, self.frames, elapsed_ms);
        }
        let index = frame_index(self.loop_type, sequence.len() as u32, elapsed_ms);
        match sequence.get(index as usize) {
            Some(&frame) if frame < self.frames.max(1) => frame,
            _ => 0,
        }
    }

    /// Advances the current frame for the wall clock time `now_ms`. The
    /// first update after `play` starts the clock.
    pub fn update_frame(&mut self, now_ms: u64) -> u32 {
        if !self.playing {
            self.current_frame = self.start_frame;
            return self.current_frame;
        }
        let start = *self.time_start_ms.get_or_insert(now_ms);
        self.current_frame = self.frame_at(now_ms.saturating_sub(start));
        self.current_frame
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Grid cell (column, row) holding a frame
    pub fn cell(&self, frame: u32) -> (u32, u32) {
        let across = self.frames_x.max(1);
        (frame % across, frame / across)
    }

    /// Texture rectangle (u0, v0, u1, v1) of a frame
    pub fn uv_rect(&self, frame: u32) -> (f64, f64, f64, f64) {
        let (col, row) = self.cell(frame);
        let du = 1.0 / self.frames_x.max(1) as f64;
        let dv = 1.0 / self.frames_y.max(1) as f64;
        let (u0, v0) = (col as f64 * du, row as f64 * dv);
        (u0, v0, u0 + du, v0 + dv)
    }
}

impl OverlayPayload for FlipbookOverlay {
    fn type_name(&self) -> &'static str {
        "TerraViewer.FlipbookOverlay"
    }

    fn element_name(&self) -> &'static str {
        "Flipbook"
    }

    fn write_overlay_properties(&self, w: &mut XmlWriter) {
        w.write_attribute_string("Filename", &self.filename);
        w.write_attribute("Frames", self.frames);
        w.write_attribute("Loop", self.loop_type);
        w.write_attribute("FramesX", self.frames_x);
        w.write_attribute("FramesY", self.frames_y);
        w.write_attribute("StartFrame", self.start_frame);
        if !self.frame_sequence.is_empty() {
            w.write_attribute_string("FrameSequence", &self.frame_sequence);
        }
    }

    fn initialize_from_xml(&mut self, el: &XmlElement) {
        let d = Self::default();
        self.filename = el.attr_string("Filename", "");
        self.frames = el.attr_or("Frames", d.frames);
        self.loop_type = el.attr_or("Loop", d.loop_type);
        self.frames_x = el.attr_or("FramesX", d.frames_x);
        self.frames_y = el.attr_or("FramesY", d.frames_y);
        self.start_frame = el.attr_or("StartFrame", d.start_frame);
        self.frame_sequence = el.attr_string("FrameSequence", "");
        self.current_frame = self.start_frame;
    }

    fn files(&self) -> Vec<&str> {
        if self.filename.is_empty() {
            Vec::new()
        } else {
            vec![self.filename.as_str()]
        }
    }

    fn play(&mut self) {
        self.playing = true;
        self.time_start_ms = None;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.time_start_ms = None;
        self.current_frame = self.start_frame;
    }

    fn clean_up(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: u64 = 1000 / FRAMES_PER_SECOND + 1;

    fn at_frame(n: u64) -> u64 {
        // first millisecond that lands on tick n
        (n * 1000).div_ceil(FRAMES_PER_SECOND)
    }

    #[test]
    fn test_once_clamps() {
        for ms in [0, FRAME_MS, at_frame(9), at_frame(10), at_frame(1000), u64::MAX / 100] {
            assert!(frame_index(LoopType::Once, 10, ms) <= 9);
        }
        assert_eq!(frame_index(LoopType::Once, 10, at_frame(50)), 9);
    }

    #[test]
    fn test_up_down_symmetry() {
        let count = 6u32;
        let period = 2 * (count as u64 - 1);
        for p in 0..=period {
            assert_eq!(
                frame_index(LoopType::UpDown, count, at_frame(p)),
                frame_index(LoopType::UpDown, count, at_frame(period - p)),
            );
        }
        assert_eq!(frame_index(LoopType::UpDown, count, at_frame(5)), 5);
        assert_eq!(frame_index(LoopType::UpDown, count, at_frame(6)), 4);
    }

    #[test]
    fn test_other_loop_types() {
        assert_eq!(frame_index(LoopType::Loop, 4, at_frame(5)), 1);
        assert_eq!(frame_index(LoopType::Down, 4, at_frame(1)), 2);
        assert_eq!(frame_index(LoopType::UpDownOnce, 4, at_frame(4)), 2);
        assert_eq!(frame_index(LoopType::UpDownOnce, 4, at_frame(60)), 0);
        assert_eq!(frame_index(LoopType::Begin, 4, at_frame(3)), 0);
        assert_eq!(frame_index(LoopType::End, 4, 0), 3);
        assert_eq!(frame_index(LoopType::Loop, 0, 12345), 0);
        assert_eq!(frame_index(LoopType::UpDown, 1, 12345), 0);
    }

    #[test]
    fn test_sequence_lookup() {
        let mut f = FlipbookOverlay::new("f.png", 10, 5, 2);
        f.loop_type = LoopType::Loop;
        f.frame_sequence = "3, 7,99".into();
        assert_eq!(f.sequence(), vec![3, 7, 99]);
        assert_eq!(f.frame_at(at_frame(0)), 3);
        assert_eq!(f.frame_at(at_frame(1)), 7);
        // out of range falls back to the first frame
        assert_eq!(f.frame_at(at_frame(2)), 0);
    }

    #[test]
    fn test_update_frame_uses_first_update_as_start() {
        let mut f = FlipbookOverlay::new("f.png", 10, 5, 2);
        f.loop_type = LoopType::Once;
        f.start_frame = 2;
        assert_eq!(f.update_frame(5_000), 2);
        f.play();
        assert_eq!(f.update_frame(10_000), 0);
        assert_eq!(f.update_frame(10_000 + at_frame(4)), 4);
        f.stop();
        assert_eq!(f.current_frame(), 2);
    }

    #[test]
    fn test_cells() {
        let f = FlipbookOverlay::new("f.png", 10, 5, 2);
        assert_eq!(f.cell(7), (2, 1));
        assert_eq!(f.uv_rect(0), (0.0, 0.0, 0.2, 0.5));
    }
}
