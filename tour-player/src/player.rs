//! Playback state machine
//!
//! Time is supplied by the host as wall-clock milliseconds on every call,
//! so playback can be driven from a render loop or stepped in tests.

use crate::{Error, Result};
use tour_core::overlay::OverlayKind;
use tour_core::{EngineContext, SlideLink, TourDocument};

/// Configuration for tour playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Start over from the first stop after the last one ends
    pub loop_tour: bool,
    /// Honor stop and overlay links. Off plays stops strictly in order.
    pub follow_links: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            loop_tour: false,
            follow_links: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Finished,
}

/// Something the host may want to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    StopEntered { index: usize, id: String },
    /// A link moved playback somewhere other than the next stop
    LinkFollowed { from: usize, to: usize },
    Returned { to: usize },
    Looped,
    Paused,
    Resumed,
    Finished,
    Stopped,
}

/// Plays one tour document
#[derive(Debug)]
pub struct TourPlayer {
    doc: TourDocument,
    config: PlayerConfig,
    state: PlayerState,
    current: Option<usize>,
    /// Wall clock time the current stop was entered
    stop_started_ms: u64,
    paused_at_ms: Option<u64>,
    paused_total_ms: u64,
    /// Slew into the current stop, played before its duration starts
    slew_ms: u64,
    return_stack: Vec<usize>,
}

impl TourPlayer {
    pub fn new(doc: TourDocument) -> Self {
        Self::with_config(doc, PlayerConfig::default())
    }

    pub fn with_config(doc: TourDocument, config: PlayerConfig) -> Self {
        Self {
            doc,
            config,
            state: PlayerState::Stopped,
            current: None,
            stop_started_ms: 0,
            paused_at_ms: None,
            paused_total_ms: 0,
            slew_ms: 0,
            return_stack: Vec::new(),
        }
    }

    pub fn document(&self) -> &TourDocument {
        &self.doc
    }

    pub fn into_document(mut self) -> TourDocument {
        self.halt_media();
        self.doc
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Starts from the document's selected stop, or the first one
    pub fn play(&mut self, now_ms: u64, ctx: &mut EngineContext) -> Result<Vec<PlayerEvent>> {
        if self.doc.tour_stop_count() == 0 {
            return Err(Error::EmptyTour);
        }
        self.halt_media();
        let start = self.doc.current_tour_stop_index().unwrap_or(0);
        log::info!(
            "playing '{}' from stop {} of {}",
            self.doc.title(),
            start,
            self.doc.tour_stop_count()
        );
        self.return_stack.clear();
        self.current = None;
        self.state = PlayerState::Playing;
        let mut events = Vec::new();
        self.enter_stop(start, now_ms, ctx, &mut events)?;
        Ok(events)
    }

    pub fn pause(&mut self, now_ms: u64) -> Result<Vec<PlayerEvent>> {
        if self.state != PlayerState::Playing {
            return Err(Error::NotPlaying);
        }
        self.paused_at_ms = Some(now_ms);
        self.state = PlayerState::Paused;
        if let Some(stop) = self.current.and_then(|i| self.doc.stop_mut(i)) {
            stop.pause();
            for track in stop.tracks_mut() {
                track.pause();
            }
        }
        Ok(vec![PlayerEvent::Paused])
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<Vec<PlayerEvent>> {
        if self.state != PlayerState::Paused {
            return Err(Error::NotPlaying);
        }
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.paused_total_ms += now_ms.saturating_sub(paused_at);
        }
        self.state = PlayerState::Playing;
        if let Some(stop) = self.current.and_then(|i| self.doc.stop_mut(i)) {
            stop.play();
            for track in stop.tracks_mut() {
                track.play();
            }
        }
        Ok(vec![PlayerEvent::Resumed])
    }

    /// Ends playback and releases overlay media
    pub fn stop(&mut self) -> Vec<PlayerEvent> {
        if self.state == PlayerState::Stopped {
            return Vec::new();
        }
        self.halt_media();
        self.doc.clean_up();
        self.state = PlayerState::Stopped;
        self.current = None;
        self.paused_at_ms = None;
        self.return_stack.clear();
        vec![PlayerEvent::Stopped]
    }

    /// Jumps to a stop. Allowed while playing or paused; a paused player
    /// stays paused on the new stop.
    pub fn move_to(
        &mut self,
        index: usize,
        now_ms: u64,
        ctx: &mut EngineContext,
    ) -> Result<Vec<PlayerEvent>> {
        if index >= self.doc.tour_stop_count() {
            return Err(tour_core::Error::StopIndexOutOfRange(index).into());
        }
        if !matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            return Err(Error::NotPlaying);
        }
        let paused = self.state == PlayerState::Paused;
        let mut events = Vec::new();
        self.enter_stop(index, now_ms, ctx, &mut events)?;
        if paused {
            self.paused_at_ms = Some(now_ms);
            if let Some(stop) = self.doc.stop_mut(index) {
                stop.pause();
                for track in stop.tracks_mut() {
                    track.pause();
                }
            }
        }
        Ok(events)
    }

    /// Milliseconds into the current stop, slew included
    pub fn elapsed_in_stop(&self, now_ms: u64) -> u64 {
        let now = self.paused_at_ms.unwrap_or(now_ms);
        now.saturating_sub(self.stop_started_ms)
            .saturating_sub(self.paused_total_ms)
    }

    /// Milliseconds until the current stop ends, slew included
    pub fn remaining_in_stop(&self, now_ms: u64) -> u64 {
        let Some(stop) = self.current.and_then(|i| self.doc.stop(i)) else {
            return 0;
        };
        (self.slew_ms + stop.duration_ms()).saturating_sub(self.elapsed_in_stop(now_ms))
    }

    /// Position on the tour's timeline, as if played straight through
    pub fn tour_time_ms(&self, now_ms: u64) -> u64 {
        match self.current {
            Some(i) => self.doc.elapsed_time_till_tour_stop(i) + self.elapsed_in_stop(now_ms),
            None => 0,
        }
    }

    /// Milliseconds since the most recent master stop began
    pub fn time_since_master_ms(&self, now_ms: u64) -> u64 {
        let Some(i) = self.current else {
            return 0;
        };
        let elapsed = self.elapsed_in_stop(now_ms);
        match self.doc.stop(i) {
            Some(stop) if stop.master_slide() => elapsed,
            _ => self.doc.elapsed_time_since_last_master(i).0 + elapsed,
        }
    }

    /// Advances playback to `now_ms`: tweens the current stop, runs its
    /// flipbooks and moves on when it ends
    pub fn update(&mut self, now_ms: u64, ctx: &mut EngineContext) -> Result<Vec<PlayerEvent>> {
        let mut events = Vec::new();
        if self.state != PlayerState::Playing {
            return Ok(events);
        }

        // a burst of zero-length stops must not spin forever
        let mut budget = self.doc.tour_stop_count() + 1;
        while self.state == PlayerState::Playing && budget > 0 {
            let Some(index) = self.current else {
                break;
            };
            let Some((duration, next_link)) = self
                .doc
                .stop(index)
                .map(|stop| (stop.duration_ms(), stop.next_link()))
            else {
                break;
            };
            let elapsed = self.elapsed_in_stop(now_ms);
            let span = self.slew_ms + duration;

            if elapsed < span {
                let tween = if duration == 0 || elapsed <= self.slew_ms {
                    0.0
                } else {
                    (elapsed - self.slew_ms) as f64 / duration as f64
                };
                self.show(index, tween, now_ms, ctx);
                break;
            }

            self.show(index, 1.0, now_ms, ctx);
            let link = if self.config.follow_links {
                next_link
            } else {
                SlideLink::Next
            };
            // the next stop starts where this one ended, not at the tick
            let boundary = now_ms - (elapsed - span);
            self.follow(index, link, false, boundary, ctx, &mut events)?;
            budget -= 1;
        }
        Ok(events)
    }

    /// Handles a click at canvas coordinates. An overlay with a link
    /// under the point sends playback there.
    pub fn click(
        &mut self,
        x: f64,
        y: f64,
        now_ms: u64,
        ctx: &mut EngineContext,
    ) -> Result<Vec<PlayerEvent>> {
        let mut events = Vec::new();
        if self.state != PlayerState::Playing || !self.config.follow_links {
            return Ok(events);
        }
        let Some(index) = self.current else {
            return Ok(events);
        };
        let link = self
            .doc
            .stop(index)
            .and_then(|stop| stop.overlay_at(x, y))
            .and_then(|overlay| overlay.link());
        if let Some(link) = link {
            log::debug!("overlay link {} clicked on stop {}", link, index);
            self.follow(index, link, true, now_ms, ctx, &mut events)?;
        }
        Ok(events)
    }

    /// Tells the player an audio file has buffered enough to play
    pub fn media_ready(&mut self, filename: &str) {
        let Some(stop) = self.current.and_then(|i| self.doc.stop_mut(i)) else {
            return;
        };
        for overlay in stop.media_mut() {
            if let OverlayKind::Audio(audio) = &mut overlay.kind {
                if audio.filename == filename {
                    audio.media.on_can_play_through();
                }
            }
        }
    }

    fn show(&mut self, index: usize, tween: f64, now_ms: u64, ctx: &mut EngineContext) {
        let Some(stop) = self.doc.stop_mut(index) else {
            return;
        };
        stop.set_tween_position(tween);
        if stop.has_time() {
            ctx.now = stop.time_at(tween);
        }
        for overlay in stop.media_mut() {
            if let OverlayKind::Flipbook(flipbook) = &mut overlay.kind {
                flipbook.update_frame(now_ms);
            }
        }
    }

    fn follow(
        &mut self,
        from: usize,
        link: SlideLink,
        push_return: bool,
        now_ms: u64,
        ctx: &mut EngineContext,
        events: &mut Vec<PlayerEvent>,
    ) -> Result<()> {
        let target = match link {
            SlideLink::Next => None,
            SlideLink::Return => match self.return_stack.pop() {
                Some(to) if to < self.doc.tour_stop_count() => {
                    events.push(PlayerEvent::Returned { to });
                    Some(to)
                }
                _ => None,
            },
            SlideLink::Stop(id) => match self.doc.index_of(&id) {
                Some(to) => {
                    if push_return {
                        self.return_stack.push(from);
                    }
                    events.push(PlayerEvent::LinkFollowed { from, to });
                    Some(to)
                }
                None => {
                    log::warn!("stop {} links to missing stop {}", from, id);
                    None
                }
            },
        };

        let target = match target {
            Some(to) => to,
            None if from + 1 < self.doc.tour_stop_count() => from + 1,
            None if self.config.loop_tour => {
                events.push(PlayerEvent::Looped);
                0
            }
            None => {
                self.finish(events);
                return Ok(());
            }
        };
        self.enter_stop(target, now_ms, ctx, events)
    }

    fn enter_stop(
        &mut self,
        index: usize,
        now_ms: u64,
        ctx: &mut EngineContext,
        events: &mut Vec<PlayerEvent>,
    ) -> Result<()> {
        let slew_ms = match self.current {
            Some(prev) if prev != index => match (self.doc.stop(prev), self.doc.stop(index)) {
                (Some(p), Some(n)) => TourDocument::slew_time_ms(p, n),
                _ => 0,
            },
            _ => 0,
        };
        self.halt_media();
        self.doc.set_current_tour_stop_index(Some(index))?;

        let stop = self
            .doc
            .stop_mut(index)
            .ok_or(tour_core::Error::StopIndexOutOfRange(index))?;
        stop.set_tween_position(0.0);
        stop.sync_settings(ctx);
        stop.play();
        for track in stop.tracks_mut() {
            track.play();
        }
        log::debug!("entered stop {} ({})", index, stop.id());
        events.push(PlayerEvent::StopEntered {
            index,
            id: stop.id().to_string(),
        });

        self.current = Some(index);
        self.stop_started_ms = now_ms;
        self.paused_at_ms = None;
        self.paused_total_ms = 0;
        self.slew_ms = slew_ms;
        Ok(())
    }

    fn finish(&mut self, events: &mut Vec<PlayerEvent>) {
        log::info!("tour '{}' finished", self.doc.title());
        self.halt_media();
        self.state = PlayerState::Finished;
        events.push(PlayerEvent::Finished);
    }

    fn halt_media(&mut self) {
        if let Some(stop) = self.current.and_then(|i| self.doc.stop_mut(i)) {
            stop.stop();
        }
    }
}
