//! Player host for running a session without an embedded browser player.
//!
//! Commands are logged and echoed back onto the bus as the state reports a
//! real embedded player would send.

use std::time::Instant;

use log::{debug, info};
use tokio::sync::broadcast::Sender;
use uuid::Uuid;

use crate::player::EmbeddedPlayerHost;
use crate::protocol::{Message, PlaybackMessage};

const STATE_PLAYING: i32 = 1;
const STATE_PAUSED: i32 = 2;

pub struct HeadlessPlayerHost {
    bus_producer: Sender<Message>,
    generation: Uuid,
    media_id: Option<String>,
    muted: bool,
    offset_seconds: f64,
    playing_since: Option<Instant>,
    duration_seconds: f64,
}

impl HeadlessPlayerHost {
    pub fn new(bus_producer: Sender<Message>, generation: Uuid, duration_seconds: f64) -> Self {
        Self {
            bus_producer,
            generation,
            media_id: None,
            muted: false,
            offset_seconds: 0.0,
            playing_since: None,
            duration_seconds: duration_seconds.max(0.0),
        }
    }

    /// Announces readiness, as an embedded player does once its API loads.
    pub fn announce_ready(&self) {
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::PlayerReady {
                generation: self.generation,
            }));
    }

    pub fn media_id(&self) -> Option<&str> {
        self.media_id.as_deref()
    }

    fn report_state(&self, code: i32) {
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::PlayerStateChanged {
                generation: self.generation,
                code,
            }));
    }
}

impl EmbeddedPlayerHost for HeadlessPlayerHost {
    fn load(&mut self, media_id: &str) {
        info!("HeadlessPlayer: load {}", media_id);
        self.media_id = Some(media_id.to_string());
        self.offset_seconds = 0.0;
        self.playing_since = None;
    }

    fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
        debug!("HeadlessPlayer: play");
        self.report_state(STATE_PLAYING);
    }

    fn pause(&mut self) {
        self.offset_seconds = self.current_time();
        self.playing_since = None;
        debug!("HeadlessPlayer: pause at {:.1}s", self.offset_seconds);
        self.report_state(STATE_PAUSED);
    }

    fn seek_to(&mut self, seconds: f64) {
        self.offset_seconds = seconds.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        debug!("HeadlessPlayer: seek to {:.1}s", self.offset_seconds);
    }

    fn mute(&mut self) {
        self.muted = true;
    }

    fn unmute(&mut self) {
        self.muted = false;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn current_time(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.offset_seconds + elapsed;
        if self.duration_seconds > 0.0 {
            position.min(self.duration_seconds)
        } else {
            position
        }
    }

    fn duration(&self) -> f64 {
        self.duration_seconds
    }

    fn destroy(&mut self) {
        info!("HeadlessPlayer: destroyed");
        self.media_id = None;
        self.playing_since = None;
    }
}
