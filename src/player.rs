//! Single embedded media player controller.
//!
//! Owns the one external player instance for a mounted setlist and keeps at
//! most one setlist row bound to it. Play/pause requests go through a
//! depth-1 debounce window; everything else is applied immediately.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::{
    debounce::CommandDebouncer, media_link, platform::PlatformCapabilities, setlist::ItemKey,
};

/// Commands understood by the embeddable external player.
///
/// Commands are fire-and-forget; completion is reported back through
/// `PlayerController::on_player_ready`, `on_external_state_change` and
/// `on_external_error`.
pub trait EmbeddedPlayerHost {
    fn load(&mut self, media_id: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn mute(&mut self);
    fn unmute(&mut self);
    fn is_muted(&self) -> bool;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn destroy(&mut self);
}

/// State codes reported by the external player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalPlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
    Unknown(i32),
}

impl ExternalPlayerState {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Unstarted,
            0 => Self::Ended,
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Buffering,
            5 => Self::Cued,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("no playable media link for this song")]
    NoPlayableMedia,
    #[error("this video is restricted or unavailable (code {code})")]
    Restricted { code: i32 },
    #[error("playback failed (code {code})")]
    Generic { code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlayerWarning {
    #[error("the player is not ready yet")]
    NotReady,
}

/// Mirror of the external player plus the current row binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub bound_item_key: Option<ItemKey>,
    pub is_playing: bool,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub is_muted: bool,
    pub is_player_ready: bool,
    /// Bind request received before the player signalled readiness.
    pub pending_bind_key: Option<ItemKey>,
}

/// Result of an effective play toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started {
        key: ItemKey,
        media_id: String,
        /// Muted autoplay was required and the follow-up unmute was refused.
        stayed_muted: bool,
    },
    Paused {
        key: ItemKey,
    },
    /// Player not ready; the request is held as the pending bind.
    Deferred {
        key: ItemKey,
    },
}

/// Media candidates of the song behind a row.
#[derive(Debug, Clone, Copy)]
pub struct MediaRequest<'a> {
    pub selected_reference_url: &'a str,
    pub reference_links: &'a [String],
}

/// Selected reference first, then the first recognized media link.
pub fn resolve_media_id(request: &MediaRequest<'_>) -> Option<String> {
    if !request.selected_reference_url.is_empty() {
        if let Some(media_id) = media_link::extract_media_id(request.selected_reference_url) {
            return Some(media_id);
        }
    }
    request
        .reference_links
        .iter()
        .find_map(|link| media_link::extract_media_id(link))
}

pub struct PlayerController<H: EmbeddedPlayerHost> {
    host: H,
    state: PlaybackState,
    capabilities: PlatformCapabilities,
    restricted_error_codes: Vec<i32>,
    toggle_debouncer: CommandDebouncer<ItemKey>,
    /// Local pause commands whose `Paused` report has not arrived yet.
    pending_local_pauses: usize,
}

impl<H: EmbeddedPlayerHost> PlayerController<H> {
    pub fn new(
        host: H,
        capabilities: PlatformCapabilities,
        debounce_window: Duration,
        restricted_error_codes: Vec<i32>,
    ) -> Self {
        Self {
            host,
            state: PlaybackState::default(),
            capabilities,
            restricted_error_codes,
            toggle_debouncer: CommandDebouncer::new(debounce_window),
            pending_local_pauses: 0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    /// Queues a play/pause toggle for `key`, collapsing bursts.
    pub fn request_play_toggle(&mut self, key: ItemKey, now: Instant) {
        if let Some(replaced) = self.toggle_debouncer.submit(key.clone(), now) {
            debug!(
                "PlayerController: toggle for {} superseded by {} within debounce window",
                replaced, key
            );
        }
    }

    /// Pops the debounced toggle once its window has elapsed.
    pub fn take_due_toggle(&mut self, now: Instant) -> Option<ItemKey> {
        self.toggle_debouncer.take_due(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.toggle_debouncer.next_deadline()
    }

    /// Applies one effective play/pause toggle for `key`.
    pub fn toggle_now(
        &mut self,
        key: ItemKey,
        media: MediaRequest<'_>,
    ) -> Result<ToggleOutcome, PlaybackError> {
        if self.state.bound_item_key.as_ref() == Some(&key) && self.state.is_playing {
            self.pause_bound();
            debug!("PlayerController: paused {}", key);
            return Ok(ToggleOutcome::Paused { key });
        }

        let Some(media_id) = resolve_media_id(&media) else {
            debug!("PlayerController: {} has no playable media link", key);
            return Err(PlaybackError::NoPlayableMedia);
        };

        if !self.state.is_player_ready {
            debug!(
                "PlayerController: player not ready, holding {} as pending bind",
                key
            );
            self.state.pending_bind_key = Some(key.clone());
            return Ok(ToggleOutcome::Deferred { key });
        }

        if self.state.bound_item_key.is_some() {
            self.pause_bound();
        }

        self.host.load(&media_id);
        let mut stayed_muted = false;
        if self.capabilities.requires_muted_autoplay {
            self.host.mute();
            self.host.play();
            self.host.unmute();
            if self.host.is_muted() {
                warn!(
                    "PlayerController: platform refused unmute for {}, continuing muted",
                    key
                );
                stayed_muted = true;
            }
        } else {
            self.host.play();
        }

        self.state.is_muted = self.host.is_muted();
        self.state.bound_item_key = Some(key.clone());
        self.state.is_playing = true;
        self.state.current_time_seconds = 0.0;
        self.state.duration_seconds = 0.0;
        info!("PlayerController: playing media {} for {}", media_id, key);
        Ok(ToggleOutcome::Started {
            key,
            media_id,
            stayed_muted,
        })
    }

    /// Marks the player ready and hands back the pending bind, if any, for a
    /// single replay.
    pub fn on_player_ready(&mut self) -> Option<ItemKey> {
        self.state.is_player_ready = true;
        self.state.is_muted = self.host.is_muted();
        let pending = self.state.pending_bind_key.take();
        debug!(
            "PlayerController: player ready (pending bind: {})",
            pending
                .as_ref()
                .map(ItemKey::to_string)
                .unwrap_or_else(|| "none".to_string())
        );
        pending
    }

    /// Applies a state report from the external player. Returns true when the
    /// binding was cleared.
    pub fn on_external_state_change(&mut self, state: ExternalPlayerState) -> bool {
        match state {
            ExternalPlayerState::Playing => {
                if self.state.bound_item_key.is_some() {
                    self.state.is_playing = true;
                } else {
                    debug!("PlayerController: ignoring playing report while unbound");
                }
                false
            }
            ExternalPlayerState::Paused if self.pending_local_pauses > 0 => {
                self.pending_local_pauses -= 1;
                false
            }
            ExternalPlayerState::Paused | ExternalPlayerState::Ended => {
                self.state.is_playing = false;
                let cleared = self.state.bound_item_key.take();
                if let Some(key) = &cleared {
                    debug!("PlayerController: {} released after {:?}", key, state);
                }
                cleared.is_some()
            }
            ExternalPlayerState::Unstarted
            | ExternalPlayerState::Buffering
            | ExternalPlayerState::Cued
            | ExternalPlayerState::Unknown(_) => false,
        }
    }

    /// Maps an external error code and resets the binding.
    pub fn on_external_error(&mut self, code: i32) -> PlaybackError {
        let error = if self.restricted_error_codes.contains(&code) {
            PlaybackError::Restricted { code }
        } else {
            PlaybackError::Generic { code }
        };
        warn!(
            "PlayerController: external error {} while bound to {:?}",
            code, self.state.bound_item_key
        );
        self.state.bound_item_key = None;
        self.state.pending_bind_key = None;
        self.state.is_playing = false;
        self.pending_local_pauses = 0;
        error
    }

    pub fn on_progress(&mut self, current_time_seconds: f64, duration_seconds: f64) {
        self.state.current_time_seconds = current_time_seconds.max(0.0);
        self.state.duration_seconds = duration_seconds.max(0.0);
    }

    /// Reads progress straight from the player while it is ready.
    pub fn sample_progress(&mut self) {
        if self.state.is_player_ready && self.state.bound_item_key.is_some() {
            let current = self.host.current_time();
            let duration = self.host.duration();
            self.on_progress(current, duration);
        }
    }

    /// Flips mute. Returns the new muted state.
    pub fn toggle_mute(&mut self) -> Result<bool, PlayerWarning> {
        if !self.state.is_player_ready {
            return Err(PlayerWarning::NotReady);
        }
        if self.host.is_muted() {
            self.host.unmute();
        } else {
            self.host.mute();
        }
        self.state.is_muted = self.host.is_muted();
        Ok(self.state.is_muted)
    }

    /// Seeks the player, clamped to the known duration. Returns the target.
    pub fn seek(&mut self, seconds: f64) -> Result<f64, PlayerWarning> {
        if !self.state.is_player_ready {
            return Err(PlayerWarning::NotReady);
        }
        let mut target = seconds.max(0.0);
        if self.state.duration_seconds > 0.0 {
            target = target.min(self.state.duration_seconds);
        }
        self.host.seek_to(target);
        self.state.current_time_seconds = target;
        Ok(target)
    }

    /// Moves every held key through `relocate`. A `None` result means the row
    /// no longer exists: a bound row stops playback, other holders are dropped.
    /// Returns true when the bound row was removed.
    pub fn relocate_keys<F>(&mut self, mut relocate: F) -> bool
    where
        F: FnMut(&ItemKey) -> Option<ItemKey>,
    {
        self.state.pending_bind_key = self.state.pending_bind_key.as_ref().and_then(&mut relocate);
        self.toggle_debouncer.retain_map(|key| relocate(&key));

        let Some(bound) = self.state.bound_item_key.clone() else {
            return false;
        };
        match relocate(&bound) {
            Some(moved) => {
                if moved != bound {
                    debug!("PlayerController: binding moved {} -> {}", bound, moved);
                }
                self.state.bound_item_key = Some(moved);
                false
            }
            None => {
                info!("PlayerController: bound row {} removed, stopping", bound);
                self.stop();
                true
            }
        }
    }

    /// Pauses and releases any binding.
    pub fn stop(&mut self) {
        if self.state.bound_item_key.is_some() {
            self.pause_bound();
        }
        self.state.bound_item_key = None;
        self.state.is_playing = false;
    }

    /// Tears the player down on unmount.
    pub fn teardown(&mut self) {
        self.toggle_debouncer.cancel();
        self.host.destroy();
        self.state = PlaybackState::default();
        self.pending_local_pauses = 0;
        debug!("PlayerController: torn down");
    }

    fn pause_bound(&mut self) {
        if self.state.is_playing {
            self.host.pause();
            self.pending_local_pauses += 1;
        }
        self.state.bound_item_key = None;
        self.state.is_playing = false;
    }
}
