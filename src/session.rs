//! Mounted setlist session.
//!
//! Owns the ordered list, selections, drag controller, the single player and
//! the reference label cache for one mount. All mutations go through here so
//! the player binding can be re-validated after every change to the list.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};
use uuid::Uuid;

use crate::db_manager::SetlistStore;
use crate::drag::{DragOutcome, DragReorderController, PointerKind, PointerPoint};
use crate::player::{
    EmbeddedPlayerHost, ExternalPlayerState, MediaRequest, PlaybackState, PlayerController,
    ToggleOutcome,
};
use crate::protocol::{
    Message, Notification, PersistedEntry, PlaybackMessage, ReferenceMessage, SessionMessage,
    SetlistMessage, SetlistRow,
};
use crate::reference_labels::{LookupTitle, ReferenceLabel, ReferenceLabelResolver};
use crate::selection::{SelectionError, SelectionStore};
use crate::setlist::{EntryId, ItemKey, RemoveError, Setlist, SetlistEntry};
use crate::song::{Locale, Song};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("setlist is not mounted")]
    NotMounted,
    #[error("song {0} is not in this setlist")]
    UnknownSong(String),
    #[error(transparent)]
    Remove(#[from] RemoveError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("setlist storage failed: {0}")]
    Store(String),
}

/// Per-mount settings supplied by the shell.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub setlist_id: String,
    pub setlist_name: String,
    pub locale: Locale,
    pub lookup_enabled: bool,
}

pub struct SetlistSession<H: EmbeddedPlayerHost> {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    settings: SessionSettings,
    setlist: Setlist,
    selections: SelectionStore,
    drag: DragReorderController,
    player: PlayerController<H>,
    labels: ReferenceLabelResolver,
    lookups_in_flight: HashSet<Vec<String>>,
    store: Option<Box<dyn SetlistStore>>,
    generation: Option<Uuid>,
    last_playback_state: Option<PlaybackState>,
}

impl<H: EmbeddedPlayerHost> SetlistSession<H> {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        setlist: Setlist,
        player: PlayerController<H>,
        drag: DragReorderController,
        settings: SessionSettings,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            settings,
            setlist,
            selections: SelectionStore::new(),
            drag,
            player,
            labels: ReferenceLabelResolver::new(),
            lookups_in_flight: HashSet::new(),
            store: None,
            generation: None,
            last_playback_state: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn SetlistStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn setlist(&self) -> &Setlist {
        &self.setlist
    }

    pub fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    pub fn player(&self) -> &PlayerController<H> {
        &self.player
    }

    pub fn drag(&self) -> &DragReorderController {
        &self.drag
    }

    pub fn generation(&self) -> Option<Uuid> {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.generation.is_some()
    }

    /// Starts a mount. Callbacks tagged with any other generation are ignored.
    pub fn mount(&mut self, generation: Uuid) {
        info!(
            "SetlistSession: mounted setlist {} ({} rows, generation {})",
            self.settings.setlist_id,
            self.setlist.len(),
            generation
        );
        self.generation = Some(generation);
        self.last_playback_state = None;
        for entry in self.setlist.entries() {
            self.selections.ensure(entry.song());
        }
        self.publish_rows();
        self.publish_playback_state();
    }

    /// Tears down the player and drops every in-flight request.
    pub fn unmount(&mut self) {
        let Some(generation) = self.generation.take() else {
            return;
        };
        self.drag.cancel();
        self.player.teardown();
        self.lookups_in_flight.clear();
        self.labels.clear();
        info!("SetlistSession: unmounted generation {}", generation);
    }

    pub fn run(&mut self) {
        while self.is_mounted() {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message, Instant::now()),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "SetlistSession: bus lagged, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.unmount();
    }

    pub fn handle_message(&mut self, message: Message, now: Instant) {
        if !self.is_mounted() {
            trace!("SetlistSession: ignoring message while unmounted");
            return;
        }
        match message {
            Message::Setlist(message) => self.handle_setlist_message(message, now),
            Message::Playback(message) => self.handle_playback_message(message, now),
            Message::Reference(message) => self.handle_reference_message(message),
            Message::Session(SessionMessage::Tick) => self.tick(now),
            Message::Session(SessionMessage::Unmount) => self.unmount(),
            Message::Session(SessionMessage::Notification(_)) => {}
        }
    }

    fn handle_setlist_message(&mut self, message: SetlistMessage, now: Instant) {
        match message {
            SetlistMessage::RemoveEntry(index) => {
                if let Err(err) = self.remove_entry(index) {
                    self.notify(Notification::error(err.to_string()));
                }
            }
            SetlistMessage::PointerDown { index, kind, point } => {
                self.pointer_down(index, kind, point, now);
            }
            SetlistMessage::PointerMove { over_index, point } => {
                self.pointer_move(over_index, point, now);
            }
            SetlistMessage::PointerUp => {
                self.pointer_up();
            }
            SetlistMessage::PointerCancel => self.drag.cancel(),
            SetlistMessage::SelectVariant {
                song_id,
                variant_key,
            } => {
                if let Err(err) = self.select_variant(&song_id, &variant_key) {
                    self.notify(Notification::warning(err.to_string()));
                }
            }
            SetlistMessage::SelectReference { song_id, url } => {
                if let Err(err) = self.select_reference(&song_id, &url) {
                    self.notify(Notification::warning(err.to_string()));
                }
            }
            SetlistMessage::SaveRequested => match self.save() {
                Ok(rows) => self.notify(Notification::info(format!("Saved {} songs", rows))),
                Err(err) => self.notify(Notification::error(err.to_string())),
            },
            SetlistMessage::RowTapped(_)
            | SetlistMessage::RowsChanged(_)
            | SetlistMessage::Saved { .. } => {}
        }
    }

    fn handle_playback_message(&mut self, message: PlaybackMessage, now: Instant) {
        match message {
            PlaybackMessage::TogglePlay(index) => self.request_play_toggle(index, now),
            PlaybackMessage::ToggleMute => self.toggle_mute(),
            PlaybackMessage::Seek(seconds) => self.seek(seconds),
            PlaybackMessage::PlayerReady { generation } => {
                if self.is_current(generation, "player ready") {
                    self.on_player_ready();
                }
            }
            PlaybackMessage::PlayerStateChanged { generation, code } => {
                if self.is_current(generation, "player state") {
                    self.on_player_state_changed(code);
                }
            }
            PlaybackMessage::PlayerError { generation, code } => {
                if self.is_current(generation, "player error") {
                    self.on_player_error(code);
                }
            }
            PlaybackMessage::Progress {
                generation,
                current_time_seconds,
                duration_seconds,
            } => {
                if self.is_current(generation, "progress") {
                    self.player
                        .on_progress(current_time_seconds, duration_seconds);
                    self.publish_playback_state();
                }
            }
            PlaybackMessage::StateChanged(_) => {}
        }
    }

    fn handle_reference_message(&mut self, message: ReferenceMessage) {
        match message {
            ReferenceMessage::LabelsRequested { song_id } => self.request_labels(&song_id),
            ReferenceMessage::LookupFinished {
                generation,
                song_id,
                urls,
                result,
            } => self.on_lookup_finished(generation, &song_id, &urls, &result),
            ReferenceMessage::LookupRequested { .. } | ReferenceMessage::LabelsResolved { .. } => {}
        }
    }

    fn is_current(&self, generation: Uuid, what: &str) -> bool {
        if self.generation == Some(generation) {
            return true;
        }
        debug!(
            "SetlistSession: dropping {} from stale generation {}",
            what, generation
        );
        false
    }

    /// Removes the row at `index`. A removed bound row stops playback; the
    /// song's selection is discarded once no occurrence of it remains.
    pub fn remove_entry(&mut self, index: usize) -> Result<SetlistEntry, SessionError> {
        self.ensure_mounted()?;
        self.drag.cancel();
        let before = self.row_identities();
        let removed = self.setlist.remove(index).map_err(|err| {
            error!("SetlistSession: {}", err);
            err
        })?;

        if self.relocate_after_mutation(&before) {
            info!(
                "SetlistSession: playback stopped, bound row {} was removed",
                removed.song().id
            );
        }
        let song_id = &removed.song().id;
        if !self.setlist.contains_song(song_id) && self.selections.discard(song_id) {
            debug!("SetlistSession: discarded selection for song {}", song_id);
        }
        self.publish_rows();
        self.publish_playback_state();
        Ok(removed)
    }

    pub fn pointer_down(&mut self, index: usize, kind: PointerKind, point: PointerPoint, now: Instant) {
        self.drag
            .pointer_down(index, kind, point, now, self.setlist.len());
    }

    pub fn pointer_move(&mut self, over_index: Option<usize>, point: PointerPoint, now: Instant) {
        self.drag
            .pointer_move(over_index, point, now, self.setlist.len());
    }

    /// Ends the gesture, committing at most one reorder.
    pub fn pointer_up(&mut self) -> DragOutcome {
        let before = self.row_identities();
        let outcome = self.drag.pointer_up(&mut self.setlist);
        match &outcome {
            DragOutcome::Committed { .. } => {
                self.relocate_after_mutation(&before);
                self.publish_rows();
                self.publish_playback_state();
            }
            DragOutcome::Tap { index } => {
                let _ = self
                    .bus_producer
                    .send(Message::Setlist(SetlistMessage::RowTapped(*index)));
            }
            DragOutcome::Rejected(err) => {
                self.notify(Notification::error(format!("Could not reorder: {}", err)));
            }
            DragOutcome::NoChange => {}
        }
        outcome
    }

    pub fn request_play_toggle(&mut self, index: usize, now: Instant) {
        match self.setlist.key_at(index) {
            Some(key) => self.player.request_play_toggle(key, now),
            None => warn!(
                "SetlistSession: play toggle for row {} ignored, setlist has {} rows",
                index,
                self.setlist.len()
            ),
        }
    }

    /// Fires due debounced toggles, activates held touches and samples progress.
    pub fn tick(&mut self, now: Instant) {
        if let Some(key) = self.player.take_due_toggle(now) {
            self.apply_toggle(key);
        }
        if self.drag.tick(now) {
            debug!(
                "SetlistSession: touch drag activated on row {:?}",
                self.drag.dragging_index()
            );
        }
        self.player.sample_progress();
        self.publish_playback_state();
    }

    fn apply_toggle(&mut self, key: ItemKey) {
        let Some(song) = self.setlist.song_for_key(&key) else {
            debug!("SetlistSession: toggle for stale row {} dropped", key);
            return;
        };
        let selection = self.selections.current(song);
        let media = MediaRequest {
            selected_reference_url: &selection.selected_reference_url,
            reference_links: &song.reference_links,
        };
        let result = self.player.toggle_now(key, media);
        match result {
            Ok(ToggleOutcome::Started {
                key,
                stayed_muted: true,
                ..
            }) => {
                self.notify(Notification::warning(format!(
                    "Playback of {} started muted; unmute to hear it",
                    key
                )));
            }
            Ok(ToggleOutcome::Deferred { key }) => {
                debug!("SetlistSession: {} waits for the player", key);
            }
            Ok(_) => {}
            Err(err) => self.notify(Notification::error(err.to_string())),
        }
        self.publish_rows();
        self.publish_playback_state();
    }

    fn on_player_ready(&mut self) {
        if let Some(pending) = self.player.on_player_ready() {
            self.apply_toggle(pending);
        }
        self.publish_playback_state();
    }

    fn on_player_state_changed(&mut self, code: i32) {
        if self
            .player
            .on_external_state_change(ExternalPlayerState::from_code(code))
        {
            self.publish_rows();
        }
        self.publish_playback_state();
    }

    fn on_player_error(&mut self, code: i32) {
        let err = self.player.on_external_error(code);
        self.notify(Notification::error(err.to_string()));
        self.publish_rows();
        self.publish_playback_state();
    }

    pub fn toggle_mute(&mut self) {
        match self.player.toggle_mute() {
            Ok(muted) => {
                debug!("SetlistSession: muted={}", muted);
                self.publish_playback_state();
            }
            Err(warning) => self.notify(Notification::warning(warning.to_string())),
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        match self.player.seek(seconds) {
            Ok(target) => {
                debug!("SetlistSession: seeked to {:.1}s", target);
                self.publish_playback_state();
            }
            Err(warning) => self.notify(Notification::warning(warning.to_string())),
        }
    }

    pub fn select_variant(&mut self, song_id: &str, variant_key: &str) -> Result<(), SessionError> {
        let song = find_song(&self.setlist, song_id)?;
        self.selections.select_variant(song, variant_key)?;
        self.publish_rows();
        Ok(())
    }

    /// Changes the playback reference. A currently playing row keeps its
    /// media until toggled again.
    pub fn select_reference(&mut self, song_id: &str, url: &str) -> Result<(), SessionError> {
        let song = find_song(&self.setlist, song_id)?;
        self.selections.select_reference(song, url)?;
        self.publish_rows();
        Ok(())
    }

    pub fn selected_file_location(&self, song_id: &str) -> Option<String> {
        let song = find_song(&self.setlist, song_id).ok()?;
        self.selections
            .selected_file_location(song)
            .map(ToOwned::to_owned)
    }

    /// Publishes labels for the song's media links, from cache when possible.
    pub fn request_labels(&mut self, song_id: &str) {
        let Some(generation) = self.generation else {
            return;
        };
        let urls = match find_song(&self.setlist, song_id) {
            Ok(song) => song.media_links(),
            Err(err) => {
                warn!("SetlistSession: label request failed: {}", err);
                return;
            }
        };
        if urls.is_empty() {
            self.publish_labels(song_id, Vec::new());
            return;
        }
        if let Some(cached) = self.labels.cached(&urls) {
            let labels = cached.to_vec();
            self.publish_labels(song_id, labels);
            return;
        }
        if !self.settings.lookup_enabled {
            let labels = self
                .labels
                .complete(song_id, &urls, &Err("title lookup disabled".to_string()));
            self.publish_labels(song_id, labels);
            return;
        }
        if !self.lookups_in_flight.insert(urls.clone()) {
            trace!("SetlistSession: lookup for {} already in flight", song_id);
            return;
        }
        let _ = self
            .bus_producer
            .send(Message::Reference(ReferenceMessage::LookupRequested {
                generation,
                song_id: song_id.to_string(),
                urls,
            }));
    }

    fn on_lookup_finished(
        &mut self,
        generation: Uuid,
        song_id: &str,
        urls: &[String],
        result: &Result<Vec<LookupTitle>, String>,
    ) {
        if !self.is_current(generation, "lookup result") {
            return;
        }
        self.lookups_in_flight.remove(urls);
        let labels = self.labels.complete(song_id, urls, result);
        self.publish_labels(song_id, labels);
    }

    pub fn rows(&self) -> Vec<SetlistRow> {
        let bound = self.player.state().bound_item_key.as_ref();
        self.setlist
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let song = entry.song();
                let selection = self.selections.current(song);
                let key = ItemKey::new(song.id.clone(), index);
                SetlistRow {
                    is_bound: bound == Some(&key),
                    key,
                    title: song.display_title(self.settings.locale).to_string(),
                    duplicate_label: self.setlist.duplicate_label_at(index),
                    selected_variant_key: selection.selected_variant_key,
                    selected_reference_url: selection.selected_reference_url,
                }
            })
            .collect()
    }

    pub fn persisted_entries(&self) -> Vec<PersistedEntry> {
        self.setlist
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let selection = self.selections.current(entry.song());
                PersistedEntry {
                    song_id: entry.song().id.clone(),
                    position,
                    selected_variant_key: selection.selected_variant_key,
                    selected_reference_url: selection.selected_reference_url,
                }
            })
            .collect()
    }

    /// Writes the current order and selections to the store.
    pub fn save(&mut self) -> Result<usize, SessionError> {
        let entries = self.persisted_entries();
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| SessionError::Store("no setlist store configured".to_string()))?;
        store
            .save_setlist(
                &self.settings.setlist_id,
                &self.settings.setlist_name,
                &entries,
            )
            .map_err(SessionError::Store)?;
        info!(
            "SetlistSession: saved {} rows of setlist {}",
            entries.len(),
            self.settings.setlist_id
        );
        let _ = self.bus_producer.send(Message::Setlist(SetlistMessage::Saved {
            setlist_id: self.settings.setlist_id.clone(),
            rows: entries.len(),
        }));
        Ok(entries.len())
    }

    /// Replaces the setlist with the stored one. Rows naming songs missing
    /// from `catalog` are dropped; invalid selections fall back to defaults.
    pub fn restore(&mut self, catalog: &[Song]) -> Result<usize, SessionError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SessionError::Store("no setlist store configured".to_string()))?;
        let rows = store
            .load_setlist(&self.settings.setlist_id)
            .map_err(SessionError::Store)?;

        let mut songs = Vec::with_capacity(rows.len());
        for row in &rows {
            match catalog.iter().find(|song| song.id == row.song_id) {
                Some(song) => songs.push(song.clone()),
                None => warn!(
                    "SetlistSession: dropping stored row {} for unknown song {}",
                    row.position, row.song_id
                ),
            }
        }

        self.drag.cancel();
        // Keys from the replaced setlist do not carry over, queued toggles included.
        self.player.relocate_keys(|_| None);
        self.setlist = Setlist::from_songs(songs);
        self.selections = SelectionStore::new();
        for row in &rows {
            let Ok(song) = find_song(&self.setlist, &row.song_id) else {
                continue;
            };
            if let Err(err) = self
                .selections
                .select_variant(song, &row.selected_variant_key)
            {
                warn!("SetlistSession: stored selection ignored: {}", err);
            }
            if let Err(err) = self
                .selections
                .select_reference(song, &row.selected_reference_url)
            {
                warn!("SetlistSession: stored selection ignored: {}", err);
            }
        }
        for entry in self.setlist.entries() {
            self.selections.ensure(entry.song());
        }

        info!(
            "SetlistSession: restored {} of {} stored rows",
            self.setlist.len(),
            rows.len()
        );
        self.publish_rows();
        self.publish_playback_state();
        Ok(self.setlist.len())
    }

    fn ensure_mounted(&self) -> Result<(), SessionError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(SessionError::NotMounted)
        }
    }

    fn row_identities(&self) -> Vec<(EntryId, String)> {
        self.setlist
            .entries()
            .iter()
            .map(|entry| (entry.entry_id(), entry.song().id.clone()))
            .collect()
    }

    /// Moves player-held keys to their entries' new positions. Returns true
    /// when the bound row no longer exists.
    fn relocate_after_mutation(&mut self, before: &[(EntryId, String)]) -> bool {
        let setlist = &self.setlist;
        self.player.relocate_keys(|key| {
            let (entry_id, song_id) = before.get(key.position)?;
            if *song_id != key.song_id {
                return None;
            }
            setlist.key_of(*entry_id)
        })
    }

    fn publish_rows(&self) {
        let _ = self
            .bus_producer
            .send(Message::Setlist(SetlistMessage::RowsChanged(self.rows())));
    }

    fn publish_playback_state(&mut self) {
        let state = self.player.state();
        if self.last_playback_state.as_ref() == Some(state) {
            return;
        }
        self.last_playback_state = Some(state.clone());
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::StateChanged(state.clone())));
    }

    fn publish_labels(&self, song_id: &str, labels: Vec<ReferenceLabel>) {
        let _ = self
            .bus_producer
            .send(Message::Reference(ReferenceMessage::LabelsResolved {
                song_id: song_id.to_string(),
                labels,
            }));
    }

    fn notify(&self, notification: Notification) {
        let _ = self
            .bus_producer
            .send(Message::Session(SessionMessage::Notification(notification)));
    }
}

fn find_song<'a>(setlist: &'a Setlist, song_id: &str) -> Result<&'a Song, SessionError> {
    setlist
        .entries()
        .iter()
        .map(SetlistEntry::song)
        .find(|song| song.id == song_id)
        .ok_or_else(|| SessionError::UnknownSong(song_id.to_string()))
}
