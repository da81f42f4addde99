use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serenity::model::id::{GuildId, UserId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{EngineError, QueueError, QueueResult};
use super::manager::QueueOptions;
use super::play_order;
use super::store::QueueStore;
use super::types::{LoopMode, QueueEntry, QueueOrder, QueueSettings, QueueSnapshot, TrackType};
use crate::playback::{Announcement, EngineEvent, EngineEventKind, PlaybackController, TrackRef};

/// One guild's queue: the in-memory copy of its persisted rows plus the
/// live playback state.
///
/// Every mutation writes through to the store before touching memory, so
/// a failed write leaves both views as they were. Instances are only
/// reachable through [`super::QueueManager`], which serializes access.
pub struct GuildQueue {
    guild_id: GuildId,
    settings: QueueSettings,
    entries: Vec<QueueEntry>,
    /// Ref of the play command the engine is currently running for us.
    now_playing: Option<TrackRef>,
    paused: bool,
    /// The current track's start has been announced.
    announced: bool,
    /// The next end event was caused by `skip`.
    skip_requested: bool,
    consecutive_errors: u32,
    store: Arc<dyn QueueStore>,
    controller: PlaybackController,
    options: QueueOptions,
    last_active: Instant,
    evicted: bool,
}

impl GuildQueue {
    /// Rebuild the queue from whatever the store holds for `guild_id`.
    pub fn load(
        guild_id: GuildId,
        store: Arc<dyn QueueStore>,
        controller: PlaybackController,
        options: QueueOptions,
    ) -> QueueResult<Self> {
        let stored = store.load(guild_id)?;
        let mut settings = stored
            .settings
            .unwrap_or_else(|| QueueSettings::defaults(guild_id, options.default_volume));

        let position = match (settings.position, stored.entries.len()) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(p), len) => Some(p.min(len - 1)),
        };
        if position != settings.position {
            warn!(
                "Guild {} stored position {:?} does not fit {} entries, using {:?}",
                guild_id,
                settings.position,
                stored.entries.len(),
                position
            );
            settings.position = position;
            store.save_settings(&settings)?;
        }

        info!(
            "Loaded queue for guild {}: {} entries, position {:?}",
            guild_id,
            stored.entries.len(),
            settings.position
        );

        Ok(Self {
            guild_id,
            settings,
            entries: stored.entries,
            now_playing: None,
            paused: false,
            announced: false,
            skip_requested: false,
            consecutive_errors: 0,
            store,
            controller,
            options,
            last_active: Instant::now(),
            evicted: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.now_playing.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            settings: self.settings.clone(),
            entries: self.entries.clone(),
            playing: self.is_playing(),
            paused: self.paused,
        }
    }

    /// Append a track. Starts playing it right away when nothing is playing.
    /// Returns the entry's index.
    pub async fn enqueue(
        &mut self,
        requester: UserId,
        source: TrackType,
        identifier: impl Into<String>,
    ) -> QueueResult<usize> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(QueueError::Validation("track identifier is empty".into()));
        }

        if self.entries.len() >= self.options.max_queue_size {
            return Err(QueueError::Validation(format!(
                "the queue is full ({} tracks)",
                self.options.max_queue_size
            )));
        }

        let entry = QueueEntry::new(requester, source, identifier);
        let index = self.entries.len();
        let idle = !self.is_playing();

        let mut settings = self.settings.clone();
        if idle {
            settings.position = Some(index);
        }
        self.store.append_entry(&settings, index, &entry)?;

        info!(
            "Guild {} queued {} at {} (requested by {})",
            self.guild_id, entry.identifier, index, requester
        );
        self.entries.push(entry);
        self.settings = settings;

        if idle {
            self.start_playback().await?;
        }
        Ok(index)
    }

    /// Remove the entry at `index`. Removing the playing entry moves on to
    /// whatever would have played next.
    pub async fn remove_at(&mut self, index: usize) -> QueueResult<QueueEntry> {
        let len = self.entries.len();
        if index >= len {
            return Err(QueueError::NotFound { index, len });
        }
        if len == 1 {
            let removed = self.entries[0].clone();
            self.reset(true).await?;
            info!("Guild {} removed {}, queue is now empty", self.guild_id, removed.identifier);
            return Ok(removed);
        }

        let current = self.settings.position.unwrap_or(0);
        let playing = self.is_playing();
        let mut settings = self.settings.clone();
        let mut restart = false;
        let mut halt = false;

        if index < current {
            settings.position = Some(current - 1);
        } else if index == current {
            if playing {
                match play_order::next_index(
                    len,
                    current,
                    self.settings.order,
                    self.settings.loop_mode.moving_on(),
                ) {
                    Some(next) => {
                        settings.position = Some(if next > index { next - 1 } else { next });
                        restart = true;
                    }
                    None => {
                        // Nothing left to move on to; the rest stays queued.
                        settings.position = Some(index.min(len - 2));
                        halt = true;
                    }
                }
            } else {
                settings.position = Some(current.min(len - 2));
            }
        }

        self.store.remove_entry(&settings, index)?;
        let removed = self.entries.remove(index);
        self.settings = settings;
        info!(
            "Guild {} removed {} from {}, position now {:?}",
            self.guild_id, removed.identifier, index, self.settings.position
        );

        if restart || halt {
            // The engine will not report an end for a track stopped here.
            self.drop_track();
            self.skip_requested = false;
            if let Err(e) = self.controller.stop(self.guild_id).await {
                warn!("Guild {} failed to stop removed track: {}", self.guild_id, e);
            }
        }
        if restart {
            self.start_playback().await?;
        }
        Ok(removed)
    }

    /// Drop every entry, reset settings, stop playback and leave voice.
    pub async fn clear(&mut self) -> QueueResult<usize> {
        let removed = self.entries.len();
        self.end_session().await?;
        info!("Guild {} cleared {} entries", self.guild_id, removed);
        Ok(removed)
    }

    pub fn set_order(&mut self, order: QueueOrder) -> QueueResult<()> {
        let mut settings = self.settings.clone();
        settings.order = order;
        self.store.save_settings(&settings)?;
        self.settings = settings;
        info!("Guild {} order set to {}", self.guild_id, order);
        Ok(())
    }

    pub fn set_loop(&mut self, loop_mode: LoopMode) -> QueueResult<()> {
        let mut settings = self.settings.clone();
        settings.loop_mode = loop_mode;
        self.store.save_settings(&settings)?;
        self.settings = settings;
        info!("Guild {} loop set to {}", self.guild_id, loop_mode);
        Ok(())
    }

    /// Set the volume in percent. Applies to the playing track immediately.
    pub async fn set_volume(&mut self, volume: i64) -> QueueResult<()> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or_else(|| QueueError::Validation(format!("volume {volume} is not within 0-100")))?;

        let mut settings = self.settings.clone();
        settings.volume = volume;
        self.store.save_settings(&settings)?;
        self.settings = settings;
        info!("Guild {} volume set to {}%", self.guild_id, volume);

        if self.is_playing() {
            if let Err(e) = self.controller.set_volume(self.guild_id, volume).await {
                // Saved anyway; the next track starts at the new volume.
                warn!(
                    "Guild {} could not apply volume to the playing track: {}",
                    self.guild_id, e
                );
            }
        }
        Ok(())
    }

    /// End the current track early. The engine's end event does the advancing.
    pub async fn skip(&mut self) -> QueueResult<()> {
        if !self.is_playing() {
            return Err(QueueError::NothingPlaying);
        }
        self.skip_requested = true;
        if let Err(e) = self.controller.stop(self.guild_id).await {
            self.skip_requested = false;
            return Err(e.into());
        }
        debug!("Guild {} skip requested", self.guild_id);
        Ok(())
    }

    /// Play the entry at `index` right away.
    pub async fn jump(&mut self, index: usize) -> QueueResult<()> {
        let len = self.entries.len();
        if index >= len {
            return Err(QueueError::NotFound { index, len });
        }

        let mut settings = self.settings.clone();
        settings.position = Some(index);
        self.store.save_settings(&settings)?;
        self.settings = settings;

        if self.now_playing.is_some() {
            self.drop_track();
            self.skip_requested = false;
            if let Err(e) = self.controller.stop(self.guild_id).await {
                warn!("Guild {} failed to stop before jump: {}", self.guild_id, e);
            }
        }
        info!("Guild {} jumping to {}", self.guild_id, index);
        self.start_playback().await.map(|_| ())
    }

    pub async fn pause(&mut self) -> QueueResult<()> {
        if !self.is_playing() {
            return Err(QueueError::NothingPlaying);
        }
        if self.paused {
            return Err(QueueError::AlreadyPaused);
        }
        self.controller.pause(self.guild_id).await?;
        self.paused = true;
        info!("Guild {} paused", self.guild_id);
        Ok(())
    }

    /// Continue a paused track, or start playing from the stored position
    /// when nothing is playing (e.g. after a restart).
    pub async fn resume(&mut self) -> QueueResult<()> {
        if self.paused {
            self.controller.unpause(self.guild_id).await?;
            self.paused = false;
            info!("Guild {} unpaused", self.guild_id);
            return Ok(());
        }
        if self.entries.is_empty() {
            return Err(QueueError::Empty);
        }
        if self.is_playing() {
            return Err(QueueError::NotPaused);
        }
        self.start_playback().await.map(|_| ())
    }

    /// Stop the engine but keep the queue and position, for leaving voice.
    pub async fn halt(&mut self) {
        self.skip_requested = false;
        if self.now_playing.is_some() {
            self.drop_track();
            if let Err(e) = self.controller.stop(self.guild_id).await {
                debug!("Guild {} stop on halt failed: {}", self.guild_id, e);
            }
        }
    }

    /// Randomly permute the entries. The playing entry stays current.
    pub fn shuffle(&mut self) -> QueueResult<()> {
        let len = self.entries.len();
        if len < 2 {
            return Ok(());
        }

        let mut permutation: Vec<usize> = (0..len).collect();
        permutation.shuffle(&mut rand::thread_rng());

        let entries: Vec<QueueEntry> = permutation
            .iter()
            .map(|&i| self.entries[i].clone())
            .collect();
        let mut settings = self.settings.clone();
        settings.position = self
            .settings
            .position
            .and_then(|current| permutation.iter().position(|&i| i == current));

        self.store.replace_entries(&settings, &entries)?;
        self.entries = entries;
        self.settings = settings;
        info!("Guild {} shuffled {} entries", self.guild_id, len);
        Ok(())
    }

    /// React to an engine notification for this guild. Returns what the
    /// guild's listeners should hear about it, if anything.
    pub async fn handle_event(
        &mut self,
        event: EngineEvent,
    ) -> QueueResult<Option<Announcement>> {
        if self.now_playing != Some(event.track) {
            debug!(
                "Guild {} ignoring {:?} for stale track {:?} (current {:?})",
                self.guild_id, event.kind, event.track, self.now_playing
            );
            return Ok(None);
        }

        match event.kind {
            EngineEventKind::Started => {
                self.consecutive_errors = 0;
                // Unpausing restarts the track too.
                if std::mem::replace(&mut self.announced, true) {
                    return Ok(None);
                }
                let current = self.settings.position.and_then(|p| self.entries.get(p));
                Ok(current.cloned().map(Announcement::NowPlaying))
            }
            EngineEventKind::Ended => self.advance(false).await,
            EngineEventKind::Errored => {
                warn!("Guild {} track {:?} errored", self.guild_id, event.track);
                self.consecutive_errors += 1;
                if self.consecutive_errors > self.options.max_consecutive_errors {
                    return self.give_up().await;
                }
                self.advance(true).await
            }
        }
    }

    /// Move past the track that just finished and start the next one.
    async fn advance(&mut self, errored: bool) -> QueueResult<Option<Announcement>> {
        self.drop_track();
        let skipped = std::mem::take(&mut self.skip_requested);
        let Some(current) = self.settings.position else {
            return Ok(None);
        };

        let loop_mode = if skipped || errored {
            self.settings.loop_mode.moving_on()
        } else {
            self.settings.loop_mode
        };
        if self.step(current, loop_mode)? {
            self.start_playback().await
        } else {
            self.end_session().await?;
            Ok(Some(Announcement::Finished))
        }
    }

    /// Point `position` at the entry after `from`. Returns `false` when the
    /// queue is exhausted; nothing is written in that case.
    fn step(&mut self, from: usize, loop_mode: LoopMode) -> QueueResult<bool> {
        let Some(next) =
            play_order::next_index(self.entries.len(), from, self.settings.order, loop_mode)
        else {
            info!("Guild {} reached the end of the queue", self.guild_id);
            return Ok(false);
        };

        let mut settings = self.settings.clone();
        settings.position = Some(next);
        self.store.save_settings(&settings)?;
        self.settings = settings;
        Ok(true)
    }

    /// Hand the current entry to the engine. Entries the engine rejects
    /// count as errored tracks and are stepped over. A missing voice
    /// connection is returned untouched; the queue stays as it is.
    async fn start_playback(&mut self) -> QueueResult<Option<Announcement>> {
        loop {
            let Some(index) = self.settings.position else {
                return Ok(None);
            };
            let Some(entry) = self.entries.get(index) else {
                return Ok(None);
            };

            let result = self
                .controller
                .play(self.guild_id, entry, self.settings.volume)
                .await;
            match result {
                Ok(track) => {
                    self.now_playing = Some(track);
                    self.paused = false;
                    self.announced = false;
                    return Ok(None);
                }
                Err(e) if e.is_connection_loss() => {
                    warn!("Guild {} cannot play entry {}: {}", self.guild_id, index, e);
                    self.drop_track();
                    return Err(e.into());
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    warn!(
                        "Guild {} engine refused entry {}: {} ({} in a row)",
                        self.guild_id, index, e, self.consecutive_errors
                    );
                    if self.consecutive_errors > self.options.max_consecutive_errors {
                        return self.give_up().await;
                    }
                    if !self.step(index, self.settings.loop_mode.moving_on())? {
                        self.end_session().await?;
                        return Ok(Some(Announcement::Finished));
                    }
                }
            }
        }
    }

    async fn give_up<T>(&mut self) -> QueueResult<T> {
        let errors = self.consecutive_errors;
        warn!(
            "Guild {} hit {} consecutive track errors, clearing the queue",
            self.guild_id, errors
        );
        self.end_session().await?;
        Err(QueueError::SessionFailed { errors })
    }

    /// Reset the queue and leave voice.
    async fn end_session(&mut self) -> QueueResult<()> {
        self.reset(true).await?;
        match self.controller.disconnect(self.guild_id).await {
            Ok(()) | Err(EngineError::NotConnected) => {}
            Err(e) => warn!("Guild {} failed to leave voice: {}", self.guild_id, e),
        }
        Ok(())
    }

    fn drop_track(&mut self) {
        self.now_playing = None;
        self.paused = false;
        self.announced = false;
    }

    /// Empty the queue and restore default settings.
    async fn reset(&mut self, stop_engine: bool) -> QueueResult<()> {
        let defaults = QueueSettings::defaults(self.guild_id, self.options.default_volume);
        self.store.clear(&defaults)?;

        self.entries.clear();
        self.settings = defaults;
        self.skip_requested = false;
        self.consecutive_errors = 0;
        let was_playing = self.now_playing.is_some();
        self.drop_track();

        if stop_engine && was_playing {
            if let Err(e) = self.controller.stop(self.guild_id).await {
                warn!("Guild {} failed to stop playback: {}", self.guild_id, e);
            }
        }
        Ok(())
    }

    pub(super) fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub(super) fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Nothing queued and nothing playing.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.now_playing.is_none()
    }

    pub(super) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub(super) fn is_evicted(&self) -> bool {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::establish_connection;
    use crate::playback::AudioEngine;
    use crate::playback::testing::{EngineCall, MockEngine};
    use serenity::model::id::ChannelId;
    use crate::queue::store::{SqliteQueueStore, testing::FlakyStore};

    const GUILD: GuildId = GuildId::new(99);

    fn options() -> QueueOptions {
        QueueOptions {
            default_volume: 100,
            max_consecutive_errors: 3,
            idle_timeout: Duration::from_secs(600),
            max_queue_size: 50,
        }
    }

    fn user() -> UserId {
        UserId::new(11)
    }

    struct Harness {
        store: Arc<FlakyStore>,
        engine: Arc<MockEngine>,
    }

    impl Harness {
        fn new() -> Self {
            let conn = establish_connection(":memory:").unwrap();
            Self {
                store: Arc::new(FlakyStore::new(SqliteQueueStore::new(conn))),
                engine: MockEngine::new(),
            }
        }

        fn queue(&self) -> GuildQueue {
            self.queue_with(options())
        }

        fn queue_with(&self, options: QueueOptions) -> GuildQueue {
            GuildQueue::load(
                GUILD,
                self.store.clone(),
                PlaybackController::new(self.engine.clone()),
                options,
            )
            .unwrap()
        }

        fn positions(&self) -> Vec<i32> {
            self.store.inner.stored_positions(GUILD)
        }

        fn event(&self, kind: EngineEventKind) -> EngineEvent {
            EngineEvent {
                guild_id: GUILD,
                kind,
                track: self.engine.last_track().unwrap(),
            }
        }
    }

    fn ids(queue: &GuildQueue) -> Vec<String> {
        queue.entries.iter().map(|e| e.identifier.clone()).collect()
    }

    async fn filled(h: &Harness, items: &[&str]) -> GuildQueue {
        let mut queue = h.queue();
        for id in items {
            queue.enqueue(user(), TrackType::YouTube, *id).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn enqueue_on_idle_queue_starts_playback() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;

        assert_eq!(h.engine.played(), ["a"]);
        assert_eq!(queue.settings.position, Some(0));
        assert!(queue.is_playing());
        assert_eq!(h.positions(), [0, 1, 2]);

        queue.enqueue(user(), TrackType::SoundCloud, "x/y").await.unwrap();
        assert_eq!(h.engine.played(), ["a"]);
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected() {
        let h = Harness::new();
        let mut queue = h.queue();
        assert!(matches!(
            queue.enqueue(user(), TrackType::YouTube, "  ").await,
            Err(QueueError::Validation(_))
        ));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn natural_end_advances_in_order() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;

        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "b", "c"]);
        assert_eq!(queue.settings.position, Some(2));
    }

    #[tokio::test]
    async fn exhausting_the_queue_ends_the_session() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_order(QueueOrder::Reverse).unwrap();
        queue.jump(1).await.unwrap();

        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        let last = queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();

        assert_eq!(last, Some(Announcement::Finished));
        assert_eq!(h.engine.disconnects(), 1);
        assert_eq!(h.engine.played(), ["a", "b", "a"]);
        assert!(queue.is_empty());
        assert!(!queue.is_playing());
        assert_eq!(queue.settings, QueueSettings::defaults(GUILD, 100));
        assert!(h.positions().is_empty());
    }

    #[tokio::test]
    async fn loop_all_wraps_around() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_loop(LoopMode::All).unwrap();

        for _ in 0..3 {
            queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        }
        assert_eq!(h.engine.played(), ["a", "b", "a", "b"]);
    }

    #[tokio::test]
    async fn stale_events_are_discarded() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;
        let first = h.event(EngineEventKind::Ended);

        queue.handle_event(first).await.unwrap();
        // A duplicate end for the track that already finished.
        queue.handle_event(first).await.unwrap();

        assert_eq!(h.engine.played(), ["a", "b"]);
        assert_eq!(queue.settings.position, Some(1));
    }

    #[tokio::test]
    async fn skip_leaves_a_looping_track() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_loop(LoopMode::Track).unwrap();

        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "a"]);

        queue.skip().await.unwrap();
        assert_eq!(h.engine.stops(), 1);
        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "a", "b"]);

        // Back to repeating once the skip is consumed.
        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "a", "b", "b"]);
    }

    #[tokio::test]
    async fn skip_without_playback_fails() {
        let h = Harness::new();
        let mut queue = h.queue();
        assert!(matches!(queue.skip().await, Err(QueueError::NothingPlaying)));
    }

    #[tokio::test]
    async fn removing_before_current_keeps_the_same_track_current() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c", "d"]).await;
        queue.jump(2).await.unwrap();

        let removed = queue.remove_at(0).await.unwrap();
        assert_eq!(removed.identifier, "a");
        assert_eq!(queue.settings.position, Some(1));
        assert_eq!(ids(&queue), ["b", "c", "d"]);
        assert_eq!(h.positions(), [0, 1, 2]);
        assert_eq!(h.engine.played(), ["a", "c"]);
    }

    #[tokio::test]
    async fn removing_after_current_changes_nothing_else() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;

        queue.remove_at(2).await.unwrap();
        assert_eq!(queue.settings.position, Some(0));
        assert_eq!(h.positions(), [0, 1]);
        assert_eq!(h.engine.stops(), 0);
    }

    #[tokio::test]
    async fn removing_the_playing_entry_moves_on() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;
        queue.jump(1).await.unwrap();
        let stale = h.event(EngineEventKind::Ended);

        queue.remove_at(1).await.unwrap();
        assert_eq!(ids(&queue), ["a", "c"]);
        assert_eq!(queue.settings.position, Some(1));
        assert_eq!(h.engine.played(), ["a", "b", "c"]);

        // The end event for the stopped track must not advance again.
        queue.handle_event(stale).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn removing_the_playing_entry_in_reverse_order() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;
        queue.set_order(QueueOrder::Reverse).unwrap();
        queue.jump(2).await.unwrap();

        queue.remove_at(2).await.unwrap();
        assert_eq!(queue.settings.position, Some(1));
        assert_eq!(h.engine.played(), ["a", "c", "b"]);
    }

    #[tokio::test]
    async fn removing_the_only_entry_empties_and_restarts_from_zero() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a"]).await;

        queue.remove_at(0).await.unwrap();
        assert!(queue.is_empty());
        assert!(!queue.is_playing());
        assert_eq!(queue.settings.position, None);
        assert_eq!(h.engine.stops(), 1);

        queue.enqueue(user(), TrackType::YouTube, "b").await.unwrap();
        assert_eq!(queue.settings.position, Some(0));
        assert_eq!(h.engine.played(), ["a", "b"]);
    }

    #[tokio::test]
    async fn removing_out_of_range_is_not_found() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a"]).await;
        assert!(matches!(
            queue.remove_at(5).await,
            Err(QueueError::NotFound { index: 5, len: 1 })
        ));
        assert_eq!(ids(&queue), ["a"]);
    }

    #[tokio::test]
    async fn failed_writes_leave_memory_untouched() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;
        let before = queue.snapshot();

        h.store.fail_writes(true);
        assert!(matches!(
            queue.enqueue(user(), TrackType::YouTube, "d").await,
            Err(QueueError::Persistence(_))
        ));
        assert!(matches!(queue.remove_at(1).await, Err(QueueError::Persistence(_))));
        assert!(matches!(queue.clear().await, Err(QueueError::Persistence(_))));
        assert!(matches!(queue.shuffle(), Err(QueueError::Persistence(_))));
        assert!(matches!(
            queue.set_order(QueueOrder::Random),
            Err(QueueError::Persistence(_))
        ));

        assert_eq!(queue.snapshot(), before);
        assert_eq!(h.positions(), [0, 1, 2]);
        assert_eq!(h.engine.played(), ["a"]);
        assert_eq!(h.engine.stops(), 0);
    }

    #[tokio::test]
    async fn volume_is_validated_and_applied_live() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a"]).await;

        assert!(matches!(queue.set_volume(101).await, Err(QueueError::Validation(_))));
        assert!(matches!(queue.set_volume(-1).await, Err(QueueError::Validation(_))));
        assert_eq!(queue.settings.volume, 100);

        queue.set_volume(40).await.unwrap();
        assert_eq!(queue.settings.volume, 40);
        assert!(h.engine.calls().contains(&EngineCall::SetVolume(GUILD, 0.4)));
    }

    #[tokio::test]
    async fn a_broken_track_is_stepped_over() {
        let h = Harness::new();
        h.engine.break_track("b");
        let mut queue = filled(&h, &["a", "b", "c"]).await;

        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "c"]);
        assert_eq!(queue.settings.position, Some(2));
    }

    #[tokio::test]
    async fn errored_events_advance_even_when_looping_the_track() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_loop(LoopMode::Track).unwrap();

        queue.handle_event(h.event(EngineEventKind::Errored)).await.unwrap();
        assert_eq!(h.engine.played(), ["a", "b"]);
    }

    #[tokio::test]
    async fn too_many_errors_abandon_the_queue() {
        let h = Harness::new();
        for id in ["b", "c", "d", "e"] {
            h.engine.break_track(id);
        }
        let mut queue = filled(&h, &["a", "b", "c", "d", "e"]).await;
        queue.set_loop(LoopMode::All).unwrap();

        let result = queue.handle_event(h.event(EngineEventKind::Ended)).await;
        assert!(matches!(result, Err(QueueError::SessionFailed { errors: 4 })));
        assert!(queue.is_empty());
        assert!(h.positions().is_empty());
    }

    #[tokio::test]
    async fn started_event_resets_the_error_count() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_loop(LoopMode::All).unwrap();

        for _ in 0..10 {
            queue.handle_event(h.event(EngineEventKind::Errored)).await.unwrap();
            queue.handle_event(h.event(EngineEventKind::Started)).await.unwrap();
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(h.engine.played().len(), 11);
    }

    #[tokio::test]
    async fn shuffle_keeps_the_playing_entry_current() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c", "d", "e", "f"]).await;
        queue.jump(3).await.unwrap();

        queue.shuffle().unwrap();
        let position = queue.settings.position.unwrap();
        assert_eq!(queue.entries[position].identifier, "d");

        let mut sorted = ids(&queue);
        sorted.sort();
        assert_eq!(sorted, ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(h.positions(), [0, 1, 2, 3, 4, 5]);
        assert_eq!(h.queue().snapshot().entries, queue.snapshot().entries);
    }

    #[tokio::test]
    async fn jump_out_of_range_is_not_found() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a"]).await;
        assert!(matches!(
            queue.jump(1).await,
            Err(QueueError::NotFound { index: 1, len: 1 })
        ));
    }

    #[tokio::test]
    async fn reload_restores_settings_and_resumes() {
        let h = Harness::new();
        {
            let mut queue = filled(&h, &["a", "b", "c"]).await;
            queue.set_order(QueueOrder::Reverse).unwrap();
            queue.jump(1).await.unwrap();
        }

        let mut queue = h.queue();
        let snapshot = queue.snapshot();
        assert_eq!(
            snapshot.entries.iter().map(|e| e.identifier.as_str()).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
        assert_eq!(snapshot.settings.order, QueueOrder::Reverse);
        assert_eq!(snapshot.settings.loop_mode, LoopMode::Off);
        assert_eq!(snapshot.settings.position, Some(1));
        assert!(!snapshot.playing);

        queue.resume().await.unwrap();
        assert_eq!(h.engine.played(), ["a", "b", "b"]);
    }

    #[tokio::test]
    async fn resume_on_empty_queue_fails() {
        let h = Harness::new();
        let mut queue = h.queue();
        assert!(matches!(queue.resume().await, Err(QueueError::Empty)));
    }

    #[tokio::test]
    async fn clear_stops_and_resets() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        queue.set_loop(LoopMode::All).unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert_eq!(h.engine.stops(), 1);
        assert_eq!(h.engine.disconnects(), 1);
        assert_eq!(queue.settings, QueueSettings::defaults(GUILD, 100));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn removing_the_last_playing_entry_keeps_the_rest() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b", "c"]).await;
        queue.jump(2).await.unwrap();

        let removed = queue.remove_at(2).await.unwrap();
        assert_eq!(removed.identifier, "c");
        assert_eq!(ids(&queue), ["a", "b"]);
        assert_eq!(queue.settings.position, Some(1));
        assert!(!queue.is_playing());
        assert_eq!(h.positions(), [0, 1]);
        assert_eq!(h.engine.played(), ["a", "c"]);
        assert_eq!(h.engine.stops(), 2);
        assert_eq!(h.engine.disconnects(), 0);
    }

    #[tokio::test]
    async fn lost_voice_connection_keeps_the_queue() {
        let h = Harness::new();
        {
            let mut queue = filled(&h, &["a", "b", "c"]).await;
            queue.jump(1).await.unwrap();
        }
        h.engine.go_offline(GUILD);

        let mut queue = h.queue();
        assert!(matches!(
            queue.resume().await,
            Err(QueueError::Engine(EngineError::NotConnected))
        ));
        assert_eq!(ids(&queue), ["a", "b", "c"]);
        assert_eq!(queue.settings.position, Some(1));
        assert!(!queue.is_playing());
        assert_eq!(h.positions(), [0, 1, 2]);
        assert_eq!(h.queue().settings().position, Some(1));

        // Queued while disconnected: kept, not played.
        assert!(queue.enqueue(user(), TrackType::YouTube, "d").await.is_err());
        assert_eq!(ids(&queue), ["a", "b", "c", "d"]);

        h.engine.connect(GUILD, ChannelId::new(1)).await.unwrap();
        queue.resume().await.unwrap();
        assert_eq!(h.engine.played(), ["a", "b", "d"]);
    }

    #[tokio::test]
    async fn pause_and_resume_the_playing_track() {
        let h = Harness::new();
        let mut queue = h.queue();
        assert!(matches!(queue.pause().await, Err(QueueError::NothingPlaying)));

        queue.enqueue(user(), TrackType::YouTube, "a").await.unwrap();
        assert!(matches!(queue.resume().await, Err(QueueError::NotPaused)));

        queue.pause().await.unwrap();
        assert!(queue.is_paused());
        assert!(queue.snapshot().paused);
        assert!(matches!(queue.pause().await, Err(QueueError::AlreadyPaused)));

        queue.resume().await.unwrap();
        assert!(!queue.is_paused());
        assert_eq!(h.engine.played(), ["a"]);
        let calls = h.engine.calls();
        assert!(calls.ends_with(&[EngineCall::Pause(GUILD), EngineCall::Unpause(GUILD)]));
    }

    #[tokio::test]
    async fn a_track_start_is_announced_once() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;

        let first = queue.handle_event(h.event(EngineEventKind::Started)).await.unwrap();
        assert_eq!(
            first,
            Some(Announcement::NowPlaying(QueueEntry::new(user(), TrackType::YouTube, "a")))
        );
        // Unpausing fires another start for the same track.
        let again = queue.handle_event(h.event(EngineEventKind::Started)).await.unwrap();
        assert_eq!(again, None);

        queue.handle_event(h.event(EngineEventKind::Ended)).await.unwrap();
        let next = queue.handle_event(h.event(EngineEventKind::Started)).await.unwrap();
        assert!(matches!(next, Some(Announcement::NowPlaying(e)) if e.identifier == "b"));
    }

    #[tokio::test]
    async fn volume_is_kept_when_the_engine_cannot_apply_it() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a"]).await;
        h.engine.go_offline(GUILD);

        queue.set_volume(30).await.unwrap();
        assert_eq!(queue.settings.volume, 30);
        assert_eq!(h.queue().settings().volume, 30);
    }

    #[tokio::test]
    async fn full_queue_rejects_more_entries() {
        let h = Harness::new();
        let mut queue = h.queue_with(QueueOptions {
            max_queue_size: 2,
            ..options()
        });
        for id in ["a", "b"] {
            queue.enqueue(user(), TrackType::YouTube, id).await.unwrap();
        }

        assert!(matches!(
            queue.enqueue(user(), TrackType::YouTube, "c").await,
            Err(QueueError::Validation(_))
        ));
        assert_eq!(ids(&queue), ["a", "b"]);
        assert_eq!(h.positions(), [0, 1]);
    }

    #[tokio::test]
    async fn halt_stops_but_keeps_the_queue() {
        let h = Harness::new();
        let mut queue = filled(&h, &["a", "b"]).await;
        let stale = h.event(EngineEventKind::Ended);

        queue.halt().await;
        assert!(!queue.is_playing());
        assert_eq!(ids(&queue), ["a", "b"]);
        assert_eq!(queue.settings.position, Some(0));
        assert_eq!(h.engine.stops(), 1);

        queue.handle_event(stale).await.unwrap();
        assert_eq!(h.engine.played(), ["a"]);
    }
}
