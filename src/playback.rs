use std::sync::Arc;

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

use crate::queue::{QueueEntry, QueueError, QueueManager, error::EngineError};

/// Identity of one play command issued to the engine. Two plays of the
/// same entry get different refs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackRef(pub u128);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEventKind {
    Started,
    Ended,
    Errored,
}

/// Notification emitted by the engine about a track it was told to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEvent {
    pub guild_id: GuildId,
    pub kind: EngineEventKind,
    pub track: TrackRef,
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// The external audio engine. `gain` is engine native: 1.0 is unity.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError>;

    /// Leave the guild's voice channel, dropping whatever was playing.
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError>;

    /// Start `entry`, replacing anything the guild is playing.
    async fn play(
        &self,
        guild_id: GuildId,
        entry: &QueueEntry,
        gain: f32,
    ) -> Result<TrackRef, EngineError>;

    async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn unpause(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn set_volume(&self, guild_id: GuildId, gain: f32) -> Result<(), EngineError>;
}

/// Something a guild's listeners should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    NowPlaying(QueueEntry),
    /// Playback ran past the last entry.
    Finished,
    SessionFailed { errors: u32 },
    /// Left voice because nobody was listening.
    Disconnected,
}

/// Delivers announcements to wherever the guild's users are talking.
/// Must not block; slow deliveries belong on their own task.
pub trait Announcer: Send + Sync {
    fn announce(&self, guild_id: GuildId, announcement: Announcement);
}

/// Converts queue volume (percent) to engine gain.
pub fn percent_to_gain(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Issues playback commands on behalf of guild queues.
#[derive(Clone)]
pub struct PlaybackController {
    engine: Arc<dyn AudioEngine>,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn AudioEngine>) -> Self {
        Self { engine }
    }

    pub async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError> {
        self.engine.connect(guild_id, channel_id).await
    }

    pub async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError> {
        info!("Guild {} leaving voice", guild_id);
        self.engine.disconnect(guild_id).await
    }

    pub async fn play(
        &self,
        guild_id: GuildId,
        entry: &QueueEntry,
        volume: u8,
    ) -> Result<TrackRef, EngineError> {
        let track = self
            .engine
            .play(guild_id, entry, percent_to_gain(volume))
            .await?;
        info!(
            "Guild {} playing {} ({:?}) as {:?}",
            guild_id, entry.identifier, entry.source, track
        );
        Ok(track)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        debug!("Guild {} pausing playback", guild_id);
        self.engine.pause(guild_id).await
    }

    pub async fn unpause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        debug!("Guild {} unpausing playback", guild_id);
        self.engine.unpause(guild_id).await
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
        debug!("Guild {} stopping playback", guild_id);
        self.engine.stop(guild_id).await
    }

    pub async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<(), EngineError> {
        self.engine
            .set_volume(guild_id, percent_to_gain(volume))
            .await
    }
}

/// Feed engine events into the guild queues until the engine goes away.
///
/// Events are handled one at a time in the order the engine emitted them,
/// so a guild never sees an end before the start that preceded it.
pub fn spawn_event_pump(
    manager: Arc<QueueManager>,
    mut events: EngineEventReceiver,
    announcer: Arc<dyn Announcer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            route_event(&manager, announcer.as_ref(), event).await;
        }
        info!("Engine event stream closed");
    })
}

async fn route_event(manager: &QueueManager, announcer: &dyn Announcer, event: EngineEvent) {
    match manager.handle_event(event).await {
        Ok(Some(announcement)) => announcer.announce(event.guild_id, announcement),
        Ok(None) => {}
        Err(QueueError::SessionFailed { errors }) => {
            announcer.announce(event.guild_id, Announcement::SessionFailed { errors })
        }
        Err(e) => error!(
            "Guild {} failed to handle {:?} event: {}",
            event.guild_id, event.kind, e
        ),
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum EngineCall {
        Connect(GuildId, ChannelId),
        Disconnect(GuildId),
        Play(GuildId, String, TrackRef),
        Pause(GuildId),
        Unpause(GuildId),
        Stop(GuildId),
        SetVolume(GuildId, f32),
    }

    /// Engine double that records commands and hands out sequential refs.
    /// Guilds count as connected until they disconnect or go offline.
    #[derive(Default)]
    pub struct MockEngine {
        calls: Mutex<Vec<EngineCall>>,
        broken: Mutex<HashSet<String>>,
        offline: Mutex<HashSet<GuildId>>,
        next_ref: Mutex<u128>,
    }

    impl MockEngine {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make every play of `identifier` fail.
        pub fn break_track(&self, identifier: &str) {
            self.broken.lock().unwrap().insert(identifier.to_string());
        }

        /// Drop the guild's voice connection, as a restart or kick would.
        pub fn go_offline(&self, guild_id: GuildId) {
            self.offline.lock().unwrap().insert(guild_id);
        }

        pub fn calls(&self) -> Vec<EngineCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn played(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    EngineCall::Play(_, id, _) => Some(id),
                    _ => None,
                })
                .collect()
        }

        pub fn last_track(&self) -> Option<TrackRef> {
            self.calls().into_iter().rev().find_map(|c| match c {
                EngineCall::Play(_, _, track) => Some(track),
                _ => None,
            })
        }

        pub fn stops(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, EngineCall::Stop(_)))
                .count()
        }

        pub fn disconnects(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, EngineCall::Disconnect(_)))
                .count()
        }

        fn record(&self, guild_id: GuildId, call: EngineCall) -> Result<(), EngineError> {
            if self.offline.lock().unwrap().contains(&guild_id) {
                return Err(EngineError::NotConnected);
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    #[async_trait]
    impl AudioEngine for MockEngine {
        async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError> {
            self.offline.lock().unwrap().remove(&guild_id);
            self.record(guild_id, EngineCall::Connect(guild_id, channel_id))
        }

        async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError> {
            self.record(guild_id, EngineCall::Disconnect(guild_id))?;
            self.go_offline(guild_id);
            Ok(())
        }

        async fn play(
            &self,
            guild_id: GuildId,
            entry: &QueueEntry,
            _gain: f32,
        ) -> Result<TrackRef, EngineError> {
            if self.offline.lock().unwrap().contains(&guild_id) {
                return Err(EngineError::NotConnected);
            }
            if self.broken.lock().unwrap().contains(&entry.identifier) {
                return Err(EngineError::TrackRejected {
                    identifier: entry.identifier.clone(),
                    reason: "broken".into(),
                });
            }
            let track = {
                let mut next = self.next_ref.lock().unwrap();
                *next += 1;
                TrackRef(*next)
            };
            self.record(
                guild_id,
                EngineCall::Play(guild_id, entry.identifier.clone(), track),
            )?;
            Ok(track)
        }

        async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
            self.record(guild_id, EngineCall::Pause(guild_id))
        }

        async fn unpause(&self, guild_id: GuildId) -> Result<(), EngineError> {
            self.record(guild_id, EngineCall::Unpause(guild_id))
        }

        async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
            self.record(guild_id, EngineCall::Stop(guild_id))
        }

        async fn set_volume(&self, guild_id: GuildId, gain: f32) -> Result<(), EngineError> {
            self.record(guild_id, EngineCall::SetVolume(guild_id, gain))
        }
    }

    /// Announcer that remembers what it was asked to say.
    #[derive(Default)]
    pub struct RecordingAnnouncer {
        said: Mutex<Vec<(GuildId, Announcement)>>,
    }

    impl RecordingAnnouncer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn said(&self) -> Vec<Announcement> {
            self.said
                .lock()
                .unwrap()
                .iter()
                .map(|(_, a)| a.clone())
                .collect()
        }
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, guild_id: GuildId, announcement: Announcement) {
            self.said.lock().unwrap().push((guild_id, announcement));
        }
    }
}
