use std::collections::HashMap;
use std::sync::Arc;

use serenity::all::{ChannelId, GuildId};
use serenity::async_trait;
use songbird::error::{ControlError, JoinError};
use songbird::input::YoutubeDl;
use songbird::tracks::TrackHandle;
use songbird::{Event, EventContext, EventHandler, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::playback::{AudioEngine, EngineEvent, EngineEventKind, EngineEventSender, TrackRef};
use crate::queue::{QueueEntry, error::EngineError};

const MAX_JOIN_ATTEMPTS: u32 = 5;

/// [`AudioEngine`] backed by songbird voice calls.
pub struct SongbirdEngine {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    events: EngineEventSender,
    /// Handle of the track each guild's queue last started.
    tracks: Mutex<HashMap<GuildId, TrackHandle>>,
}

impl SongbirdEngine {
    pub fn new(songbird: Arc<Songbird>, events: EngineEventSender) -> Self {
        Self {
            songbird,
            http: reqwest::Client::new(),
            events,
            tracks: Mutex::new(HashMap::new()),
        }
    }

    /// Run a control command against the guild's current track.
    async fn with_track(
        &self,
        guild_id: GuildId,
        control: impl FnOnce(&TrackHandle) -> Result<(), ControlError>,
    ) -> Result<(), EngineError> {
        let tracks = self.tracks.lock().await;
        let handle = tracks.get(&guild_id).ok_or(EngineError::NotConnected)?;
        control(handle).map_err(|e| EngineError::Control(e.to_string()))
    }
}

/// Forwards one kind of songbird track event into the engine event stream.
struct TrackEventForwarder {
    guild_id: GuildId,
    track: TrackRef,
    kind: EngineEventKind,
    events: EngineEventSender,
}

#[async_trait]
impl EventHandler for TrackEventForwarder {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let _ = self.events.send(EngineEvent {
            guild_id: self.guild_id,
            kind: self.kind,
            track: self.track,
        });
        None
    }
}

#[async_trait]
impl AudioEngine for SongbirdEngine {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError> {
        if let Some(call_lock) = self.songbird.get(guild_id) {
            let current = call_lock.lock().await.current_channel();
            if current.map(|c| c.0.get()) == Some(channel_id.get()) {
                return Ok(());
            }
        }

        // Retry voice channel joining with exponential backoff
        let mut attempts = 0;
        loop {
            info!(
                "Attempting to join voice channel {} in guild {} (attempt {}/{})",
                channel_id,
                guild_id,
                attempts + 1,
                MAX_JOIN_ATTEMPTS
            );

            match self.songbird.join(guild_id, channel_id).await {
                Ok(_call_lock) => {
                    info!(
                        "Joined voice channel {} in guild {} after {} attempt(s)",
                        channel_id,
                        guild_id,
                        attempts + 1
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_JOIN_ATTEMPTS {
                        return Err(EngineError::Join(format!(
                            "gave up after {MAX_JOIN_ATTEMPTS} attempts: {e}"
                        )));
                    }

                    let delay_ms = std::cmp::min(5000, 1000 * 2_u64.pow(attempts - 1));
                    warn!(
                        "Voice channel join attempt {} failed: {}. Retrying in {}ms...",
                        attempts, e, delay_ms
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.tracks.lock().await.remove(&guild_id);
        match self.songbird.remove(guild_id).await {
            Ok(()) => Ok(()),
            Err(JoinError::NoCall) => Err(EngineError::NotConnected),
            Err(e) => Err(EngineError::Control(e.to_string())),
        }
    }

    async fn play(
        &self,
        guild_id: GuildId,
        entry: &QueueEntry,
        gain: f32,
    ) -> Result<TrackRef, EngineError> {
        let call_lock = self
            .songbird
            .get(guild_id)
            .ok_or(EngineError::NotConnected)?;
        let source = YoutubeDl::new(self.http.clone(), entry.playback_url());

        let mut call = call_lock.lock().await;
        // Supersede whatever was playing; its end event is stale by now.
        call.stop();
        let handle = call.play_input(source.into());
        drop(call);

        let track = TrackRef(handle.uuid().as_u128());
        let rejected = |e: ControlError| EngineError::TrackRejected {
            identifier: entry.identifier.clone(),
            reason: e.to_string(),
        };
        handle.set_volume(gain).map_err(rejected)?;
        for (event, kind) in [
            (TrackEvent::Play, EngineEventKind::Started),
            (TrackEvent::End, EngineEventKind::Ended),
            (TrackEvent::Error, EngineEventKind::Errored),
        ] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEventForwarder {
                        guild_id,
                        track,
                        kind,
                        events: self.events.clone(),
                    },
                )
                .map_err(rejected)?;
        }
        self.tracks.lock().await.insert(guild_id, handle);
        Ok(track)
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.with_track(guild_id, |handle| handle.pause()).await
    }

    async fn unpause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.with_track(guild_id, |handle| handle.play()).await
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let call_lock = self
            .songbird
            .get(guild_id)
            .ok_or(EngineError::NotConnected)?;
        call_lock.lock().await.stop();
        self.tracks.lock().await.remove(&guild_id);
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, gain: f32) -> Result<(), EngineError> {
        self.with_track(guild_id, |handle| handle.set_volume(gain))
            .await
    }
}
