use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use url::Url;

use super::error::QueueError;

/// The order in which entries are played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOrder {
    #[default]
    Normal,
    Reverse,
    Random,
}

impl QueueOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOrder::Normal => "normal",
            QueueOrder::Reverse => "reverse",
            QueueOrder::Random => "random",
        }
    }
}

impl FromStr for QueueOrder {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(QueueOrder::Normal),
            "reverse" => Ok(QueueOrder::Reverse),
            "random" => Ok(QueueOrder::Random),
            other => Err(QueueError::Validation(format!("unknown queue order {other:?}"))),
        }
    }
}

impl fmt::Display for QueueOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeat policy applied when a track ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    Off,
    All,
    Track,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::All => "all",
            LoopMode::Track => "track",
        }
    }

    /// Loop mode to use when the current track is being left on purpose
    /// (skip, removal, engine error): repeating it is not an option.
    pub fn moving_on(self) -> LoopMode {
        match self {
            LoopMode::Track => LoopMode::All,
            other => other,
        }
    }
}

impl FromStr for LoopMode {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(LoopMode::Off),
            "all" => Ok(LoopMode::All),
            "track" => Ok(LoopMode::Track),
            other => Err(QueueError::Validation(format!("unknown loop mode {other:?}"))),
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider a queued track originates from. Stored as an integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    YouTube = 0,
    YouTubeMusic = 1,
    SoundCloud = 2,
}

impl TrackType {
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Split a user supplied URL into a source tag and the provider's track
    /// identifier. Returns `None` for hosts we cannot stream from.
    pub fn from_url(raw: &str) -> Option<(TrackType, String)> {
        let url = Url::parse(raw.trim()).ok()?;
        let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

        let video_id = || {
            url.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        match host {
            "youtube.com" => video_id().map(|id| (TrackType::YouTube, id)),
            "music.youtube.com" => video_id().map(|id| (TrackType::YouTubeMusic, id)),
            "youtu.be" => url
                .path_segments()?
                .next()
                .filter(|id| !id.is_empty())
                .map(|id| (TrackType::YouTube, id.to_string())),
            "soundcloud.com" => {
                let path = url.path().trim_matches('/');
                (!path.is_empty()).then(|| (TrackType::SoundCloud, path.to_string()))
            }
            _ => None,
        }
    }

    /// URL the audio engine can stream `identifier` from.
    pub fn playback_url(self, identifier: &str) -> String {
        match self {
            TrackType::YouTube => format!("https://www.youtube.com/watch?v={identifier}"),
            TrackType::YouTubeMusic => format!("https://music.youtube.com/watch?v={identifier}"),
            TrackType::SoundCloud => format!("https://soundcloud.com/{identifier}"),
        }
    }
}

impl TryFrom<i32> for TrackType {
    type Error = QueueError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(TrackType::YouTube),
            1 => Ok(TrackType::YouTubeMusic),
            2 => Ok(TrackType::SoundCloud),
            other => Err(QueueError::Validation(format!("unknown track type {other}"))),
        }
    }
}

/// Per-guild playback settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    pub guild_id: GuildId,
    pub order: QueueOrder,
    pub loop_mode: LoopMode,
    pub volume: u8,
    /// Index of the entry last handed to the engine. `None` iff the queue is empty.
    pub position: Option<usize>,
}

impl QueueSettings {
    pub fn defaults(guild_id: GuildId, volume: u8) -> Self {
        Self {
            guild_id,
            order: QueueOrder::Normal,
            loop_mode: LoopMode::Off,
            volume,
            position: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub requester: UserId,
    pub source: TrackType,
    pub identifier: String,
}

impl QueueEntry {
    pub fn new(requester: UserId, source: TrackType, identifier: impl Into<String>) -> Self {
        Self {
            requester,
            source,
            identifier: identifier.into(),
        }
    }

    pub fn playback_url(&self) -> String {
        self.source.playback_url(&self.identifier)
    }
}

/// Read-only view of a guild's queue for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub settings: QueueSettings,
    pub entries: Vec<QueueEntry>,
    pub playing: bool,
    pub paused: bool,
}

impl QueueSnapshot {
    pub fn current(&self) -> Option<&QueueEntry> {
        self.settings.position.and_then(|p| self.entries.get(p))
    }
}
