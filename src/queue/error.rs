use thiserror::Error;

/// Failures of the durable queue store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("invalid {column} value stored for guild {guild_id}: {value:?}")]
    InvalidValue {
        guild_id: u64,
        column: &'static str,
        value: String,
    },

    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Failures reported by the audio engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("engine rejected track {identifier}: {reason}")]
    TrackRejected { identifier: String, reason: String },

    #[error("track control failed: {0}")]
    Control(String),
}

impl EngineError {
    /// The voice connection is missing, as opposed to a bad track.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, EngineError::NotConnected | EngineError::Join(_))
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no entry at position {index} (queue has {len})")]
    NotFound { index: usize, len: usize },

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("playback is already paused")]
    AlreadyPaused,

    #[error("playback is not paused")]
    NotPaused,

    #[error("the queue is empty")]
    Empty,

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("audio engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("gave up after {errors} consecutive track errors; the queue was cleared")]
    SessionFailed { errors: u32 },
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
