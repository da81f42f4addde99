//! Per-guild music queues: what plays next, persisted across restarts.

pub mod error;
pub mod guild;
pub mod manager;
pub mod play_order;
pub mod store;
pub mod types;

pub use error::{QueueError, QueueResult};
pub use guild::GuildQueue;
pub use manager::{QueueManager, QueueManagerKey, QueueOptions};
pub use store::{QueueStore, SqliteQueueStore};
pub use types::{LoopMode, QueueEntry, QueueOrder, QueueSettings, QueueSnapshot, TrackType};
