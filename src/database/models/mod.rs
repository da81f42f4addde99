pub mod queue_entries;
pub mod queue_settings;

// Re-export all models for convenience
pub use queue_entries::{MAX_GUILD_ENTRIES, QueueEntryRow};
pub use queue_settings::QueueSettingsRow;
