use std::sync::Mutex;

use diesel::prelude::*;
use serenity::model::id::{GuildId, UserId};
use tracing::warn;

use super::error::StoreError;
use super::types::{LoopMode, QueueEntry, QueueOrder, QueueSettings, TrackType};
use crate::database::models::{QueueEntryRow, QueueSettingsRow};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything persisted for one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredQueue {
    /// `None` until the guild's settings row has been written once.
    pub settings: Option<QueueSettings>,
    /// Entries in dense position order.
    pub entries: Vec<QueueEntry>,
}

/// Durable storage for queue settings and entries.
///
/// Every method is one atomic write: either all of it lands or none of
/// it does. Structural writes carry the settings row so the stored
/// `position` always matches the stored entries.
pub trait QueueStore: Send + Sync {
    fn load(&self, guild_id: GuildId) -> StoreResult<StoredQueue>;

    fn save_settings(&self, settings: &QueueSettings) -> StoreResult<()>;

    /// Store `entry` at dense position `index` (the current end of the queue).
    fn append_entry(&self, settings: &QueueSettings, index: usize, entry: &QueueEntry)
    -> StoreResult<()>;

    /// Delete the entry at `index` and renumber the ones after it.
    fn remove_entry(&self, settings: &QueueSettings, index: usize) -> StoreResult<()>;

    /// Replace every entry of the guild with `entries`, numbered from 0.
    fn replace_entries(&self, settings: &QueueSettings, entries: &[QueueEntry])
    -> StoreResult<()>;

    /// Delete every entry of the guild and write `settings`.
    fn clear(&self, settings: &QueueSettings) -> StoreResult<()>;
}

/// [`QueueStore`] backed by the bot's SQLite database.
pub struct SqliteQueueStore {
    conn: Mutex<SqliteConnection>,
}

impl SqliteQueueStore {
    pub fn new(conn: SqliteConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }

    #[cfg(test)]
    pub fn stored_positions(&self, guild_id: GuildId) -> Vec<i32> {
        self.with_conn(|conn| Ok(QueueEntryRow::get_guild_entries(conn, db_id(guild_id.get()))?))
            .unwrap()
            .into_iter()
            .map(|row| row.position)
            .collect()
    }

    #[cfg(test)]
    pub fn execute_raw(&self, sql: &str) {
        use diesel::connection::SimpleConnection;
        self.with_conn(|conn| Ok(conn.batch_execute(sql)?)).unwrap();
    }
}

impl QueueStore for SqliteQueueStore {
    fn load(&self, guild_id: GuildId) -> StoreResult<StoredQueue> {
        let gid = db_id(guild_id.get());
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let settings = QueueSettingsRow::find_by_guild_id(conn, gid)?
                    .map(|row| settings_from_row(&row))
                    .transpose()?;

                let rows = QueueEntryRow::get_guild_entries(conn, gid)?;
                let entries = rows
                    .iter()
                    .map(|row| entry_from_row(row))
                    .collect::<StoreResult<Vec<_>>>()?;

                let dense = rows
                    .iter()
                    .enumerate()
                    .all(|(i, row)| row.position as usize == i && row.position >= 0);
                if !dense {
                    warn!(
                        "Renumbering {} stored queue entries for guild {}",
                        rows.len(),
                        guild_id
                    );
                    QueueEntryRow::clear_guild_entries(conn, gid)?;
                    QueueEntryRow::insert_all(conn, &entry_rows(guild_id, &entries))?;
                }

                Ok(StoredQueue { settings, entries })
            })
        })
    }

    fn save_settings(&self, settings: &QueueSettings) -> StoreResult<()> {
        self.with_conn(|conn| {
            settings_row(settings).upsert(conn)?;
            Ok(())
        })
    }

    fn append_entry(
        &self,
        settings: &QueueSettings,
        index: usize,
        entry: &QueueEntry,
    ) -> StoreResult<()> {
        let row = entry_row(settings.guild_id, index, entry);
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                row.insert(conn)?;
                settings_row(settings).upsert(conn)?;
                Ok(())
            })
        })
    }

    fn remove_entry(&self, settings: &QueueSettings, index: usize) -> StoreResult<()> {
        let gid = db_id(settings.guild_id.get());
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                QueueEntryRow::remove_and_shift(conn, gid, index as i32)?;
                settings_row(settings).upsert(conn)?;
                Ok(())
            })
        })
    }

    fn replace_entries(
        &self,
        settings: &QueueSettings,
        entries: &[QueueEntry],
    ) -> StoreResult<()> {
        let gid = db_id(settings.guild_id.get());
        let rows = entry_rows(settings.guild_id, entries);
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                QueueEntryRow::clear_guild_entries(conn, gid)?;
                QueueEntryRow::insert_all(conn, &rows)?;
                settings_row(settings).upsert(conn)?;
                Ok(())
            })
        })
    }

    fn clear(&self, settings: &QueueSettings) -> StoreResult<()> {
        let gid = db_id(settings.guild_id.get());
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                QueueEntryRow::clear_guild_entries(conn, gid)?;
                settings_row(settings).upsert(conn)?;
                Ok(())
            })
        })
    }
}

// Discord snowflakes fit in 63 bits; SQLite only has signed integers.
fn db_id(id: u64) -> i64 {
    id as i64
}

fn settings_row(settings: &QueueSettings) -> QueueSettingsRow {
    QueueSettingsRow {
        guild_id: db_id(settings.guild_id.get()),
        position: settings.position.map(|p| p as i32),
        play_order: settings.order.as_str().to_string(),
        loop_mode: settings.loop_mode.as_str().to_string(),
        volume: i32::from(settings.volume),
    }
}

fn settings_from_row(row: &QueueSettingsRow) -> StoreResult<QueueSettings> {
    let guild_id = row.guild_id as u64;
    let invalid = |column: &'static str, value: String| StoreError::InvalidValue {
        guild_id,
        column,
        value,
    };

    if guild_id == 0 {
        return Err(invalid("guild_id", row.guild_id.to_string()));
    }
    let order: QueueOrder = row
        .play_order
        .parse()
        .map_err(|_| invalid("order", row.play_order.clone()))?;
    let loop_mode: LoopMode = row
        .loop_mode
        .parse()
        .map_err(|_| invalid("loop", row.loop_mode.clone()))?;
    let volume = u8::try_from(row.volume)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| invalid("volume", row.volume.to_string()))?;
    // Negative positions were once used to mean "nothing selected".
    let position = row.position.filter(|p| *p >= 0).map(|p| p as usize);

    Ok(QueueSettings {
        guild_id: GuildId::new(guild_id),
        order,
        loop_mode,
        volume,
        position,
    })
}

fn entry_row(guild_id: GuildId, index: usize, entry: &QueueEntry) -> QueueEntryRow {
    QueueEntryRow {
        guild_id: db_id(guild_id.get()),
        user_id: db_id(entry.requester.get()),
        position: index as i32,
        track_type: entry.source.tag(),
        identifier: entry.identifier.clone(),
    }
}

fn entry_rows(guild_id: GuildId, entries: &[QueueEntry]) -> Vec<QueueEntryRow> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| entry_row(guild_id, i, entry))
        .collect()
}

fn entry_from_row(row: &QueueEntryRow) -> StoreResult<QueueEntry> {
    let invalid = |column: &'static str, value: String| StoreError::InvalidValue {
        guild_id: row.guild_id as u64,
        column,
        value,
    };
    if row.user_id == 0 {
        return Err(invalid("user_id", row.user_id.to_string()));
    }
    let source = TrackType::try_from(row.track_type)
        .map_err(|_| invalid("type", row.track_type.to_string()))?;
    Ok(QueueEntry {
        requester: UserId::new(row.user_id as u64),
        source,
        identifier: row.identifier.clone(),
    })
}
