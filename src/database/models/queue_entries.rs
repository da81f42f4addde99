use diesel::prelude::*;

use crate::database::schema::queue_entries;

/// Offset used to park shifted rows out of the way so the
/// `(guild_id, position)` key never collides mid-update.
const PARK_OFFSET: i32 = 1 << 24;

/// Largest number of rows one guild may hold without parked rows
/// overlapping live ones.
pub const MAX_GUILD_ENTRIES: usize = PARK_OFFSET as usize;

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = queue_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueEntryRow {
    pub guild_id: i64,
    pub user_id: i64,
    pub position: i32,
    pub track_type: i32,
    pub identifier: String,
}

impl QueueEntryRow {
    pub fn get_guild_entries(
        conn: &mut SqliteConnection,
        guild_id: i64,
    ) -> QueryResult<Vec<QueueEntryRow>> {
        queue_entries::table
            .filter(queue_entries::guild_id.eq(guild_id))
            .order(queue_entries::position.asc())
            .select(QueueEntryRow::as_select())
            .load::<QueueEntryRow>(conn)
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(queue_entries::table)
            .values(self)
            .execute(conn)
    }

    pub fn insert_all(conn: &mut SqliteConnection, rows: &[QueueEntryRow]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(queue_entries::table)
            .values(rows)
            .execute(conn)
    }

    /// Delete the row at `position` and move every later row down by one.
    ///
    /// Must run inside a transaction. Returns `NotFound` when nothing was
    /// stored at `position`.
    pub fn remove_and_shift(
        conn: &mut SqliteConnection,
        guild_id: i64,
        position: i32,
    ) -> QueryResult<()> {
        let deleted = diesel::delete(queue_entries::table)
            .filter(queue_entries::guild_id.eq(guild_id))
            .filter(queue_entries::position.eq(position))
            .execute(conn)?;
        if deleted == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        // Two passes: park the tail above every live position, then bring it
        // back one slot lower.
        diesel::update(queue_entries::table)
            .filter(queue_entries::guild_id.eq(guild_id))
            .filter(queue_entries::position.gt(position))
            .set(queue_entries::position.eq(queue_entries::position + PARK_OFFSET))
            .execute(conn)?;
        diesel::update(queue_entries::table)
            .filter(queue_entries::guild_id.eq(guild_id))
            .filter(queue_entries::position.ge(PARK_OFFSET))
            .set(queue_entries::position.eq(queue_entries::position - (PARK_OFFSET + 1)))
            .execute(conn)?;

        Ok(())
    }

    pub fn clear_guild_entries(conn: &mut SqliteConnection, guild_id: i64) -> QueryResult<usize> {
        diesel::delete(queue_entries::table)
            .filter(queue_entries::guild_id.eq(guild_id))
            .execute(conn)
    }
}
