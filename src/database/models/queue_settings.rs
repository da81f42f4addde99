use diesel::prelude::*;

use crate::database::schema::queue_settings;

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = queue_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueSettingsRow {
    pub guild_id: i64,
    pub position: Option<i32>,
    pub play_order: String,
    pub loop_mode: String,
    pub volume: i32,
}

impl QueueSettingsRow {
    pub fn find_by_guild_id(
        conn: &mut SqliteConnection,
        guild_id: i64,
    ) -> QueryResult<Option<QueueSettingsRow>> {
        queue_settings::table
            .filter(queue_settings::guild_id.eq(guild_id))
            .select(QueueSettingsRow::as_select())
            .first::<QueueSettingsRow>(conn)
            .optional()
    }

    /// Insert the row, replacing whatever was stored for the guild.
    pub fn upsert(&self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::replace_into(queue_settings::table)
            .values(self)
            .execute(conn)
    }
}
