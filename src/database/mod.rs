use diesel::connection::SimpleConnection;
use diesel::prelude::*;

pub mod models;
pub mod schema;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queue_settings (
    guild_id BIGINT PRIMARY KEY NOT NULL,
    position INTEGER,
    "order" TEXT NOT NULL DEFAULT 'normal',
    "loop" TEXT NOT NULL DEFAULT 'off',
    volume INTEGER NOT NULL DEFAULT 100
);

CREATE TABLE IF NOT EXISTS queue_entries (
    guild_id BIGINT NOT NULL,
    user_id BIGINT NOT NULL,
    position INTEGER NOT NULL,
    "type" INTEGER NOT NULL,
    identifier TEXT NOT NULL,
    PRIMARY KEY (guild_id, position)
);
"#;

/// Open the SQLite database at `database_url` and make sure the queue
/// tables exist.
pub fn establish_connection(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    conn.batch_execute("PRAGMA busy_timeout = 5000;")?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(SCHEMA)
}
