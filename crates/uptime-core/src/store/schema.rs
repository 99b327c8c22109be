use rusqlite::Connection;

/// Create the monitor registry and observation log if they don't exist.
///
/// The `(grp, name, timestamp)` index serves every per-monitor range query;
/// the bare `timestamp` index serves the global retention purge.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS monitors (
            grp   TEXT NOT NULL,
            name  TEXT NOT NULL,
            url   TEXT NOT NULL,
            PRIMARY KEY (grp, name)
        );

        CREATE TABLE IF NOT EXISTS observations (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            grp       TEXT    NOT NULL,
            name      TEXT    NOT NULL,
            timestamp INTEGER NOT NULL,
            time      REAL    NOT NULL,
            response  TEXT    NOT NULL,
            FOREIGN KEY (grp, name) REFERENCES monitors (grp, name) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_observations_key_timestamp
            ON observations (grp, name, timestamp);
        CREATE INDEX IF NOT EXISTS idx_observations_timestamp
            ON observations (timestamp);",
    )?;
    Ok(())
}
