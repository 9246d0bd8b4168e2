use rusqlite::Connection;

/// Bump when the table layout changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Column holding extra node attributes as a JSON object.
pub const ATTRIBUTES_COLUMN: &str = "attributes";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS lineage_nodes (
    node_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    proc_name   TEXT,
    table_name  TEXT NOT NULL,
    column_name TEXT NOT NULL,
    node_type   TEXT NOT NULL,
    attributes  TEXT NOT NULL DEFAULT '{}'
);

-- No foreign keys: an upstream id may legitimately point at a node that
-- was never recorded.
CREATE TABLE IF NOT EXISTS lineage_edges (
    edge_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    downstream_node_id INTEGER NOT NULL,
    upstream_node_id   INTEGER NOT NULL,
    transform_type     TEXT
);

CREATE INDEX IF NOT EXISTS idx_lineage_edges_downstream
    ON lineage_edges (downstream_node_id);
";

/// Create tables if missing and stamp the schema version. Idempotent.
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if version > SCHEMA_VERSION {
        tracing::warn!(
            found = version,
            supported = SCHEMA_VERSION,
            "lineage database was written by a newer version"
        );
    }
    Ok(())
}
