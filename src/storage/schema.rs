//! Database schema definitions for the run state file

/// SQL schema for the run state database
pub const SCHEMA_SQL: &str = r#"
-- Parameters of the persisted run (single row)
CREATE TABLE IF NOT EXISTS run_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    query TEXT NOT NULL,
    locales TEXT NOT NULL,
    max_results INTEGER NOT NULL,
    max_pages INTEGER NOT NULL,
    since TEXT,
    until TEXT,
    max_depth INTEGER NOT NULL,
    total_results_seen INTEGER NOT NULL DEFAULT 0,
    output_path TEXT NOT NULL,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Every URL claimed by a crawl worker
CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY
);

-- Unconsumed crawl targets, in frontier order
CREATE TABLE IF NOT EXISTS frontier (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
