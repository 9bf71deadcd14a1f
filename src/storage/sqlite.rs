//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.

use crate::state::{CrawlTarget, DateRange, RunSnapshot, RunState, RunStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite run state backend
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Opens (or creates) the state database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_state_row(&self) -> StorageResult<Option<RunState>> {
        let row = self
            .conn
            .query_row(
                "SELECT query, locales, max_results, max_pages, since, until, max_depth,
                 total_results_seen, output_path, status, config_hash
                 FROM run_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            query,
            locales,
            max_results,
            max_pages,
            since,
            until,
            max_depth,
            total_results_seen,
            output_path,
            status,
            config_hash,
        )) = row
        else {
            return Ok(None);
        };

        let status = RunStatus::from_db_string(&status)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown run status '{}'", status)))?;

        Ok(Some(RunState {
            query,
            locales: split_locales(&locales),
            max_results: max_results.max(0) as usize,
            max_pages,
            date_range: DateRange::from_bounds(since.as_deref(), until.as_deref()),
            max_depth,
            total_results_seen: total_results_seen.max(0) as usize,
            remaining_work: self.load_frontier()?,
            output_path,
            status,
            config_hash,
        }))
    }

    fn load_frontier(&self) -> StorageResult<Vec<CrawlTarget>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, depth FROM frontier ORDER BY position")?;
        let targets = stmt
            .query_map([], |row| Ok(CrawlTarget::new(row.get::<_, String>(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn load_visited(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM visited ORDER BY url")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }
}

impl StateStore for SqliteStateStore {
    fn load(&self) -> StorageResult<Option<RunSnapshot>> {
        let Some(state) = self.load_state_row()? else {
            return Ok(None);
        };
        let visited = self.load_visited()?;
        Ok(Some(RunSnapshot { state, visited }))
    }

    fn save(&mut self, snapshot: &RunSnapshot) -> StorageResult<()> {
        let state = &snapshot.state;
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM run_state", [])?;
        tx.execute("DELETE FROM visited", [])?;
        tx.execute("DELETE FROM frontier", [])?;

        tx.execute(
            "INSERT INTO run_state (id, query, locales, max_results, max_pages, since, until,
             max_depth, total_results_seen, output_path, status, config_hash, saved_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                state.query,
                state.locales.join(","),
                state.max_results as i64,
                state.max_pages,
                state.date_range.as_ref().map(|r| r.since.as_str()),
                state.date_range.as_ref().map(|r| r.until.as_str()),
                state.max_depth,
                state.total_results_seen as i64,
                state.output_path,
                state.status.to_db_string(),
                state.config_hash,
                Utc::now().to_rfc3339(),
            ],
        )?;

        {
            let mut insert_visited = tx.prepare("INSERT OR IGNORE INTO visited (url) VALUES (?1)")?;
            for url in &snapshot.visited {
                insert_visited.execute(params![url])?;
            }

            let mut insert_target =
                tx.prepare("INSERT INTO frontier (position, url, depth) VALUES (?1, ?2, ?3)")?;
            for (position, target) in state.remaining_work.iter().enumerate() {
                insert_target.execute(params![position as i64, target.url, target.depth])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM run_state;
            DELETE FROM visited;
            DELETE FROM frontier;
        ",
        )?;
        Ok(())
    }
}

fn split_locales(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
