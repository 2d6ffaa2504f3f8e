//! SQLite persistence for assignment runs.
//!
//! RULE: Only the store talks to the database.
//! The engine produces an AssignmentRun; the store persists it whole.

use crate::error::AssignResult;
use rusqlite::Connection;

mod assignment;
mod run;

pub use run::RunRecord;

pub struct AssignmentStore {
    conn: Connection,
}

impl AssignmentStore {
    pub fn open(path: &str) -> AssignResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AssignResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AssignResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_assignments.sql"))?;
        Ok(())
    }
}
