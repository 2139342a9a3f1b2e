//! SQLite storage for the plan catalog.
//!
//! The catalog keeps every accepted plan so later revisions can look up their
//! parent. Plans are stored whole as JSON next to a few indexed columns used
//! for listing; [`crate::catalog::PlanCatalog`] is the async, shareable
//! front-end over this connection type.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod migrations;
pub mod plan_queries;

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens (or creates) the catalog at `path` and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }

    /// In-memory catalog, used by tests and throwaway runs.
    pub fn in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
