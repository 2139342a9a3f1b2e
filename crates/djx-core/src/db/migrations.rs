//! Database schema initialization and migrations.

use crate::error::{DatabaseResultExt, DjxError, Result};

/// Bumped together with a new step in `apply_migrations`. Version 1 is the
/// schema in `assets/schema.sql`, so it has no steps yet.
const SCHEMA_VERSION: i64 = 1;

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        self.apply_migrations()
    }

    /// Stamps fresh catalogs with [`SCHEMA_VERSION`] and refuses catalogs
    /// written by a newer build.
    fn apply_migrations(&self) -> Result<()> {
        let version: i64 = self
            .connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .db_context("Failed to read schema version")?;

        if version > SCHEMA_VERSION {
            return Err(DjxError::invalid_input("catalog").with_reason(format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        if version < SCHEMA_VERSION {
            self.connection
                .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .db_context("Failed to record schema version")?;
        }

        Ok(())
    }
}
