//! Reconciliation stats
//!
//! Always computed from the source tables. Session counts are only as fresh
//! as the last recompute pass.

use rusqlite::params;

use super::mappings::count_mappings_on;
use super::Database;
use crate::error::Result;
use crate::models::{BookMapping, ImportStats, UserMapping};

impl Database {
    /// Mapped/unmapped entity counts and ready/imported session counts for an import
    pub fn import_stats(&self, import_id: &str) -> Result<ImportStats> {
        let conn = self.conn()?;

        let users = count_mappings_on::<UserMapping>(&conn, import_id)?;
        let books = count_mappings_on::<BookMapping>(&conn, import_id)?;

        let (ready, imported, pending, skipped): (i64, i64, i64, i64) = conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'ready' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'imported' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status IN ('pending_user', 'pending_book') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'skipped' THEN 1 ELSE 0 END), 0)
            FROM import_sessions
            WHERE import_id = ?
            "#,
            params![import_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(ImportStats {
            mapped: users.mapped + books.mapped,
            unmapped: users.unmapped + books.unmapped,
            ready,
            imported,
            pending,
            skipped,
            users,
            books,
        })
    }
}
