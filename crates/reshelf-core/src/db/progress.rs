//! Playback progress mirror
//!
//! Progress rows are written once at ingestion and read by the downstream
//! importer. Their `status`/`imported_at` pair belongs to that importer and is
//! never touched by recompute.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{format_datetime, parse_datetime, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ImportProgress, NewImportProgress, ProgressKey, ProgressStatus};

const PROGRESS_COLUMNS: &str = "p.import_id, p.external_user_id, p.external_media_id, \
    p.current_position, p.duration, p.progress, p.is_finished, p.finished_at, p.last_update, \
    p.status, p.imported_at";

fn map_progress_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportProgress> {
    let last_update: String = row.get(8)?;
    let status_str: String = row.get(9)?;

    Ok(ImportProgress {
        import_id: row.get(0)?,
        external_user_id: row.get(1)?,
        external_media_id: row.get(2)?,
        current_time: row.get(3)?,
        duration: row.get(4)?,
        progress: row.get(5)?,
        is_finished: row.get(6)?,
        finished_at: parse_optional_datetime(row.get(7)?),
        last_update: parse_datetime(&last_update),
        status: status_str.parse().unwrap_or_default(),
        imported_at: parse_optional_datetime(row.get(10)?),
    })
}

fn progress_not_found(key: &ProgressKey<'_>) -> Error {
    Error::NotFound(format!(
        "progress for user {} on {} in import {}",
        key.external_user_id, key.external_media_id, key.import_id
    ))
}

impl Database {
    /// Record a progress row from the snapshot (ingestion only)
    pub fn create_progress(&self, import_id: &str, progress: &NewImportProgress) -> Result<()> {
        if !(0.0..=1.0).contains(&progress.progress) {
            return Err(Error::Validation(format!(
                "progress fraction must be within [0, 1], got {}",
                progress.progress
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO import_progress
                (import_id, external_user_id, external_media_id, current_position, duration,
                 progress, is_finished, finished_at, last_update, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                import_id,
                progress.external_user_id,
                progress.external_media_id,
                progress.current_time,
                progress.duration,
                progress.progress,
                progress.is_finished,
                progress.finished_at.as_ref().map(format_datetime),
                format_datetime(&progress.last_update),
                ProgressStatus::Pending.as_str(),
            ],
        )
        .map_err(|e| {
            Error::on_insert(
                e,
                format!(
                    "progress for user {} on {} in import {}",
                    progress.external_user_id, progress.external_media_id, import_id
                ),
            )
        })?;
        Ok(())
    }

    /// Get a progress row by its composite key
    pub fn get_progress(&self, key: &ProgressKey<'_>) -> Result<ImportProgress> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM import_progress p \
                 WHERE p.import_id = ? AND p.external_user_id = ? AND p.external_media_id = ?",
                PROGRESS_COLUMNS
            ),
            params![key.import_id, key.external_user_id, key.external_media_id],
            map_progress_row,
        )
        .optional()?
        .ok_or_else(|| progress_not_found(key))
    }

    /// All progress rows of one external user, most recently updated first
    pub fn list_progress_for_user(
        &self,
        import_id: &str,
        external_user_id: &str,
    ) -> Result<Vec<ImportProgress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_progress p \
             WHERE p.import_id = ? AND p.external_user_id = ? \
             ORDER BY p.last_update DESC, p.external_media_id ASC",
            PROGRESS_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![import_id, external_user_id], map_progress_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Progress rows with a given importer status, for paging by the downstream importer
    pub fn list_progress_by_status(
        &self,
        import_id: &str,
        status: ProgressStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImportProgress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_progress p \
             WHERE p.import_id = ? AND p.status = ? \
             ORDER BY p.external_user_id ASC, p.external_media_id ASC LIMIT ? OFFSET ?",
            PROGRESS_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![import_id, status.as_str(), limit, offset],
                map_progress_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Resolve a user's progress through the catalog id a book was mapped to.
    ///
    /// Fails with `NotFound` when no book in the import maps to
    /// `internal_book_id`, or when the user has no progress on that book.
    pub fn get_progress_for_internal_book(
        &self,
        import_id: &str,
        external_user_id: &str,
        internal_book_id: &str,
    ) -> Result<ImportProgress> {
        let conn = self.conn()?;

        let mapped: Option<String> = conn
            .query_row(
                "SELECT external_id FROM book_mappings \
                 WHERE import_id = ? AND internal_id = ? ORDER BY external_id LIMIT 1",
                params![import_id, internal_book_id],
                |row| row.get(0),
            )
            .optional()?;
        if mapped.is_none() {
            return Err(Error::NotFound(format!(
                "no book in import {} is mapped to {}",
                import_id, internal_book_id
            )));
        }

        conn.query_row(
            &format!(
                "SELECT {} FROM import_progress p \
                 JOIN book_mappings b \
                   ON b.import_id = p.import_id AND b.external_id = p.external_media_id \
                 WHERE p.import_id = ? AND p.external_user_id = ? AND b.internal_id = ? \
                 ORDER BY p.last_update DESC LIMIT 1",
                PROGRESS_COLUMNS
            ),
            params![import_id, external_user_id, internal_book_id],
            map_progress_row,
        )
        .optional()?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "progress for user {} on catalog book {} in import {}",
                external_user_id, internal_book_id, import_id
            ))
        })
    }

    /// Record the downstream importer's outcome for a progress row.
    ///
    /// `Imported` stamps `imported_at`; any other status clears it.
    pub fn update_progress_status(
        &self,
        key: &ProgressKey<'_>,
        status: ProgressStatus,
    ) -> Result<ImportProgress> {
        let imported_at = match status {
            ProgressStatus::Imported => Some(format_datetime(&Utc::now())),
            ProgressStatus::Pending | ProgressStatus::Skipped => None,
        };

        let conn = self.conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_progress SET status = ?, imported_at = ?
            WHERE import_id = ? AND external_user_id = ? AND external_media_id = ?
            "#,
            params![
                status.as_str(),
                imported_at,
                key.import_id,
                key.external_user_id,
                key.external_media_id
            ],
        )?;
        if affected == 0 {
            return Err(progress_not_found(key));
        }

        debug!(
            import_id = key.import_id,
            user = key.external_user_id,
            media = key.external_media_id,
            status = %status,
            "Progress status updated"
        );
        drop(conn);
        self.get_progress(key)
    }
}
