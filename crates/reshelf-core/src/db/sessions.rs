//! Import session operations
//!
//! Sessions are created unresolved at ingestion and move forward through
//! recompute. The two terminal transitions (`imported`, `skipped`) are only
//! reached through the explicit calls in this module.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{format_datetime, parse_datetime, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ImportSession, NewImportSession, SessionFilter, SessionStatus};

const SESSION_COLUMNS: &str = "import_id, external_session_id, external_user_id, \
    external_media_id, started_at, duration_secs, start_position, end_position, \
    status, imported_at, skip_reason";

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportSession> {
    let started_at: String = row.get(4)?;
    let status_str: String = row.get(8)?;

    Ok(ImportSession {
        import_id: row.get(0)?,
        external_session_id: row.get(1)?,
        external_user_id: row.get(2)?,
        external_media_id: row.get(3)?,
        started_at: parse_datetime(&started_at),
        duration_secs: row.get(5)?,
        start_position: row.get(6)?,
        end_position: row.get(7)?,
        // The CHECK constraint keeps this column within the known states
        status: status_str.parse().unwrap_or_default(),
        imported_at: parse_optional_datetime(row.get(9)?),
        skip_reason: row.get(10)?,
    })
}

fn session_not_found(import_id: &str, external_session_id: &str) -> Error {
    Error::NotFound(format!(
        "session {} in import {}",
        external_session_id, import_id
    ))
}

pub(crate) fn get_session_on(
    conn: &Connection,
    import_id: &str,
    external_session_id: &str,
) -> Result<ImportSession> {
    conn.query_row(
        &format!(
            "SELECT {} FROM import_sessions WHERE import_id = ? AND external_session_id = ?",
            SESSION_COLUMNS
        ),
        params![import_id, external_session_id],
        map_session_row,
    )
    .optional()?
    .ok_or_else(|| session_not_found(import_id, external_session_id))
}

impl Database {
    /// Register a session from the snapshot (ingestion only). Starts as `pending_user`.
    pub fn register_session(&self, import_id: &str, session: &NewImportSession) -> Result<()> {
        if session.external_session_id.trim().is_empty() {
            return Err(Error::Validation(
                "session has an empty external id".to_string(),
            ));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO import_sessions
                (import_id, external_session_id, external_user_id, external_media_id,
                 started_at, duration_secs, start_position, end_position, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                import_id,
                session.external_session_id,
                session.external_user_id,
                session.external_media_id,
                format_datetime(&session.started_at),
                session.duration_secs,
                session.start_position,
                session.end_position,
                SessionStatus::PendingUser.as_str(),
            ],
        )
        .map_err(|e| {
            Error::on_insert(
                e,
                format!(
                    "session {} in import {}",
                    session.external_session_id, import_id
                ),
            )
        })?;
        Ok(())
    }

    /// Get a single session
    pub fn get_session(&self, import_id: &str, external_session_id: &str) -> Result<ImportSession> {
        let conn = self.conn()?;
        get_session_on(&conn, import_id, external_session_id)
    }

    /// List sessions ordered by start time. A negative limit means no limit.
    pub fn list_sessions(
        &self,
        import_id: &str,
        filter: SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImportSession>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM import_sessions WHERE import_id = ? AND {} \
             ORDER BY started_at ASC, external_session_id ASC LIMIT ? OFFSET ?",
            SESSION_COLUMNS,
            filter.predicate()
        );

        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![import_id, limit, offset], map_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Count sessions matching a filter
    pub fn count_sessions(&self, import_id: &str, filter: SessionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM import_sessions WHERE import_id = ? AND {}",
                filter.predicate()
            ),
            params![import_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sessions of one external user, for the operator's per-user view
    pub fn list_sessions_for_user(
        &self,
        import_id: &str,
        external_user_id: &str,
    ) -> Result<Vec<ImportSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_sessions WHERE import_id = ? AND external_user_id = ? \
             ORDER BY started_at ASC, external_session_id ASC",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![import_id, external_user_id], map_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Mark a session as written to the catalog by the downstream importer.
    ///
    /// Allowed from any non-terminal state. Repeating the call on an imported
    /// session keeps the original `imported_at`; a skipped session is refused.
    pub fn mark_session_imported(
        &self,
        import_id: &str,
        external_session_id: &str,
    ) -> Result<ImportSession> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_sessions SET status = 'imported', imported_at = ?
            WHERE import_id = ? AND external_session_id = ?
              AND status IN ('pending_user', 'pending_book', 'ready')
            "#,
            params![format_datetime(&Utc::now()), import_id, external_session_id],
        )?;

        let session = get_session_on(&conn, import_id, external_session_id)?;
        if affected == 0 && session.status == SessionStatus::Skipped {
            warn!(
                import_id,
                external_session_id, "Refusing to mark a skipped session imported"
            );
            return Err(Error::Validation(format!(
                "session {} is skipped and cannot be imported",
                external_session_id
            )));
        }

        debug!(import_id, external_session_id, "Session marked imported");
        Ok(session)
    }

    /// Exclude a session from import with a reason.
    ///
    /// Allowed from any non-terminal state; repeating on a skipped session
    /// overwrites the reason. An imported session is refused.
    pub fn skip_session(
        &self,
        import_id: &str,
        external_session_id: &str,
        reason: &str,
    ) -> Result<ImportSession> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_sessions SET status = 'skipped', skip_reason = ?
            WHERE import_id = ? AND external_session_id = ? AND status != 'imported'
            "#,
            params![reason, import_id, external_session_id],
        )?;

        let session = get_session_on(&conn, import_id, external_session_id)?;
        if affected == 0 {
            warn!(
                import_id,
                external_session_id, "Refusing to skip an imported session"
            );
            return Err(Error::Validation(format!(
                "session {} is already imported and cannot be skipped",
                external_session_id
            )));
        }

        debug!(import_id, external_session_id, reason, "Session skipped");
        Ok(session)
    }
}
