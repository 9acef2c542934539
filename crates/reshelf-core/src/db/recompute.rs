//! Session status recompute
//!
//! Re-derives the status of every non-terminal session of an import from the
//! current mapping tables. The mapped user and book id sets are loaded once,
//! each session's status is computed with [`SessionStatus::derive`], and the
//! changed rows are written back in a single transaction. Nothing is carried
//! over from earlier passes, so running it again is always safe and converges.

use std::collections::HashSet;
use std::time::Instant;

use rusqlite::{params, TransactionBehavior};
use tracing::{debug, info};

use super::imports::refresh_counters_on;
use super::mappings::mapped_external_ids;
use super::Database;
use crate::error::Result;
use crate::models::{BookMapping, RecomputeSummary, SessionStatus, UserMapping};

/// Mapping state one pass is evaluated against
struct MappedSets {
    users: HashSet<String>,
    books: HashSet<String>,
}

impl MappedSets {
    fn status_for(&self, current: SessionStatus, user_id: &str, media_id: &str) -> SessionStatus {
        current.derive(self.users.contains(user_id), self.books.contains(media_id))
    }
}

impl Database {
    /// Recompute session statuses for one import.
    ///
    /// Must run after mapping changes and before stats or downstream
    /// consumption. Terminal sessions are never touched, including ones that
    /// become terminal while the pass is running.
    pub fn recompute_sessions(&self, import_id: &str) -> Result<RecomputeSummary> {
        let start = Instant::now();
        let mut conn = self.conn()?;
        // Take the write lock up front so the mapping sets and the updates
        // see the same state
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sets = MappedSets {
            users: mapped_external_ids::<UserMapping>(&tx, import_id)?,
            books: mapped_external_ids::<BookMapping>(&tx, import_id)?,
        };

        let candidates: Vec<(String, String, String, String)> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT external_session_id, external_user_id, external_media_id, status
                FROM import_sessions
                WHERE import_id = ? AND status IN ('pending_user', 'pending_book', 'ready')
                "#,
            )?;
            let rows = stmt.query_map(params![import_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut summary = RecomputeSummary {
            examined: candidates.len(),
            ..Default::default()
        };

        {
            let mut update = tx.prepare(
                r#"
                UPDATE import_sessions SET status = ?
                WHERE import_id = ? AND external_session_id = ?
                  AND status IN ('pending_user', 'pending_book', 'ready')
                "#,
            )?;

            for (session_id, user_id, media_id, status_str) in &candidates {
                let current: SessionStatus = status_str.parse().unwrap_or_default();
                let next = sets.status_for(current, user_id, media_id);

                match next {
                    SessionStatus::PendingUser => summary.pending_user += 1,
                    SessionStatus::PendingBook => summary.pending_book += 1,
                    SessionStatus::Ready => summary.ready += 1,
                    SessionStatus::Imported | SessionStatus::Skipped => {}
                }

                if next != current {
                    summary.changed +=
                        update.execute(params![next.as_str(), import_id, session_id])?;
                }
            }
        }

        refresh_counters_on(&tx, import_id)?;
        tx.commit()?;

        debug!(
            import_id,
            users_mapped = sets.users.len(),
            books_mapped = sets.books.len(),
            "Recompute mapping sets"
        );
        info!(
            import_id,
            examined = summary.examined,
            changed = summary.changed,
            pending_user = summary.pending_user,
            pending_book = summary.pending_book,
            ready = summary.ready,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recomputed session statuses"
        );

        Ok(summary)
    }
}
