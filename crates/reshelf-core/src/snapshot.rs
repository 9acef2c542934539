//! Snapshot documents handed over by the ingestion step
//!
//! The ingestion step parses the audiobook server's backup and runs its own
//! matcher. Its output is a JSON document with every user, book, session and
//! progress row already carrying confidence and suggestions. Loading one only
//! stores that data and derives initial session statuses.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Import, ImportStatus, NewBookMapping, NewImport, NewImportProgress, NewImportSession,
    NewUserMapping, RecomputeSummary,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub import: NewImport,
    #[serde(default)]
    pub users: Vec<NewUserMapping>,
    #[serde(default)]
    pub books: Vec<NewBookMapping>,
    #[serde(default)]
    pub sessions: Vec<NewImportSession>,
    #[serde(default)]
    pub progress: Vec<NewImportProgress>,
}

impl Snapshot {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Validation(format!("Invalid snapshot document: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// What `load_snapshot` stored
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub import: Import,
    pub recompute: RecomputeSummary,
}

impl Database {
    /// Store a snapshot as a new import and derive initial session statuses.
    ///
    /// Fails with `AlreadyExists` if the import id is taken. If a later row
    /// fails, the import is deleted again so a corrected snapshot can be
    /// loaded under the same id.
    pub fn load_snapshot(&self, snapshot: &Snapshot) -> Result<LoadSummary> {
        self.create_import(&snapshot.import)?;
        let import_id = snapshot.import.id.as_str();

        if let Err(e) = self.store_snapshot_rows(import_id, snapshot) {
            // Undo the partial load
            if let Err(cleanup) = self.delete_import(import_id) {
                warn!(
                    import_id,
                    error = %cleanup,
                    "Failed to remove partially loaded import"
                );
            }
            return Err(e);
        }

        let recompute = self.recompute_sessions(import_id)?;
        self.update_import_status(import_id, ImportStatus::Mapping)?;
        let import = self.get_import(import_id)?;

        info!(
            import_id,
            users = import.total_users,
            books = import.total_books,
            sessions = import.total_sessions,
            progress = snapshot.progress.len(),
            "Snapshot loaded"
        );

        Ok(LoadSummary { import, recompute })
    }

    fn store_snapshot_rows(&self, import_id: &str, snapshot: &Snapshot) -> Result<()> {
        for user in &snapshot.users {
            self.register_user(import_id, user)?;
        }
        for book in &snapshot.books {
            self.register_book(import_id, book)?;
        }
        for session in &snapshot.sessions {
            self.register_session(import_id, session)?;
        }
        for progress in &snapshot.progress {
            self.create_progress(import_id, progress)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionFilter, SessionStatus};
    use crate::test_utils::*;

    const DOC: &str = r#"{
        "import": { "id": "imp-1", "name": "Living room server" },
        "users": [
            { "external_id": "u1", "external_username": "alice",
              "confidence": 0.9, "match_reason": "email",
              "suggestions": [{ "internal_id": "lu-1", "name": "alice", "confidence": 0.9 }] }
        ],
        "books": [
            { "external_id": "b1", "external_title": "Dune" }
        ],
        "sessions": [
            { "external_session_id": "s1", "external_user_id": "u1",
              "external_media_id": "b1", "started_at": "2024-03-01T12:00:00Z" }
        ],
        "progress": [
            { "external_user_id": "u1", "external_media_id": "b1",
              "progress": 0.25, "last_update": "2024-03-01T13:00:00Z" }
        ]
    }"#;

    #[test]
    fn test_load_snapshot() {
        let db = Database::in_memory().unwrap();
        let snapshot = Snapshot::from_json(DOC).unwrap();

        let summary = db.load_snapshot(&snapshot).unwrap();
        assert_eq!(summary.import.status, ImportStatus::Mapping);
        assert_eq!(summary.import.total_users, 1);
        assert_eq!(summary.import.total_sessions, 1);
        assert_eq!(summary.recompute.pending_user, 1);

        let user: crate::models::UserMapping = db.get_mapping("imp-1", "u1").unwrap();
        assert!(!user.is_mapped());
        assert_eq!(user.matching.suggestions.len(), 1);

        let pending = db
            .count_sessions("imp-1", SessionFilter::Pending)
            .unwrap();
        assert_eq!(pending, 1);
    }

    #[test]
    fn test_load_snapshot_existing_import() {
        let db = seeded_db("imp-1");
        let snapshot = Snapshot::from_json(DOC).unwrap();
        assert!(matches!(
            db.load_snapshot(&snapshot),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_load_snapshot_rolls_back_on_bad_row() {
        let db = Database::in_memory().unwrap();
        let mut snapshot = Snapshot::from_json(DOC).unwrap();
        snapshot.sessions.push(session("s1", "u1", "b1", 5));

        let err = db.load_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(matches!(db.get_import("imp-1"), Err(Error::NotFound(_))));

        // The id is free again once the document is fixed
        snapshot.sessions.pop();
        let summary = db.load_snapshot(&snapshot).unwrap();
        assert_eq!(
            db.get_session("imp-1", "s1").unwrap().status,
            SessionStatus::PendingUser
        );
        assert_eq!(summary.recompute.examined, 1);
    }

    #[test]
    fn test_invalid_document() {
        let err = Snapshot::from_json("{\"users\": []}").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
