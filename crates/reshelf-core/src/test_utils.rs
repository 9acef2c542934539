//! Fixture builders for tests
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates.
//!
//! # Example
//!
//! ```ignore
//! use reshelf_core::test_utils::*;
//!
//! let db = seeded_db("imp-1");
//! db.register_user("imp-1", &user("u1", "alice")).unwrap();
//! ```

use chrono::{DateTime, TimeZone, Utc};

use crate::db::Database;
use crate::models::{
    MatchInfo, MatchSuggestion, NewBookMapping, NewImport, NewImportProgress, NewImportSession,
    NewUserMapping, Suggestions,
};

/// Fresh database with one empty import
pub fn seeded_db(import_id: &str) -> Database {
    let db = Database::in_memory().expect("test database");
    db.create_import(&new_import(import_id)).expect("test import");
    db
}

pub fn new_import(id: &str) -> NewImport {
    NewImport {
        id: id.to_string(),
        name: format!("Import {}", id),
        backup_path: format!("/backups/{}.audiobookshelf", id),
    }
}

/// Fixed point in time so ordering assertions are deterministic
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn suggestion(internal_id: &str, name: &str, confidence: f64) -> MatchSuggestion {
    MatchSuggestion {
        internal_id: internal_id.to_string(),
        name: name.to_string(),
        detail: None,
        confidence,
    }
}

pub fn user(external_id: &str, username: &str) -> NewUserMapping {
    NewUserMapping {
        external_id: external_id.to_string(),
        external_username: username.to_string(),
        external_email: Some(format!("{}@example.com", username)),
        session_count: 0,
        total_listen_secs: 0.0,
        matching: MatchInfo::default(),
    }
}

pub fn book(external_id: &str, title: &str) -> NewBookMapping {
    NewBookMapping {
        external_id: external_id.to_string(),
        external_title: title.to_string(),
        external_author: Some("Some Author".to_string()),
        external_asin: None,
        external_isbn: None,
        duration_secs: 36_000.0,
        matching: MatchInfo::default(),
    }
}

/// Matcher output with a single top suggestion
pub fn matched(confidence: f64, reason: &str, top: MatchSuggestion) -> MatchInfo {
    MatchInfo {
        confidence,
        match_reason: Some(reason.to_string()),
        suggestions: Suggestions(vec![top]),
    }
}

pub fn session(id: &str, user_id: &str, media_id: &str, started_minute: i64) -> NewImportSession {
    NewImportSession {
        external_session_id: id.to_string(),
        external_user_id: user_id.to_string(),
        external_media_id: media_id.to_string(),
        started_at: at(started_minute),
        duration_secs: 1800.0,
        start_position: 0.0,
        end_position: 1800.0,
    }
}

pub fn progress(user_id: &str, media_id: &str, updated_minute: i64) -> NewImportProgress {
    NewImportProgress {
        external_user_id: user_id.to_string(),
        external_media_id: media_id.to_string(),
        current_time: 1800.0,
        duration: 36_000.0,
        progress: 0.05,
        is_finished: false,
        finished_at: None,
        last_update: at(updated_minute),
    }
}
