//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use reshelf_core::models::{
    BookMapping, MappingFilter, MappingTarget, ProgressKey, ProgressStatus, SessionStatus,
    UserMapping,
};
use reshelf_core::test_utils::*;
use reshelf_core::{Config, Database};

use crate::cli::MappingAction;
use crate::commands::{self, truncate};

/// Import with two users, two books and three sessions; nothing mapped yet
fn setup_test_db() -> Database {
    let db = seeded_db("imp-1");
    db.register_user("imp-1", &user("u1", "alice")).unwrap();
    db.register_user("imp-1", &user("u2", "bob")).unwrap();
    db.register_book("imp-1", &book("b1", "Dune")).unwrap();
    db.register_book("imp-1", &book("b2", "Anathem")).unwrap();
    db.register_session("imp-1", &session("s1", "u1", "b1", 0))
        .unwrap();
    db.register_session("imp-1", &session("s2", "u1", "b2", 10))
        .unwrap();
    db.register_session("imp-1", &session("s3", "u2", "b1", 20))
        .unwrap();
    db.create_progress("imp-1", &progress("u1", "b1", 30))
        .unwrap();
    db
}

fn config(recompute_after_mapping: bool) -> Config {
    Config {
        recompute_after_mapping,
        ..Config::default()
    }
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long book title", 10), "a long ...");
    assert_eq!(truncate("Ægir og Rán", 5), "Æg...");
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_imports_list() {
    let db = setup_test_db();
    assert!(commands::cmd_imports_list(&db).is_ok());

    let empty = Database::in_memory().unwrap();
    assert!(commands::cmd_imports_list(&empty).is_ok());
}

#[test]
fn test_cmd_imports_show_unknown() {
    let db = setup_test_db();
    assert!(commands::cmd_imports_show(&db, "imp-1").is_ok());
    assert!(commands::cmd_imports_show(&db, "missing").is_err());
}

#[test]
fn test_cmd_imports_delete() {
    let db = setup_test_db();
    commands::cmd_imports_delete(&db, "imp-1").unwrap();
    assert!(db.get_import("imp-1").is_err());
    assert!(db.list_sessions_for_user("imp-1", "u1").unwrap().is_empty());
}

#[test]
fn test_cmd_load() {
    let db = Database::in_memory().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "import": {{ "id": "imp-9", "name": "Garage server" }},
            "users": [{{ "external_id": "u1", "external_username": "alice" }}],
            "books": [{{ "external_id": "b1", "external_title": "Dune" }}],
            "sessions": [{{ "external_session_id": "s1", "external_user_id": "u1",
                           "external_media_id": "b1", "started_at": "2024-03-01T12:00:00Z" }}]
        }}"#
    )
    .unwrap();

    commands::cmd_load(&db, file.path()).unwrap();

    let import = db.get_import("imp-9").unwrap();
    assert_eq!(import.total_sessions, 1);

    // Loading the same document again collides on the import id
    assert!(commands::cmd_load(&db, file.path()).is_err());
}

#[test]
fn test_cmd_load_bad_file() {
    let db = Database::in_memory().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(commands::cmd_load(&db, file.path()).is_err());
    assert!(db.list_imports().unwrap().is_empty());
}

// ========== Mapping Command Tests ==========

#[test]
fn test_cmd_users_list_filters() {
    let db = setup_test_db();
    for filter in ["all", "mapped", "unmapped"] {
        assert!(commands::cmd_mappings_list::<UserMapping>(&db, "imp-1", filter, 50, 0).is_ok());
    }
    assert!(commands::cmd_mappings_list::<BookMapping>(&db, "imp-1", "bogus", 50, 0).is_err());
    assert!(commands::cmd_mappings_list::<BookMapping>(&db, "missing", "all", 50, 0).is_err());
}

#[test]
fn test_cmd_mappings_show() {
    let db = setup_test_db();
    assert!(commands::cmd_mappings_show::<UserMapping>(&db, "imp-1", "u1").is_ok());
    assert!(commands::cmd_mappings_show::<BookMapping>(&db, "imp-1", "nope").is_err());
}

#[test]
fn test_map_recomputes_when_configured() {
    let db = setup_test_db();
    let cfg = config(true);

    commands::run_mapping_action::<UserMapping>(
        &db,
        &cfg,
        "imp-1",
        Some(MappingAction::Map {
            external_id: "u1".to_string(),
            internal_id: "lu-1".to_string(),
            name: Some("alice".to_string()),
            detail: None,
        }),
    )
    .unwrap();
    commands::run_mapping_action::<BookMapping>(
        &db,
        &cfg,
        "imp-1",
        Some(MappingAction::Map {
            external_id: "b1".to_string(),
            internal_id: "lu-b1".to_string(),
            name: None,
            detail: None,
        }),
    )
    .unwrap();

    assert_eq!(
        db.get_session("imp-1", "s1").unwrap().status,
        SessionStatus::Ready
    );
    assert_eq!(
        db.get_session("imp-1", "s2").unwrap().status,
        SessionStatus::PendingBook
    );
    assert_eq!(
        db.get_session("imp-1", "s3").unwrap().status,
        SessionStatus::PendingUser
    );

    let u1: UserMapping = db.get_mapping("imp-1", "u1").unwrap();
    assert_eq!(u1.internal_username.as_deref(), Some("alice"));
}

#[test]
fn test_map_without_recompute_leaves_statuses() {
    let db = setup_test_db();
    let cfg = config(false);

    commands::run_mapping_action::<UserMapping>(
        &db,
        &cfg,
        "imp-1",
        Some(MappingAction::Map {
            external_id: "u1".to_string(),
            internal_id: "lu-1".to_string(),
            name: None,
            detail: None,
        }),
    )
    .unwrap();

    assert_eq!(
        db.get_session("imp-1", "s1").unwrap().status,
        SessionStatus::PendingUser
    );
    assert_eq!(
        db.count_mappings::<UserMapping>("imp-1", MappingFilter::Mapped)
            .unwrap(),
        1
    );
}

#[test]
fn test_unmap() {
    let db = setup_test_db();
    db.set_user_mapping("imp-1", "u2", &MappingTarget::new("lu-2"))
        .unwrap();

    commands::run_mapping_action::<UserMapping>(
        &db,
        &config(true),
        "imp-1",
        Some(MappingAction::Unmap {
            external_id: "u2".to_string(),
        }),
    )
    .unwrap();

    let u2: UserMapping = db.get_mapping("imp-1", "u2").unwrap();
    assert!(!u2.is_mapped());
    assert!(u2.mapped_at.is_none());
}

#[test]
fn test_map_unknown_entity() {
    let db = setup_test_db();
    let result = commands::cmd_mappings_map::<BookMapping>(
        &db,
        "imp-1",
        "ghost",
        &MappingTarget::new("lu-x"),
        true,
    );
    assert!(result.is_err());
}

// ========== Session Command Tests ==========

#[test]
fn test_cmd_sessions_list() {
    let db = setup_test_db();
    for filter in ["all", "pending", "ready", "imported", "skipped"] {
        assert!(commands::cmd_sessions_list(&db, "imp-1", filter, 2, 0).is_ok());
    }
    assert!(commands::cmd_sessions_list(&db, "imp-1", "done", 2, 0).is_err());
}

#[test]
fn test_cmd_sessions_transitions() {
    let db = setup_test_db();

    commands::cmd_sessions_skip(&db, "imp-1", "s1", "test listen").unwrap();
    assert_eq!(
        db.get_session("imp-1", "s1").unwrap().status,
        SessionStatus::Skipped
    );

    commands::cmd_sessions_mark_imported(&db, "imp-1", "s2").unwrap();
    assert_eq!(
        db.get_session("imp-1", "s2").unwrap().status,
        SessionStatus::Imported
    );

    // Refused transitions surface as errors
    assert!(commands::cmd_sessions_mark_imported(&db, "imp-1", "s1").is_err());
    assert!(commands::cmd_sessions_skip(&db, "imp-1", "s2", "late").is_err());
    assert!(commands::cmd_sessions_show(&db, "imp-1", "s9").is_err());
}

// ========== Progress Command Tests ==========

#[test]
fn test_cmd_progress_commands() {
    let db = setup_test_db();

    assert!(commands::cmd_progress_list(&db, "imp-1", Some("u1"), "pending", 50).is_ok());
    assert!(commands::cmd_progress_list(&db, "imp-1", None, "pending", 50).is_ok());
    assert!(commands::cmd_progress_list(&db, "imp-1", None, "bogus", 50).is_err());
    assert!(commands::cmd_progress_show(&db, "imp-1", "u1", "b1").is_ok());

    // Not mapped yet
    assert!(commands::cmd_progress_for_book(&db, "imp-1", "u1", "lu-b1").is_err());
    db.set_book_mapping("imp-1", "b1", &MappingTarget::new("lu-b1"))
        .unwrap();
    assert!(commands::cmd_progress_for_book(&db, "imp-1", "u1", "lu-b1").is_ok());
}

#[test]
fn test_cmd_progress_mark() {
    let db = setup_test_db();
    commands::cmd_progress_mark(&db, "imp-1", "u1", "b1", "imported").unwrap();

    let key = ProgressKey {
        import_id: "imp-1",
        external_user_id: "u1",
        external_media_id: "b1",
    };
    let row = db.get_progress(&key).unwrap();
    assert_eq!(row.status, ProgressStatus::Imported);
    assert!(row.imported_at.is_some());

    assert!(commands::cmd_progress_mark(&db, "imp-1", "u1", "b2", "imported").is_err());
}

// ========== Recompute / Stats Tests ==========

#[test]
fn test_cmd_recompute_and_stats() {
    let db = setup_test_db();
    db.set_user_mapping("imp-1", "u1", &MappingTarget::new("lu-1"))
        .unwrap();
    db.set_book_mapping("imp-1", "b1", &MappingTarget::new("lu-b1"))
        .unwrap();

    commands::cmd_recompute(&db, "imp-1").unwrap();
    assert_eq!(
        db.get_session("imp-1", "s1").unwrap().status,
        SessionStatus::Ready
    );

    assert!(commands::cmd_stats(&db, "imp-1", false).is_ok());
    assert!(commands::cmd_stats(&db, "imp-1", true).is_ok());

    let stats = db.import_stats("imp-1").unwrap();
    assert_eq!(stats.mapped, 2);
    assert_eq!(stats.unmapped, 2);
    assert_eq!(stats.ready, 1);
}

#[test]
fn test_cmd_recompute_unknown_import() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_recompute(&db, "missing").is_err());
    assert!(commands::cmd_stats(&db, "missing", false).is_err());
}

#[test]
fn test_cmd_status_missing_db() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    assert!(commands::cmd_status(&path, true).is_ok());
    assert!(!path.exists());
}

#[test]
fn test_cmd_status_with_imports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reshelf.db");
    let db = commands::open_db(&path, true).unwrap();
    assert!(!db.is_encrypted());
    db.create_import(&new_import("imp-1")).unwrap();
    db.register_user("imp-1", &user("u1", "alice")).unwrap();
    drop(db);

    assert!(commands::cmd_status(&path, true).is_ok());
}

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reshelf.db");
    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_imports().unwrap().is_empty());
}
