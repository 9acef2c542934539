//! reshelf Core Library
//!
//! Reconciles a snapshot imported from an audiobook server against the
//! catalog:
//! - Database access and migrations
//! - Mapping registry for external users and books
//! - Session status machine and batch recompute
//! - Playback progress mirror
//! - Reconciliation stats
//! - Snapshot loading and configuration

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod snapshot;

/// Fixture builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use db::{Database, MappingKind};
pub use error::{Error, Result};
pub use models::{
    BookMapping, EntityKind, Import, ImportProgress, ImportSession, ImportStats, ImportStatus,
    MappingFilter, MappingTarget, MatchInfo, MatchSuggestion, ProgressKey, ProgressStatus,
    RecomputeSummary, SessionFilter, SessionStatus, UserMapping,
};
pub use snapshot::{LoadSummary, Snapshot};
