//! Domain models for reshelf

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ========== Imports ==========

/// One migration job reconciling an external snapshot against the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: String,
    pub name: String,
    /// Path of the backup file the snapshot was parsed from
    pub backup_path: String,
    pub status: ImportStatus,
    pub total_users: i64,
    pub total_books: i64,
    pub total_sessions: i64,
    pub users_mapped: i64,
    pub books_mapped: i64,
    pub sessions_imported: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImport {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub backup_path: String,
}

/// Lifecycle of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Snapshot ingested, nothing reconciled yet
    #[default]
    Pending,
    /// Operator is reconciling mappings
    Mapping,
    /// Downstream importer is consuming ready sessions
    Importing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Mapping => "mapping",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "mapping" => Ok(Self::Mapping),
            "importing" => Ok(Self::Importing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown import status: {}", s)),
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ========== Mappings ==========

/// The two kinds of external entity that get mapped onto the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Book,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Book => "book",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing filter for mapping rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingFilter {
    #[default]
    All,
    Mapped,
    Unmapped,
}

impl MappingFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Mapped => "mapped",
            Self::Unmapped => "unmapped",
        }
    }

    /// SQL predicate over the `internal_id` column
    pub(crate) fn predicate(&self) -> &'static str {
        match self {
            Self::All => "1 = 1",
            Self::Mapped => "internal_id IS NOT NULL",
            Self::Unmapped => "internal_id IS NULL",
        }
    }
}

impl std::str::FromStr for MappingFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "mapped" => Ok(Self::Mapped),
            "unmapped" => Ok(Self::Unmapped),
            _ => Err(format!("Unknown mapping filter: {}", s)),
        }
    }
}

/// A candidate internal entity proposed by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub internal_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub confidence: f64,
}

/// Matcher output stored alongside every mapping row.
///
/// reshelf never computes these values, it only validates and serves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatchInfo {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub match_reason: Option<String>,
    #[serde(default)]
    pub suggestions: Suggestions,
}

impl MatchInfo {
    pub fn validate(&self) -> Result<()> {
        check_confidence(self.confidence, "confidence")?;
        for s in &self.suggestions.0 {
            if s.internal_id.trim().is_empty() {
                return Err(Error::Validation(
                    "suggestion has an empty internal_id".to_string(),
                ));
            }
            check_confidence(s.confidence, "suggestion confidence")?;
        }
        Ok(())
    }
}

fn check_confidence(value: f64, what: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be within [0, 1], got {}",
            what, value
        )))
    }
}

/// Ordered candidate list, persisted as a JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Suggestions(pub Vec<MatchSuggestion>);

impl Suggestions {
    pub fn iter(&self) -> std::slice::Iter<'_, MatchSuggestion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<MatchSuggestion>> for Suggestions {
    fn from(v: Vec<MatchSuggestion>) -> Self {
        Self(v)
    }
}

impl ToSql for Suggestions {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let json = serde_json::to_string(&self.0)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(json))
    }
}

impl FromSql for Suggestions {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::default()),
            _ => {
                let text = value.as_str()?;
                serde_json::from_str(text)
                    .map(Self)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    }
}

/// Target of a mapping update. An empty `internal_id` clears the mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingTarget {
    pub internal_id: String,
    /// Denormalized display name (username or title)
    pub name: Option<String>,
    /// Secondary display field (email or author)
    pub detail: Option<String>,
}

impl MappingTarget {
    pub fn new(internal_id: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
            ..Default::default()
        }
    }

    pub fn clear() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_clear(&self) -> bool {
        self.internal_id.trim().is_empty()
    }
}

/// An external audiobook-server user and its catalog counterpart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMapping {
    pub import_id: String,
    pub external_id: String,
    pub external_username: String,
    pub external_email: Option<String>,
    pub internal_user_id: Option<String>,
    pub internal_username: Option<String>,
    pub internal_email: Option<String>,
    /// Set iff `internal_user_id` is present
    pub mapped_at: Option<DateTime<Utc>>,
    pub session_count: i64,
    pub total_listen_secs: f64,
    #[serde(flatten)]
    pub matching: MatchInfo,
}

impl UserMapping {
    pub fn is_mapped(&self) -> bool {
        self.internal_user_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserMapping {
    pub external_id: String,
    pub external_username: String,
    #[serde(default)]
    pub external_email: Option<String>,
    #[serde(default)]
    pub session_count: i64,
    #[serde(default)]
    pub total_listen_secs: f64,
    #[serde(flatten)]
    pub matching: MatchInfo,
}

/// An external library item (audiobook) and its catalog counterpart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMapping {
    pub import_id: String,
    pub external_id: String,
    pub external_title: String,
    pub external_author: Option<String>,
    pub external_asin: Option<String>,
    pub external_isbn: Option<String>,
    pub duration_secs: f64,
    pub internal_book_id: Option<String>,
    pub internal_title: Option<String>,
    pub internal_author: Option<String>,
    /// Set iff `internal_book_id` is present
    pub mapped_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub matching: MatchInfo,
}

impl BookMapping {
    pub fn is_mapped(&self) -> bool {
        self.internal_book_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookMapping {
    pub external_id: String,
    pub external_title: String,
    #[serde(default)]
    pub external_author: Option<String>,
    #[serde(default)]
    pub external_asin: Option<String>,
    #[serde(default)]
    pub external_isbn: Option<String>,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(flatten)]
    pub matching: MatchInfo,
}

// ========== Sessions ==========

/// Readiness of an imported listening session.
///
/// `PendingUser`, `PendingBook` and `Ready` are derived from mapping state;
/// `Imported` and `Skipped` are terminal and only reached by explicit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    PendingUser,
    PendingBook,
    Ready,
    Imported,
    Skipped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingUser => "pending_user",
            Self::PendingBook => "pending_book",
            Self::Ready => "ready",
            Self::Imported => "imported",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Imported | Self::Skipped)
    }

    /// Status a session should hold given the current mapping state.
    ///
    /// Checks run in order: an unmapped user always yields `PendingUser`
    /// regardless of the book. Terminal states are returned unchanged.
    pub fn derive(self, user_mapped: bool, book_mapped: bool) -> Self {
        if self.is_terminal() {
            self
        } else if !user_mapped {
            Self::PendingUser
        } else if !book_mapped {
            Self::PendingBook
        } else {
            Self::Ready
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_user" => Ok(Self::PendingUser),
            "pending_book" => Ok(Self::PendingBook),
            "ready" => Ok(Self::Ready),
            "imported" => Ok(Self::Imported),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing filter for sessions. `Pending` covers both pending sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionFilter {
    #[default]
    All,
    Pending,
    Ready,
    Imported,
    Skipped,
}

impl SessionFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Imported => "imported",
            Self::Skipped => "skipped",
        }
    }

    pub(crate) fn predicate(&self) -> &'static str {
        match self {
            Self::All => "1 = 1",
            Self::Pending => "status IN ('pending_user', 'pending_book')",
            Self::Ready => "status = 'ready'",
            Self::Imported => "status = 'imported'",
            Self::Skipped => "status = 'skipped'",
        }
    }
}

impl std::str::FromStr for SessionFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "imported" => Ok(Self::Imported),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown session filter: {}", s)),
        }
    }
}

impl std::fmt::Display for SessionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A listening session from the external snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub import_id: String,
    pub external_session_id: String,
    pub external_user_id: String,
    pub external_media_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub start_position: f64,
    pub end_position: f64,
    pub status: SessionStatus,
    pub imported_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportSession {
    pub external_session_id: String,
    pub external_user_id: String,
    pub external_media_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub start_position: f64,
    #[serde(default)]
    pub end_position: f64,
}

// ========== Progress ==========

/// Import status of a progress row, owned by the downstream importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    #[default]
    Pending,
    Imported,
    Skipped,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Imported => "imported",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "imported" => Ok(Self::Imported),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown progress status: {}", s)),
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite key of a progress row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey<'a> {
    pub import_id: &'a str,
    pub external_user_id: &'a str,
    pub external_media_id: &'a str,
}

/// Snapshot of a user's playback position in one book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub import_id: String,
    pub external_user_id: String,
    pub external_media_id: String,
    pub current_time: f64,
    pub duration: f64,
    /// Fraction in [0, 1]
    pub progress: f64,
    pub is_finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub status: ProgressStatus,
    pub imported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportProgress {
    pub external_user_id: String,
    pub external_media_id: String,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
}

// ========== Stats ==========

/// Mapped/unmapped counts for one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MappingCounts {
    pub mapped: i64,
    pub unmapped: i64,
}

impl MappingCounts {
    pub fn total(&self) -> i64 {
        self.mapped + self.unmapped
    }
}

/// Reconciliation progress for one import, derived from source tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportStats {
    /// Mapped users + mapped books
    pub mapped: i64,
    /// Unmapped users + unmapped books
    pub unmapped: i64,
    pub ready: i64,
    pub imported: i64,
    pub pending: i64,
    pub skipped: i64,
    pub users: MappingCounts,
    pub books: MappingCounts,
}

/// Outcome of one recompute pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecomputeSummary {
    /// Non-terminal sessions evaluated
    pub examined: usize,
    /// Sessions whose status changed
    pub changed: usize,
    pub pending_user: usize,
    pub pending_book: usize,
    pub ready: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_order() {
        let s = SessionStatus::PendingUser;
        assert_eq!(s.derive(false, false), SessionStatus::PendingUser);
        // Book mapped but user not: still pending on the user
        assert_eq!(s.derive(false, true), SessionStatus::PendingUser);
        assert_eq!(s.derive(true, false), SessionStatus::PendingBook);
        assert_eq!(s.derive(true, true), SessionStatus::Ready);
        // Ready sessions fall back when a mapping is cleared
        assert_eq!(SessionStatus::Ready.derive(true, false), SessionStatus::PendingBook);
    }

    #[test]
    fn test_derive_keeps_terminal() {
        for terminal in [SessionStatus::Imported, SessionStatus::Skipped] {
            for (u, b) in [(false, false), (true, false), (true, true)] {
                assert_eq!(terminal.derive(u, b), terminal);
            }
        }
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            SessionStatus::PendingUser,
            SessionStatus::PendingBook,
            SessionStatus::Ready,
            SessionStatus::Imported,
            SessionStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_session_filter_round_trip_strings() {
        for filter in [
            SessionFilter::All,
            SessionFilter::Pending,
            SessionFilter::Ready,
            SessionFilter::Imported,
            SessionFilter::Skipped,
        ] {
            assert_eq!(filter.as_str().parse::<SessionFilter>().unwrap(), filter);
            assert_eq!(filter.to_string(), filter.as_str());
        }
        assert!("pending_user".parse::<SessionFilter>().is_err());
    }

    #[test]
    fn test_match_info_validation() {
        let mut info = MatchInfo {
            confidence: 0.8,
            match_reason: Some("email".to_string()),
            suggestions: Suggestions(vec![MatchSuggestion {
                internal_id: "lu-1".to_string(),
                name: "alice".to_string(),
                detail: None,
                confidence: 0.8,
            }]),
        };
        assert!(info.validate().is_ok());

        info.confidence = 1.2;
        assert!(matches!(info.validate(), Err(Error::Validation(_))));

        info.confidence = 0.5;
        info.suggestions.0[0].confidence = -0.1;
        assert!(matches!(info.validate(), Err(Error::Validation(_))));

        info.confidence = f64::NAN;
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_mapping_target_clear() {
        assert!(MappingTarget::clear().is_clear());
        assert!(MappingTarget::new("  ").is_clear());
        assert!(!MappingTarget::new("lu-1").with_name("alice").is_clear());
    }
}
