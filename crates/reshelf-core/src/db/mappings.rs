//! Mapping registry: external → internal identity correspondences
//!
//! Users and books share one implementation. Each kind describes its table
//! and its external columns through [`MappingKind`]; the internal side of a
//! mapping (`internal_id`, `internal_name`, `internal_detail`, `mapped_at`)
//! and the matcher output (`confidence`, `match_reason`, `suggestions`) use
//! the same column names in both tables.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{format_datetime, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    BookMapping, EntityKind, MappingCounts, MappingFilter, MappingTarget, MatchInfo,
    NewBookMapping, NewUserMapping, UserMapping,
};

/// An entity kind stored in the mapping registry
pub trait MappingKind: Sized {
    const KIND: EntityKind;
    const TABLE: &'static str;
    /// Select list understood by `from_row`
    const COLUMNS: &'static str;
    /// Display column listings are ordered by
    const SORT_COLUMN: &'static str;

    /// Ingestion payload for `register_mapping`
    type New;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn external_id(new: &Self::New) -> &str;

    fn match_info(new: &Self::New) -> &MatchInfo;

    fn insert(conn: &Connection, import_id: &str, new: &Self::New) -> rusqlite::Result<usize>;
}

impl MappingKind for UserMapping {
    const KIND: EntityKind = EntityKind::User;
    const TABLE: &'static str = "user_mappings";
    const COLUMNS: &'static str = "import_id, external_id, external_username, external_email, \
        internal_id, internal_name, internal_detail, mapped_at, \
        session_count, total_listen_secs, confidence, match_reason, suggestions";
    const SORT_COLUMN: &'static str = "external_username";

    type New = NewUserMapping;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserMapping {
            import_id: row.get(0)?,
            external_id: row.get(1)?,
            external_username: row.get(2)?,
            external_email: row.get(3)?,
            internal_user_id: row.get(4)?,
            internal_username: row.get(5)?,
            internal_email: row.get(6)?,
            mapped_at: parse_optional_datetime(row.get(7)?),
            session_count: row.get(8)?,
            total_listen_secs: row.get(9)?,
            matching: MatchInfo {
                confidence: row.get(10)?,
                match_reason: row.get(11)?,
                suggestions: row.get(12)?,
            },
        })
    }

    fn external_id(new: &NewUserMapping) -> &str {
        &new.external_id
    }

    fn match_info(new: &NewUserMapping) -> &MatchInfo {
        &new.matching
    }

    fn insert(conn: &Connection, import_id: &str, new: &NewUserMapping) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO user_mappings
                (import_id, external_id, external_username, external_email,
                 session_count, total_listen_secs, confidence, match_reason, suggestions)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                import_id,
                new.external_id,
                new.external_username,
                new.external_email,
                new.session_count,
                new.total_listen_secs,
                new.matching.confidence,
                new.matching.match_reason,
                new.matching.suggestions,
            ],
        )
    }
}

impl MappingKind for BookMapping {
    const KIND: EntityKind = EntityKind::Book;
    const TABLE: &'static str = "book_mappings";
    const COLUMNS: &'static str = "import_id, external_id, external_title, external_author, \
        external_asin, external_isbn, duration_secs, \
        internal_id, internal_name, internal_detail, mapped_at, \
        confidence, match_reason, suggestions";
    const SORT_COLUMN: &'static str = "external_title";

    type New = NewBookMapping;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BookMapping {
            import_id: row.get(0)?,
            external_id: row.get(1)?,
            external_title: row.get(2)?,
            external_author: row.get(3)?,
            external_asin: row.get(4)?,
            external_isbn: row.get(5)?,
            duration_secs: row.get(6)?,
            internal_book_id: row.get(7)?,
            internal_title: row.get(8)?,
            internal_author: row.get(9)?,
            mapped_at: parse_optional_datetime(row.get(10)?),
            matching: MatchInfo {
                confidence: row.get(11)?,
                match_reason: row.get(12)?,
                suggestions: row.get(13)?,
            },
        })
    }

    fn external_id(new: &NewBookMapping) -> &str {
        &new.external_id
    }

    fn match_info(new: &NewBookMapping) -> &MatchInfo {
        &new.matching
    }

    fn insert(conn: &Connection, import_id: &str, new: &NewBookMapping) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO book_mappings
                (import_id, external_id, external_title, external_author, external_asin,
                 external_isbn, duration_secs, confidence, match_reason, suggestions)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                import_id,
                new.external_id,
                new.external_title,
                new.external_author,
                new.external_asin,
                new.external_isbn,
                new.duration_secs,
                new.matching.confidence,
                new.matching.match_reason,
                new.matching.suggestions,
            ],
        )
    }
}

/// External ids of every mapped row of kind `K` in an import
pub(crate) fn mapped_external_ids<K: MappingKind>(
    conn: &Connection,
    import_id: &str,
) -> rusqlite::Result<HashSet<String>> {
    let sql = format!(
        "SELECT external_id FROM {} WHERE import_id = ? AND internal_id IS NOT NULL",
        K::TABLE
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![import_id], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(ids)
}

pub(crate) fn count_mappings_on<K: MappingKind>(
    conn: &Connection,
    import_id: &str,
) -> rusqlite::Result<MappingCounts> {
    let sql = format!(
        "SELECT COUNT(internal_id), COUNT(*) - COUNT(internal_id) FROM {} WHERE import_id = ?",
        K::TABLE
    );
    conn.query_row(&sql, params![import_id], |row| {
        Ok(MappingCounts {
            mapped: row.get(0)?,
            unmapped: row.get(1)?,
        })
    })
}

impl Database {
    /// Register an unresolved mapping row (ingestion only)
    pub fn register_mapping<K: MappingKind>(&self, import_id: &str, new: &K::New) -> Result<()> {
        K::match_info(new).validate()?;
        let external_id = K::external_id(new);
        if external_id.trim().is_empty() {
            return Err(Error::Validation(format!(
                "{} mapping has an empty external id",
                K::KIND
            )));
        }

        let conn = self.conn()?;
        K::insert(&conn, import_id, new).map_err(|e| {
            Error::on_insert(
                e,
                format!("{} {} in import {}", K::KIND, external_id, import_id),
            )
        })?;

        debug!(import_id, external_id, kind = %K::KIND, "Registered mapping");
        Ok(())
    }

    /// Set or clear the internal entity a row maps to.
    ///
    /// A non-empty `internal_id` stamps `mapped_at` and stores the display
    /// fields; an empty one clears all four. Concurrent calls for the same
    /// row are last-write-wins.
    pub fn set_mapping<K: MappingKind>(
        &self,
        import_id: &str,
        external_id: &str,
        target: &MappingTarget,
    ) -> Result<K> {
        let conn = self.conn()?;

        let affected = if target.is_clear() {
            let sql = format!(
                "UPDATE {} SET internal_id = NULL, internal_name = NULL, internal_detail = NULL, \
                 mapped_at = NULL WHERE import_id = ? AND external_id = ?",
                K::TABLE
            );
            conn.execute(&sql, params![import_id, external_id])?
        } else {
            let sql = format!(
                "UPDATE {} SET internal_id = ?, internal_name = ?, internal_detail = ?, \
                 mapped_at = ? WHERE import_id = ? AND external_id = ?",
                K::TABLE
            );
            conn.execute(
                &sql,
                params![
                    target.internal_id.trim(),
                    target.name,
                    target.detail,
                    format_datetime(&Utc::now()),
                    import_id,
                    external_id,
                ],
            )?
        };

        if affected == 0 {
            return Err(Error::NotFound(format!(
                "{} {} in import {}",
                K::KIND,
                external_id,
                import_id
            )));
        }

        debug!(
            import_id,
            external_id,
            kind = %K::KIND,
            internal_id = %target.internal_id,
            cleared = target.is_clear(),
            "Updated mapping"
        );

        Self::get_mapping_on::<K>(&conn, import_id, external_id)
    }

    /// Clear a mapping; shorthand for `set_mapping` with an empty target
    pub fn clear_mapping<K: MappingKind>(&self, import_id: &str, external_id: &str) -> Result<K> {
        self.set_mapping::<K>(import_id, external_id, &MappingTarget::clear())
    }

    /// Get a single mapping row
    pub fn get_mapping<K: MappingKind>(&self, import_id: &str, external_id: &str) -> Result<K> {
        let conn = self.conn()?;
        Self::get_mapping_on::<K>(&conn, import_id, external_id)
    }

    fn get_mapping_on<K: MappingKind>(
        conn: &Connection,
        import_id: &str,
        external_id: &str,
    ) -> Result<K> {
        let sql = format!(
            "SELECT {} FROM {} WHERE import_id = ? AND external_id = ?",
            K::COLUMNS,
            K::TABLE
        );
        conn.query_row(&sql, params![import_id, external_id], K::from_row)
            .optional()?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{} {} in import {}",
                    K::KIND,
                    external_id,
                    import_id
                ))
            })
    }

    /// List mapping rows ordered by display name (ties broken by external id)
    pub fn list_mappings<K: MappingKind>(
        &self,
        import_id: &str,
        filter: MappingFilter,
    ) -> Result<Vec<K>> {
        self.list_mappings_page::<K>(import_id, filter, -1, 0)
    }

    /// Paginated variant of `list_mappings`. A negative limit means no limit.
    pub fn list_mappings_page<K: MappingKind>(
        &self,
        import_id: &str,
        filter: MappingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<K>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE import_id = ? AND {} ORDER BY {} ASC, external_id ASC \
             LIMIT ? OFFSET ?",
            K::COLUMNS,
            K::TABLE,
            filter.predicate(),
            K::SORT_COLUMN
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![import_id, limit, offset], K::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Count mapping rows matching a filter
    pub fn count_mappings<K: MappingKind>(
        &self,
        import_id: &str,
        filter: MappingFilter,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE import_id = ? AND {}",
            K::TABLE,
            filter.predicate()
        );
        let count: i64 = conn.query_row(&sql, params![import_id], |row| row.get(0))?;
        Ok(count)
    }

    /// Mapped/unmapped counts for one kind
    pub fn mapping_counts<K: MappingKind>(&self, import_id: &str) -> Result<MappingCounts> {
        let conn = self.conn()?;
        Ok(count_mappings_on::<K>(&conn, import_id)?)
    }

    // Concrete-kind shorthands

    pub fn register_user(&self, import_id: &str, user: &NewUserMapping) -> Result<()> {
        self.register_mapping::<UserMapping>(import_id, user)
    }

    pub fn register_book(&self, import_id: &str, book: &NewBookMapping) -> Result<()> {
        self.register_mapping::<BookMapping>(import_id, book)
    }

    pub fn set_user_mapping(
        &self,
        import_id: &str,
        external_id: &str,
        target: &MappingTarget,
    ) -> Result<UserMapping> {
        self.set_mapping::<UserMapping>(import_id, external_id, target)
    }

    pub fn set_book_mapping(
        &self,
        import_id: &str,
        external_id: &str,
        target: &MappingTarget,
    ) -> Result<BookMapping> {
        self.set_mapping::<BookMapping>(import_id, external_id, target)
    }
}
