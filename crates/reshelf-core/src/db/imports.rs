//! Import job operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Import, ImportStatus, NewImport};

const IMPORT_COLUMNS: &str = "id, name, backup_path, status, total_users, total_books, \
    total_sessions, users_mapped, books_mapped, sessions_imported, created_at, updated_at";

fn map_import_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Import> {
    let status_str: String = row.get(3)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Import {
        id: row.get(0)?,
        name: row.get(1)?,
        backup_path: row.get(2)?,
        status: status_str.parse().unwrap_or_default(),
        total_users: row.get(4)?,
        total_books: row.get(5)?,
        total_sessions: row.get(6)?,
        users_mapped: row.get(7)?,
        books_mapped: row.get(8)?,
        sessions_imported: row.get(9)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn get_import_on(conn: &Connection, id: &str) -> Result<Import> {
    conn.query_row(
        &format!("SELECT {} FROM imports WHERE id = ?", IMPORT_COLUMNS),
        params![id],
        map_import_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("import {}", id)))
}

/// Re-derive the denormalized counters from the child tables
pub(crate) fn refresh_counters_on(conn: &Connection, import_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        UPDATE imports SET
            total_users = (SELECT COUNT(*) FROM user_mappings WHERE import_id = ?1),
            total_books = (SELECT COUNT(*) FROM book_mappings WHERE import_id = ?1),
            total_sessions = (SELECT COUNT(*) FROM import_sessions WHERE import_id = ?1),
            users_mapped = (SELECT COUNT(*) FROM user_mappings
                            WHERE import_id = ?1 AND internal_id IS NOT NULL),
            books_mapped = (SELECT COUNT(*) FROM book_mappings
                            WHERE import_id = ?1 AND internal_id IS NOT NULL),
            sessions_imported = (SELECT COUNT(*) FROM import_sessions
                                 WHERE import_id = ?1 AND status = 'imported'),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?1
        "#,
        params![import_id],
    )
}

impl Database {
    /// Create an import job
    pub fn create_import(&self, import: &NewImport) -> Result<Import> {
        if import.id.trim().is_empty() {
            return Err(Error::Validation("import id must not be empty".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO imports (id, name, backup_path, status) VALUES (?, ?, ?, ?)",
            params![
                import.id,
                import.name,
                import.backup_path,
                ImportStatus::Pending.as_str()
            ],
        )
        .map_err(|e| Error::on_insert(e, format!("import {}", import.id)))?;

        info!(import_id = %import.id, name = %import.name, "Created import");
        get_import_on(&conn, &import.id)
    }

    /// Get an import by id
    pub fn get_import(&self, id: &str) -> Result<Import> {
        let conn = self.conn()?;
        get_import_on(&conn, id)
    }

    /// List imports, newest first
    pub fn list_imports(&self) -> Result<Vec<Import>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM imports ORDER BY created_at DESC, id ASC",
            IMPORT_COLUMNS
        ))?;
        let imports = stmt
            .query_map([], map_import_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(imports)
    }

    /// Update import status
    pub fn update_import_status(&self, id: &str, status: ImportStatus) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE imports SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if affected == 0 {
            return Err(Error::NotFound(format!("import {}", id)));
        }
        debug!(import_id = id, status = %status, "Import status updated");
        Ok(())
    }

    /// Recount users, books, sessions and their mapped/imported subsets
    pub fn refresh_import_counters(&self, id: &str) -> Result<Import> {
        let conn = self.conn()?;
        if refresh_counters_on(&conn, id)? == 0 {
            return Err(Error::NotFound(format!("import {}", id)));
        }
        get_import_on(&conn, id)
    }

    /// Delete an import and, through cascading foreign keys, all of its rows
    pub fn delete_import(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM imports WHERE id = ?", params![id])?;
        if affected == 0 {
            return Err(Error::NotFound(format!("import {}", id)));
        }
        info!(import_id = id, "Deleted import");
        Ok(())
    }
}
