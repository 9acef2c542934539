//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `require_import` - Resolve an import id or fail with a readable message
//! - `cmd_init` - Initialize the database
//! - `cmd_load` - Load a snapshot document

use std::path::Path;

use anyhow::{Context, Result};
use reshelf_core::models::Import;
use reshelf_core::{Database, Snapshot};
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    debug!(path = path_str, encrypted = !no_encrypt, "Opening database");
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Look up an import, turning NotFound into a hint for the operator
pub fn require_import(db: &Database, import_id: &str) -> Result<Import> {
    db.get_import(import_id).with_context(|| {
        format!(
            "Import '{}' not found. Run 'reshelf imports' to list imports.",
            import_id
        )
    })
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Load a snapshot: reshelf load --file snapshot.json");
    println!("  2. Review mappings: reshelf users --import ID list --filter unmapped");

    Ok(())
}

pub fn cmd_load(db: &Database, file: &Path) -> Result<()> {
    println!("📥 Loading snapshot from {}...", file.display());

    let snapshot = Snapshot::from_file(file)
        .with_context(|| format!("Failed to read snapshot {}", file.display()))?;
    let summary = db
        .load_snapshot(&snapshot)
        .with_context(|| format!("Failed to load import '{}'", snapshot.import.id))?;

    let import = &summary.import;
    println!();
    println!("✅ Loaded import '{}' ({})", import.id, import.name);
    println!("   ─────────────────────────────");
    println!("   Users:    {}", import.total_users);
    println!("   Books:    {}", import.total_books);
    println!("   Sessions: {}", import.total_sessions);
    println!("   Progress: {}", snapshot.progress.len());
    println!();
    println!(
        "   Ready: {}   Pending user: {}   Pending book: {}",
        summary.recompute.ready, summary.recompute.pending_user, summary.recompute.pending_book
    );

    Ok(())
}
