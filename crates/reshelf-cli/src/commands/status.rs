//! Database status command

use std::path::Path;

use anyhow::Result;
use reshelf_core::db::DB_KEY_ENV;
use reshelf_core::Database;

use super::{open_db, truncate};

/// One line per import: mapping backlog and sessions still to import
fn print_import_backlog(db: &Database) -> Result<()> {
    let imports = db.list_imports()?;

    println!();
    if imports.is_empty() {
        println!("   No imports yet. Load one with 'reshelf load --file snapshot.json'.");
        return Ok(());
    }

    println!(
        "   {:<20} {:<10} {:>9} {:>9} {:>7} {:>9}",
        "Import", "Status", "Unmapped", "Pending", "Ready", "Imported"
    );
    for import in &imports {
        let stats = db.import_stats(&import.id)?;
        println!(
            "   {:<20} {:<10} {:>9} {:>9} {:>7} {:>9}",
            truncate(&import.id, 20),
            import.status.as_str(),
            stats.unmapped,
            stats.pending,
            stats.ready,
            stats.imported,
        );
    }
    Ok(())
}

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!();
    println!("📊 reshelf Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if !db_path.exists() {
        println!("   (database not initialized, run 'reshelf init')");
        println!();
        return Ok(());
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    match open_db(db_path, no_encrypt) {
        Ok(db) => {
            if db.is_encrypted() {
                println!("   🔒 Encryption: ENABLED");
            } else {
                println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
            }
            print_import_backlog(&db)?;
        }
        Err(e) => {
            println!("   ❌ Error opening database: {}", e);
            if !no_encrypt && !has_key {
                println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
            } else if has_key {
                println!("      (Check if {} is correct)", DB_KEY_ENV);
            }
        }
    }

    println!();
    Ok(())
}
