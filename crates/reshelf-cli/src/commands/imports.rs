//! Import listing and deletion commands

use anyhow::Result;
use reshelf_core::Database;

use super::{require_import, truncate};

pub fn cmd_imports_list(db: &Database) -> Result<()> {
    let imports = db.list_imports()?;

    if imports.is_empty() {
        println!("No imports found. Run 'reshelf load --file snapshot.json' to add one.");
        return Ok(());
    }

    println!();
    println!(
        "   {:<20} {:<24} {:<10} {:>7} {:>7} {:>9}",
        "ID", "Name", "Status", "Users", "Books", "Sessions"
    );
    println!("   ─────────────────────────────────────────────────────────────────────────────────");

    for import in &imports {
        println!(
            "   {:<20} {:<24} {:<10} {:>7} {:>7} {:>9}",
            truncate(&import.id, 20),
            truncate(&import.name, 24),
            import.status.as_str(),
            format!("{}/{}", import.users_mapped, import.total_users),
            format!("{}/{}", import.books_mapped, import.total_books),
            format!("{}/{}", import.sessions_imported, import.total_sessions),
        );
    }

    println!();
    println!("Counts show mapped/total (users, books) and imported/total (sessions).");
    Ok(())
}

pub fn cmd_imports_show(db: &Database, import_id: &str) -> Result<()> {
    let import = require_import(db, import_id)?;

    println!();
    println!("📦 Import {}", import.id);
    println!("   ─────────────────────────────");
    println!("   Name:       {}", import.name);
    if !import.backup_path.is_empty() {
        println!("   Backup:     {}", import.backup_path);
    }
    println!("   Status:     {}", import.status);
    println!("   Created:    {}", import.created_at.format("%Y-%m-%d %H:%M"));
    println!("   Updated:    {}", import.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
    println!(
        "   Users:      {} of {} mapped",
        import.users_mapped, import.total_users
    );
    println!(
        "   Books:      {} of {} mapped",
        import.books_mapped, import.total_books
    );
    println!(
        "   Sessions:   {} of {} imported",
        import.sessions_imported, import.total_sessions
    );

    Ok(())
}

pub fn cmd_imports_delete(db: &Database, import_id: &str) -> Result<()> {
    let import = require_import(db, import_id)?;
    db.delete_import(&import.id)?;
    println!(
        "✅ Deleted import '{}' ({} users, {} books, {} sessions)",
        import.id, import.total_users, import.total_books, import.total_sessions
    );
    Ok(())
}
