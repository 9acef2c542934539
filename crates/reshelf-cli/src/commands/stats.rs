//! Recompute and stats commands

use anyhow::Result;
use reshelf_core::Database;

use super::require_import;

pub fn cmd_recompute(db: &Database, import_id: &str) -> Result<()> {
    require_import(db, import_id)?;
    println!("🔄 Recomputing session statuses for '{}'...", import_id);

    let summary = db.recompute_sessions(import_id)?;

    println!();
    println!("   Examined:     {}", summary.examined);
    println!("   Changed:      {}", summary.changed);
    println!("   ─────────────────────────────");
    println!("   👤 Pending user: {}", summary.pending_user);
    println!("   📕 Pending book: {}", summary.pending_book);
    println!("   🟢 Ready:        {}", summary.ready);
    Ok(())
}

pub fn cmd_stats(db: &Database, import_id: &str, json: bool) -> Result<()> {
    let import = require_import(db, import_id)?;
    let stats = db.import_stats(import_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│          📊 Reconciliation Stats        │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Import:          {} ({})", import.id, import.status);
    println!();
    println!("  Mapped:          {}", stats.mapped);
    println!(
        "    users {} / books {}",
        stats.users.mapped, stats.books.mapped
    );
    println!("  Unmapped:        {}", stats.unmapped);
    println!(
        "    users {} / books {}",
        stats.users.unmapped, stats.books.unmapped
    );
    println!();
    println!("  Sessions ready:    {}", stats.ready);
    println!("  Sessions imported: {}", stats.imported);
    println!("  Sessions pending:  {}", stats.pending);
    println!("  Sessions skipped:  {}", stats.skipped);

    if stats.unmapped > 0 {
        println!();
        println!(
            "💡 {} entities still need a mapping. Try 'reshelf users --import {} list --filter unmapped'.",
            stats.unmapped, import_id
        );
    }

    Ok(())
}
