//! Progress mirror commands

use anyhow::{Context, Result};
use reshelf_core::models::{ImportProgress, ProgressKey, ProgressStatus};
use reshelf_core::Database;

use super::{fmt_time, require_import, truncate};

fn print_progress_table(rows: &[ImportProgress]) {
    println!();
    println!(
        "   {:<12} {:<14} {:>6} {:<8} {:<16} {}",
        "User", "Media", "Done", "Finished", "Last update", "Status"
    );
    println!("   ─────────────────────────────────────────────────────────────────────");

    for p in rows {
        println!(
            "   {:<12} {:<14} {:>5.0}% {:<8} {:<16} {}",
            truncate(&p.external_user_id, 12),
            truncate(&p.external_media_id, 14),
            p.progress * 100.0,
            if p.is_finished { "yes" } else { "no" },
            p.last_update.format("%Y-%m-%d %H:%M"),
            p.status,
        );
    }
}

fn print_progress(p: &ImportProgress) {
    println!();
    println!("📖 Progress {} / {}", p.external_user_id, p.external_media_id);
    println!("   ─────────────────────────────");
    println!(
        "   Position:  {:.0}s of {:.0}s ({:.1}%)",
        p.current_time,
        p.duration,
        p.progress * 100.0
    );
    if p.is_finished {
        println!("   Finished:  {}", fmt_time(p.finished_at.as_ref()));
    }
    println!("   Updated:   {}", p.last_update.format("%Y-%m-%d %H:%M:%S"));
    println!("   Status:    {}", p.status);
    if p.imported_at.is_some() {
        println!("   Imported:  {}", fmt_time(p.imported_at.as_ref()));
    }
}

pub fn cmd_progress_list(
    db: &Database,
    import_id: &str,
    user: Option<&str>,
    status: &str,
    limit: i64,
) -> Result<()> {
    require_import(db, import_id)?;

    let rows = match user {
        Some(user) => db.list_progress_for_user(import_id, user)?,
        None => {
            let status: ProgressStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            db.list_progress_by_status(import_id, status, limit, 0)?
        }
    };

    if rows.is_empty() {
        println!("No progress rows found.");
        return Ok(());
    }

    print_progress_table(&rows);
    println!();
    println!("{} rows", rows.len());
    Ok(())
}

pub fn cmd_progress_show(db: &Database, import_id: &str, user: &str, media: &str) -> Result<()> {
    let key = ProgressKey {
        import_id,
        external_user_id: user,
        external_media_id: media,
    };
    let row = db
        .get_progress(&key)
        .with_context(|| format!("No progress for user '{}' on '{}'", user, media))?;
    print_progress(&row);
    Ok(())
}

pub fn cmd_progress_for_book(
    db: &Database,
    import_id: &str,
    user: &str,
    internal_book_id: &str,
) -> Result<()> {
    let row = db
        .get_progress_for_internal_book(import_id, user, internal_book_id)
        .with_context(|| {
            format!(
                "No progress for user '{}' on catalog book '{}'",
                user, internal_book_id
            )
        })?;
    print_progress(&row);
    Ok(())
}

pub fn cmd_progress_mark(
    db: &Database,
    import_id: &str,
    user: &str,
    media: &str,
    status: &str,
) -> Result<()> {
    let status: ProgressStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let key = ProgressKey {
        import_id,
        external_user_id: user,
        external_media_id: media,
    };
    let row = db.update_progress_status(&key, status)?;
    println!(
        "✅ Progress for '{}' on '{}' is now {}",
        row.external_user_id, row.external_media_id, row.status
    );
    Ok(())
}
