//! Session command implementations (list, show, skip, mark-imported)

use anyhow::{Context, Result};
use reshelf_core::models::{ImportSession, SessionFilter, SessionStatus};
use reshelf_core::Database;

use super::{fmt_time, require_import, truncate};

fn status_icon(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::PendingUser => "👤",
        SessionStatus::PendingBook => "📕",
        SessionStatus::Ready => "🟢",
        SessionStatus::Imported => "✅",
        SessionStatus::Skipped => "⏭️ ",
    }
}

fn fmt_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as i64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub fn cmd_sessions_list(
    db: &Database,
    import_id: &str,
    filter: &str,
    limit: i64,
    offset: i64,
) -> Result<()> {
    let filter: SessionFilter = filter.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    require_import(db, import_id)?;

    let sessions = db.list_sessions(import_id, filter, limit, offset)?;
    let total = db.count_sessions(import_id, filter)?;

    if sessions.is_empty() {
        println!("No sessions found ({}).", filter.as_str());
        return Ok(());
    }

    println!();
    println!(
        "   {:<3} {:<14} {:<16} {:<12} {:<12} {:>9}  {}",
        "", "Session", "Started", "User", "Media", "Duration", "Status"
    );
    println!("   ─────────────────────────────────────────────────────────────────────────────────");

    for s in &sessions {
        println!(
            "   {:<3} {:<14} {:<16} {:<12} {:<12} {:>9}  {}",
            status_icon(s.status),
            truncate(&s.external_session_id, 14),
            s.started_at.format("%Y-%m-%d %H:%M"),
            truncate(&s.external_user_id, 12),
            truncate(&s.external_media_id, 12),
            fmt_duration(s.duration_secs),
            s.status,
        );
    }

    println!();
    println!(
        "Showing {}-{} of {} sessions ({})",
        offset + 1,
        offset + sessions.len() as i64,
        total,
        filter.as_str()
    );
    Ok(())
}

fn print_session(s: &ImportSession) {
    println!();
    println!("{} Session {}", status_icon(s.status), s.external_session_id);
    println!("   ─────────────────────────────");
    println!("   Status:    {}", s.status);
    println!("   User:      {}", s.external_user_id);
    println!("   Media:     {}", s.external_media_id);
    println!("   Started:   {}", s.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "   Listened:  {} ({} → {})",
        fmt_duration(s.duration_secs),
        fmt_duration(s.start_position),
        fmt_duration(s.end_position)
    );
    if s.imported_at.is_some() {
        println!("   Imported:  {}", fmt_time(s.imported_at.as_ref()));
    }
    if let Some(reason) = &s.skip_reason {
        println!("   Skipped:   {}", reason);
    }
}

pub fn cmd_sessions_show(db: &Database, import_id: &str, session_id: &str) -> Result<()> {
    let session = db
        .get_session(import_id, session_id)
        .with_context(|| format!("No session '{}' in import '{}'", session_id, import_id))?;
    print_session(&session);
    Ok(())
}

pub fn cmd_sessions_skip(
    db: &Database,
    import_id: &str,
    session_id: &str,
    reason: &str,
) -> Result<()> {
    let session = db
        .skip_session(import_id, session_id, reason)
        .with_context(|| format!("Failed to skip session '{}'", session_id))?;
    println!(
        "✅ Skipped session '{}': {}",
        session.external_session_id, reason
    );
    Ok(())
}

pub fn cmd_sessions_mark_imported(db: &Database, import_id: &str, session_id: &str) -> Result<()> {
    let session = db
        .mark_session_imported(import_id, session_id)
        .with_context(|| format!("Failed to mark session '{}' imported", session_id))?;
    println!(
        "✅ Session '{}' marked imported at {}",
        session.external_session_id,
        fmt_time(session.imported_at.as_ref())
    );
    Ok(())
}
