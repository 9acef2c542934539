//! Mapping review commands, shared by `reshelf users` and `reshelf books`

use anyhow::{Context, Result};
use reshelf_core::models::{BookMapping, MappingFilter, MappingTarget, MatchInfo, UserMapping};
use reshelf_core::{Config, Database, MappingKind};

use super::{fmt_time, require_import, truncate};
use crate::cli::MappingAction;

/// Table columns for a mapping row
pub trait MappingRow: MappingKind {
    fn external_key(&self) -> &str;
    /// Username or title
    fn label(&self) -> &str;
    /// Email or author
    fn secondary(&self) -> Option<&str>;
    fn internal_id(&self) -> Option<&str>;
    fn internal_label(&self) -> Option<&str>;
    fn matching(&self) -> &MatchInfo;
    fn mapped_at(&self) -> Option<&chrono::DateTime<chrono::Utc>>;
}

impl MappingRow for UserMapping {
    fn external_key(&self) -> &str {
        &self.external_id
    }
    fn label(&self) -> &str {
        &self.external_username
    }
    fn secondary(&self) -> Option<&str> {
        self.external_email.as_deref()
    }
    fn internal_id(&self) -> Option<&str> {
        self.internal_user_id.as_deref()
    }
    fn internal_label(&self) -> Option<&str> {
        self.internal_username.as_deref()
    }
    fn matching(&self) -> &MatchInfo {
        &self.matching
    }
    fn mapped_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.mapped_at.as_ref()
    }
}

impl MappingRow for BookMapping {
    fn external_key(&self) -> &str {
        &self.external_id
    }
    fn label(&self) -> &str {
        &self.external_title
    }
    fn secondary(&self) -> Option<&str> {
        self.external_author.as_deref()
    }
    fn internal_id(&self) -> Option<&str> {
        self.internal_book_id.as_deref()
    }
    fn internal_label(&self) -> Option<&str> {
        self.internal_title.as_deref()
    }
    fn matching(&self) -> &MatchInfo {
        &self.matching
    }
    fn mapped_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.mapped_at.as_ref()
    }
}

/// Dispatch a `users`/`books` subcommand for mapping kind `K`
pub fn run_mapping_action<K: MappingRow>(
    db: &Database,
    config: &Config,
    import_id: &str,
    action: Option<MappingAction>,
) -> Result<()> {
    match action {
        None => cmd_mappings_list::<K>(db, import_id, "all", config.page_size, 0),
        Some(MappingAction::List {
            filter,
            limit,
            offset,
        }) => cmd_mappings_list::<K>(
            db,
            import_id,
            &filter,
            limit.unwrap_or(config.page_size),
            offset,
        ),
        Some(MappingAction::Show { external_id }) => {
            cmd_mappings_show::<K>(db, import_id, &external_id)
        }
        Some(MappingAction::Map {
            external_id,
            internal_id,
            name,
            detail,
        }) => {
            let mut target = MappingTarget::new(internal_id);
            target.name = name;
            target.detail = detail;
            cmd_mappings_map::<K>(
                db,
                import_id,
                &external_id,
                &target,
                config.recompute_after_mapping,
            )
        }
        Some(MappingAction::Unmap { external_id }) => cmd_mappings_map::<K>(
            db,
            import_id,
            &external_id,
            &MappingTarget::clear(),
            config.recompute_after_mapping,
        ),
    }
}

pub fn cmd_mappings_list<K: MappingRow>(
    db: &Database,
    import_id: &str,
    filter: &str,
    limit: i64,
    offset: i64,
) -> Result<()> {
    let filter: MappingFilter = filter.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    require_import(db, import_id)?;

    let rows = db.list_mappings_page::<K>(import_id, filter, limit, offset)?;
    let total = db.count_mappings::<K>(import_id, filter)?;

    if rows.is_empty() {
        println!("No {} mappings found ({}).", K::KIND, filter.as_str());
        return Ok(());
    }

    println!();
    println!(
        "   {:<14} {:<30} {:<22} {:>5}  {}",
        "External", "Name", "Detail", "Conf", "Catalog"
    );
    println!("   ─────────────────────────────────────────────────────────────────────────────────────");

    for row in &rows {
        let catalog = match (row.internal_id(), row.internal_label()) {
            (Some(id), Some(label)) => format!("✓ {} ({})", id, label),
            (Some(id), None) => format!("✓ {}", id),
            _ => match row.matching().suggestions.iter().next() {
                Some(top) => format!("? {} {:.0}%", top.internal_id, top.confidence * 100.0),
                None => "-".to_string(),
            },
        };
        println!(
            "   {:<14} {:<30} {:<22} {:>4.0}%  {}",
            truncate(row.external_key(), 14),
            truncate(row.label(), 30),
            truncate(row.secondary().unwrap_or("-"), 22),
            row.matching().confidence * 100.0,
            catalog,
        );
    }

    println!();
    println!(
        "Showing {}-{} of {} {} mappings ({})",
        offset + 1,
        offset + rows.len() as i64,
        total,
        K::KIND,
        filter.as_str()
    );
    Ok(())
}

pub fn cmd_mappings_show<K: MappingRow>(
    db: &Database,
    import_id: &str,
    external_id: &str,
) -> Result<()> {
    let row = db
        .get_mapping::<K>(import_id, external_id)
        .with_context(|| format!("No {} '{}' in import '{}'", K::KIND, external_id, import_id))?;
    let matching = row.matching();

    println!();
    println!("🔗 {} {}", K::KIND, row.external_key());
    println!("   ─────────────────────────────");
    println!("   Name:       {}", row.label());
    if let Some(detail) = row.secondary() {
        println!("   Detail:     {}", detail);
    }
    match row.internal_id() {
        Some(id) => {
            println!(
                "   Mapped to:  {}{}",
                id,
                row.internal_label()
                    .map(|l| format!(" ({})", l))
                    .unwrap_or_default()
            );
            println!("   Mapped at:  {}", fmt_time(row.mapped_at()));
        }
        None => println!("   Mapped to:  (unmapped)"),
    }
    println!(
        "   Confidence: {:.0}%{}",
        matching.confidence * 100.0,
        matching
            .match_reason
            .as_deref()
            .map(|r| format!(" via {}", r))
            .unwrap_or_default()
    );

    if !matching.suggestions.is_empty() {
        println!();
        println!("   Suggestions:");
        for (i, s) in matching.suggestions.iter().enumerate() {
            println!(
                "   {}. {:<16} {:<30} {:>4.0}%{}",
                i + 1,
                truncate(&s.internal_id, 16),
                truncate(&s.name, 30),
                s.confidence * 100.0,
                s.detail
                    .as_deref()
                    .map(|d| format!("  {}", d))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Set or clear a mapping, then recompute when configured to
pub fn cmd_mappings_map<K: MappingRow>(
    db: &Database,
    import_id: &str,
    external_id: &str,
    target: &MappingTarget,
    recompute: bool,
) -> Result<()> {
    let row = db
        .set_mapping::<K>(import_id, external_id, target)
        .with_context(|| format!("Failed to update {} '{}'", K::KIND, external_id))?;

    match row.internal_id() {
        Some(id) => println!("✅ Mapped {} '{}' → {}", K::KIND, row.label(), id),
        None => println!("✅ Cleared mapping for {} '{}'", K::KIND, row.label()),
    }

    if recompute {
        let summary = db.recompute_sessions(import_id)?;
        println!(
            "   Recomputed {} sessions ({} changed, {} ready)",
            summary.examined, summary.changed, summary.ready
        );
    } else {
        println!(
            "   Run 'reshelf recompute --import {}' to refresh session statuses.",
            import_id
        );
    }

    Ok(())
}
