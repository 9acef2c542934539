//! reshelf CLI - Audiobook import reconciliation
//!
//! Usage:
//!   reshelf init                          Initialize database
//!   reshelf load --file snapshot.json     Load a matched snapshot
//!   reshelf users --import ID list        Review user mappings
//!   reshelf recompute --import ID         Re-derive session statuses
//!   reshelf stats --import ID             Show reconciliation progress

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::Parser;
use reshelf_core::models::{BookMapping, UserMapping};
use reshelf_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path.clone());

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&db_path, cli.no_encrypt),
        Commands::Load { file } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_load(&db, &file)
        }
        Commands::Imports { action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None | Some(ImportsAction::List) => commands::cmd_imports_list(&db),
                Some(ImportsAction::Show { id }) => commands::cmd_imports_show(&db, &id),
                Some(ImportsAction::Delete { id }) => commands::cmd_imports_delete(&db, &id),
            }
        }
        Commands::Users { import, action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::run_mapping_action::<UserMapping>(&db, &config, &import, action)
        }
        Commands::Books { import, action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::run_mapping_action::<BookMapping>(&db, &config, &import, action)
        }
        Commands::Sessions { import, action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None => commands::cmd_sessions_list(&db, &import, "all", config.page_size, 0),
                Some(SessionsAction::List {
                    filter,
                    limit,
                    offset,
                }) => commands::cmd_sessions_list(
                    &db,
                    &import,
                    &filter,
                    limit.unwrap_or(config.page_size),
                    offset,
                ),
                Some(SessionsAction::Show { id }) => commands::cmd_sessions_show(&db, &import, &id),
                Some(SessionsAction::Skip { id, reason }) => {
                    commands::cmd_sessions_skip(&db, &import, &id, &reason)
                }
                Some(SessionsAction::MarkImported { id }) => {
                    commands::cmd_sessions_mark_imported(&db, &import, &id)
                }
            }
        }
        Commands::Progress { import, action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None => commands::cmd_progress_list(&db, &import, None, "pending", config.page_size),
                Some(ProgressAction::List {
                    user,
                    status,
                    limit,
                }) => commands::cmd_progress_list(
                    &db,
                    &import,
                    user.as_deref(),
                    &status,
                    limit.unwrap_or(config.page_size),
                ),
                Some(ProgressAction::Show { user, media }) => {
                    commands::cmd_progress_show(&db, &import, &user, &media)
                }
                Some(ProgressAction::ForBook {
                    user,
                    internal_book_id,
                }) => commands::cmd_progress_for_book(&db, &import, &user, &internal_book_id),
                Some(ProgressAction::Mark {
                    user,
                    media,
                    status,
                }) => commands::cmd_progress_mark(&db, &import, &user, &media, &status),
            }
        }
        Commands::Recompute { import } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_recompute(&db, &import)
        }
        Commands::Stats { import, json } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_stats(&db, &import, json)
        }
    }
}
