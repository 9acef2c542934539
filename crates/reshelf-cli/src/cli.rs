//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// reshelf - Reconcile an audiobook server backup against the catalog
#[derive(Parser)]
#[command(name = "reshelf")]
#[command(about = "Operator console for audiobook import reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides [database] path from the config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ~/.local/share/reshelf/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set RESHELF_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, size, imports)
    Status,

    /// Load a matched snapshot document as a new import
    Load {
        /// Snapshot JSON file produced by the ingestion step
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage imports (list, show, delete)
    Imports {
        #[command(subcommand)]
        action: Option<ImportsAction>,
    },

    /// Review and resolve user mappings
    Users {
        /// Import id
        #[arg(short, long)]
        import: String,

        #[command(subcommand)]
        action: Option<MappingAction>,
    },

    /// Review and resolve book mappings
    Books {
        /// Import id
        #[arg(short, long)]
        import: String,

        #[command(subcommand)]
        action: Option<MappingAction>,
    },

    /// Inspect sessions and record import outcomes
    Sessions {
        /// Import id
        #[arg(short, long)]
        import: String,

        #[command(subcommand)]
        action: Option<SessionsAction>,
    },

    /// Inspect mirrored playback progress
    Progress {
        /// Import id
        #[arg(short, long)]
        import: String,

        #[command(subcommand)]
        action: Option<ProgressAction>,
    },

    /// Re-derive session statuses from the current mappings
    Recompute {
        /// Import id
        #[arg(short, long)]
        import: String,
    },

    /// Show reconciliation stats for an import
    Stats {
        /// Import id
        #[arg(short, long)]
        import: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ImportsAction {
    /// List imports, newest first
    List,
    /// Show one import with its counters
    Show {
        /// Import id
        id: String,
    },
    /// Delete an import and everything recorded under it
    Delete {
        /// Import id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MappingAction {
    /// List mappings
    List {
        /// Filter: all, mapped, unmapped
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Maximum rows (defaults to [listing] page_size)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },
    /// Show one mapping with the matcher's suggestions
    Show {
        /// External id
        external_id: String,
    },
    /// Map an external entity to a catalog id
    Map {
        /// External id
        external_id: String,

        /// Catalog id
        internal_id: String,

        /// Catalog display name
        #[arg(long)]
        name: Option<String>,

        /// Catalog secondary detail (email or author)
        #[arg(long)]
        detail: Option<String>,
    },
    /// Clear a mapping
    Unmap {
        /// External id
        external_id: String,
    },
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List sessions by start time
    List {
        /// Filter: all, pending, ready, imported, skipped
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Maximum rows (defaults to [listing] page_size)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },
    /// Show one session
    Show {
        /// External session id
        id: String,
    },
    /// Exclude a session from import
    Skip {
        /// External session id
        id: String,

        /// Why the session is skipped
        #[arg(short, long)]
        reason: String,
    },
    /// Record that a session was written to the catalog
    MarkImported {
        /// External session id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ProgressAction {
    /// List progress rows for a user, or by status
    List {
        /// External user id (lists that user's rows, most recent first)
        #[arg(short, long)]
        user: Option<String>,

        /// Status when no user is given: pending, imported, skipped
        #[arg(short, long, default_value = "pending")]
        status: String,

        /// Maximum rows (defaults to [listing] page_size)
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Show one progress row
    Show {
        /// External user id
        user: String,
        /// External media id
        media: String,
    },
    /// Look up a user's progress by the catalog book it was mapped to
    ForBook {
        /// External user id
        user: String,
        /// Catalog book id
        internal_book_id: String,
    },
    /// Record the importer's outcome for a progress row
    Mark {
        /// External user id
        user: String,
        /// External media id
        media: String,
        /// New status: pending, imported, skipped
        status: String,
    },
}
