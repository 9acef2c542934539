//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, load) and shared utilities (open_db)
//! - `imports` - Import listing and deletion
//! - `mappings` - User and book mapping review, shared across both kinds
//! - `progress` - Progress mirror lookups and status updates
//! - `sessions` - Session listing and explicit transitions
//! - `stats` - Recompute and stats commands
//! - `status` - Database status

pub mod core;
pub mod imports;
pub mod mappings;
pub mod progress;
pub mod sessions;
pub mod stats;
pub mod status;

// Re-export command functions for main.rs
pub use core::*;
pub use imports::*;
pub use mappings::*;
pub use progress::*;
pub use sessions::*;
pub use stats::*;
pub use status::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an optional timestamp for table output
pub fn fmt_time(dt: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    dt.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
