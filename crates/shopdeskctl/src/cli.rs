//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap.
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shopdesk back-office status tool
#[derive(Parser, Debug)]
#[command(name = "shopdeskctl")]
#[command(about = "Shopdesk - entity flags, status lifecycles and badges", long_about = None)]
#[command(version = env!("SHOPDESK_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Database file (overrides $SHOPDESK_DB and the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (overrides the user and system config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output JSON only
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and show where it lives
    Init {
        /// Also write the effective config to --config or the user config path
        #[arg(long)]
        write_config: bool,
    },

    /// Create an entity
    Create {
        /// Entity kind (address, order, product, ...)
        kind: String,

        /// Owning scope, e.g. the customer id for addresses
        #[arg(long)]
        scope: Option<i64>,

        /// Flags to switch on (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
    },

    /// Show one entity
    Show { id: i64 },

    /// List entities of a kind
    List {
        kind: String,

        #[arg(long)]
        scope: Option<i64>,
    },

    /// Make an entity the only holder of an exclusive flag in its scope
    SetDefault {
        scope: i64,
        id: i64,

        #[arg(long, default_value = "is_default")]
        flag: String,
    },

    /// Flip a flag
    Toggle { id: i64, flag: String },

    /// Set a flag to an explicit value
    Set {
        id: i64,
        flag: String,
        #[arg(action = clap::ArgAction::Set, required = true)]
        value: bool,
    },

    /// Move an entity to another status
    Transition { id: i64, status: String },

    /// Set a flag on many entities
    Bulk {
        flag: String,
        #[arg(action = clap::ArgAction::Set, required = true)]
        value: bool,

        #[arg(required = true)]
        ids: Vec<i64>,

        /// atomic or best_effort (defaults to the config)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Duplicate an entity
    Replicate { id: i64 },

    /// Navigation badge for a kind
    Badge {
        kind: String,

        #[arg(long, default_value = "is_active")]
        flag: String,
    },

    /// Entity count per status
    Summary { kind: String },

    /// Show or record usage of a discount or campaign
    Usage {
        id: i64,

        /// Record one use with this reference
        #[arg(long)]
        record: Option<String>,
    },

    /// Recent journal entries
    Events {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Order total from its amounts in cents
    Total {
        #[arg(long, default_value_t = 0)]
        subtotal: u64,
        #[arg(long, default_value_t = 0)]
        tax: u64,
        #[arg(long, default_value_t = 0)]
        shipping: u64,
        #[arg(long, default_value_t = 0)]
        discount: u64,
    },
}
