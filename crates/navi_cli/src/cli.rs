//! Command-line argument definitions.
//!
//! Parsing only; execution lives in `main.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use navi_core::NodeType;
use std::path::PathBuf;

/// NAVI knowledge store CLI
#[derive(Parser)]
#[command(name = "navi")]
#[command(about = "Inspect and edit a NAVI knowledge store", long_about = None)]
#[command(version = navi_core::core_version())]
pub struct Cli {
    /// Store database file (in-memory store when omitted)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Byte quota of the store medium
    #[arg(long, global = true)]
    pub quota_bytes: Option<u64>,

    /// Absolute directory for rolling log files (logging off when omitted)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the tree, optionally filtered to branches matching a query
    Tree {
        #[arg(long)]
        query: Option<String>,
    },

    /// Append a child node under a parent
    Add {
        /// Parent node id
        #[arg(long, default_value = "root")]
        parent: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "type")]
        kind: Option<NodeType>,
    },

    /// Patch fields of an existing node
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "type")]
        kind: Option<NodeType>,
    },

    /// Delete a node and its subtree
    Delete { id: String },

    /// List nodes whose title or content contains a query
    Search { query: String },

    /// Record a completed conversation turn as a node under root
    Record {
        #[arg(long, value_enum)]
        mode: RecordMode,
        /// User input of the turn
        #[arg(long)]
        input: String,
        /// Tutor response of the turn
        #[arg(long)]
        response: String,
    },

    /// Write every entity as one JSON snapshot
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Install entities from a JSON snapshot file
    Import { file: PathBuf },

    /// Show storage usage per key
    Usage,

    /// Evict sessions idle past the stale threshold
    Evict,

    /// Inspect or edit conversation sessions
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },

    /// Inspect or edit settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },

    /// Remove all stored data
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List session ids with their last activity
    List,
    /// Print one session
    Show { id: String },
    /// Merge `name=value` attributes into a session
    Save {
        id: String,
        #[arg(value_name = "NAME=VALUE")]
        attributes: Vec<String>,
    },
    /// Delete one session
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print current settings
    Show,
    /// Merge `name=value` options into settings
    Set {
        #[arg(value_name = "NAME=VALUE", required = true)]
        options: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RecordMode {
    Learning,
    Questioning,
}
