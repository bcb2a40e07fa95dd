use carfault_common::{EntryId, ReconcileStrategy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carfault")]
#[command(author, version, about = "Car fault records with folder backups")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage fault entries
    #[command(subcommand)]
    Entry(EntryCommand),

    /// Export all entries and images into a folder
    Export {
        /// Target folder (created if missing)
        #[arg(required = true)]
        dir: PathBuf,
    },

    /// Import an export document into the store
    Import {
        /// Path to carfault_export.json
        #[arg(required = true)]
        json: PathBuf,

        /// Folder holding `<id>/<file>` images (default: `images/` next to the document)
        #[arg(long)]
        images: Option<PathBuf>,
    },

    /// Merge an exported folder into the store
    Merge {
        /// Folder containing carfault_export.json and images/
        #[arg(required = true)]
        dir: PathBuf,

        /// Reconcile strategy: append_always, by_id or by_content_hash
        #[arg(long)]
        strategy: Option<ReconcileStrategy>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum EntryCommand {
    /// Add a new entry
    Add {
        /// Short title (at most 50 characters)
        #[arg(short, long)]
        title: String,

        /// Description (at most 500 characters)
        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        brand: Option<String>,

        /// Model name; needs --brand and --year
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Image file to copy into the entry (repeatable)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },

    /// List all entries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one entry
    Show {
        id: EntryId,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search titles and descriptions
    Search {
        query: String,

        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Delete an entry and its managed images
    Delete { id: EntryId },
}
