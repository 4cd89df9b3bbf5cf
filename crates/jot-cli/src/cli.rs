use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "jot")]
#[command(about = "Offline-first notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Owning user for created and listed records
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Treat the remote store as unreachable; every mutation is queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Quick capture: jot "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note content
        content: Vec<String>,
        /// Optional title
        #[arg(short, long)]
        title: Option<String>,
        /// Capture format
        #[arg(long, value_enum, default_value_t = NoteKindArg::Text)]
        kind: NoteKindArg,
        /// Object storage URL of the note's media
        #[arg(long, value_name = "URL")]
        media_url: Option<String>,
    },
    /// List recent notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Push queued operations to the remote store
    Sync,
    /// Fetch remote records and merge them into the local store
    Pull,
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queued operations
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum NoteKindArg {
    Text,
    Audio,
    Image,
    Video,
}

impl From<NoteKindArg> for jot_core::NoteKind {
    fn from(kind: NoteKindArg) -> Self {
        match kind {
            NoteKindArg::Text => Self::Text,
            NoteKindArg::Audio => Self::Audio,
            NoteKindArg::Image => Self::Image,
            NoteKindArg::Video => Self::Video,
        }
    }
}
