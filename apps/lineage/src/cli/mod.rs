//! # Lineage CLI Module
//!
//! This module implements the CLI interface for the lineage dataset.
//!
//! ## Available Commands
//!
//! - `build` - Compile, validate and write the export
//! - `check` - Compile and validate without writing anything
//! - `remove-photo` - Delete one photo from a record and renumber
//! - `remove-author` - Delete every photo credited to an author
//! - `restore-author` - Re-add an author's photos from the commit that removed them
//! - `sort-locators` - Sort a record's provider photos into upload order
//! - `sort-updates` - Sort records touched by the last commit and backfill dates
//! - `dedupe` - Merge photos that share a URI, in every record
//! - `update-commit-dates` - Backfill commit dates from history
//! - `digest` - Show what was added recently

mod commands;

use clap::{Parser, Subcommand};
use lineage_core::LineageError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Lineage - red panda dataset tool
///
/// Compiles the plain-text animal, zoo and media records into one validated
/// graph, and maintains the photo lists inside those records.
#[derive(Parser, Debug)]
#[command(name = "lineage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress human-readable summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Repository root holding the record directories
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file, relative to the root unless absolute
    #[arg(long, global = true, default_value = "lineage.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile and validate the dataset, then write the export
    Build {
        /// Skip mining version-control history
        #[arg(long)]
        no_history: bool,
    },

    /// Compile and validate without writing the export
    Check,

    /// Remove one photo from a record and renumber the rest
    RemovePhoto {
        /// Record file
        path: PathBuf,

        /// Photo index to remove
        index: u32,
    },

    /// Remove every photo credited to an author
    RemoveAuthor {
        /// Author name as written in `photo.N.author`
        author: String,
    },

    /// Restore the photos of an author removed in an earlier commit
    RestoreAuthor {
        /// Author name as written in `photo.N.author`
        author: String,

        /// Commit that removed the photos (default: the most recent one)
        commit: Option<String>,
    },

    /// Sort a record's provider photos into upload order
    SortLocators {
        /// Record file
        path: PathBuf,
    },

    /// Sort the records touched by the last commit and backfill their dates
    SortUpdates,

    /// Merge photos that share a URI, in every record
    Dedupe,

    /// Backfill entity and photo commit dates from history
    UpdateCommitDates {
        /// Commit to start mining from (default: the whole history)
        commit: Option<String>,

        /// Overwrite dates that are already present
        #[arg(short, long)]
        force: bool,
    },

    /// Show the entities, photos and contributors added recently
    Digest,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), LineageError> {
    let workspace = Workspace::open(&cli.root, &cli.config)?;
    let output = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Build { no_history } => cmd_build(&workspace, output, !no_history),
        Commands::Check => cmd_check(&workspace, output),
        Commands::RemovePhoto { path, index } => {
            cmd_remove_photo(&workspace, output, &path, index)
        }
        Commands::RemoveAuthor { author } => cmd_remove_author(&workspace, output, &author),
        Commands::RestoreAuthor { author, commit } => {
            cmd_restore_author(&workspace, output, &author, commit.as_deref())
        }
        Commands::SortLocators { path } => cmd_sort_locators(&workspace, output, &path),
        Commands::SortUpdates => cmd_sort_updates(&workspace, output),
        Commands::Dedupe => cmd_dedupe(&workspace, output),
        Commands::UpdateCommitDates { commit, force } => {
            cmd_update_commit_dates(&workspace, output, commit.as_deref(), force)
        }
        Commands::Digest => cmd_digest(&workspace, output),
    }
}
