//! Commands and subcommands for `filedict-cli`.
//!
//! This binary is a thin external collaborator over [`crate::Dict`]:
//! it talks to the store directly, with no server process in between,
//! matching the single-process embedded design of the library.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Args for `filedict-cli`.
#[derive(Parser)]
#[clap(author, version, about)]
#[clap(propagate_version = true)]
pub struct FileDictArgs {
    /// Path to the store file.
    #[clap(short, long, value_parser, default_value = "filedict.db")]
    pub file: PathBuf,
    /// Subcommand.
    #[clap(subcommand)]
    pub command: Commands,
}

/// Enum type of subcommand for `filedict-cli`.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set the value of a key to a JSON-encoded string.
    Set {
        /// Key.
        key: String,
        /// JSON-encoded value, e.g. `'"a string"'`, `42`, `'{"a":1}'`.
        value: String,
    },
    /// Get the value of a given key.
    Get {
        /// Key.
        key: String,
    },
    /// Remove a given key.
    Rm {
        /// Key.
        key: String,
    },
    /// List every key currently live.
    Keys,
    /// Print the number of live entries.
    Len,
    /// Compact the file, dropping tombstoned space.
    Vacuum,
}
