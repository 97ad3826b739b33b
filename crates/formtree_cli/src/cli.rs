use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "formtree", version, about = "Build form trees from a JSON schema and layout")]
pub struct Cli {
    /// Default log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Print the node tree of a form descriptor
    Outline { descriptor: PathBuf },
    /// Print the initial values of a form descriptor
    Values { descriptor: PathBuf },
    /// Turn a flat field file ({"key": raw, ...}) into a structured value
    Extract {
        descriptor: PathBuf,
        fields: PathBuf,
    },
    /// Insert an array item and print the resulting values
    Insert {
        descriptor: PathBuf,
        /// Concrete key of the array node
        key: String,
        index: usize,
    },
    /// Delete an array item and print the resulting values
    Delete {
        descriptor: PathBuf,
        key: String,
        index: usize,
    },
    /// Print the item bounds of an array node
    Bounds { descriptor: PathBuf, key: String },
}
