use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "conexus",
    version,
    about = "Hybrid search over ingested case studies"
)]
pub struct Cli {
    /// JSON config file; environment overrides are applied on top
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and index a case study file
    Ingest(IngestArgs),
    /// Retrieve the most relevant passages for a question
    Ask(AskArgs),
    /// Show store and index counts
    Stats,
    /// Remove a case study and all its chunks
    DeleteCase(DeleteCaseArgs),
    /// Build the vector index once the store is large enough
    EnsureIndexes,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// .pdf, .md, .markdown or .txt
    pub file: PathBuf,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub url: Option<String>,

    /// Defaults to the title, lower-cased with dashes
    #[arg(long)]
    pub case_id: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteCaseArgs {
    pub case_id: String,
}
