use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and seed reference tables
    Init,

    /// Run one pipeline stage for a registry
    Run(StageArgs),

    /// Delete a registry's data at and below a level
    Clean {
        /// Registry to clean (huggingface, docker, maven, pypi)
        #[arg(long)]
        registry: String,

        /// Level to clean from (packages, versions, artifacts, signatures)
        #[arg(long)]
        level: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,

        /// Fail instead of prompting
        #[arg(long)]
        non_interactive: bool,
    },

    /// Show adoption figures for a registry
    Summary {
        /// Registry to summarize
        #[arg(long)]
        registry: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a verification transcript read from a file or stdin
    Classify {
        /// Transcript file; stdin when omitted
        file: Option<String>,

        /// Also extract signature packet metadata, printed as JSON
        #[arg(long)]
        packets: bool,
    },
}

#[derive(Args)]
pub struct StageArgs {
    /// Stage to run (packages, filter, adoption, analysis)
    pub stage: String,

    /// Registry the stage operates on
    #[arg(long)]
    pub registry: String,

    /// First package index to process
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Package index to stop before; negative means the end of the list
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub stop: i64,

    /// Clean the stage's level for the registry before ingesting
    #[arg(long)]
    pub clean: bool,

    /// Registry manifest to ingest from
    #[arg(long)]
    pub manifest: Option<String>,

    /// Directory artifact paths resolve against; defaults to the manifest's directory
    #[arg(long)]
    pub work_dir: Option<String>,

    /// Only refresh signature data, keeping existing artifacts
    #[arg(long)]
    pub signatures_only: bool,

    /// Packages per transaction
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Output the stage report as JSON
    #[arg(long)]
    pub json: bool,
}
