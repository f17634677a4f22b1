//! CLI command definitions.

use clap::Subcommand;
use gridiron_core::Dataset;

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the dataset API
    Serve {
        /// Listen address, overrides `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Load one dataset into the warehouse
    Load {
        /// Dataset name, e.g. player_stats
        #[arg(short, long)]
        dataset: Dataset,

        /// Comma-separated seasons; all seasons when omitted
        #[arg(short, long)]
        seasons: Option<String>,

        /// Column scoping delete-then-append loads
        #[arg(long)]
        incremental_key: Option<String>,

        /// Load into an in-process warehouse instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Run the scheduled load pipeline
    Schedule {
        /// Run one pass now and exit
        #[arg(long)]
        once: bool,

        /// Load into an in-process warehouse instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Validate configuration and print it with secrets redacted
    CheckConfig,
}
