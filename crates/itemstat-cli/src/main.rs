//! itemstat CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use itemstat_core::model::DifType;

mod commands;
mod render;

#[derive(Parser)]
#[command(
    name = "itemstat",
    version,
    about = "Classical item statistics for assessment response files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a response file without storing it
    Validate {
        /// Path to the CSV response file
        #[arg(long)]
        file: PathBuf,
    },

    /// Parse, score and store response files, then compute statistics
    Ingest {
        /// CSV response file (repeat for several assessments)
        #[arg(long, required = true)]
        file: Vec<PathBuf>,

        /// Assessment name (single file only; defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Assessment year
        #[arg(long)]
        year: Option<i32>,

        /// Country the assessment was administered in
        #[arg(long)]
        country: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Analyze a stored assessment or a response file
    Analyze {
        /// Stored assessment id
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        assessment: Option<Uuid>,

        /// CSV response file analyzed in memory
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the JSON report to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the JSON report into the configured output directory
        #[arg(long, conflicts_with = "output")]
        save: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Differential item functioning for a stored assessment
    Dif {
        /// Stored assessment id
        #[arg(long)]
        assessment: Uuid,

        /// Grouping: gender, percentile, country, country-gender
        #[arg(long, default_value = "gender")]
        by: DifType,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List stored assessments
    List {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two analysis reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Difficulty change that counts as a shift
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if any item shifted
        #[arg(long)]
        fail_on_shift: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a starter config and an example response file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("itemstat=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => commands::validate::execute(file),
        Commands::Ingest {
            file,
            name,
            year,
            country,
            config,
        } => commands::ingest::execute(file, name, year, country, config).await,
        Commands::Analyze {
            assessment,
            file,
            format,
            output,
            save,
            config,
        } => commands::analyze::execute(assessment, file, format, output, save, config).await,
        Commands::Dif {
            assessment,
            by,
            format,
            config,
        } => commands::dif::execute(assessment, by, format, config).await,
        Commands::List { config } => commands::list::execute(config).await,
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_shift,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_shift, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
