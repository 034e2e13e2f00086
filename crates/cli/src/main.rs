// Switchyard CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json output formats for scripting.
// Design Decision: Each subcommand drives one primitive end to end and reports what it observed.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use switchyard_core::telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Switchyard CLI - Exercise the worker pool, broadcaster and signal combinators")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit sleeping jobs to a bounded worker pool
    Pool {
        /// Number of workers
        #[arg(long, short, env = "POOL_MAX_WORKERS", default_value = "4")]
        workers: usize,

        /// Number of jobs submitted concurrently
        #[arg(long, short, default_value = "10")]
        jobs: usize,

        /// Submission timeout in milliseconds (0 waits without limit)
        #[arg(long, default_value = "100")]
        timeout_ms: u64,

        /// Time each job sleeps in milliseconds
        #[arg(long, default_value = "250")]
        work_ms: u64,
    },

    /// Fan integers out to several receivers
    Broadcast {
        /// Number of receivers
        #[arg(long, short, default_value = "3")]
        receivers: usize,

        /// Number of values written (1..=N)
        #[arg(long, short, default_value = "10")]
        values: u64,
    },

    /// Time the or/and combinators over timer signals
    Signals {
        /// Timer delays in milliseconds, comma separated
        #[arg(long, value_delimiter = ',', default_value = "200,500,1000")]
        delays_ms: Vec<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env());

    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Pool {
            workers,
            jobs,
            timeout_ms,
            work_ms,
        } => commands::pool::run(output_format, workers, jobs, timeout_ms, work_ms).await,
        Commands::Broadcast { receivers, values } => {
            commands::broadcast::run(output_format, receivers, values).await
        }
        Commands::Signals { delays_ms } => commands::signals::run(output_format, &delays_ms).await,
    }
}
