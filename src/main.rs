use anyhow::Result;
use clap::Parser;

use perf_lens::telemetry;

mod cli;

use cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose);

    match &cli.command {
        Commands::Analyze(args) => {
            commands::analyze::execute(args, cli.config.as_deref(), cli.json).await
        }
        Commands::Parse(args) => commands::parse::execute(args, cli.json),
        Commands::Metrics => commands::metrics::execute(cli.json),
    }
}
