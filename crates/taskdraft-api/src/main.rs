//! taskdraft CLI entry point.
//!
//! Binary name: `tdraft`
//!
//! Parses CLI arguments, opens the draft database, then dispatches to the
//! matching command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use taskdraft_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing_options = TracingOptions::from_verbosity(cli.verbose, cli.quiet);
    tracing_options.json = cli.log_json;
    tracing_options.otel = cli.otel;
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tdraft", &mut std::io::stdout());
        return Ok(());
    }

    let sweep_on_start = !matches!(cli.command, Commands::Cleanup);
    let state = AppState::init(sweep_on_start).await?;
    let result = cli::dispatch(cli.command, &state, cli.json).await;

    state.db_pool.close().await;
    shutdown_tracing();
    result
}
