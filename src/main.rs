//! `DoseWatch` - medication ingestion verification

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dosewatch::cli::args::Cli;
use dosewatch::cli::commands;
use dosewatch::error::ExitCode;
use dosewatch::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format.into(), cli.verbose, cli.color);
    }

    // First Ctrl+C stops running sessions, the second one exits
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        eprintln!("\nStopping sessions... (press Ctrl+C again to force)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(ExitCode::INTERRUPTED);
        }
    });

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
