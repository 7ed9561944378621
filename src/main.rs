use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use qmdown::cli::{Cli, Command};
use qmdown::progress::{reporter_for, spawn_reporter};
use qmdown::resolver::{ChainResolver, resolve_all};
use qmdown::{Downloader, Error, Result, RunResult, RunStatus, cancel_on_signal};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Command::Completions { shell }) = cli.command {
        Cli::write_completions(shell, &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(status) => ExitCode::from(u8::try_from(status.exit_code()).unwrap_or(1)),
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatus> {
    if cli.urls.is_empty() {
        return Err(Error::Other("no URLs given (see --help)".to_string()));
    }
    let config = cli.load_config()?;

    // Phase 1: Resolve every link
    let resolver = ChainResolver::standard(&config.download);
    let resolution = resolve_all(&resolver, &cli.urls).await;
    for (url, e) in &resolution.errors {
        eprintln!("Could not resolve {url}: {e}");
    }
    if resolution.items.is_empty() {
        if resolution.errors.is_empty() {
            println!("Nothing to download");
            return Ok(RunStatus::Success);
        }
        return Ok(RunStatus::Failure);
    }

    // Phase 2: Download with a reporter attached
    let downloader = Downloader::new(config)?;
    let reporter = spawn_reporter(
        reporter_for(&downloader.config().display),
        downloader.subscribe(),
    );
    let cancel = CancellationToken::new();
    let listener = cancel_on_signal(cancel.clone());

    let outcome = downloader.coordinate(resolution.items, cancel).await;
    listener.abort();
    // Every sender goes away with the downloader, so the reporter cannot hang
    drop(downloader);
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Progress reporter ended abnormally");
    }
    let result = outcome?;

    // Phase 3: Summary
    print_summary(&result);
    Ok(result.status_with_unresolved(resolution.errors.len()))
}

fn print_summary(result: &RunResult) {
    let mut line = format!(
        "{} succeeded, {} failed, {} skipped",
        result.succeeded, result.failed, result.skipped
    );
    if result.deduplicated > 0 {
        line.push_str(&format!(", {} duplicates dropped", result.deduplicated));
    }
    println!("{line} in {:.1}s", result.elapsed.as_secs_f64());

    if !result.failures.is_empty() {
        println!("Failed:");
        for failure in &result.failures {
            println!("  {}: {} ({})", failure.name, failure.reason, failure.url);
        }
    }
    if result.cancelled {
        println!("Run cancelled");
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(Level::WARN.into())
            .from_env_lossy()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
