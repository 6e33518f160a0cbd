mod cli;
mod config;
mod error;
mod event;
mod output;
mod tracer;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cli::Cli;
use config::TraceConfig;
use output::OutputManager;
use tracer::Tracer;

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    cli.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .context("failed to set signal handler")?;

    let config = TraceConfig::from_args(&cli).context("failed to determine working directory")?;

    let jsonl = match &cli.output {
        Some(path) => Some(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => None,
    };
    let output = OutputManager::new(jsonl, !cli.quiet, cli.no_color);

    let mut tracer = Tracer::new(config, output, shutdown).context("failed to set up tracer")?;
    let exit_code = tracer.run().context("tracer failed")?;
    std::process::exit(exit_code);
}
