//! Rampdeck CLI
//!
//! Command-line interface for rendering audio through a playback session.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rampdeck::cli::commands::{self, RenderOptions};
use rampdeck::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Rampdeck v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Rampdeck v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            config,
            tempo,
            gain,
            filter,
            cutoff,
            q,
            max_seconds,
        } => {
            let options = RenderOptions {
                config,
                tempo,
                gain,
                filter,
                cutoff,
                q,
                max_seconds,
            };
            commands::render(&input, &output, &options)
                .with_context(|| format!("rendering {} failed", input.display()))
        }
        Commands::RampPreview {
            initial,
            factor,
            window_ms,
            tick_ms,
            every,
        } => commands::ramp_preview(&initial, factor, window_ms, tick_ms, every)
            .context("ramp preview failed"),
        Commands::Tone {
            output,
            frequency,
            duration,
            sample_rate,
        } => commands::tone(&output, frequency, duration, sample_rate)
            .with_context(|| format!("writing {} failed", output.display())),
        Commands::Config { output } => {
            commands::config(output.as_deref()).context("writing config failed")
        }
    }
}
