//! CLI Module
//!
//! Command-line surface for driving a playback session offline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rampdeck - render audio through a tempo-ramped, recorded playback session
#[derive(Parser, Debug)]
#[command(name = "rampdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a WAV file through a session and export the capture
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Directory the captured file is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Session config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Starting tempo, 1.0 = original speed
        #[arg(long)]
        tempo: Option<String>,

        /// Linear output gain
        #[arg(long)]
        gain: Option<String>,

        /// Route through the lowpass filter
        #[arg(long)]
        filter: bool,

        /// Filter cutoff in Hz
        #[arg(long)]
        cutoff: Option<String>,

        /// Filter resonance
        #[arg(long)]
        q: Option<String>,

        /// Stop after this many seconds of output
        #[arg(long)]
        max_seconds: Option<f64>,
    },

    /// Print the tempo values a ramp would produce
    #[command(name = "ramp-preview")]
    RampPreview {
        /// Starting tempo
        #[arg(long, default_value = "1.0")]
        initial: String,

        /// Target as a multiple of the starting tempo
        #[arg(long, default_value_t = 1.25)]
        factor: f64,

        /// Ramp window in milliseconds
        #[arg(long, default_value_t = 30_000)]
        window_ms: u64,

        /// Tick interval in milliseconds
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,

        /// Print every Nth tick (the final tick is always printed)
        #[arg(long, default_value_t = 20)]
        every: u64,
    },

    /// Write a sine test tone as WAV
    #[command(name = "tone")]
    Tone {
        /// Output WAV file
        output: PathBuf,

        /// Frequency in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f32,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 2.0)]
        duration: f32,

        /// Sample rate in Hz
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
    },

    /// Print the default session config, or write it to a file
    #[command(name = "config")]
    Config {
        /// Destination file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_arguments_parse() {
        let cli = Cli::try_parse_from([
            "rampdeck", "render", "in.wav", "--tempo", "0.9", "--filter", "--cutoff", "800",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Render {
                input,
                tempo,
                filter,
                cutoff,
                output,
                ..
            }) => {
                assert_eq!(input, PathBuf::from("in.wav"));
                assert_eq!(tempo.as_deref(), Some("0.9"));
                assert!(filter);
                assert_eq!(cutoff.as_deref(), Some("800"));
                assert_eq!(output, PathBuf::from("."));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
