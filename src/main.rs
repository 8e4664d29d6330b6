//! wavedeck - a waveform playlist player for the terminal.
//!
//! Every track of a pre-analyzed table is drawn as a clickable waveform; one
//! global transport makes sure only a single track is audible at a time. The
//! `analyze` subcommand produces that table from a directory of audio files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod app;
mod audio;
mod config;
mod error;
mod host;
mod library;
mod mpris;
mod runtime;
mod track;
mod transport;
mod ui;
mod waveform;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(name = "wavedeck")]
#[command(about = "Waveform playlist player with a single global transport")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Track table written by `wavedeck analyze` (overrides `library.data_file`)
    #[arg(long)]
    data: Option<String>,
    /// Directory or http(s) URL the table's file references resolve against
    #[arg(long)]
    base: Option<String>,
    /// Track to centre on, by slug
    #[arg(long, value_name = "SLUG")]
    track: Option<String>,
    /// Deep link, `#slug` or `slug`
    #[arg(value_name = "LINK")]
    link: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a track table from the audio files under a directory
    Analyze {
        dir: PathBuf,
        /// Output file (defaults to `analyze.output`)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Length of each amplitude summary
        #[arg(long)]
        bins: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Analyze { dir, out, bins }) => {
            runtime::analyze(&dir, out.as_deref(), bins)
        }
        None => runtime::run(runtime::LaunchOptions {
            data_file: cli.data,
            base: cli.base,
            deep_link: cli.track.or(cli.link),
        }),
    }
}
