use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Runs the hk3 bot calibration tool and agent")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Settings file to use instead of the per-user default.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Start the repo root search here instead of at the binary's directory.
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the calibration tool once and wait for it to finish.
    Calibrate(RunArgs),
    /// Run the agent once and wait for it to finish.
    Agent(RunArgs),
    /// Interactive session driven by commands on stdin (default).
    Console,
    /// Inspect or edit stored settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

/// Per-run overrides on top of the stored settings.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub config: Option<String>,

    /// `rules` or `gemini`.
    #[arg(long)]
    pub planner: Option<String>,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub debug: bool,

    #[arg(long)]
    pub fps: Option<u32>,

    /// Also write the transcript to the log directory when the run ends.
    #[arg(long)]
    pub save_log: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Print the effective settings.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Print the settings file location.
    Path,
    /// Read an API key from stdin and store it encrypted.
    SetKey,
    /// Remove the stored API key.
    ClearKey,
}
