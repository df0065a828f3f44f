//! fclink CLI - Build and flash flight controller firmware over DFU.
//!
//! ## Features
//!
//! - Build a firmware target and flash it with `dfu-util`
//! - List boards waiting in DFU mode
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use config::Config;

/// fclink - Build and DFU-flash flight controller firmware.
///
/// Environment variables:
///   FCLINK_SOURCE    - Firmware source tree (default: current directory)
///   FCLINK_TARGET    - Build target name
///   FCLINK_MAKE      - Build tool (default: make)
///   FCLINK_DFU_UTIL  - dfu-util binary (default: dfu-util from PATH)
#[derive(Parser)]
#[command(name = "fclink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// dfu-util binary to list and flash devices with.
    #[arg(long, global = true, value_name = "PATH", env = "FCLINK_DFU_UTIL")]
    dfu_util: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Build firmware for a target and flash it through DFU.
    Flash(FlashArgs),

    /// List boards currently in DFU mode.
    Devices {
        /// Output the device list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments of the `flash` command.
#[derive(Args)]
struct FlashArgs {
    /// Firmware source tree (where `make binary` runs).
    #[arg(short, long, value_name = "DIR", env = "FCLINK_SOURCE")]
    source: Option<PathBuf>,

    /// Build target name (e.g. SPRACINGF3).
    #[arg(short, long, env = "FCLINK_TARGET")]
    target: Option<String>,

    /// Build tool, run as `<make> binary`.
    #[arg(long, value_name = "PATH", env = "FCLINK_MAKE")]
    make: Option<PathBuf>,

    /// Do not ask for confirmation once the board should be in DFU mode.
    #[arg(long)]
    no_prompt: bool,
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn load_config(cli: &Cli) -> Config {
    if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Flash(args) => commands::flash::cmd_flash(cli, &load_config(cli), args),
        Commands::Devices { json } => commands::devices::cmd_devices(cli, &load_config(cli), *json),
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // NO_COLOR and non-terminal stderr turn styling off.
    if env::var_os("NO_COLOR").is_some() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    init_logging(&cli);
    debug!(
        "fclink v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        },
    }
}
