//! DFU device listing command.

use anyhow::{Context, Result};
use console::style;
use fclink::FlashOrchestrator;

use super::flash_options;
use crate::Cli;
use crate::config::Config;

/// List boards waiting in DFU mode.
pub(crate) fn cmd_devices(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let mut orchestrator = FlashOrchestrator::new(flash_options(cli, config, None));
    let devices = orchestrator
        .devices()
        .context("Listing DFU devices failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if cli.quiet {
        return Ok(());
    }

    if devices.is_empty() {
        eprintln!("{} No boards in DFU mode", style("⚠").yellow());
        return Ok(());
    }

    eprintln!("{} Boards in DFU mode:", style("🔍").cyan());
    for device in &devices {
        eprintln!(
            "  {} {} (alt {}, offset {})",
            style("•").green(),
            style(&device.serial).bold(),
            device.alt,
            device.offset
        );
    }

    Ok(())
}
