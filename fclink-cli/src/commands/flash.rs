//! Build and flash command implementation.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use fclink::{BootloaderReboot, FlashEvent, FlashOrchestrator};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::flash_options;
use crate::config::Config;
use crate::{Cli, FlashArgs};

/// Bootloader entry by hand.
///
/// Without an MSP link the board cannot be told to reboot, so the operator
/// holds BOOT while reconnecting it instead.
pub(crate) struct ManualReboot {
    prompt: bool,
    quiet: bool,
}

impl BootloaderReboot for ManualReboot {
    fn reboot_to_bootloader(&mut self) -> fclink::Result<()> {
        if !self.prompt {
            if !self.quiet {
                eprintln!(
                    "{} Hold BOOT and reconnect the board to enter DFU mode",
                    style("ℹ").blue()
                );
            }
            return Ok(());
        }

        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Hold BOOT and reconnect the board, then continue")
            .default(true)
            .interact_opt()
            .map_err(|e| fclink::Error::Io(io::Error::other(e)))?
            .unwrap_or(false);

        if confirmed {
            Ok(())
        } else {
            Err(fclink::Error::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "cancelled by operator",
            )))
        }
    }
}

/// Renders flash events, with a spinner while waiting for the board.
struct Progress {
    quiet: bool,
    spinner: Option<ProgressBar>,
}

impl Progress {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            spinner: None,
        }
    }

    fn show(&mut self, event: &FlashEvent) {
        if let Some(spinner) = self
            .spinner
            .take()
        {
            spinner.finish_and_clear();
        }
        if self.quiet {
            return;
        }

        match event {
            FlashEvent::WaitingForDevice => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg} [{elapsed}]")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner.set_message(event.to_string());
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.spinner = Some(spinner);
            },
            FlashEvent::Building { .. } => eprintln!("{} {event}", style("🔨").cyan()),
            FlashEvent::RebootingToBootloader => eprintln!("{} {event}", style("🔄").cyan()),
            FlashEvent::DeviceFound { .. } => eprintln!("{} {event}", style("✓").green()),
            FlashEvent::Flashing { .. } => eprintln!("{} {event}", style("⚡").yellow()),
            FlashEvent::Done => eprintln!("{} {event}", style("✓").green()),
            FlashEvent::TargetResolved { .. } | FlashEvent::BinaryLocated { .. } => {
                eprintln!("{} {event}", style("•").dim());
            },
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(spinner) = self
            .spinner
            .take()
        {
            spinner.finish_and_clear();
        }
    }
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &Config, args: &FlashArgs) -> Result<()> {
    let source = args
        .source
        .clone()
        .or_else(|| config.flash.source.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let target = args
        .target
        .clone()
        .or_else(|| config.flash.target.clone());
    let options = flash_options(cli, config, args.make.as_ref());
    debug!(
        "Source {}, target {target:?}, make {}, dfu-util {}",
        source.display(),
        options.make.display(),
        options.dfu_util.display()
    );

    let mut board = ManualReboot {
        prompt: !args.no_prompt,
        quiet: cli.quiet,
    };
    let mut orchestrator = FlashOrchestrator::new(options);
    let mut progress = Progress::new(cli.quiet);

    let job = orchestrator
        .flash(&mut board, &source, target.as_deref(), &mut |event| {
            progress.show(event);
        })
        .with_context(|| format!("Flashing from {} failed", source.display()))?;
    drop(progress);

    if !cli.quiet {
        eprintln!(
            "\n{} Flashed {} to {}",
            style("🎉").green().bold(),
            style(&job.target).cyan(),
            job.device
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fclink::DfuDescriptor;

    #[test]
    fn test_manual_reboot_without_prompt_succeeds() {
        let mut board = ManualReboot {
            prompt: false,
            quiet: true,
        };
        assert!(board.reboot_to_bootloader().is_ok());
        assert!(board.detected_target().is_none());
    }

    #[test]
    fn test_quiet_progress_keeps_no_spinner() {
        let mut progress = Progress::new(true);
        progress.show(&FlashEvent::WaitingForDevice);
        assert!(progress.spinner.is_none());
    }

    #[test]
    fn test_spinner_only_while_waiting() {
        let mut progress = Progress::new(false);
        progress.show(&FlashEvent::WaitingForDevice);
        assert!(progress.spinner.is_some());
        progress.show(&FlashEvent::DeviceFound {
            device: DfuDescriptor {
                alt: 0,
                serial: "3276365D3336".into(),
                offset: "0x08000000".into(),
            },
        });
        assert!(progress.spinner.is_none());
    }
}
