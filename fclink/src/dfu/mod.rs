//! Firmware build and DFU flashing.
//!
//! [`FlashOrchestrator::flash`] walks one board through the whole sequence:
//!
//! ```text
//! ResolveTarget -> Build -> LocateBinary -> RebootToBootloader
//!               -> WaitForDevice -> ParseDescriptor -> Flash
//! ```
//!
//! Each step either advances or ends the run with an error; nothing is
//! retried. Progress is reported through a [`FlashEvent`] callback so the
//! caller decides how to render it.

pub mod binary;
pub mod descriptor;
pub mod tools;

pub use {
    binary::locate_binary,
    descriptor::DfuDescriptor,
    tools::{ProcessRunner, ToolCommand, ToolRunner},
};

use {
    crate::{
        clock::{Clock, SystemClock},
        error::{Error, Result},
    },
    log::{debug, info, trace, warn},
    std::{
        fmt,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Prefix of device lines in `dfu-util --list` output.
pub const DFU_DEVICE_PREFIX: &str = "Found DFU: ";

/// Marks the STM32 internal flash interface in a device line.
pub const INTERNAL_FLASH_MARKER: &str = "@Internal Flash  /";

/// Default delay between two device listings.
pub const DFU_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default time allowed for the board to show up in DFU mode.
pub const DFU_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can put the board into its bootloader.
pub trait BootloaderReboot {
    /// Reboot the board into DFU mode.
    fn reboot_to_bootloader(&mut self) -> Result<()>;

    /// Build target reported by the running firmware, if known.
    fn detected_target(&self) -> Option<&str> {
        None
    }
}

/// Tools and timings used by the flash sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashOptions {
    /// Build tool, run as `<make> binary`.
    pub make: PathBuf,
    /// DFU lister and flasher.
    pub dfu_util: PathBuf,
    /// Build output directory, relative to the source directory.
    pub output_dir: PathBuf,
    /// Delay between device listings.
    pub poll_interval: Duration,
    /// How long to wait for the board to enter DFU mode.
    pub wait_timeout: Duration,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            make: "make".into(),
            dfu_util: "dfu-util".into(),
            output_dir: "obj".into(),
            poll_interval: DFU_POLL_INTERVAL,
            wait_timeout: DFU_WAIT_TIMEOUT,
        }
    }
}

impl FlashOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different build tool.
    #[must_use]
    pub fn with_make(mut self, make: impl Into<PathBuf>) -> Self {
        self.make = make.into();
        self
    }

    /// Use a different `dfu-util`.
    #[must_use]
    pub fn with_dfu_util(mut self, dfu_util: impl Into<PathBuf>) -> Self {
        self.dfu_util = dfu_util.into();
        self
    }

    /// Change the device wait deadline.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

/// Progress of a flash run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashEvent {
    /// Target chosen; `detected` when it came from the board.
    TargetResolved {
        /// Target name.
        target: String,
        /// Whether the board reported it.
        detected: bool,
    },
    /// Build started.
    Building {
        /// Target name.
        target: String,
    },
    /// Firmware image found.
    BinaryLocated {
        /// Image path.
        path: PathBuf,
    },
    /// Bootloader reboot requested.
    RebootingToBootloader,
    /// Polling the DFU lister.
    WaitingForDevice,
    /// Board found in DFU mode.
    DeviceFound {
        /// Parsed device line.
        device: DfuDescriptor,
    },
    /// Writing the image.
    Flashing {
        /// Image file name.
        binary: String,
        /// Flash offset.
        offset: String,
    },
    /// Flasher finished successfully.
    Done,
}

impl fmt::Display for FlashEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetResolved {
                target,
                detected: true,
            } => write!(f, "Using target {target} reported by the board"),
            Self::TargetResolved { target, .. } => write!(f, "Using target {target}"),
            Self::Building { target } => write!(f, "Building binary for {target}..."),
            Self::BinaryLocated { path } => write!(f, "Found {}", path.display()),
            Self::RebootingToBootloader => write!(f, "Rebooting board in DFU mode..."),
            Self::WaitingForDevice => write!(f, "Waiting for board in DFU mode..."),
            Self::DeviceFound { device } => write!(f, "Found DFU device ({device})"),
            Self::Flashing { binary, offset } => {
                write!(f, "Flashing {binary} via DFU to offset {offset}...")
            },
            Self::Done => write!(f, "Flashing complete"),
        }
    }
}

/// Record of a successful flash run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashJob {
    /// Target that was built.
    pub target: String,
    /// Firmware source tree.
    pub source_dir: PathBuf,
    /// Image that was written.
    pub binary_path: PathBuf,
    /// Device it was written to.
    pub device: DfuDescriptor,
}

/// Pick the build target: explicit beats detected, empty counts as absent.
pub fn resolve_target(explicit: Option<&str>, detected: Option<&str>) -> Result<(String, bool)> {
    let non_empty = |name: &&str| !name.is_empty();
    if let Some(target) = explicit.filter(non_empty) {
        return Ok((target.to_string(), false));
    }
    detected
        .filter(non_empty)
        .map(|target| (target.to_string(), true))
        .ok_or(Error::EmptyTarget)
}

/// Device lines of a `dfu-util --list` run, prefix stripped.
pub fn dfu_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_matches(|c| matches!(c, '\n' | '\r' | '\t' | ' ')))
        .filter_map(|line| line.strip_prefix(DFU_DEVICE_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Runs the build and flash sequence.
pub struct FlashOrchestrator<R: ToolRunner = ProcessRunner, C: Clock = SystemClock> {
    runner: R,
    clock: C,
    options: FlashOptions,
}

impl FlashOrchestrator {
    /// Orchestrator running real processes on the system clock.
    pub fn new(options: FlashOptions) -> Self {
        Self::with_runner(options, ProcessRunner, SystemClock)
    }
}

impl<R: ToolRunner, C: Clock> FlashOrchestrator<R, C> {
    /// Orchestrator with a custom tool runner and clock.
    pub fn with_runner(options: FlashOptions, runner: R, clock: C) -> Self {
        Self {
            runner,
            clock,
            options,
        }
    }

    /// Options in use.
    pub fn options(&self) -> &FlashOptions {
        &self.options
    }

    /// Build `source_dir` for the target and flash it onto `board`.
    pub fn flash(
        &mut self,
        board: &mut dyn BootloaderReboot,
        source_dir: &Path,
        target: Option<&str>,
        progress: &mut dyn FnMut(&FlashEvent),
    ) -> Result<FlashJob> {
        let (target, detected) = resolve_target(target, board.detected_target())?;
        progress(&FlashEvent::TargetResolved {
            target: target.clone(),
            detected,
        });

        let dfu_util = self
            .runner
            .resolve(&self.options.dfu_util)?;

        progress(&FlashEvent::Building {
            target: target.clone(),
        });
        let build = ToolCommand::new(&self.options.make)
            .arg("binary")
            .env("TARGET", &target)
            .current_dir(source_dir);
        self.runner.run(&build)?;

        let binary_path = locate_binary(&source_dir.join(&self.options.output_dir), &target)?;
        progress(&FlashEvent::BinaryLocated {
            path: binary_path.clone(),
        });

        progress(&FlashEvent::RebootingToBootloader);
        board.reboot_to_bootloader()?;

        progress(&FlashEvent::WaitingForDevice);
        let line = self.wait_for_device(&dfu_util)?;
        let device = DfuDescriptor::parse(&line)?;
        progress(&FlashEvent::DeviceFound {
            device: device.clone(),
        });

        let binary = binary_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress(&FlashEvent::Flashing {
            binary,
            offset: device.offset.clone(),
        });
        let flash = ToolCommand::new(&dfu_util)
            .args(device.flash_args(&binary_path.display().to_string()));
        self.runner.run(&flash)?;
        info!("Flashed {} to {device}", binary_path.display());
        progress(&FlashEvent::Done);

        Ok(FlashJob {
            target,
            source_dir: source_dir.to_path_buf(),
            binary_path,
            device,
        })
    }

    /// Internal flash interfaces currently visible to `dfu-util`.
    pub fn devices(&mut self) -> Result<Vec<DfuDescriptor>> {
        let dfu_util = self
            .runner
            .resolve(&self.options.dfu_util)?;
        let mut devices = Vec::new();
        for line in self.list(&dfu_util)? {
            if !DfuDescriptor::is_internal_flash(&line) {
                continue;
            }
            match DfuDescriptor::parse(&line) {
                Ok(device) => devices.push(device),
                Err(err) => warn!("Skipping DFU device: {err}"),
            }
        }
        Ok(devices)
    }

    /// Poll until an internal flash line shows up, returning that line.
    fn wait_for_device(&mut self, dfu_util: &Path) -> Result<String> {
        let deadline = self.clock.now() + self.options.wait_timeout;
        let mut polls = 0u32;
        loop {
            polls += 1;
            let found = self
                .list(dfu_util)?
                .into_iter()
                .find(|line| DfuDescriptor::is_internal_flash(line));
            if let Some(line) = found {
                debug!("DFU device after {polls} polls: {line}");
                return Ok(line);
            }
            if self.clock.now() >= deadline {
                return Err(Error::Timeout(
                    "timed out while waiting for board in DFU mode".into(),
                ));
            }
            trace!("No DFU device yet (poll {polls})");
            self.clock.sleep(self.options.poll_interval);
        }
    }

    fn list(&mut self, dfu_util: &Path) -> Result<Vec<String>> {
        let output = self
            .runner
            .output(&ToolCommand::new(dfu_util).arg("--list"))?;
        Ok(dfu_lines(&output))
    }
}
