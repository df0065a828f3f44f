//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod devices;
pub(crate) mod flash;

use fclink::FlashOptions;
use std::path::PathBuf;

use crate::Cli;
use crate::config::Config;

/// Tool selection: command line and environment first, then config files.
pub(crate) fn flash_options(cli: &Cli, config: &Config, make: Option<&PathBuf>) -> FlashOptions {
    let mut options = FlashOptions::new();
    if let Some(dfu_util) = cli
        .dfu_util
        .as_ref()
        .or(config.flash.dfu_util.as_ref())
    {
        options = options.with_dfu_util(dfu_util);
    }
    if let Some(make) = make.or(config.flash.make.as_ref()) {
        options = options.with_make(make);
    }
    options
}
