// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A command line frontend to `snapmenu-rs`, meant to be run by `grub-mkconfig` from `/etc/grub.d`.
//!
//! The generated menu is written to the GRUB directory, and the wrapper that loads it is printed on standard output
//! so that it ends up in `grub.cfg`. Everything else goes to standard error.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{LevelFilter, error, info};
use snapmenu_rs_core::{
    config::{DEFAULT_CONFIG_PATH, GRUB_DEFAULTS_PATH, RenderConfig},
    generate::generate,
    system::{log_backend::StderrLogger, tools::SystemHost},
};

/// The global logging instance.
static LOGGER: StderrLogger = StderrLogger::new();

/// Generates GRUB menu entries for booting into btrfs snapshots.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the grub-btrfs configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Path to the GRUB defaults file
    #[arg(long, default_value = GRUB_DEFAULTS_PATH)]
    grub_defaults: PathBuf,

    /// Show debug output (twice for trace output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    /// Returns the maximum log level for the verbosity flags.
    const fn level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }
}

/// The main function of the program.
///
/// Errors are printed along with a hint, and turned into an exit code that is specific to the kind of error. A
/// disabled generator prints nothing and succeeds, so that `grub-mkconfig` carries on.
fn main() -> ExitCode {
    let args = Args::parse();
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(args.level()));

    info!("Detecting snapshots ...");
    let config = RenderConfig::load(&args.config, &args.grub_defaults);
    let host = SystemHost::new(&config);

    match generate(&config, &host) {
        Ok(Some(generated)) => {
            print!("{}", generated.wrapper);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("hint: {}", e.hint());
            ExitCode::from(e.exit_code())
        }
    }
}
