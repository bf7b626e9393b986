//! Simple standard error backend for the [`log`] crate.
//!
//! The generator runs inside `grub-mkconfig`, which collects our standard output into `grub.cfg`. Every diagnostic
//! must therefore go to standard error.

use std::io::Write;

use log::{Level, Metadata, Record};

/// A simple logging backend that writes to standard error.
#[derive(Default)]
pub struct StderrLogger;

impl StderrLogger {
    /// Constructs a new [`StderrLogger`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new() -> Self {
        Self
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let args = record.args();
            let mut stderr = std::io::stderr().lock();
            // info lines are progress messages for grub-mkconfig, so they are printed as is
            let _ = match record.level() {
                Level::Info => writeln!(stderr, "{args}"),
                Level::Debug | Level::Trace => {
                    let target = record.target();
                    writeln!(stderr, "[{} {target}] {args}", record.level())
                }
                level => writeln!(stderr, "{level}: {args}"),
            };
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
