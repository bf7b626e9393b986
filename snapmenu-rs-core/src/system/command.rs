//! Helpers for running the external programs that the generator depends on.
//!
//! All of the programs are run through [`duct`], with both output streams captured so that nothing a tool prints
//! ends up in the GRUB configuration that `grub-mkconfig` assembles from our standard output.

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use duct::cmd;
use log::debug;
use thiserror::Error;

/// An `Error` that may result from running an external program.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be started at all.
    #[error("Failed to run \"{program}\": {source}")]
    Spawn {
        /// The program that was run.
        program: String,

        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The program exited with a non zero status.
    #[error("\"{program}\" exited with status {status}: {stderr}")]
    Failed {
        /// The program that was run.
        program: String,

        /// The exit status, or -1 if it was killed by a signal.
        status: i32,

        /// Whatever the program wrote to its standard error.
        stderr: String,
    },

    /// The program printed something that is not UTF-8.
    #[error("\"{0}\" produced output that is not valid UTF-8")]
    Utf8(String),
}

/// Runs a program to completion and returns its standard output.
///
/// # Errors
///
/// May return an `Error` if the program could not be started, if it exits with a non zero status, or if its output
/// is not valid UTF-8.
pub fn run_capture<I, S>(program: &str, args: I) -> Result<String, CommandError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let output = run_unchecked(program, args)?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            program: program.to_owned(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| CommandError::Utf8(program.to_owned()))
}

/// Runs a program to completion and returns whether it exited successfully.
///
/// # Errors
///
/// May return an `Error` if the program could not be started.
pub fn run_status<I, S>(program: &str, args: I) -> Result<bool, CommandError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    Ok(run_unchecked(program, args)?.status.success())
}

/// Runs a program with captured output, without treating a non zero exit status as an error.
fn run_unchecked<I, S>(program: &str, args: I) -> Result<std::process::Output, CommandError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    debug!("Running {program}");
    cmd(program, args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|source| CommandError::Spawn {
            program: program.to_owned(),
            source,
        })
}

/// Finds a program either by its path, or by searching the directories of `PATH`.
#[must_use = "Has no effect if the result is unused"]
pub fn find_program(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        assert!(find_program("snapmenu-rs-definitely-not-a-program").is_none());
        assert!(matches!(
            run_capture("snapmenu-rs-definitely-not-a-program", ["--help"]),
            Err(CommandError::Spawn { .. })
        ));
    }

    #[test]
    fn test_program_by_path() {
        let dir = tempfile::tempdir().expect("Failed to create temporary directory in test");
        let program = dir.path().join("tool");
        std::fs::write(&program, b"").expect("Failed to write file in test");
        let program = program.to_string_lossy().into_owned();
        assert!(find_program(&program).is_some());
    }
}
