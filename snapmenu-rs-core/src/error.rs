// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`SnapError`], which encapsulates other errors

use std::path::PathBuf;

use thiserror::Error;

/// The hint printed alongside errors that have no specific remedy.
const BUG_REPORT_HINT: &str =
    "If you think an error has occurred, please file a bug report with the output of this program.";

/// An `Error` resulting from the program.
///
/// Every variant is fatal for the current run. Each one maps onto its own process exit code through
/// [`SnapError::exit_code`], so that the hook that runs this program can tell them apart.
#[derive(Error, Debug)]
pub enum SnapError {
    /// The root filesystem is not btrfs.
    #[error("Root filesystem isn't btrfs (found \"{0}\")")]
    NotSupportedFilesystem(String),

    /// A program that is required to generate the menu could not be found.
    #[error("Required program \"{0}\" was not found")]
    MissingTool(String),

    /// There were no kernels in the shared boot directory.
    #[error("Kernels not found in \"{0}\"")]
    NoKernelFound(PathBuf),

    /// There were no initramfs images in the shared boot directory.
    #[error("Initramfs not found in \"{0}\"")]
    NoInitramfsFound(PathBuf),

    /// No snapshot survived filtering and limiting.
    #[error("No snapshots found")]
    NoSnapshotsFound,

    /// The generated file was rejected by `grub-script-check`.
    #[error("Syntax errors were detected in the generated file \"{0}\"")]
    ScriptCheckFailed(PathBuf),

    /// An external program failed.
    #[error("Command Error: {0}")]
    Command(#[from] crate::system::command::CommandError),

    /// An error occurred while performing filesystem operations.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapError {
    /// Returns the process exit code that corresponds to this error.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Command(_) | Self::Io(_) => 1,
            Self::NotSupportedFilesystem(_) => 3,
            Self::MissingTool(_) => 4,
            Self::NoKernelFound(_) => 5,
            Self::NoInitramfsFound(_) => 6,
            Self::NoSnapshotsFound => 7,
            Self::ScriptCheckFailed(_) => 9,
        }
    }

    /// Returns a remediation hint to print along with the error.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn hint(&self) -> &'static str {
        match self {
            Self::NotSupportedFilesystem(_) => {
                "Snapshot menus can only be generated for a btrfs root filesystem."
            }
            Self::MissingTool(_) => "Install btrfs-progs and the GRUB tools, then try again.",
            Self::NoKernelFound(_) | Self::NoInitramfsFound(_) => {
                "Check GRUB_BTRFS_BOOT_DIRNAME, GRUB_BTRFS_NKERNEL and GRUB_BTRFS_NINIT."
            }
            Self::NoSnapshotsFound => {
                "Create a snapshot containing a boot directory, or check GRUB_BTRFS_LIMIT and the ignore lists."
            }
            Self::ScriptCheckFailed(_) | Self::Command(_) | Self::Io(_) => BUG_REPORT_HINT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            SnapError::NotSupportedFilesystem("ext4".to_owned()),
            SnapError::MissingTool("btrfs".to_owned()),
            SnapError::NoKernelFound(PathBuf::from("/boot")),
            SnapError::NoInitramfsFound(PathBuf::from("/boot")),
            SnapError::NoSnapshotsFound,
            SnapError::ScriptCheckFailed(PathBuf::from("/boot/grub/grub-btrfs.new")),
            SnapError::Io(std::io::Error::other("io")),
        ];
        let mut codes: Vec<u8> = errors.iter().map(SnapError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&2)); // reserved for usage errors
    }
}
