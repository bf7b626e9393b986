//! The external collaborators of the generator, and their implementation on a real system.
//!
//! Every interaction with the outside world that is not plain file reading goes through one of the traits in this
//! module. [`SystemHost`] implements them with the usual btrfs, snapper and GRUB tools, and the tests implement
//! them with fixtures.

use std::{ffi::OsStr, path::Path};

use log::warn;

use crate::{
    config::RenderConfig,
    system::command::{CommandError, find_program, run_capture, run_status},
};

/// The directory where snapper keeps its configurations.
const SNAPPER_CONFIG_DIR: &str = "/etc/snapper/configs";

/// The directory of UUID device links maintained by udev.
const UUID_LINK_DIR: &str = "/dev/disk/by-uuid";

/// The mount options for the scratch mount of the top level subvolume.
const MOUNT_OPTIONS: &str = "ro,subvolid=5";

/// Provides the raw snapshot listings.
pub trait SnapshotSource {
    /// Lists every subvolume of the root volume, in the format of `btrfs subvolume list -sa /`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the listing could not be obtained.
    fn list_subvolumes(&self) -> Result<String, CommandError>;

    /// Lists the snapshots known to the snapshot manager under the given configuration, in the format of
    /// `snapper list`.
    ///
    /// Returns [`None`] if there is no snapshot manager, or if it has no such configuration.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the manager exists but the listing failed.
    fn list_manager_snapshots(&self, config: &str) -> Result<Option<String>, CommandError>;
}

/// A property of a device that can be queried from `grub-probe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeTarget {
    /// The UUID of the filesystem.
    FsUuid,

    /// The filesystem type, as a GRUB module name.
    Fs,

    /// The platform search hints for `search`.
    HintsString,

    /// The storage abstractions (such as `lvm`) the device uses.
    Abstraction,
}

impl ProbeTarget {
    /// Convert a [`ProbeTarget`] into the `--target` argument of `grub-probe`.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FsUuid => "fs_uuid",
            Self::Fs => "fs",
            Self::HintsString => "hints_string",
            Self::Abstraction => "abstraction",
        }
    }
}

/// Queries device and filesystem identity.
pub trait DeviceProbe {
    /// Returns the device that holds a path.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the device could not be determined.
    fn device_of(&self, path: &str) -> Result<String, CommandError>;

    /// Returns a property of a device, or [`None`] if it is unknown or empty.
    fn probe(&self, device: &str, target: ProbeTarget) -> Option<String>;

    /// Returns the output of `btrfs subvolume show` for a path, or [`None`] if it is not a subvolume.
    fn subvolume_show(&self, path: &str) -> Option<String>;

    /// Returns a path relative to the root of the filesystem it is on, as GRUB sees it.
    fn relative_path(&self, path: &str) -> Option<String>;

    /// Checks if the device link for a filesystem UUID exists.
    fn uuid_device_exists(&self, uuid: &str) -> bool;
}

/// Mounts and unmounts the scratch mount.
pub trait Mounter {
    /// Mounts the top level subvolume of `source` read-only at `target`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if mounting failed.
    fn mount(&self, source: &str, target: &Path) -> Result<(), CommandError>;

    /// Unmounts `target`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if unmounting failed, for example because the mount is busy.
    fn unmount(&self, target: &Path) -> Result<(), CommandError>;
}

/// Checks for programs and validates the generated script.
pub trait Toolbox {
    /// Checks if a program is available.
    fn has_program(&self, name: &str) -> bool;

    /// Validates a GRUB script, returning `false` if it has syntax errors.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the checker could not be run.
    fn check_script(&self, path: &Path) -> Result<bool, CommandError>;
}

/// Everything the generator needs from the system it runs on.
pub trait Host: SnapshotSource + DeviceProbe + Mounter + Toolbox {}

impl<T: SnapshotSource + DeviceProbe + Mounter + Toolbox + ?Sized> Host for T {}

/// The [`Host`] of a real system, backed by `btrfs`, `snapper`, `mount` and the GRUB tools.
pub struct SystemHost {
    /// The name or path of `grub-probe`.
    grub_probe: String,

    /// The name or path of `grub-mkrelpath`.
    grub_mkrelpath: String,

    /// The name or path of `grub-script-check`.
    script_check: String,
}

impl SystemHost {
    /// Creates a new [`SystemHost`] using the program names of a [`RenderConfig`].
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            grub_probe: config.grub_probe.clone(),
            grub_mkrelpath: config.grub_mkrelpath.clone(),
            script_check: config.script_check.clone(),
        }
    }
}

impl SnapshotSource for SystemHost {
    fn list_subvolumes(&self) -> Result<String, CommandError> {
        run_capture("btrfs", ["subvolume", "list", "-sa", "/"])
    }

    fn list_manager_snapshots(&self, config: &str) -> Result<Option<String>, CommandError> {
        if find_program("snapper").is_none() {
            return Ok(None);
        }

        let config_path = Path::new(SNAPPER_CONFIG_DIR).join(config);
        if !std::fs::metadata(&config_path).is_ok_and(|metadata| metadata.len() > 0) {
            warn!("snapper detected but config '{config}' does not exist");
            return Ok(None);
        }

        run_capture("snapper", ["--no-dbus", "-t", "0", "-c", config, "list"]).map(Some)
    }
}

impl DeviceProbe for SystemHost {
    fn device_of(&self, path: &str) -> Result<String, CommandError> {
        let output = run_capture(&self.grub_probe, ["--target=device", path])?;
        // a filesystem may span several devices, the first one is enough to identify it
        Ok(output.lines().next().unwrap_or_default().trim().to_owned())
    }

    fn probe(&self, device: &str, target: ProbeTarget) -> Option<String> {
        let target = format!("--target={}", target.as_str());
        run_capture(&self.grub_probe, ["--device", device, &target])
            .ok()
            .map(|output| output.trim().to_owned())
            .filter(|output| !output.is_empty())
    }

    fn subvolume_show(&self, path: &str) -> Option<String> {
        run_capture("btrfs", ["subvolume", "show", path]).ok()
    }

    fn relative_path(&self, path: &str) -> Option<String> {
        run_capture(&self.grub_mkrelpath, [path])
            .ok()
            .map(|output| output.trim().to_owned())
            .filter(|output| !output.is_empty())
    }

    fn uuid_device_exists(&self, uuid: &str) -> bool {
        Path::new(UUID_LINK_DIR).join(uuid).exists()
    }
}

impl Mounter for SystemHost {
    fn mount(&self, source: &str, target: &Path) -> Result<(), CommandError> {
        let args = [
            OsStr::new("-o"),
            OsStr::new(MOUNT_OPTIONS),
            OsStr::new(source),
            target.as_os_str(),
        ];
        run_capture("mount", args).map(|_| ())
    }

    fn unmount(&self, target: &Path) -> Result<(), CommandError> {
        run_capture("umount", [target]).map(|_| ())
    }
}

impl Toolbox for SystemHost {
    fn has_program(&self, name: &str) -> bool {
        find_program(name).is_some()
    }

    fn check_script(&self, path: &Path) -> Result<bool, CommandError> {
        run_status(&self.script_check, [path])
    }
}
