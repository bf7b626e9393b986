// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`ScratchMount`], the temporary read-only mount of the whole btrfs volume.
//!
//! Snapshots are enumerated by path relative to the top level subvolume, so the volume is mounted with
//! `subvolid=5` at a fresh directory under the temporary directory. The mount is released when the
//! [`ScratchMount`] is dropped, which covers every early return of the generator as well as the normal path.

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use log::{debug, warn};

use crate::{SnapResult, system::tools::Mounter};

/// The prefix of the temporary mount directory.
pub const MOUNT_PREFIX: &str = "grub-btrfs.";

/// How many times unmounting is attempted before giving up.
const UNMOUNT_ATTEMPTS: u32 = 10;

/// The delay between two unmount attempts.
const UNMOUNT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// A mounted scratch directory that is unmounted and removed on drop.
pub struct ScratchMount<'a, M: Mounter + ?Sized> {
    /// The [`Mounter`] that mounted the directory, and that will unmount it.
    mounter: &'a M,

    /// The mount point.
    path: PathBuf,

    /// Whether the volume is currently mounted at `path`.
    mounted: bool,

    /// Whether cleanup already happened.
    released: bool,
}

impl<'a, M: Mounter + ?Sized> ScratchMount<'a, M> {
    /// Creates a fresh temporary directory and mounts `source` on it.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the directory could not be created, or if mounting failed. In the latter case the
    /// directory is removed again before returning.
    pub fn acquire(mounter: &'a M, source: &str) -> SnapResult<Self> {
        let path = tempfile::Builder::new()
            .prefix(MOUNT_PREFIX)
            .tempdir()?
            .keep(); // never remove recursively, the directory may still hold a mounted volume

        let mut mount = Self {
            mounter,
            path,
            mounted: false,
            released: false,
        };

        mounter.mount(source, &mount.path)?;
        mount.mounted = true;
        debug!("Mounted {source} at {}", mount.path.display());

        Ok(mount)
    }

    /// Returns the mount point.
    #[must_use = "Has no effect if the result is unused"]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unmounts the volume and removes the mount point.
    ///
    /// This is the same as dropping the [`ScratchMount`], but makes the point of release explicit.
    pub fn release(mut self) {
        self.cleanup();
    }

    /// Unmounts with retries, then removes the directory if nothing is mounted on it anymore.
    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for attempt in 1..=UNMOUNT_ATTEMPTS {
            if !self.mounted {
                break;
            }
            match self.mounter.unmount(&self.path) {
                Ok(()) => self.mounted = false,
                Err(e) if attempt == UNMOUNT_ATTEMPTS => {
                    warn!("Unable to unmount {}: {e}", self.path.display());
                }
                Err(e) => {
                    debug!("Unmount attempt {attempt} failed: {e}");
                    thread::sleep(UNMOUNT_RETRY_DELAY);
                }
            }
        }

        if !self.mounted
            && let Err(e) = fs::remove_dir(&self.path)
        {
            warn!("Unable to delete {}: {e}", self.path.display());
        }
    }
}

impl<M: Mounter + ?Sized> Drop for ScratchMount<'_, M> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::system::command::CommandError;

    #[derive(Default)]
    struct RecordingMounter {
        fail_mount: bool,
        mounted_at: RefCell<Option<PathBuf>>,
        unmounts: Cell<u32>,
    }

    impl Mounter for RecordingMounter {
        fn mount(&self, _source: &str, target: &Path) -> Result<(), CommandError> {
            if self.fail_mount {
                return Err(CommandError::Failed {
                    program: "mount".to_owned(),
                    status: 32,
                    stderr: "mount failed".to_owned(),
                });
            }
            *self.mounted_at.borrow_mut() = Some(target.to_path_buf());
            Ok(())
        }

        fn unmount(&self, _target: &Path) -> Result<(), CommandError> {
            self.unmounts.set(self.unmounts.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_release_on_drop() -> SnapResult<()> {
        let mounter = RecordingMounter::default();
        let path = {
            let mount = ScratchMount::acquire(&mounter, "/dev/sda2")?;
            assert!(mount.path().is_dir());
            assert!(
                mount
                    .path()
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(MOUNT_PREFIX))
            );
            mount.path().to_path_buf()
        };
        assert_eq!(mounter.mounted_at.borrow().as_deref(), Some(path.as_path()));
        assert_eq!(mounter.unmounts.get(), 1);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_explicit_release_only_unmounts_once() -> SnapResult<()> {
        let mounter = RecordingMounter::default();
        let mount = ScratchMount::acquire(&mounter, "/dev/sda2")?;
        mount.release();
        assert_eq!(mounter.unmounts.get(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_mount_removes_directory() {
        let mounter = RecordingMounter {
            fail_mount: true,
            ..RecordingMounter::default()
        };
        assert!(ScratchMount::acquire(&mounter, "/dev/sda2").is_err());
        assert_eq!(mounter.unmounts.get(), 0);
    }
}
