//! Decides where the kernels of a snapshot come from.
//!
//! There are two layouts:
//! - Bound: `/boot` is a directory of the root subvolume, so every snapshot carries its own kernels and initramfs.
//!   These are read from the snapshot itself, and the entries boot them from inside the snapshot.
//! - Separate: `/boot` is on another filesystem or subvolume, so snapshots do not carry kernels. The kernels of the
//!   running system are used for every snapshot.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    SnapResult,
    artifacts::{ArtifactMatcher, BootArtifactSet},
    catalog::Snapshot,
    config::RenderConfig,
    error::SnapError,
    system::tools::{DeviceProbe, ProbeTarget},
};

/// The directory of UUID device links, as passed to the kernel.
const UUID_DEVICE_DIR: &str = "/dev/disk/by-uuid";

/// What is known about the filesystem under a path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// The device the path is on.
    pub device: String,

    /// The filesystem UUID.
    pub fs_uuid: Option<String>,

    /// The filesystem type, as a GRUB module name.
    pub fs: Option<String>,

    /// The platform search hints of the device.
    pub hints: Option<String>,

    /// The storage abstractions of the device.
    pub abstraction: Option<String>,

    /// The UUID of the btrfs subvolume the path is in.
    pub subvolume_uuid: Option<String>,

    /// Whether the device link of the filesystem UUID exists.
    pub uuid_linked: bool,
}

impl DeviceIdentity {
    /// Probes the filesystem under a path.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the device of the path could not be found.
    pub fn probe<P: DeviceProbe + ?Sized>(probe: &P, path: &str) -> SnapResult<Self> {
        let device = probe.device_of(path)?;
        let fs_uuid = probe.probe(&device, ProbeTarget::FsUuid);
        let uuid_linked = fs_uuid
            .as_deref()
            .is_some_and(|uuid| probe.uuid_device_exists(uuid));

        Ok(Self {
            fs: probe.probe(&device, ProbeTarget::Fs),
            hints: probe.probe(&device, ProbeTarget::HintsString),
            abstraction: probe.probe(&device, ProbeTarget::Abstraction),
            subvolume_uuid: probe.subvolume_show(path).as_deref().and_then(parse_subvolume_uuid),
            device,
            fs_uuid,
            uuid_linked,
        })
    }

    /// Checks if the device is a logical volume.
    #[must_use = "Has no effect if the result is unused"]
    pub fn uses_lvm(&self) -> bool {
        self.abstraction
            .as_deref()
            .is_some_and(|abstraction| abstraction.split_whitespace().any(|a| a == "lvm"))
    }
}

/// The root and boot filesystems of the running system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemLayout {
    /// The filesystem of `/`.
    pub root: DeviceIdentity,

    /// The filesystem of the boot directory.
    pub boot: DeviceIdentity,
}

impl SystemLayout {
    /// Probes the root and boot filesystems.
    ///
    /// If the boot directory is not a subvolume of its own, it is in the root subvolume.
    ///
    /// # Errors
    ///
    /// May return an `Error` if a device could not be found.
    pub fn probe<P: DeviceProbe + ?Sized>(probe: &P, boot_directory: &str) -> SnapResult<Self> {
        let root = DeviceIdentity::probe(probe, "/")?;
        let mut boot = DeviceIdentity::probe(probe, boot_directory)?;
        if boot.subvolume_uuid.is_none() {
            boot.subvolume_uuid.clone_from(&root.subvolume_uuid);
        }
        debug!("Root: {root:?}");
        debug!("Boot: {boot:?}");
        Ok(Self { root, boot })
    }

    /// Checks if the boot directory is inside the root subvolume.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_bound(&self) -> bool {
        self.root.fs_uuid == self.boot.fs_uuid
            && self.root.subvolume_uuid == self.boot.subvolume_uuid
    }

    /// Returns the `root=` argument of the kernel.
    ///
    /// This is `UUID=<uuid>` where possible, and the device path otherwise.
    #[must_use = "Has no effect if the result is unused"]
    pub fn kernel_root(&self, disable_linux_uuid: bool) -> String {
        match &self.root.fs_uuid {
            Some(uuid) if !disable_linux_uuid && self.root.uuid_linked && !self.root.uses_lvm() => {
                format!("UUID={uuid}")
            }
            _ => self.root.device.clone(),
        }
    }

    /// Returns the source of the scratch mount.
    #[must_use = "Has no effect if the result is unused"]
    pub fn mount_source(&self) -> String {
        self.root.fs_uuid.as_ref().map_or_else(
            || self.root.device.clone(),
            |uuid| format!("{UUID_DEVICE_DIR}/{uuid}"),
        )
    }
}

/// The boot artifacts of a snapshot, and the path GRUB reads them from.
#[derive(Clone, Debug)]
pub struct SnapshotBoot<'a> {
    /// The artifacts.
    pub artifacts: Cow<'a, BootArtifactSet>,

    /// The directory of the artifacts, as GRUB sees it.
    pub grub_path: String,
}

/// Where the kernels of the snapshots come from.
#[derive(Clone, Debug)]
pub enum Topology {
    /// Every snapshot has its own boot directory.
    Bound,

    /// Every snapshot uses the same, shared boot directory.
    Separate {
        /// The artifacts of the shared boot directory.
        artifacts: BootArtifactSet,

        /// The shared boot directory, as GRUB sees it.
        grub_path: String,
    },
}

impl Topology {
    /// Decides on the [`Topology`] of a system.
    ///
    /// In the separate topology the boot directory is scanned right away.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the separate topology is used and the boot directory has no kernel or no initramfs.
    pub fn resolve<P: DeviceProbe + ?Sized>(
        layout: &SystemLayout,
        config: &RenderConfig,
        matcher: &ArtifactMatcher,
        probe: &P,
    ) -> SnapResult<Self> {
        if layout.is_bound() && !config.override_boot_detection {
            debug!("Boot directory is inside the root subvolume");
            return Ok(Self::Bound);
        }

        if config.override_boot_detection {
            info!("Override boot partition detection: enabled");
        }

        let directory = PathBuf::from(&config.boot_directory);
        let artifacts = matcher.scan(&directory);
        if artifacts.kernels.is_empty() {
            return Err(SnapError::NoKernelFound(directory));
        }
        if artifacts.initramfs.is_empty() {
            return Err(SnapError::NoInitramfsFound(directory));
        }

        let grub_path = probe
            .relative_path(&config.boot_directory)
            .unwrap_or_else(|| "/".to_owned());
        debug!("Boot directory is separate, GRUB reads it from {grub_path}");

        Ok(Self::Separate {
            artifacts,
            grub_path,
        })
    }

    /// Returns the boot artifacts of a snapshot, given the mount point of the top level subvolume.
    #[must_use = "Has no effect if the result is unused"]
    pub fn boot_of(
        &self,
        snapshot: &Snapshot,
        mount: &Path,
        config: &RenderConfig,
        matcher: &ArtifactMatcher,
    ) -> SnapshotBoot<'_> {
        match self {
            Self::Bound => SnapshotBoot {
                artifacts: Cow::Owned(
                    matcher.scan(&snapshot.boot_under(mount, &config.boot_directory)),
                ),
                grub_path: format!("/{}{}", snapshot.path, config.boot_directory),
            },
            Self::Separate {
                artifacts,
                grub_path,
            } => SnapshotBoot {
                artifacts: Cow::Borrowed(artifacts),
                grub_path: grub_path.clone(),
            },
        }
    }
}

/// Finds the subvolume UUID in the output of `btrfs subvolume show`.
fn parse_subvolume_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("UUID:"))
        .map(|uuid| uuid.trim().to_owned())
        .filter(|uuid| !uuid.is_empty() && uuid != "-")
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use super::*;
    use crate::system::command::CommandError;

    const SHOW_ROOT: &str = "\
@
\tName: \t\t\t@
\tUUID: \t\t\t5e2c9a04-0000-4000-8000-000000000001
\tParent UUID: \t\t-
\tReceived UUID: \t\t-
";

    #[derive(Default)]
    struct FakeProbe {
        root_device: &'static str,
        boot_device: &'static str,
        uuids: HashMap<&'static str, &'static str>,
        abstraction: Option<&'static str>,
        relative: Option<&'static str>,
    }

    impl DeviceProbe for FakeProbe {
        fn device_of(&self, path: &str) -> Result<String, CommandError> {
            let device = if path == "/" {
                self.root_device
            } else {
                self.boot_device
            };
            Ok(device.to_owned())
        }

        fn probe(&self, device: &str, target: ProbeTarget) -> Option<String> {
            match target {
                ProbeTarget::FsUuid => self.uuids.get(device).map(|uuid| (*uuid).to_owned()),
                ProbeTarget::Fs => Some("btrfs".to_owned()),
                ProbeTarget::HintsString => None,
                ProbeTarget::Abstraction => self.abstraction.map(str::to_owned),
            }
        }

        fn subvolume_show(&self, path: &str) -> Option<String> {
            (path == "/").then(|| SHOW_ROOT.to_owned())
        }

        fn relative_path(&self, _path: &str) -> Option<String> {
            self.relative.map(str::to_owned)
        }

        fn uuid_device_exists(&self, _uuid: &str) -> bool {
            true
        }
    }

    fn single_volume() -> FakeProbe {
        FakeProbe {
            root_device: "/dev/sda2",
            boot_device: "/dev/sda2",
            uuids: HashMap::from([("/dev/sda2", "aaaa")]),
            ..FakeProbe::default()
        }
    }

    fn separate_boot() -> FakeProbe {
        FakeProbe {
            root_device: "/dev/sda2",
            boot_device: "/dev/sda1",
            uuids: HashMap::from([("/dev/sda2", "aaaa"), ("/dev/sda1", "bbbb")]),
            ..FakeProbe::default()
        }
    }

    #[test]
    fn test_parse_subvolume_uuid() {
        assert_eq!(
            parse_subvolume_uuid(SHOW_ROOT).as_deref(),
            Some("5e2c9a04-0000-4000-8000-000000000001")
        );
        assert_eq!(parse_subvolume_uuid("\tParent UUID: \t-\n"), None);
    }

    #[test]
    fn test_bound_layout() -> SnapResult<()> {
        let layout = SystemLayout::probe(&single_volume(), "/boot")?;
        assert!(layout.is_bound());
        assert_eq!(layout.boot.subvolume_uuid, layout.root.subvolume_uuid);
        assert_eq!(layout.kernel_root(false), "UUID=aaaa");
        assert_eq!(layout.kernel_root(true), "/dev/sda2");
        assert_eq!(layout.mount_source(), "/dev/disk/by-uuid/aaaa");

        let topology = Topology::resolve(
            &layout,
            &RenderConfig::default(),
            &ArtifactMatcher::default(),
            &single_volume(),
        )?;
        assert!(matches!(topology, Topology::Bound));
        Ok(())
    }

    #[test]
    fn test_lvm_root() -> SnapResult<()> {
        let probe = FakeProbe {
            abstraction: Some("lvm"),
            ..single_volume()
        };
        let layout = SystemLayout::probe(&probe, "/boot")?;
        assert_eq!(layout.kernel_root(false), "/dev/sda2");
        Ok(())
    }

    #[test]
    fn test_separate_boot() -> SnapResult<()> {
        let dir = tempfile::tempdir()?;
        let config = RenderConfig {
            boot_directory: dir.path().to_string_lossy().into_owned(),
            ..RenderConfig::default()
        };
        let probe = separate_boot();
        let layout = SystemLayout::probe(&probe, &config.boot_directory)?;
        assert!(!layout.is_bound());

        let matcher = ArtifactMatcher::default();
        assert!(matches!(
            Topology::resolve(&layout, &config, &matcher, &probe),
            Err(SnapError::NoKernelFound(_))
        ));

        fs::write(dir.path().join("vmlinuz-linux"), b"")?;
        assert!(matches!(
            Topology::resolve(&layout, &config, &matcher, &probe),
            Err(SnapError::NoInitramfsFound(_))
        ));

        fs::write(dir.path().join("initramfs-linux.img"), b"")?;
        let topology = Topology::resolve(&layout, &config, &matcher, &probe)?;
        let Topology::Separate { artifacts, grub_path } = &topology else {
            panic!("Expected a separate topology");
        };
        assert_eq!(artifacts.kernels.len(), 1);
        assert_eq!(grub_path, "/");
        Ok(())
    }

    #[test]
    fn test_override() -> SnapResult<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("vmlinuz-linux"), b"")?;
        fs::write(dir.path().join("initramfs-linux.img"), b"")?;
        let config = RenderConfig {
            boot_directory: dir.path().to_string_lossy().into_owned(),
            override_boot_detection: true,
            ..RenderConfig::default()
        };
        let probe = FakeProbe {
            relative: Some("/@/boot"),
            ..single_volume()
        };
        let layout = SystemLayout::probe(&probe, "/boot")?;
        assert!(layout.is_bound());

        let topology = Topology::resolve(&layout, &config, &ArtifactMatcher::default(), &probe)?;
        let snapshot = Snapshot {
            id: Some(1),
            rootid: 300,
            generation: 1,
            creation_generation: 1,
            path: "@snapshots/1/snapshot".to_owned(),
            timestamp: "2024-01-01 00:00:00".to_owned(),
            metadata: None,
        };
        let boot = topology.boot_of(
            &snapshot,
            Path::new("/nonexistent"),
            &config,
            &ArtifactMatcher::default(),
        );
        assert_eq!(boot.grub_path, "/@/boot");
        assert!(matches!(boot.artifacts, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn test_bound_boot_of() {
        let snapshot = Snapshot {
            id: Some(1),
            rootid: 300,
            generation: 1,
            creation_generation: 1,
            path: "@snapshots/1/snapshot".to_owned(),
            timestamp: "2024-01-01 00:00:00".to_owned(),
            metadata: None,
        };
        let mount = tempfile::tempdir().expect("Failed to create temporary directory in test");
        let boot = mount.path().join("@snapshots/1/snapshot/boot");
        fs::create_dir_all(&boot).expect("Failed to create directory in test");
        fs::write(boot.join("vmlinuz-6.1"), b"").expect("Failed to write file in test");

        let config = RenderConfig::default();
        let boot = Topology::Bound.boot_of(
            &snapshot,
            mount.path(),
            &config,
            &ArtifactMatcher::default(),
        );
        assert_eq!(boot.grub_path, "/@snapshots/1/snapshot/boot");
        assert_eq!(boot.artifacts.kernels[0].file_name, "vmlinuz-6.1");
    }
}
