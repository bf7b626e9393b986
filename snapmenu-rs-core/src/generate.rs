// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`Generator`], which drives a whole run from the configuration to the generated file.
//!
//! The generated menu is first written to `grub-btrfs.new` in the GRUB directory. Only once it is complete (and
//! accepted by `grub-script-check`, if that is installed) does it replace `grub-btrfs.cfg`, so a failed run never
//! leaves a half written menu behind.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    SnapResult,
    artifacts::ArtifactMatcher,
    catalog::{SnapshotCatalog, parse_manager_list, parse_subvolume_list},
    config::RenderConfig,
    error::SnapError,
    render::{GENERATED_FILE_NAME, MenuEntryRenderer, fstab_root_flags, render_wrapper},
    system::{
        fs::{read_optional, remove_if_exists},
        mount::ScratchMount,
        tools::Host,
    },
    topology::{SystemLayout, Topology},
};

/// From this many entries on, GRUB may become slow or fail to load the menu.
pub const ENTRY_WARNING_THRESHOLD: usize = 250;

/// The name of the file that the menu is written to before it replaces the generated file.
pub const STAGING_FILE_NAME: &str = "grub-btrfs.new";

/// The file system type that snapshots can be generated for.
const SUPPORTED_FILESYSTEM: &str = "btrfs";

/// The amount of snapshots and entries that were generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// The amount of snapshots with a submenu.
    pub snapshots: usize,

    /// The amount of menu entries across every snapshot.
    pub entries: usize,
}

impl Counters {
    /// Checks if there are enough entries for GRUB to struggle with the menu.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn exceeds_warning_threshold(&self) -> bool {
        self.entries >= ENTRY_WARNING_THRESHOLD
    }
}

/// The result of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generated {
    /// The wrapper to print on standard output.
    pub wrapper: String,

    /// What was generated.
    pub counters: Counters,

    /// The generated file.
    pub output: PathBuf,
}

/// The state of one run.
pub struct Generator<'a, H: Host + ?Sized> {
    /// The configuration.
    config: &'a RenderConfig,

    /// The system the run happens on.
    host: &'a H,

    /// What was generated so far.
    counters: Counters,
}

impl<'a, H: Host + ?Sized> Generator<'a, H> {
    /// Creates a new [`Generator`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(config: &'a RenderConfig, host: &'a H) -> Self {
        Self {
            config,
            host,
            counters: Counters {
                snapshots: 0,
                entries: 0,
            },
        }
    }

    /// Generates the snapshot menu.
    ///
    /// Returns [`None`] without touching the system if the generator is disabled.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the system is not supported, if there are no snapshots to generate entries for, or
    /// if any IO or external program failed.
    pub fn run(mut self) -> SnapResult<Option<Generated>> {
        if self.config.disabled {
            info!("GRUB_BTRFS_DISABLE is set to true, skipping");
            return Ok(None);
        }

        let layout = self.check_preconditions()?;

        let staging = self.config.grub_directory.join(STAGING_FILE_NAME);
        let output = self.config.grub_directory.join(GENERATED_FILE_NAME);

        let result = File::create(&staging)
            .map_err(SnapError::from)
            .and_then(|file| self.write_menu(&layout, file))
            .and_then(|()| self.finish(&staging, &output));

        if let Err(e) = result {
            if let Err(e) = remove_if_exists(&staging) {
                warn!("Unable to delete {}: {e}", staging.display());
            }
            return Err(e);
        }

        Ok(Some(Generated {
            wrapper: render_wrapper(self.config),
            counters: self.counters,
            output,
        }))
    }

    /// Checks that the required tools exist, and that the root is btrfs.
    fn check_preconditions(&self) -> SnapResult<SystemLayout> {
        for program in ["btrfs", self.config.grub_probe.as_str()] {
            if !self.host.has_program(program) {
                return Err(SnapError::MissingTool(program.to_owned()));
            }
        }

        let layout = SystemLayout::probe(self.host, &self.config.boot_directory)?;
        match layout.root.fs.as_deref() {
            Some(SUPPORTED_FILESYSTEM) => Ok(layout),
            fs => Err(SnapError::NotSupportedFilesystem(
                fs.unwrap_or("unknown").to_owned(),
            )),
        }
    }

    /// Writes the submenu of every snapshot, up to the limit.
    ///
    /// The top level subvolume is mounted for the duration of this function.
    fn write_menu(&mut self, layout: &SystemLayout, file: File) -> SnapResult<()> {
        let config = self.config;
        let mut writer = BufWriter::new(file);
        let mount = ScratchMount::acquire(self.host, &layout.mount_source())?;

        let records = parse_subvolume_list(&self.host.list_subvolumes()?);
        let manager = match self.host.list_manager_snapshots(&config.snapper_config) {
            Ok(listing) => listing.as_deref().map(parse_manager_list),
            Err(e) => {
                warn!("Unable to read the snapper listing, snapshots will have no description: {e}");
                None
            }
        };
        let catalog = SnapshotCatalog::list(records, manager.as_deref(), config, mount.path());
        debug!("{} snapshots are eligible", catalog.len());

        let matcher = ArtifactMatcher::new(config);
        let topology = Topology::resolve(layout, config, &matcher, self.host)?;
        let renderer = MenuEntryRenderer::new(config, layout);

        for (snapshot, line) in catalog.iter().zip(catalog.display_lines()) {
            if self.counters.snapshots >= config.limit {
                break;
            }

            let boot = topology.boot_of(snapshot, mount.path(), config, &matcher);
            let entries = boot.artifacts.match_entries(snapshot);
            if entries.is_empty() {
                debug!("Skipping {}, it has no kernel with a matching initramfs", snapshot.path);
                continue;
            }

            let fstab_flags = read_optional(&snapshot.root_under(mount.path()).join("etc/fstab"))
                .map(|fstab| fstab_root_flags(&fstab))
                .unwrap_or_default();
            let text = renderer.render_snapshot(snapshot, &entries, &boot.grub_path, &fstab_flags);
            writer.write_all(text.as_bytes())?;

            self.counters.snapshots += 1;
            self.counters.entries += entries.len();
            if config.show_snapshots_found {
                info!("Found snapshot: {line}");
            }
        }

        writer.flush()?;
        mount.release();
        Ok(())
    }

    /// Reports the counters, validates the staging file and moves it into place.
    fn finish(&self, staging: &Path, output: &Path) -> SnapResult<()> {
        let Counters { snapshots, entries } = self.counters;

        if self.counters.exceeds_warning_threshold() {
            warn!(
                "Generated {entries} total GRUB entries. You might experience issues loading snapshots menu in GRUB."
            );
        }
        if self.config.show_total_found {
            info!("Found {snapshots} snapshot(s)");
        }

        if snapshots == 0 {
            remove_if_exists(output)?;
            return Err(SnapError::NoSnapshotsFound);
        }

        if self.host.has_program(&self.config.script_check) && !self.host.check_script(staging)? {
            return Err(SnapError::ScriptCheckFailed(staging.to_path_buf()));
        }

        std::fs::rename(staging, output)?;
        Ok(())
    }
}

/// Generates the snapshot menu with a [`Generator`].
///
/// # Errors
///
/// May return an `Error` for the same reasons as [`Generator::run`].
pub fn generate<H: Host + ?Sized>(config: &RenderConfig, host: &H) -> SnapResult<Option<Generated>> {
    Generator::new(config, host).run()
}
