// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`SnapshotCatalog`], the ordered list of snapshots that entries are generated for.
//!
//! The catalog is built from two listings. The first is the subvolume listing of the filesystem:
//!
//! ```text
//! ID 256 gen 1021 cgen 8 top level 5 otime 2024-01-01 10:00:00 path <FS_TREE>/@
//! ID 301 gen 1002 cgen 1001 top level 258 otime 2024-03-02 12:30:05 path <FS_TREE>/@snapshots/42/snapshot
//! ```
//!
//! The second, optional one is the snapshot listing of snapper, which carries a type and a description for every
//! snapshot:
//!
//! ```text
//!  #  | Type   | Pre # | Date                     | User | Cleanup | Description  | Userdata
//! ----+--------+-------+--------------------------+------+---------+--------------+---------
//! 0   | single |       |                          | root |         | current      |
//! 42* | single |       | Sat 02 Mar 2024 12:30:05 | root |         | before nvidia |
//! ```
//!
//! The two are correlated through the digits in the snapshot's path, as snapper keeps its snapshot number in the
//! directory name (`@snapshots/42/snapshot`).

use std::{
    cmp::Ordering,
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

use crate::{
    config::{
        RenderConfig,
        types::{SortField, SortOrder},
    },
    system::fs::is_dir,
};

/// The path that btrfs reports for a subvolume that is being deleted.
pub const DELETED_MARKER: &str = "DELETED";

/// The first path segment that btrfs uses for the top level subvolume.
pub const FS_TREE_MARKER: &str = "<FS_TREE>";

/// The amount of header lines in a snapper listing.
const MANAGER_HEADER_LINES: usize = 2;

/// An `Error` that may result from parsing a listing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// A subvolume record was missing a field.
    #[error("Subvolume record is missing \"{0}\"")]
    MissingField(&'static str),

    /// A numeric field of a subvolume record could not be parsed.
    #[error("Subvolume record has an invalid \"{0}\"")]
    InvalidNumber(&'static str),
}

/// One record of the subvolume listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubvolumeRecord {
    /// The subvolume id.
    pub rootid: u64,

    /// The generation of the last change.
    pub generation: u64,

    /// The generation in which the subvolume was created.
    pub creation_generation: u64,

    /// The creation time, as `YYYY-MM-DD HH:MM:SS`.
    pub otime: String,

    /// The path, relative to the top level subvolume, as btrfs printed it.
    pub path: String,
}

impl SubvolumeRecord {
    /// Parses a line of `btrfs subvolume list -sa`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if a field is missing, or if a number could not be parsed.
    pub fn parse(line: &str) -> Result<Self, CatalogError> {
        // the path is the only field that can contain whitespace, so split it off first
        let (fields, path) = line
            .split_once(" path ")
            .ok_or(CatalogError::MissingField("path"))?;
        let fields: Vec<&str> = fields.split_whitespace().collect();

        let number = |key: &'static str| -> Result<u64, CatalogError> {
            field_after(&fields, key)
                .ok_or(CatalogError::MissingField(key))?
                .parse()
                .map_err(|_| CatalogError::InvalidNumber(key))
        };

        let otime = fields
            .iter()
            .position(|&field| field == "otime")
            .and_then(|i| Some(format!("{} {}", fields.get(i + 1)?, fields.get(i + 2)?)))
            .ok_or(CatalogError::MissingField("otime"))?;

        Ok(Self {
            rootid: number("ID")?,
            generation: number("gen")?,
            creation_generation: number("cgen")?,
            otime,
            path: path.trim_end_matches(['\r', '\n']).to_owned(),
        })
    }
}

/// One record of the snapshot manager listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerRecord {
    /// The snapshot number, or [`None`] if the id column had no digits.
    pub id: Option<u64>,

    /// The snapshot type (`single`, `pre`, `post`).
    pub kind: String,

    /// The description of the snapshot.
    pub description: String,
}

impl ManagerRecord {
    /// Parses a data line of `snapper list`, returning [`None`] if it does not have enough columns.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(line: &str) -> Option<Self> {
        let columns: Vec<&str> = line.split('|').collect();
        if columns.len() < 3 {
            return None;
        }

        Some(Self {
            id: numeric_id(columns[0]),
            kind: columns[1].trim().to_owned(),
            description: columns[columns.len() - 2].trim().to_owned(),
        })
    }
}

/// The metadata that a snapshot manager keeps about a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerMetadata {
    /// The snapshot type.
    pub kind: String,

    /// The description of the snapshot.
    pub description: String,
}

/// A snapshot that entries may be generated for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// The number derived from the digits of the path, used to find the manager metadata.
    ///
    /// This is not unique: `a1` and `1a` both have the id 1.
    pub id: Option<u64>,

    /// The subvolume id.
    pub rootid: u64,

    /// The generation of the last change.
    pub generation: u64,

    /// The generation in which the snapshot was created.
    pub creation_generation: u64,

    /// The path relative to the top level subvolume, such as `@snapshots/42/snapshot`.
    pub path: String,

    /// The creation time, as `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,

    /// The metadata of the snapshot manager, if it knows this snapshot.
    pub metadata: Option<ManagerMetadata>,
}

impl Snapshot {
    /// Returns the manager type, or an empty string.
    #[must_use = "Has no effect if the result is unused"]
    pub fn kind(&self) -> &str {
        self.metadata.as_ref().map_or("", |metadata| &metadata.kind)
    }

    /// Returns the manager description, or an empty string.
    #[must_use = "Has no effect if the result is unused"]
    pub fn description(&self) -> &str {
        self.metadata
            .as_ref()
            .map_or("", |metadata| &metadata.description)
    }

    /// Returns the directory of this snapshot under a mount of the top level subvolume.
    #[must_use = "Has no effect if the result is unused"]
    pub fn root_under(&self, mount: &Path) -> PathBuf {
        mount.join(&self.path)
    }

    /// Returns the boot directory of this snapshot under a mount of the top level subvolume.
    #[must_use = "Has no effect if the result is unused"]
    pub fn boot_under(&self, mount: &Path, boot_directory: &str) -> PathBuf {
        self.root_under(mount)
            .join(boot_directory.trim_start_matches('/'))
    }

    /// Compares two snapshots according to a [`SortOrder`].
    fn compare(&self, other: &Self, order: &SortOrder) -> Ordering {
        order.keys().iter().fold(Ordering::Equal, |ordering, key| {
            ordering.then_with(|| {
                let ordering = match key.field {
                    SortField::RootId => self.rootid.cmp(&other.rootid),
                    SortField::Generation => self.generation.cmp(&other.generation),
                    SortField::CreationGeneration => {
                        self.creation_generation.cmp(&other.creation_generation)
                    }
                    SortField::Path => self.path.cmp(&other.path),
                };
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
        })
    }
}

/// The ordered, filtered list of snapshots.
#[derive(Clone, Debug, Default)]
pub struct SnapshotCatalog {
    /// The snapshots, in order.
    snapshots: Vec<Snapshot>,
}

impl SnapshotCatalog {
    /// Builds a [`SnapshotCatalog`] out of subvolume records and optional manager records.
    ///
    /// This will:
    /// 1. Discard deleted subvolumes, and strip the `<FS_TREE>` marker of every path.
    /// 2. Discard paths that are ignored, exactly or by prefix.
    /// 3. Discard snapshots without a boot directory under `mount`.
    /// 4. Attach the metadata of the first manager record with the same id, then discard ignored manager types and
    ///    descriptions.
    /// 5. Sort, and remove duplicate paths.
    #[must_use = "Has no effect if the result is unused"]
    pub fn list(
        records: Vec<SubvolumeRecord>,
        manager: Option<&[ManagerRecord]>,
        config: &RenderConfig,
        mount: &Path,
    ) -> Self {
        let mut snapshots: Vec<Snapshot> = records
            .into_iter()
            .filter(|record| record.path != DELETED_MARKER)
            .map(|record| {
                let path = strip_fs_tree(&record.path).to_owned();
                Snapshot {
                    id: numeric_id(&path),
                    rootid: record.rootid,
                    generation: record.generation,
                    creation_generation: record.creation_generation,
                    path,
                    timestamp: record.otime,
                    metadata: None,
                }
            })
            .filter(|snapshot| !is_ignored_path(&snapshot.path, config))
            .filter(|snapshot| {
                let boot = snapshot.boot_under(mount, &config.boot_directory);
                let found = is_dir(&boot);
                if !found {
                    debug!("Skipping {}, it has no boot directory", snapshot.path);
                }
                found
            })
            .collect();

        if let Some(manager) = manager {
            for snapshot in &mut snapshots {
                snapshot.metadata = snapshot.id.and_then(|id| {
                    manager
                        .iter()
                        .find(|record| record.id == Some(id))
                        .map(|record| ManagerMetadata {
                            kind: record.kind.clone(),
                            description: record.description.clone(),
                        })
                });
            }
        }

        snapshots.retain(|snapshot| !is_ignored_metadata(snapshot, config));
        snapshots.sort_by(|a, b| a.compare(b, &config.sort));

        let mut seen = HashSet::new();
        snapshots.retain(|snapshot| seen.insert(snapshot.path.clone()));

        Self { snapshots }
    }

    /// Returns an iterator over the snapshots, in order.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Returns the amount of snapshots.
    #[must_use = "Has no effect if the result is unused"]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Checks if there are no snapshots.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Formats every snapshot as a line for logging, in order.
    ///
    /// Lines are `date | path`, and `date | path | type | description` for snapshots with manager metadata. The
    /// columns are padded to the widest value across the catalog, so that they line up.
    #[must_use = "Has no effect if the result is unused"]
    pub fn display_lines(&self) -> Vec<String> {
        let entries: Vec<String> = self
            .snapshots
            .iter()
            .map(|snapshot| format!("{} | {}", snapshot.timestamp, snapshot.path))
            .collect();
        let entry_width = entries
            .iter()
            .map(|entry| entry.chars().count())
            .max()
            .unwrap_or(0);
        let type_width = self
            .snapshots
            .iter()
            .map(|snapshot| snapshot.kind().chars().count())
            .max()
            .unwrap_or(0);

        self.snapshots
            .iter()
            .zip(entries)
            .map(|(snapshot, entry)| match &snapshot.metadata {
                Some(metadata) => format!(
                    "{entry:<entry_width$} | {:<type_width$} | {}",
                    metadata.kind,
                    metadata.description,
                ),
                None => entry,
            })
            .collect()
    }
}

/// Parses the output of `btrfs subvolume list -sa`, skipping lines that cannot be parsed.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_subvolume_list(output: &str) -> Vec<SubvolumeRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match SubvolumeRecord::parse(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("[SUBVOLUME PARSER]: {e}: {line}");
                None
            }
        })
        .collect()
}

/// Parses the output of `snapper list`, skipping its header.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_manager_list(output: &str) -> Vec<ManagerRecord> {
    output
        .lines()
        .skip(MANAGER_HEADER_LINES)
        .filter_map(ManagerRecord::parse)
        .collect()
}

/// Derives a numeric id from the digits of a string, ignoring everything else.
fn numeric_id(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Returns the value following a key in a list of whitespace separated fields.
fn field_after<'a>(fields: &[&'a str], key: &str) -> Option<&'a str> {
    let i = fields.iter().position(|&field| field == key)?;
    fields.get(i + 1).copied()
}

/// Removes the `<FS_TREE>` segment from the start of a path.
fn strip_fs_tree(path: &str) -> &str {
    match path.split_once('/') {
        Some((FS_TREE_MARKER, rest)) => rest,
        _ => path,
    }
}

/// Checks if a path is in the ignore lists.
///
/// A prefix only matches whole path segments, so `var/lib/docker` ignores `var/lib/docker/btrfs`, but neither
/// `var/lib/docker` itself nor `var/lib/docker2`.
fn is_ignored_path(path: &str, config: &RenderConfig) -> bool {
    config.ignore_paths.iter().any(|ignored| path == ignored)
        || config.ignore_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.trim_end_matches('/'))
                .is_some_and(|rest| rest.starts_with('/'))
        })
}

/// Checks if the manager metadata of a snapshot is in the ignore lists.
fn is_ignored_metadata(snapshot: &Snapshot, config: &RenderConfig) -> bool {
    snapshot.metadata.as_ref().is_some_and(|metadata| {
        config
            .ignore_manager_types
            .iter()
            .any(|kind| kind.trim() == metadata.kind)
            || config
                .ignore_manager_descriptions
                .iter()
                .any(|description| description.trim() == metadata.description)
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use proptest::prelude::*;

    use super::*;

    const LISTING: &str = "\
ID 256 gen 1021 cgen 8 top level 5 otime 2024-01-01 10:00:00 path <FS_TREE>/@
ID 301 gen 1002 cgen 1001 top level 258 otime 2024-03-02 12:30:05 path <FS_TREE>/@snapshots/42/snapshot
ID 302 gen 1010 cgen 1009 top level 258 otime 2024-03-03 08:00:00 path <FS_TREE>/@snapshots/43/snapshot
ID 303 gen 1011 cgen 1011 top level 258 otime 2024-03-03 09:00:00 path DELETED
ID 304 gen 1012 cgen 1012 top level 5 otime 2024-03-04 09:00:00 path <FS_TREE>/var/lib/docker/btrfs/subvolumes/abc
ID 305 gen 1013 cgen 1013 top level 258 otime 2024-03-05 09:00:00 path <FS_TREE>/@snapshots/44/my snapshot
";

    const MANAGER_LISTING: &str = "\
 #   | Type   | Pre # | Date                     | User | Cleanup | Description   | Userdata
-----+--------+-------+--------------------------+------+---------+---------------+---------
0    | single |       |                          | root |         | current       |
 42* | single |       | Sat 02 Mar 2024 12:30:05 | root |         | before nvidia |
43   | pre    |       | Sun 03 Mar 2024 08:00:00 | root | number  | zypp(zypper)  | important=yes
";

    /// Creates a fake top level subvolume holding a boot directory for each path.
    fn mount_with(paths: &[&str]) -> tempfile::TempDir {
        let mount = tempfile::tempdir().expect("Failed to create temporary directory in test");
        for path in paths {
            fs::create_dir_all(mount.path().join(path).join("boot"))
                .expect("Failed to create directory in test");
        }
        mount
    }

    fn paths(catalog: &SnapshotCatalog) -> Vec<&str> {
        catalog.iter().map(|snapshot| snapshot.path.as_str()).collect()
    }

    #[test]
    fn test_parse_record() -> Result<(), CatalogError> {
        let record = SubvolumeRecord::parse(
            "ID 305 gen 1013 cgen 1012 top level 258 otime 2024-03-05 09:00:00 path <FS_TREE>/@snapshots/44/my snapshot",
        )?;
        assert_eq!(record.rootid, 305);
        assert_eq!(record.generation, 1013);
        assert_eq!(record.creation_generation, 1012);
        assert_eq!(record.otime, "2024-03-05 09:00:00");
        assert_eq!(record.path, "<FS_TREE>/@snapshots/44/my snapshot");

        // spaces belong to the name, only the line ending is dropped
        let record = SubvolumeRecord::parse(
            "ID 306 gen 1014 cgen 1014 top level 258 otime 2024-03-06 09:00:00 path <FS_TREE>/@snapshots/ padded \r",
        )?;
        assert_eq!(record.path, "<FS_TREE>/@snapshots/ padded ");
        Ok(())
    }

    #[test]
    fn test_parse_invalid_records() {
        assert_eq!(
            SubvolumeRecord::parse("ID 305 gen 1013"),
            Err(CatalogError::MissingField("path"))
        );
        assert_eq!(
            SubvolumeRecord::parse("ID x gen 1 cgen 1 top level 5 otime 2024-01-01 00:00:00 path @"),
            Err(CatalogError::InvalidNumber("ID"))
        );
        assert_eq!(
            SubvolumeRecord::parse("ID 1 gen 1 cgen 1 top level 5 otime 2024-01-01 path @"),
            Err(CatalogError::MissingField("otime"))
        );
        assert_eq!(parse_subvolume_list("garbage\n\nID 1\n").len(), 0);
    }

    #[test]
    fn test_parse_manager_list() {
        let records = parse_manager_list(MANAGER_LISTING);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            ManagerRecord {
                id: Some(42),
                kind: "single".to_owned(),
                description: "before nvidia".to_owned(),
            }
        );
        assert_eq!(records[2].kind, "pre");
        assert_eq!(records[2].description, "zypp(zypper)");
    }

    #[test]
    fn test_list() {
        let mount = mount_with(&[
            "@",
            "@snapshots/42/snapshot",
            "@snapshots/43/snapshot",
            "var/lib/docker/btrfs/subvolumes/abc",
            "@snapshots/44/my snapshot",
        ]);
        let config = RenderConfig {
            ignore_paths: vec!["@".to_owned()],
            ignore_prefixes: vec!["var/lib/docker".to_owned()],
            ..RenderConfig::default()
        };

        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            None,
            &config,
            mount.path(),
        );
        assert_eq!(
            paths(&catalog),
            [
                "@snapshots/44/my snapshot",
                "@snapshots/43/snapshot",
                "@snapshots/42/snapshot",
            ]
        );
        assert!(catalog.iter().all(|snapshot| snapshot.metadata.is_none()));
    }

    #[test]
    fn test_missing_boot_directory() {
        let mount = mount_with(&["@snapshots/42/snapshot"]);
        fs::create_dir_all(mount.path().join("@snapshots/43/snapshot"))
            .expect("Failed to create directory in test");

        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            None,
            &RenderConfig::default(),
            mount.path(),
        );
        assert_eq!(paths(&catalog), ["@snapshots/42/snapshot"]);
    }

    #[test]
    fn test_manager_metadata() {
        let mount = mount_with(&["@", "@snapshots/42/snapshot", "@snapshots/43/snapshot"]);
        let manager = parse_manager_list(MANAGER_LISTING);

        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            Some(&manager),
            &RenderConfig::default(),
            mount.path(),
        );
        let snapshots: Vec<&Snapshot> = catalog.iter().collect();
        assert_eq!(snapshots[0].path, "@snapshots/43/snapshot");
        assert_eq!(snapshots[0].kind(), "pre");
        assert_eq!(snapshots[1].id, Some(42));
        assert_eq!(snapshots[1].kind(), "single");
        assert_eq!(snapshots[1].description(), "before nvidia");
        assert_eq!(snapshots[2].path, "@");
        assert_eq!(snapshots[2].kind(), "");
        assert_eq!(snapshots[2].description(), "");

        let lines = catalog.display_lines();
        assert_eq!(
            lines[0],
            "2024-03-03 08:00:00 | @snapshots/43/snapshot | pre    | zypp(zypper)"
        );
        assert_eq!(
            lines[1],
            "2024-03-02 12:30:05 | @snapshots/42/snapshot | single | before nvidia"
        );
        assert_eq!(lines[2], "2024-01-01 10:00:00 | @");
    }

    #[test]
    fn test_ignored_metadata() {
        let mount = mount_with(&["@snapshots/42/snapshot", "@snapshots/43/snapshot"]);
        let manager = parse_manager_list(MANAGER_LISTING);
        let config = RenderConfig {
            ignore_manager_types: vec!["pre".to_owned()],
            ..RenderConfig::default()
        };

        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            Some(&manager),
            &config,
            mount.path(),
        );
        assert_eq!(paths(&catalog), ["@snapshots/42/snapshot"]);

        let config = RenderConfig {
            ignore_manager_descriptions: vec!["before nvidia".to_owned()],
            ..RenderConfig::default()
        };
        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            Some(&manager),
            &config,
            mount.path(),
        );
        assert_eq!(paths(&catalog), ["@snapshots/43/snapshot"]);
    }

    #[test]
    fn test_noisy_manager_id() {
        assert_eq!(ManagerRecord::parse(" 42*  | single | | | | | x |").and_then(|r| r.id), Some(42));
        assert_eq!(numeric_id("@snapshots/42/snapshot"), Some(42));
        assert_eq!(numeric_id("a1"), numeric_id("1a"));
        assert_eq!(numeric_id("@"), None);
    }

    #[test]
    fn test_sort_order() {
        let mount = mount_with(&["@snapshots/42/snapshot", "@snapshots/43/snapshot", "@"]);
        let config = RenderConfig {
            sort: SortOrder::parse("+path").expect("Failed to parse valid sort order in test"),
            ..RenderConfig::default()
        };
        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            None,
            &config,
            mount.path(),
        );
        assert_eq!(
            paths(&catalog),
            ["@", "@snapshots/42/snapshot", "@snapshots/43/snapshot"]
        );

        let config = RenderConfig {
            sort: SortOrder::parse("-gen").expect("Failed to parse valid sort order in test"),
            ..RenderConfig::default()
        };
        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(LISTING),
            None,
            &config,
            mount.path(),
        );
        assert_eq!(
            paths(&catalog),
            ["@", "@snapshots/43/snapshot", "@snapshots/42/snapshot"]
        );
    }

    #[test]
    fn test_duplicate_paths() {
        let mount = mount_with(&["@snapshots/1/snapshot"]);
        let listing = "\
ID 10 gen 1 cgen 1 top level 5 otime 2024-01-01 00:00:00 path <FS_TREE>/@snapshots/1/snapshot
ID 11 gen 1 cgen 1 top level 5 otime 2024-01-01 00:00:00 path @snapshots/1/snapshot
";
        let catalog = SnapshotCatalog::list(
            parse_subvolume_list(listing),
            None,
            &RenderConfig::default(),
            mount.path(),
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.iter().next().map(|s| s.rootid), Some(11));
    }

    proptest! {
        #[test]
        fn doesnt_panic(x in any::<String>()) {
            let _ = parse_subvolume_list(&x);
            let _ = parse_manager_list(&x);
        }

        #[test]
        fn never_lists_deleted_or_ignored(
            names in proptest::collection::vec("[a-z]{1,3}(/[a-z0-9]{1,3}){0,2}", 0..8),
            ignored in "[a-z]{1,3}",
        ) {
            let mount = mount_with(&names.iter().map(String::as_str).collect::<Vec<_>>());
            let mut listing = String::new();
            for (i, name) in names.iter().enumerate() {
                listing.push_str(&format!(
                    "ID {i} gen 1 cgen 1 top level 5 otime 2024-01-01 00:00:00 path <FS_TREE>/{name}\n"
                ));
                listing.push_str(&format!(
                    "ID {i} gen 1 cgen 1 top level 5 otime 2024-01-01 00:00:00 path {DELETED_MARKER}\n"
                ));
            }
            let config = RenderConfig {
                ignore_paths: vec![ignored.clone()],
                ignore_prefixes: vec![ignored.clone()],
                ..RenderConfig::default()
            };

            let catalog = SnapshotCatalog::list(parse_subvolume_list(&listing), None, &config, mount.path());
            for snapshot in catalog.iter() {
                prop_assert_ne!(snapshot.path.as_str(), DELETED_MARKER);
                prop_assert_ne!(&snapshot.path, &ignored);
                let nested = format!("{ignored}/");
                prop_assert!(!snapshot.path.starts_with(&nested));
            }
        }
    }
}
