// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`ArtifactMatcher`], which finds the kernels, initramfs images and microcode in a boot directory.
//!
//! Kernels are paired with initramfs images through the version in their file names, such that `vmlinuz-6.1.0-13`
//! pairs with `initramfs-6.1.0-13.img`, `initrd.img-6.1.0-13` and `initramfs-6.1.0-13-fallback.img`.

use std::path::{Path, PathBuf};

use crate::{
    catalog::Snapshot,
    config::RenderConfig,
    system::fs::{is_file, sorted_file_names},
};

/// The file name patterns of kernels.
const KERNEL_PATTERNS: [Pattern; 3] = [
    Pattern::Prefix("vmlinuz-"),
    Pattern::Prefix("vmlinux-"),
    Pattern::Prefix("kernel-"),
];

/// The file name patterns of initramfs images.
const INITRAMFS_PATTERNS: [Pattern; 5] = [
    Pattern::Prefix("initrd.img-"),
    Pattern::Surround("initrd-", ".img"),
    Pattern::Surround("initrd-", ".gz"),
    Pattern::Surround("initramfs-", ".img"),
    Pattern::Surround("initramfs-", ".gz"),
];

/// The file name patterns of microcode images.
const MICROCODE_PATTERNS: [Pattern; 6] = [
    Pattern::Exact("intel-uc.img"),
    Pattern::Exact("intel-ucode.img"),
    Pattern::Exact("amd-uc.img"),
    Pattern::Exact("amd-ucode.img"),
    Pattern::Exact("early_ucode.cpio"),
    Pattern::Exact("microcode.cpio"),
];

/// A file name pattern, the equivalent of a shell glob with at most one `*`.
#[derive(Clone, Copy, Debug)]
enum Pattern {
    /// `name`
    Exact(&'static str),

    /// `prefix*`
    Prefix(&'static str),

    /// `prefix*suffix`
    Surround(&'static str, &'static str),
}

impl Pattern {
    /// Checks if a file name matches the pattern.
    fn matches(self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Prefix(prefix) => name.starts_with(prefix),
            Self::Surround(prefix, suffix) => {
                name.len() >= prefix.len() + suffix.len()
                    && name.starts_with(prefix)
                    && name.ends_with(suffix)
            }
        }
    }
}

/// A kernel image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    /// The file name of the kernel.
    pub file_name: String,

    /// The version of the kernel, which is everything after the first `-` of the file name, or the whole file name
    /// if it has no `-`.
    pub version: String,
}

impl Kernel {
    /// Creates a [`Kernel`] from its file name.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(file_name: &str) -> Self {
        let version = file_name
            .split_once('-')
            .map_or(file_name, |(_, version)| version)
            .to_owned();
        Self {
            file_name: file_name.to_owned(),
            version,
        }
    }

    /// Checks if an initramfs image belongs to this kernel.
    ///
    /// The suffix of the initramfs (everything after its first `-`) must be the kernel version, optionally followed
    /// by `.img`, `-fallback.img` or `.gz`.
    #[must_use = "Has no effect if the result is unused"]
    pub fn matches_initramfs(&self, initramfs: &str) -> bool {
        let Some((_, suffix)) = initramfs.split_once('-') else {
            return false;
        };
        let version = self.version.as_str();

        suffix == version
            || suffix
                .strip_prefix(version)
                .is_some_and(|rest| matches!(rest, ".img" | "-fallback.img" | ".gz"))
    }
}

/// The artifacts found in one boot directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootArtifactSet {
    /// The directory that was scanned.
    pub directory: PathBuf,

    /// The kernels found.
    pub kernels: Vec<Kernel>,

    /// The file names of the initramfs images found.
    pub initramfs: Vec<String>,

    /// The file names of the microcode images found.
    pub microcode: Vec<String>,
}

impl BootArtifactSet {
    /// Returns the microcode choices of an entry.
    ///
    /// If there is no microcode, this is a single [`None`], so every kernel and initramfs pair still gets one entry.
    #[must_use = "Has no effect if the result is unused"]
    pub fn microcode_choices(&self) -> Vec<Option<&str>> {
        if self.microcode.is_empty() {
            vec![None]
        } else {
            self.microcode.iter().map(|name| Some(name.as_str())).collect()
        }
    }

    /// Pairs every kernel with its initramfs images, for every microcode choice.
    #[must_use = "Has no effect if the result is unused"]
    pub fn match_entries<'a>(&'a self, snapshot: &'a Snapshot) -> Vec<MatchedEntry<'a>> {
        let microcode = self.microcode_choices();
        let mut entries = Vec::new();

        for kernel in &self.kernels {
            for initramfs in self
                .initramfs
                .iter()
                .filter(|initramfs| kernel.matches_initramfs(initramfs))
            {
                for &microcode in &microcode {
                    entries.push(MatchedEntry {
                        snapshot,
                        kernel,
                        initramfs,
                        microcode,
                    });
                }
            }
        }

        entries
    }
}

/// A kernel, initramfs and optional microcode that make up one menu entry of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchedEntry<'a> {
    /// The snapshot that is booted.
    pub snapshot: &'a Snapshot,

    /// The kernel.
    pub kernel: &'a Kernel,

    /// The file name of the initramfs.
    pub initramfs: &'a str,

    /// The file name of the microcode, if any.
    pub microcode: Option<&'a str>,
}

/// Finds boot artifacts by their file names.
#[derive(Clone, Debug, Default)]
pub struct ArtifactMatcher {
    /// Extra kernel file names.
    custom_kernels: Vec<String>,

    /// Extra initramfs file names.
    custom_initramfs: Vec<String>,

    /// Extra microcode file names.
    custom_microcode: Vec<String>,
}

impl ArtifactMatcher {
    /// Creates an [`ArtifactMatcher`] that also looks for the custom file names of a [`RenderConfig`].
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            custom_kernels: config.custom_kernels.clone(),
            custom_initramfs: config.custom_initramfs.clone(),
            custom_microcode: config.custom_microcode.clone(),
        }
    }

    /// Finds the kernels in a directory.
    #[must_use = "Has no effect if the result is unused"]
    pub fn detect_kernels(&self, dir: &Path) -> Vec<PathBuf> {
        detect(dir, &KERNEL_PATTERNS, &self.custom_kernels)
    }

    /// Finds the initramfs images in a directory.
    #[must_use = "Has no effect if the result is unused"]
    pub fn detect_initramfs(&self, dir: &Path) -> Vec<PathBuf> {
        detect(dir, &INITRAMFS_PATTERNS, &self.custom_initramfs)
    }

    /// Finds the microcode images in a directory.
    #[must_use = "Has no effect if the result is unused"]
    pub fn detect_microcode(&self, dir: &Path) -> Vec<PathBuf> {
        detect(dir, &MICROCODE_PATTERNS, &self.custom_microcode)
    }

    /// Finds every kind of artifact in a directory.
    #[must_use = "Has no effect if the result is unused"]
    pub fn scan(&self, dir: &Path) -> BootArtifactSet {
        BootArtifactSet {
            directory: dir.to_path_buf(),
            kernels: file_names(&self.detect_kernels(dir))
                .iter()
                .map(|name| Kernel::new(name))
                .collect(),
            initramfs: file_names(&self.detect_initramfs(dir)),
            microcode: file_names(&self.detect_microcode(dir)),
        }
    }
}

/// Finds the files in a directory that match a list of patterns, followed by the custom names that exist.
fn detect(dir: &Path, patterns: &[Pattern], custom: &[String]) -> Vec<PathBuf> {
    let names = sorted_file_names(dir);
    let mut found: Vec<&str> = Vec::new();

    for pattern in patterns {
        for name in &names {
            if pattern.matches(name) && !found.contains(&name.as_str()) {
                found.push(name);
            }
        }
    }

    let mut paths: Vec<PathBuf> = found.into_iter().map(|name| dir.join(name)).collect();
    for name in custom {
        let path = dir.join(name);
        if is_file(&path) && !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Returns the UTF-8 file names of a list of paths.
fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| path.file_name()?.to_str().map(str::to_owned))
        .collect()
}
