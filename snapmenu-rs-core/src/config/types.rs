//! Typed values of the configuration.
//!
//! These are the settings that are not plain strings, booleans or lists: the title format, the path display mode,
//! and the sort order of the snapshots.

/// A part of the title of a snapshot's submenu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TitlePart {
    /// The configured prefix label, such as `Snapshot:`.
    Prefix,

    /// The creation timestamp of the snapshot.
    Date,

    /// The display name (path) of the snapshot.
    Name,
}

/// Which parts make up a title, and in which order.
///
/// Each format has a short code, which is what `GRUB_BTRFS_TITLE_FORMAT` is set to. The letters stand for
/// **p**refix, **d**ate and **n**ame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TitleFormat {
    /// `p`
    Prefix,

    /// `d`
    Date,

    /// `n`
    Name,

    /// `p/d`
    PrefixDate,

    /// `p/n`
    PrefixName,

    /// `d/n`
    DateName,

    /// `n/d`
    NameDate,

    /// `p/d/n`
    #[default]
    PrefixDateName,
}

impl TitleFormat {
    /// Every title format, in the order of their codes.
    pub const ALL: [Self; 8] = [
        Self::Prefix,
        Self::Date,
        Self::Name,
        Self::PrefixDate,
        Self::PrefixName,
        Self::DateName,
        Self::NameDate,
        Self::PrefixDateName,
    ];

    /// Parses a title format from its code, returning [`None`] for an unknown code.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.code() == code.trim())
    }

    /// Convert a [`TitleFormat`] into its code.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Prefix => "p",
            Self::Date => "d",
            Self::Name => "n",
            Self::PrefixDate => "p/d",
            Self::PrefixName => "p/n",
            Self::DateName => "d/n",
            Self::NameDate => "n/d",
            Self::PrefixDateName => "p/d/n",
        }
    }

    /// Returns the parts of a title, in order.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn parts(self) -> &'static [TitlePart] {
        use TitlePart::{Date, Name, Prefix};
        match self {
            Self::Prefix => &[Prefix],
            Self::Date => &[Date],
            Self::Name => &[Name],
            Self::PrefixDate => &[Prefix, Date],
            Self::PrefixName => &[Prefix, Name],
            Self::DateName => &[Date, Name],
            Self::NameDate => &[Name, Date],
            Self::PrefixDateName => &[Prefix, Date, Name],
        }
    }
}

/// How the path of a snapshot is displayed in its title.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathDisplay {
    /// The full path relative to the top level subvolume, such as `@snapshots/12/snapshot`.
    #[default]
    Full,

    /// The path without its first segment, such as `12/snapshot`.
    Trimmed,
}

impl PathDisplay {
    /// Returns the display name of a snapshot path.
    ///
    /// A path with a single segment is displayed the same in both modes.
    #[must_use = "Has no effect if the result is unused"]
    pub fn display(self, path: &str) -> &str {
        match self {
            Self::Full => path,
            Self::Trimmed => path.split_once('/').map_or(path, |(_, rest)| rest),
        }
    }
}

/// A field that snapshots can be sorted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    /// The subvolume id assigned by the filesystem.
    RootId,

    /// The generation of the last change.
    Generation,

    /// The generation in which the subvolume was created.
    CreationGeneration,

    /// The path of the subvolume.
    Path,
}

/// One key of a [`SortOrder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// The field to compare.
    pub field: SortField,

    /// Whether larger values come first.
    pub descending: bool,
}

/// The order of the snapshots, as a list of keys.
///
/// This uses the syntax of `btrfs subvolume list --sort`: comma separated fields out of `rootid`, `gen`, `ogen`
/// and `path`, each optionally prefixed with `+` (ascending, the default) or `-` (descending).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortOrder(Vec<SortKey>);

impl SortOrder {
    /// Parses a [`SortOrder`], returning [`None`] if any of the keys is invalid.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(order: &str) -> Option<Self> {
        let keys = order
            .split(',')
            .map(|key| {
                let key = key.trim();
                let (descending, name) = match key.as_bytes().first() {
                    Some(b'-') => (true, &key[1..]),
                    Some(b'+') => (false, &key[1..]),
                    _ => (false, key),
                };
                let field = match name {
                    "rootid" => SortField::RootId,
                    "gen" => SortField::Generation,
                    "ogen" => SortField::CreationGeneration,
                    "path" => SortField::Path,
                    _ => return None,
                };
                Some(SortKey { field, descending })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self(keys))
    }

    /// Returns the keys, the most significant first.
    #[must_use = "Has no effect if the result is unused"]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self(vec![SortKey {
            field: SortField::RootId,
            descending: true,
        }])
    }
}
