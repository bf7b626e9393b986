//! Provides [`RenderConfig`], the settings of a generator run.
//!
//! The settings come from shell variables, layered in this order (later wins):
//! 1. the `GRUB_` variables of the environment, which `grub-mkconfig` exports,
//! 2. `/etc/default/grub`,
//! 3. the grub-btrfs configuration file, `/etc/default/grub-btrfs/config` by default.
//!
//! The kernel command line variables are the exception. `grub-mkconfig` has already evaluated them (including
//! `/etc/default/grub.d`), so when they are exported, the exported value always wins. Values that refer to other
//! variables are never read from the files, as references are not expanded.
//!
//! Example configuration:
//!
//! ```text
//! # Show at most 20 snapshots
//! GRUB_BTRFS_LIMIT="20"
//!
//! # Sort by creation generation, oldest first
//! GRUB_BTRFS_SUBVOLUME_SORT="+ogen"
//!
//! # Show the date, then the path of every snapshot
//! GRUB_BTRFS_TITLE_FORMAT="d/n"
//!
//! # Do not generate entries for docker's subvolumes
//! GRUB_BTRFS_IGNORE_PREFIX_PATH=("var/lib/docker" "@var/lib/docker")
//! ```
//!
//! A value that cannot be parsed is reported and replaced by its default, rather than failing the whole run.

use std::path::{Path, PathBuf};

use log::warn;

use crate::{
    config::{
        shell::ShellVars,
        types::{PathDisplay, SortOrder, TitleFormat},
    },
    system::fs::read_optional,
};

pub mod shell;
pub mod types;

/// The default path of the grub-btrfs configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/default/grub-btrfs/config";

/// The default path of the GRUB configuration defaults.
pub const GRUB_DEFAULTS_PATH: &str = "/etc/default/grub";

/// The path of the os-release file, used for the default submenu name.
const OS_RELEASE_PATH: &str = "/etc/os-release";

/// The variables whose exported value wins over the configuration files.
const EXPORTED_KEYS: [&str; 4] = [
    "GRUB_CMDLINE_LINUX",
    "GRUB_CMDLINE_LINUX_DEFAULT",
    "GRUB_ROOT_FLAGS",
    "GRUB_DISABLE_LINUX_UUID",
];

/// The default maximum amount of snapshots.
const DEFAULT_LIMIT: usize = 50;

/// The settings of a generator run.
///
/// This is loaded once, and only ever read afterwards.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Disables the generator entirely.
    pub disabled: bool,

    /// The name of the submenu that holds every snapshot.
    pub submenu_name: String,

    /// The prefix label of every snapshot title.
    pub prefix_entry: String,

    /// The maximum amount of snapshots to generate entries for.
    pub limit: usize,

    /// The order of the snapshots.
    pub sort: SortOrder,

    /// The snapper configuration to read snapshot metadata from.
    pub snapper_config: String,

    /// The GRUB directory, where the generated file is written.
    pub grub_directory: PathBuf,

    /// The boot directory, as an absolute path without a trailing slash.
    pub boot_directory: String,

    /// Lets users that are not authorized boot the snapshots.
    pub unrestricted: bool,

    /// The GRUB users allowed to boot the snapshots.
    pub authorized_users: Option<String>,

    /// Forces the separate boot topology.
    pub override_boot_detection: bool,

    /// Extra kernel file names to look for.
    pub custom_kernels: Vec<String>,

    /// Extra initramfs file names to look for.
    pub custom_initramfs: Vec<String>,

    /// Extra microcode file names to look for.
    pub custom_microcode: Vec<String>,

    /// Snapshot paths to ignore.
    pub ignore_paths: Vec<String>,

    /// Snapshot path prefixes to ignore.
    pub ignore_prefixes: Vec<String>,

    /// Snapper types to ignore.
    pub ignore_manager_types: Vec<String>,

    /// Snapper descriptions to ignore.
    pub ignore_manager_descriptions: Vec<String>,

    /// The title format of the snapshots.
    pub title_format: TitleFormat,

    /// How snapshot paths are displayed in titles.
    pub path_display: PathDisplay,

    /// Logs every snapshot that entries were generated for.
    pub show_snapshots_found: bool,

    /// Logs the amount of snapshots that entries were generated for.
    pub show_total_found: bool,

    /// The kernel command line, from `GRUB_CMDLINE_LINUX` and `GRUB_CMDLINE_LINUX_DEFAULT`.
    pub kernel_parameters: String,

    /// Extra root flags, from `GRUB_ROOT_FLAGS`.
    pub root_flags: String,

    /// Always use the root device path instead of its UUID.
    pub disable_linux_uuid: bool,

    /// The `grub-probe` program.
    pub grub_probe: String,

    /// The `grub-mkrelpath` program.
    pub grub_mkrelpath: String,

    /// The `grub-script-check` program.
    pub script_check: String,
}

impl RenderConfig {
    /// Loads a [`RenderConfig`] from the environment and configuration files.
    ///
    /// Missing files are skipped, so this always returns a usable [`RenderConfig`].
    #[must_use = "Has no effect if the result is unused"]
    pub fn load(config_path: &Path, grub_defaults: &Path) -> Self {
        let read = |path: &Path| {
            read_optional(path)
                .map(|content| ShellVars::parse(&content))
                .unwrap_or_default()
        };
        let vars = layer(ShellVars::from_env(), read(grub_defaults), read(config_path));

        let distro = read_optional(Path::new(OS_RELEASE_PATH))
            .and_then(|content| ShellVars::parse(&content).get("NAME").map(str::to_owned));

        Self::from_vars(&vars, distro.as_deref())
    }

    /// Builds a [`RenderConfig`] from a set of shell variables.
    ///
    /// The distribution name is used for the default submenu name.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_vars(vars: &ShellVars, distro: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(distro) = distro.filter(|distro| !distro.trim().is_empty()) {
            config.submenu_name = format!("{} snapshots", distro.trim());
        }

        config.disabled = get_bool(vars, "GRUB_BTRFS_DISABLE", config.disabled);
        assign_str(vars, "GRUB_BTRFS_SUBMENUNAME", &mut config.submenu_name);
        assign_str(vars, "GRUB_BTRFS_PREFIXENTRY", &mut config.prefix_entry);
        assign_str(vars, "GRUB_BTRFS_SNAPPER_CONFIG", &mut config.snapper_config);
        assign_str(vars, "GRUB_BTRFS_PROBE", &mut config.grub_probe);
        assign_str(vars, "GRUB_BTRFS_MKRELPATH", &mut config.grub_mkrelpath);
        assign_str(vars, "GRUB_BTRFS_SCRIPT_CHECK", &mut config.script_check);

        if let Some(limit) = get_non_empty(vars, "GRUB_BTRFS_LIMIT") {
            match limit.parse() {
                Ok(limit) => config.limit = limit,
                Err(e) => warn!("GRUB_BTRFS_LIMIT={limit} is not a valid limit ({e}), using {DEFAULT_LIMIT}"),
            }
        }

        if let Some(sort) = get_non_empty(vars, "GRUB_BTRFS_SUBVOLUME_SORT") {
            match SortOrder::parse(sort) {
                Some(sort) => config.sort = sort,
                None => warn!("GRUB_BTRFS_SUBVOLUME_SORT={sort} is not supported, using -rootid"),
            }
        }

        if let Some(format) = get_non_empty(vars, "GRUB_BTRFS_TITLE_FORMAT") {
            match TitleFormat::from_code(format) {
                Some(format) => config.title_format = format,
                None => warn!("GRUB_BTRFS_TITLE_FORMAT={format} is not supported, using p/d/n"),
            }
        }

        if let Some(directory) = get_non_empty(vars, "GRUB_BTRFS_GRUB_DIRNAME") {
            config.grub_directory = PathBuf::from(directory);
        }
        if let Some(directory) = get_non_empty(vars, "GRUB_BTRFS_BOOT_DIRNAME") {
            config.boot_directory = normalize_directory(directory);
        }

        config.unrestricted = get_bool(
            vars,
            "GRUB_BTRFS_DISABLE_PROTECTION_SUBMENU",
            config.unrestricted,
        );
        config.authorized_users =
            get_non_empty(vars, "GRUB_BTRFS_PROTECTION_AUTHORIZED_USERS").map(str::to_owned);
        config.override_boot_detection = get_bool(
            vars,
            "GRUB_BTRFS_OVERRIDE_BOOT_PARTITION_DETECTION",
            config.override_boot_detection,
        );

        config.custom_kernels = vars.get_list("GRUB_BTRFS_NKERNEL");
        config.custom_initramfs = vars.get_list("GRUB_BTRFS_NINIT");
        config.custom_microcode = vars.get_list("GRUB_BTRFS_CUSTOM_MICROCODE");
        config.ignore_paths = vars.get_list("GRUB_BTRFS_IGNORE_SPECIFIC_PATH");
        config.ignore_prefixes = vars.get_list("GRUB_BTRFS_IGNORE_PREFIX_PATH");
        config.ignore_manager_types = vars.get_list("GRUB_BTRFS_IGNORE_SNAPPER_TYPE");
        config.ignore_manager_descriptions =
            vars.get_list("GRUB_BTRFS_IGNORE_SNAPPER_DESCRIPTION");

        if !get_bool(vars, "GRUB_BTRFS_DISPLAY_PATH_SNAPSHOT", true) {
            config.path_display = PathDisplay::Trimmed;
        }
        config.show_snapshots_found = get_bool(
            vars,
            "GRUB_BTRFS_SHOW_SNAPSHOTS_FOUND",
            config.show_snapshots_found,
        );
        config.show_total_found = get_bool(
            vars,
            "GRUB_BTRFS_SHOW_TOTAL_SNAPSHOTS_FOUND",
            config.show_total_found,
        );

        config.kernel_parameters = ["GRUB_CMDLINE_LINUX", "GRUB_CMDLINE_LINUX_DEFAULT"]
            .into_iter()
            .filter_map(|key| get_non_empty(vars, key))
            .collect::<Vec<_>>()
            .join(" ");
        config.root_flags = get_non_empty(vars, "GRUB_ROOT_FLAGS")
            .unwrap_or_default()
            .to_owned();
        config.disable_linux_uuid = get_bool(vars, "GRUB_DISABLE_LINUX_UUID", false);

        config
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            submenu_name: "Linux snapshots".to_owned(),
            prefix_entry: "Snapshot:".to_owned(),
            limit: DEFAULT_LIMIT,
            sort: SortOrder::default(),
            snapper_config: "root".to_owned(),
            grub_directory: PathBuf::from("/boot/grub"),
            boot_directory: "/boot".to_owned(),
            unrestricted: false,
            authorized_users: None,
            override_boot_detection: false,
            custom_kernels: Vec::new(),
            custom_initramfs: Vec::new(),
            custom_microcode: Vec::new(),
            ignore_paths: Vec::new(),
            ignore_prefixes: Vec::new(),
            ignore_manager_types: Vec::new(),
            ignore_manager_descriptions: Vec::new(),
            title_format: TitleFormat::default(),
            path_display: PathDisplay::default(),
            show_snapshots_found: true,
            show_total_found: true,
            kernel_parameters: String::new(),
            root_flags: String::new(),
            disable_linux_uuid: false,
            grub_probe: "grub-probe".to_owned(),
            grub_mkrelpath: "grub-mkrelpath".to_owned(),
            script_check: "grub-script-check".to_owned(),
        }
    }
}

/// Layers the configuration files over the environment.
fn layer(mut env: ShellVars, grub_defaults: ShellVars, config: ShellVars) -> ShellVars {
    let exported = env.split_off(&EXPORTED_KEYS);
    env.extend(grub_defaults.without_references());
    env.extend(config.without_references());
    env.extend(exported);
    env
}

/// Returns a variable if it is set to something other than whitespace.
fn get_non_empty<'a>(vars: &'a ShellVars, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Overwrites a string setting if the variable is set and non empty.
fn assign_str(vars: &ShellVars, key: &str, setting: &mut String) {
    if let Some(value) = get_non_empty(vars, key) {
        value.clone_into(setting);
    }
}

/// Parses a boolean variable, case insensitively.
///
/// An unset variable returns the default. Anything other than `true` or `false` is reported, then also returns the
/// default.
fn get_bool(vars: &ShellVars, key: &str, default: bool) -> bool {
    let Some(value) = get_non_empty(vars, key) else {
        return default;
    };

    match &*value.to_ascii_lowercase() {
        "true" => true,
        "false" => false,
        _ => {
            warn!("{key}={value} is not a boolean, using {default}");
            default
        }
    }
}

/// Normalizes a directory into an absolute path without a trailing slash.
fn normalize_directory(directory: &str) -> String {
    let trimmed = directory.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}
