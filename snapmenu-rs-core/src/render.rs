// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`MenuEntryRenderer`], which writes the GRUB script of every snapshot.
//!
//! Each snapshot becomes a submenu of its own:
//!
//! ```text
//! submenu 'Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot' {
//!     submenu 'Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot' { echo }
//!     menuentry '  vmlinuz-linux & initramfs-linux.img' --class snapshots ... {
//!         ...
//!     }
//! }
//! ```
//!
//! The inner submenu does nothing, it only repeats the title at the top of the submenu once it is opened.

use crate::{
    artifacts::MatchedEntry,
    catalog::Snapshot,
    config::{RenderConfig, types::TitlePart},
    topology::SystemLayout,
};

/// The classes of every menu entry.
const ENTRY_CLASSES: &str = "--class snapshots --class gnu-linux --class gnu --class os";

/// The name of the generated file, relative to the GRUB directory.
pub const GENERATED_FILE_NAME: &str = "grub-btrfs.cfg";

/// The width of one indentation level.
const INDENT: &str = "    ";

/// Escapes a string for use inside a GRUB single quoted string.
#[must_use = "Has no effect if the result is unused"]
pub fn escape_single(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Escapes a string for use inside a GRUB double quoted string.
#[must_use = "Has no effect if the result is unused"]
pub fn escape_double(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '$' | '\\' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Returns the mount options of the btrfs root filesystem in an fstab, except for the subvolume selection.
///
/// The subvolume is always chosen by the entry itself.
#[must_use = "Has no effect if the result is unused"]
pub fn fstab_root_flags(fstab: &str) -> Vec<String> {
    fstab
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .find(|fields| fields.get(1) == Some(&"/") && fields.get(2) == Some(&"btrfs"))
        .and_then(|fields| fields.get(3).copied())
        .map(|options| {
            options
                .split(',')
                .filter(|option| {
                    !option.is_empty()
                        && !option.starts_with("subvol=")
                        && !option.starts_with("subvolid=")
                })
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Renders the wrapper that registers the generated file in the main GRUB menu.
#[must_use = "Has no effect if the result is unused"]
pub fn render_wrapper(config: &RenderConfig) -> String {
    let mut options = String::new();
    if let Some(users) = &config.authorized_users {
        options.push_str("--users ");
        options.push_str(users);
        options.push(' ');
    }
    if config.unrestricted {
        options.push_str("--unrestricted ");
    }

    format!(
        "submenu '{}' {options}{{\n{INDENT}configfile \"${{prefix}}/{GENERATED_FILE_NAME}\"\n}}\n",
        escape_single(&config.submenu_name)
    )
}

/// Joins a file name onto a directory as GRUB sees it.
fn grub_join(directory: &str, file_name: &str) -> String {
    format!("{}/{file_name}", directory.trim_end_matches('/'))
}

/// An indented script that is built line by line.
#[derive(Default)]
struct Script {
    /// The script so far.
    text: String,

    /// The current indentation level.
    depth: usize,
}

impl Script {
    /// Adds a line at the current indentation level.
    fn line(&mut self, line: &str) {
        for _ in 0..self.depth {
            self.text.push_str(INDENT);
        }
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Adds a line, then indents the following lines.
    fn open(&mut self, line: &str) {
        self.line(line);
        self.depth += 1;
    }

    /// Removes one indentation level, then adds a closing line.
    fn close(&mut self, line: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(line);
    }

    /// Closes a block and opens the next one on the same line, as for `else`.
    fn reopen(&mut self, line: &str) {
        self.close(line);
        self.depth += 1;
    }
}

/// The settings of the system that are the same for every entry.
#[derive(Clone, Debug)]
pub struct MenuEntryRenderer<'a> {
    /// The configuration.
    config: &'a RenderConfig,

    /// The `root=` argument of the kernel.
    root_device: String,

    /// The UUID of the boot filesystem.
    boot_uuid: Option<&'a str>,

    /// The GRUB module of the boot filesystem.
    boot_fs: Option<&'a str>,

    /// The search hints of the boot filesystem.
    boot_hints: Option<&'a str>,
}

impl<'a> MenuEntryRenderer<'a> {
    /// Creates a [`MenuEntryRenderer`] for a system.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(config: &'a RenderConfig, layout: &'a SystemLayout) -> Self {
        Self {
            config,
            root_device: layout.kernel_root(config.disable_linux_uuid),
            boot_uuid: layout.boot.fs_uuid.as_deref(),
            boot_fs: layout.boot.fs.as_deref(),
            boot_hints: layout.boot.hints.as_deref(),
        }
    }

    /// Returns the title of a snapshot, made of the parts of the configured title format.
    ///
    /// The title is not escaped.
    #[must_use = "Has no effect if the result is unused"]
    pub fn title(&self, snapshot: &Snapshot) -> String {
        self.config
            .title_format
            .parts()
            .iter()
            .map(|part| match part {
                TitlePart::Prefix => self.config.prefix_entry.as_str(),
                TitlePart::Date => snapshot.timestamp.as_str(),
                TitlePart::Name => self.config.path_display.display(&snapshot.path),
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Renders the submenu of a snapshot, with one menu entry for every matched entry.
    ///
    /// `grub_path` is the boot directory as GRUB sees it, and `fstab_flags` are the root mount options of the
    /// snapshot's fstab.
    #[must_use = "Has no effect if the result is unused"]
    pub fn render_snapshot(
        &self,
        snapshot: &Snapshot,
        entries: &[MatchedEntry<'_>],
        grub_path: &str,
        fstab_flags: &[String],
    ) -> String {
        let title = escape_single(&self.title(snapshot));
        let mut script = Script::default();

        script.open(&format!("submenu '{title}' {{"));
        script.line(&format!("submenu '{title}' {{ echo }}"));
        for entry in entries {
            self.render_entry(&mut script, entry, grub_path, fstab_flags);
        }
        script.close("}");

        script.text
    }

    /// Renders one menu entry.
    fn render_entry(
        &self,
        script: &mut Script,
        entry: &MatchedEntry<'_>,
        grub_path: &str,
        fstab_flags: &[String],
    ) {
        let kernel = entry.kernel.file_name.as_str();
        let label = match entry.microcode {
            Some(microcode) => format!("  {kernel} & {} & {microcode}", entry.initramfs),
            None => format!("  {kernel} & {}", entry.initramfs),
        };
        let id = format!("gnulinux-snapshots-{}", self.boot_uuid.unwrap_or_default());

        script.open(&format!(
            "menuentry '{}' {ENTRY_CLASSES} $menuentry_id_option '{}' {{",
            escape_single(&label),
            escape_single(&id),
        ));

        script.line("if [ x$feature_all_video_module = xy ]; then");
        script.line("insmod all_video");
        script.line("fi");
        script.line("set gfxpayload=keep");
        if let Some(fs) = self.boot_fs {
            script.line(&format!("insmod {fs}"));
        }
        if let Some(uuid) = self.boot_uuid {
            match self.boot_hints {
                Some(hints) => {
                    script.open("if [ x$feature_platform_search_hint = xy ]; then");
                    script.line(&format!("search --no-floppy --fs-uuid  --set=root {hints} {uuid}"));
                    script.reopen("else");
                    script.line(&format!("search --no-floppy --fs-uuid  --set=root {uuid}"));
                    script.close("fi");
                }
                None => script.line(&format!("search --no-floppy --fs-uuid  --set=root {uuid}")),
            }
        }

        let snapshot = entry.snapshot;
        script.line(&format!(
            "echo 'Loading Snapshot: {}'",
            escape_single(&format!("{} {}", snapshot.timestamp, snapshot.path))
        ));
        script.line(&format!("echo 'Loading Kernel: {} ...'", escape_single(kernel)));
        script.line(&self.linux_line(kernel, grub_path, &snapshot.path, fstab_flags));

        let initramfs = format!("\"{}\"", escape_double(&grub_join(grub_path, entry.initramfs)));
        match entry.microcode {
            Some(microcode) => {
                script.line(&format!(
                    "echo 'Loading Microcode & Initramfs: {} ...'",
                    escape_single(&format!("{microcode} {}", entry.initramfs))
                ));
                script.line(&format!(
                    "initrd \"{}\" {initramfs}",
                    escape_double(&grub_join(grub_path, microcode))
                ));
            }
            None => {
                script.line(&format!(
                    "echo 'Loading Initramfs: {} ...'",
                    escape_single(entry.initramfs)
                ));
                script.line(&format!("initrd {initramfs}"));
            }
        }

        script.close("}");
    }

    /// Renders the `linux` command of an entry.
    fn linux_line(
        &self,
        kernel: &str,
        grub_path: &str,
        snapshot_path: &str,
        fstab_flags: &[String],
    ) -> String {
        let mut flags = String::from("rootflags=");
        let grub_flags = self.config.root_flags.trim();
        for flag in fstab_flags
            .iter()
            .map(String::as_str)
            .chain((!grub_flags.is_empty()).then_some(grub_flags))
        {
            flags.push_str(flag);
            flags.push(',');
        }
        flags.push_str("subvol=\"");
        flags.push_str(&escape_double(snapshot_path));
        flags.push('"');

        let kernel = format!("\"{}\"", escape_double(&grub_join(grub_path, kernel)));
        let root = format!("root={}", self.root_device);
        [
            "linux",
            kernel.as_str(),
            root.as_str(),
            self.config.kernel_parameters.trim(),
            flags.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::Kernel,
        catalog::ManagerMetadata,
        config::types::{PathDisplay, TitleFormat},
        topology::DeviceIdentity,
    };

    fn snapshot() -> Snapshot {
        Snapshot {
            id: Some(42),
            rootid: 301,
            generation: 1002,
            creation_generation: 1001,
            path: "@snapshots/42/snapshot".to_owned(),
            timestamp: "2024-03-02 12:30:05".to_owned(),
            metadata: Some(ManagerMetadata {
                kind: "single".to_owned(),
                description: "before nvidia".to_owned(),
            }),
        }
    }

    fn layout() -> SystemLayout {
        let root = DeviceIdentity {
            device: "/dev/sda2".to_owned(),
            fs_uuid: Some("aaaa".to_owned()),
            fs: Some("btrfs".to_owned()),
            hints: None,
            abstraction: None,
            subvolume_uuid: Some("s1".to_owned()),
            uuid_linked: true,
        };
        SystemLayout {
            boot: root.clone(),
            root,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_single("it's"), r"it'\''s");
        assert_eq!(escape_double(r#"a"$b\`"#), r#"a\"\$b\\\`"#);
    }

    #[test]
    fn test_titles() {
        let snapshot = snapshot();
        let layout = layout();
        let expected = [
            ("p", "Snapshot:"),
            ("d", "2024-03-02 12:30:05"),
            ("n", "@snapshots/42/snapshot"),
            ("p/d", "Snapshot: 2024-03-02 12:30:05"),
            ("p/n", "Snapshot: @snapshots/42/snapshot"),
            ("d/n", "2024-03-02 12:30:05 @snapshots/42/snapshot"),
            ("n/d", "@snapshots/42/snapshot 2024-03-02 12:30:05"),
            ("p/d/n", "Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot"),
        ];

        for (code, title) in expected {
            let config = RenderConfig {
                title_format: TitleFormat::from_code(code).expect("Failed to parse title code in test"),
                ..RenderConfig::default()
            };
            assert_eq!(MenuEntryRenderer::new(&config, &layout).title(&snapshot), title);
        }

        let config = RenderConfig {
            title_format: TitleFormat::Name,
            path_display: PathDisplay::Trimmed,
            ..RenderConfig::default()
        };
        assert_eq!(
            MenuEntryRenderer::new(&config, &layout).title(&snapshot),
            "42/snapshot"
        );
    }

    #[test]
    fn test_fstab_root_flags() {
        let fstab = "\
# /etc/fstab
UUID=aaaa /     btrfs rw,noatime,compress=zstd:3,subvol=/@,subvolid=256 0 0
UUID=aaaa /home btrfs rw,noatime,subvol=/@home 0 0
";
        assert_eq!(fstab_root_flags(fstab), ["rw", "noatime", "compress=zstd:3"]);
        assert!(fstab_root_flags("UUID=bbbb / ext4 defaults 0 1").is_empty());
    }

    #[test]
    fn test_single_entry() {
        let snapshot = snapshot();
        let layout = layout();
        let config = RenderConfig {
            kernel_parameters: "quiet splash".to_owned(),
            ..RenderConfig::default()
        };
        let kernel = Kernel::new("vmlinuz-linux");
        let entries = [MatchedEntry {
            snapshot: &snapshot,
            kernel: &kernel,
            initramfs: "initramfs-linux.img",
            microcode: None,
        }];

        let text = MenuEntryRenderer::new(&config, &layout).render_snapshot(
            &snapshot,
            &entries,
            "/@snapshots/42/snapshot/boot",
            &["noatime".to_owned()],
        );
        let expected = r#"submenu 'Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot' {
    submenu 'Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot' { echo }
    menuentry '  vmlinuz-linux & initramfs-linux.img' --class snapshots --class gnu-linux --class gnu --class os $menuentry_id_option 'gnulinux-snapshots-aaaa' {
        if [ x$feature_all_video_module = xy ]; then
        insmod all_video
        fi
        set gfxpayload=keep
        insmod btrfs
        search --no-floppy --fs-uuid  --set=root aaaa
        echo 'Loading Snapshot: 2024-03-02 12:30:05 @snapshots/42/snapshot'
        echo 'Loading Kernel: vmlinuz-linux ...'
        linux "/@snapshots/42/snapshot/boot/vmlinuz-linux" root=UUID=aaaa quiet splash rootflags=noatime,subvol="@snapshots/42/snapshot"
        echo 'Loading Initramfs: initramfs-linux.img ...'
        initrd "/@snapshots/42/snapshot/boot/initramfs-linux.img"
    }
}
"#;
        assert_eq!(text, expected);
        assert_eq!(text.matches("menuentry '").count(), 1);
    }

    #[test]
    fn test_microcode_and_hints() {
        let snapshot = snapshot();
        let mut layout = layout();
        layout.boot.hints = Some("--hint-bios=hd0,gpt2".to_owned());
        let config = RenderConfig {
            root_flags: "ssd".to_owned(),
            ..RenderConfig::default()
        };
        let kernel = Kernel::new("vmlinuz-linux");
        let entries = [MatchedEntry {
            snapshot: &snapshot,
            kernel: &kernel,
            initramfs: "initramfs-linux.img",
            microcode: Some("intel-ucode.img"),
        }];

        let text = MenuEntryRenderer::new(&config, &layout).render_snapshot(&snapshot, &entries, "/", &[]);
        assert!(text.contains(
            "    menuentry '  vmlinuz-linux & initramfs-linux.img & intel-ucode.img' --class snapshots"
        ));
        assert!(text.contains(
            "        if [ x$feature_platform_search_hint = xy ]; then\n            search --no-floppy --fs-uuid  --set=root --hint-bios=hd0,gpt2 aaaa\n        else\n            search --no-floppy --fs-uuid  --set=root aaaa\n        fi\n"
        ));
        assert!(text.contains(
            r#"linux "/vmlinuz-linux" root=UUID=aaaa rootflags=ssd,subvol="@snapshots/42/snapshot""#
        ));
        assert!(text.contains("echo 'Loading Microcode & Initramfs: intel-ucode.img initramfs-linux.img ...'"));
        assert!(text.contains(r#"initrd "/intel-ucode.img" "/initramfs-linux.img""#));
    }

    #[test]
    fn test_quotes_in_path() {
        let mut snapshot = snapshot();
        snapshot.path = "@snapshots/it's".to_owned();
        let layout = layout();
        let config = RenderConfig::default();
        let text = MenuEntryRenderer::new(&config, &layout).render_snapshot(&snapshot, &[], "/", &[]);
        assert!(text.starts_with(r"submenu 'Snapshot: 2024-03-02 12:30:05 @snapshots/it'\''s' {"));
    }

    #[test]
    fn test_wrapper() {
        let config = RenderConfig {
            submenu_name: "Arch Linux snapshots".to_owned(),
            ..RenderConfig::default()
        };
        assert_eq!(
            render_wrapper(&config),
            "submenu 'Arch Linux snapshots' {\n    configfile \"${prefix}/grub-btrfs.cfg\"\n}\n"
        );

        let config = RenderConfig {
            authorized_users: Some("admin".to_owned()),
            unrestricted: true,
            ..config
        };
        assert!(render_wrapper(&config).starts_with("submenu 'Arch Linux snapshots' --users admin --unrestricted {\n"));
    }
}
