// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A parser for the shell variable assignments found in `/etc/default/grub` and the grub-btrfs configuration.
//!
//! These files are meant to be sourced by a shell, but only a tiny subset of the shell language is ever used in
//! them, so that subset is parsed here instead of running a shell.
//!
//! Example configuration:
//!
//! ```text
//! # a comment
//! GRUB_BTRFS_LIMIT="20"
//! export GRUB_CMDLINE_LINUX_DEFAULT='quiet splash'
//! GRUB_BTRFS_IGNORE_PREFIX_PATH=("var/lib/docker"
//!                                "@var/lib/docker")
//! ```
//!
//! Variable references such as `$FOO` are not expanded. See [`ShellVars::without_references`].

use std::collections::HashMap;

use log::debug;

/// The value of a shell variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellValue {
    /// A plain `KEY=value` assignment.
    Scalar(String),

    /// An array `KEY=("a" "b")` assignment.
    Array(Vec<String>),
}

/// A set of shell variables.
#[derive(Clone, Debug, Default)]
pub struct ShellVars(HashMap<String, ShellValue>);

/// The words of an assignment value, and whether an unquoted `)` ended them.
struct Words {
    /// The words, with quotes removed.
    words: Vec<String>,

    /// Whether a closing parenthesis was found.
    closed: bool,
}

impl ShellVars {
    /// Parses the assignments of a shell file.
    ///
    /// Lines that are not assignments are ignored. If a variable is assigned several times, the last assignment
    /// wins, the same as it would in a shell.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(content: &str) -> Self {
        let mut vars = Self::default();
        let mut lines = content.lines();

        while let Some(line) = lines.next() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").map_or(line, str::trim_start);
            let Some((key, value)) = line.split_once('=') else {
                debug!("[SHELL PARSER]: Ignoring line {line}");
                continue;
            };
            if !is_valid_name(key) {
                debug!("[SHELL PARSER]: Ignoring invalid variable name {key}");
                continue;
            }

            if let Some(array) = value.strip_prefix('(') {
                // arrays may span several lines, until the closing parenthesis
                let mut body = array.to_owned();
                while !split_words(&body).closed {
                    let Some(next) = lines.next() else {
                        break;
                    };
                    body.push('\n');
                    body.push_str(next);
                }
                vars.insert(key, ShellValue::Array(split_words(&body).words));
            } else {
                let value = split_words(value).words.into_iter().next();
                vars.insert(key, ShellValue::Scalar(value.unwrap_or_default()));
            }
        }

        vars
    }

    /// Collects the `GRUB_` variables of the process environment.
    ///
    /// `grub-mkconfig` exports the settings of `/etc/default/grub` before running its hooks, so these are the
    /// baseline that the configuration files are layered on top of.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_env() -> Self {
        let mut vars = Self::default();
        for (key, value) in std::env::vars() {
            if key.starts_with("GRUB_") {
                vars.insert(&key, ShellValue::Scalar(value));
            }
        }
        vars
    }

    /// Sets a variable.
    pub fn insert(&mut self, key: &str, value: ShellValue) {
        self.0.insert(key.to_owned(), value);
    }

    /// Overrides variables with the ones of another set.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Removes a set of variables, returning them as a new set.
    #[must_use = "Has no effect if the result is unused"]
    pub fn split_off(&mut self, keys: &[&str]) -> Self {
        Self(
            keys.iter()
                .filter_map(|key| self.0.remove_entry(*key))
                .collect(),
        )
    }

    /// Drops the variables whose value refers to another variable.
    ///
    /// References are not expanded, so such a value would otherwise be used as literal text.
    #[must_use = "Has no effect if the result is unused"]
    pub fn without_references(mut self) -> Self {
        self.0.retain(|key, value| {
            let referenced = match value {
                ShellValue::Scalar(value) => value.contains('$'),
                ShellValue::Array(values) => values.iter().any(|value| value.contains('$')),
            };
            if referenced {
                debug!("[SHELL PARSER]: Ignoring {key}, its value refers to another variable");
            }
            !referenced
        });
        self
    }

    /// Returns a variable as a single string.
    ///
    /// For arrays this is the first element, which is what `$KEY` evaluates to in a shell.
    #[must_use = "Has no effect if the result is unused"]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ShellValue::Scalar(value) => Some(value),
            ShellValue::Array(values) => values.first().map(String::as_str),
        }
    }

    /// Returns a variable as a list.
    ///
    /// A non empty scalar is a list of one element.
    #[must_use = "Has no effect if the result is unused"]
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(ShellValue::Array(values)) => values.clone(),
            Some(ShellValue::Scalar(value)) if !value.is_empty() => vec![value.clone()],
            _ => Vec::new(),
        }
    }
}

/// Checks if a string is a valid shell variable name.
fn is_valid_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits an assignment value into words, removing quotes.
///
/// Splitting stops at an unquoted `)`, which closes an array.
fn split_words(input: &str) -> Words {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_word = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(&next) = chars.peek()
                                && matches!(next, '"' | '\\' | '$' | '`')
                            {
                                current.push(next);
                                chars.next();
                            } else {
                                current.push('\\');
                            }
                        }
                        c => current.push(c),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next()
                    && next != '\n'
                {
                    current.push(next);
                }
            }
            '#' if !in_word => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            ')' => {
                if in_word {
                    words.push(current);
                }
                return Words {
                    words,
                    closed: true,
                };
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Words {
        words,
        closed: false,
    }
}
