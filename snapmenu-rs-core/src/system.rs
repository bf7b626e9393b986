// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Everything that touches the running system: external programs, the filesystem, mounts and logging.

pub mod command;
pub mod fs;
pub mod log_backend;
pub mod mount;
pub mod tools;
