// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The `snapmenu-rs` library crate.
//!
//! This crate turns the snapshots of a btrfs root volume into GRUB menu entries, so that a machine can be booted
//! directly into any of its snapshots. It is meant to be driven from a `/etc/grub.d` hook through the
//! [snapmenu-rs-cli](../snapmenu_rs_cli/index.html) binary, but every stage of the pipeline is exposed here so that
//! other frontends, the fuzzers and the tests can use them directly.
//!
//! The pipeline, leaf first:
//! - [`artifacts`] finds kernels, initramfs images and microcode in a boot directory, and pairs them up.
//! - [`catalog`] parses the snapshot listing, merges snapper metadata, then filters and orders the snapshots.
//! - [`topology`] decides whether every snapshot carries its own `/boot`, or shares a separate one.
//! - [`render`] writes the GRUB script for a snapshot.
//! - [`generate`] drives everything and writes the generated configuration file.
//!
//! ## MSRV
//!
//! The minimum supported rust version is 1.88.0.

/// The primary result type that wraps around [`crate::error::SnapError`].
pub type SnapResult<T> = Result<T, crate::error::SnapError>;

pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generate;
pub mod render;
pub mod system;
pub mod topology;
