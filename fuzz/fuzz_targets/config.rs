// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;
use snapmenu_rs_core::config::{RenderConfig, shell::ShellVars};

fuzz_target!(|data: &[u8]| {
    let Ok(data) = std::str::from_utf8(data) else {
        return;
    };
    let vars = ShellVars::parse(data);
    let _ = RenderConfig::from_vars(&vars, None);
});
