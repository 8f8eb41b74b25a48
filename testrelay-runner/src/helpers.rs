// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Removes ANSI escape sequences (colors, cursor movement) from a message.
///
/// Test runners colorize failure messages for terminals; backends render
/// them as plain text.
pub fn strip_ansi(message: &str) -> String {
    strip_ansi_escapes::strip_str(message)
}

/// Converts backslash separators to forward slashes.
///
/// Test runners on Windows report native paths. Everything downstream compares
/// paths as strings, so they are normalized to `/` whatever the host.
pub(crate) fn convert_to_forward_slash(path: &str) -> Utf8PathBuf {
    path.replace('\\', "/").into()
}

/// Lexically normalizes a path, resolving `.` and `..` components without
/// touching the filesystem.
pub(crate) fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.components().next_back() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root is the root.
                Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_str()),
        }
    }
    out
}
