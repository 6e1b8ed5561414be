// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the identity store layout.

use std::path::{Path, PathBuf};

/// Extension of identity files.
pub const IDENTITY_EXTENSION: &str = "id";

/// Storage path utilities for the wallet directory.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    root: PathBuf,
}

impl WalletPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the wallet.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the file holding the identity stored under `label`.
    pub fn identity(&self, label: &str) -> PathBuf {
        self.root.join(format!("{label}.{IDENTITY_EXTENSION}"))
    }

    /// Scratch file written once when the wallet is opened.
    pub fn write_check(&self) -> PathBuf {
        self.root.join(".write_check")
    }
}

/// Whether `label` is usable as a file stem inside the wallet directory.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label != "."
        && label != ".."
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_paths_use_id_extension() {
        let paths = WalletPaths::new("/tmp/wallet");
        assert_eq!(paths.root(), Path::new("/tmp/wallet"));
        assert_eq!(
            paths.identity("appUser"),
            PathBuf::from("/tmp/wallet/appUser.id")
        );
        assert_eq!(paths.identity("admin"), PathBuf::from("/tmp/wallet/admin.id"));
    }

    #[test]
    fn labels_cannot_escape_the_wallet() {
        assert!(is_valid_label("appUser"));
        assert!(is_valid_label("user-1@org1"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label(".."));
        assert!(!is_valid_label("../admin"));
        assert!(!is_valid_label("a/b"));
    }
}
