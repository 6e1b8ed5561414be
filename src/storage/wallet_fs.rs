// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet directory access.
//!
//! Entries are replaced by writing a temporary sibling and renaming it into
//! place, so a crash never leaves a half-written identity behind.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use super::paths::IDENTITY_EXTENSION;
use super::WalletPaths;

/// Errors from identity store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("wallet I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed wallet entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wallet directory {} is not writable", .0.display())]
    Unwritable(PathBuf),

    #[error("invalid identity label: {0:?}")]
    InvalidLabel(String),

    #[error("corrupted identity: {0}")]
    Corrupted(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// An opened wallet directory holding one JSON entry per label.
#[derive(Debug, Clone)]
pub struct WalletDir {
    paths: WalletPaths,
}

impl WalletDir {
    /// Create the directory if needed and prove it accepts writes.
    pub fn open(paths: WalletPaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.root())?;

        let marker = paths.write_check();
        let writable = fs::write(&marker, b"ok").is_ok() && fs::remove_file(&marker).is_ok();
        if !writable {
            return Err(StorageError::Unwritable(paths.root().to_path_buf()));
        }

        tracing::debug!(root = %paths.root().display(), "Wallet directory opened");
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &WalletPaths {
        &self.paths
    }

    /// Entry stored under `label`, or `None` when there is none.
    pub fn read_entry<T: DeserializeOwned>(&self, label: &str) -> StorageResult<Option<T>> {
        let file = match File::open(self.paths.identity(label)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_reader(BufReader::new(file))?))
    }

    /// Replace the entry stored under `label`.
    ///
    /// On failure the previous entry is left untouched and the staged file
    /// is removed.
    pub fn write_entry<T: Serialize>(&self, label: &str, entry: &T) -> StorageResult<()> {
        let target = self.paths.identity(label);
        let staged = target.with_extension("tmp");

        let written = stage(&staged, entry)
            .and_then(|()| fs::rename(&staged, &target).map_err(StorageError::from));
        if written.is_err() {
            if let Err(e) = fs::remove_file(&staged) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %staged.display(), error = %e, "Failed to remove staged wallet entry");
                }
            }
        }
        written
    }

    /// Labels of all entries, sorted.
    pub fn labels(&self) -> StorageResult<Vec<String>> {
        let mut labels = Vec::new();
        for entry in fs::read_dir(self.paths.root())? {
            let path = entry?.path();
            if let Some(label) = entry_label(&path) {
                labels.push(label);
            }
        }
        labels.sort();
        Ok(labels)
    }
}

fn stage<T: Serialize>(path: &Path, entry: &T) -> StorageResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, entry)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn entry_label(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension()? != IDENTITY_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        msp_id: String,
    }

    fn entry() -> Entry {
        Entry {
            msp_id: "Org1MSP".into(),
        }
    }

    #[test]
    fn open_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path().join("a/b/wallet"))).unwrap();
        assert!(wallet.paths().root().is_dir());
        assert!(!wallet.paths().write_check().exists());
    }

    #[test]
    fn entries_are_replaced_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path())).unwrap();

        wallet.write_entry("admin", &entry()).unwrap();
        wallet
            .write_entry("admin", &Entry { msp_id: "Org2MSP".into() })
            .unwrap();

        let stored: Entry = wallet.read_entry("admin").unwrap().unwrap();
        assert_eq!(stored.msp_id, "Org2MSP");
        assert!(!wallet.paths().identity("admin").with_extension("tmp").exists());
    }

    #[test]
    fn failed_replace_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path())).unwrap();
        let target = wallet.paths().identity("admin");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        assert!(matches!(
            wallet.write_entry("admin", &entry()),
            Err(StorageError::Io(_))
        ));
        assert!(!target.with_extension("tmp").exists());
        assert!(target.join("occupied").exists());
    }

    #[test]
    fn absent_entry_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path())).unwrap();
        assert!(wallet.read_entry::<Entry>("ghost").unwrap().is_none());
    }

    #[test]
    fn garbage_entry_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path())).unwrap();
        fs::write(wallet.paths().identity("admin"), b"{not json").unwrap();

        assert!(matches!(
            wallet.read_entry::<Entry>("admin"),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn labels_only_list_identity_files() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletDir::open(WalletPaths::new(dir.path())).unwrap();
        wallet.write_entry("appUser", &entry()).unwrap();
        wallet.write_entry("admin", &entry()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.id")).unwrap();

        assert_eq!(wallet.labels().unwrap(), vec!["admin", "appUser"]);
    }

    #[test]
    fn file_in_place_of_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("wallet");
        fs::write(&blocker, b"").unwrap();

        assert!(WalletDir::open(WalletPaths::new(&blocker)).is_err());
    }
}
