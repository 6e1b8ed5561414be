// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Store
//!
//! Durable storage for enrolled identities, keyed by label (the enrollment
//! id for application users, `admin` for the organization registrar).
//!
//! ## Storage Layout
//!
//! ```text
//! <WALLET_DIR>/
//!   admin.id      # Registrar identity (certificate + private key)
//!   appUser.id    # Identity the gateway session connects with
//! ```
//!
//! ## Important Notes
//!
//! - Identities are written once and never rewritten or deleted here
//! - Private keys are stored in PKCS#8 PEM; protect the directory accordingly

pub mod identities;
pub mod memory;
pub mod paths;
pub mod wallet_fs;

pub use identities::FileWallet;
pub use memory::InMemoryWallet;
pub use paths::WalletPaths;
pub use wallet_fs::{StorageError, StorageResult, WalletDir};

use crate::identity::Identity;

/// Persistent identity store keyed by label.
pub trait IdentityStore: Send + Sync {
    /// Look up an identity; `Ok(None)` when nothing is stored under `label`.
    fn get(&self, label: &str) -> StorageResult<Option<Identity>>;

    /// Persist an identity under its label.
    fn put(&self, identity: &Identity) -> StorageResult<()>;

    /// Labels of all stored identities, sorted.
    fn list(&self) -> StorageResult<Vec<String>>;

    fn exists(&self, label: &str) -> StorageResult<bool> {
        Ok(self.get(label)?.is_some())
    }
}
