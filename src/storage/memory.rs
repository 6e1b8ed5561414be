// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Volatile identity store.
//!
//! Useful for tests and throwaway runs; identities vanish with the process.
//! Writes can be made to fail to exercise persistence error handling.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{IdentityStore, StorageError, StorageResult};
use crate::identity::Identity;

#[derive(Default)]
pub struct InMemoryWallet {
    identities: Mutex<HashMap<String, Identity>>,
    fail_writes: AtomicBool,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.identities.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StorageError {
        StorageError::Corrupted("in-memory wallet lock poisoned".to_string())
    }
}

impl IdentityStore for InMemoryWallet {
    fn get(&self, label: &str) -> StorageResult<Option<Identity>> {
        let identities = self.identities.lock().map_err(|_| Self::poisoned())?;
        Ok(identities.get(label).cloned())
    }

    fn put(&self, identity: &Identity) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other("write rejected")));
        }
        let mut identities = self.identities.lock().map_err(|_| Self::poisoned())?;
        identities.insert(identity.label.clone(), identity.clone());
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let identities = self.identities.lock().map_err(|_| Self::poisoned())?;
        let mut labels: Vec<String> = identities.keys().cloned().collect();
        labels.sort();
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Credentials, Role};

    fn admin() -> Identity {
        Identity {
            label: "admin".into(),
            role: Role::Admin,
            credentials: Credentials {
                certificate: "cert".into(),
                private_key: "key".into(),
            },
            affiliation: None,
            msp_id: "Org1MSP".into(),
        }
    }

    #[test]
    fn stores_and_lists_identities() {
        let wallet = InMemoryWallet::new();
        assert!(wallet.is_empty());

        wallet.put(&admin()).unwrap();

        assert_eq!(wallet.get("admin").unwrap(), Some(admin()));
        assert_eq!(wallet.list().unwrap(), vec!["admin"]);
        assert_eq!(wallet.len(), 1);
    }

    #[test]
    fn failing_writes_leave_store_untouched() {
        let wallet = InMemoryWallet::new();
        wallet.fail_writes(true);

        assert!(matches!(wallet.put(&admin()), Err(StorageError::Io(_))));
        assert!(wallet.is_empty());
    }
}
