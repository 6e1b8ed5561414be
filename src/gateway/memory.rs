// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process ledger hosting the car registry.
//!
//! Submits are ordered through a single async mutex and may be delayed to
//! mimic consensus latency; the world state lock is only held to copy or
//! replace the state, so evaluates never wait behind a pending commit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::chaincode::{self, WorldState};
use super::{Commit, Connection, Contract, GatewayError, LedgerGateway, Network};
use crate::identity::Identity;

struct LedgerInner {
    channel: String,
    contract: String,
    state: RwLock<WorldState>,
    /// Serializes submits; holds the current block height.
    ordering: Mutex<u64>,
    commit_delay: Duration,
    available: AtomicBool,
    connections: AtomicUsize,
}

impl LedgerInner {
    fn snapshot(&self) -> Result<WorldState, GatewayError> {
        self.state
            .read()
            .map(|state| state.clone())
            .map_err(|_| GatewayError::Unreachable("world state lock poisoned".to_string()))
    }
}

/// A single-channel ledger deploying one car registry contract.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl MemoryLedger {
    /// Empty ledger serving `contract` on `channel`.
    pub fn new(channel: impl Into<String>, contract: impl Into<String>) -> Self {
        Self::with_state(channel, contract, WorldState::new())
    }

    pub fn with_state(
        channel: impl Into<String>,
        contract: impl Into<String>,
        state: WorldState,
    ) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                channel: channel.into(),
                contract: contract.into(),
                state: RwLock::new(state),
                ordering: Mutex::new(0),
                commit_delay: Duration::ZERO,
                available: AtomicBool::new(true),
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Delay every commit by `delay` while holding the ordering lock.
    ///
    /// Must be set before the ledger is shared.
    pub fn with_commit_delay(self, delay: Duration) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.commit_delay = delay;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => Self { inner },
        }
    }

    /// Toggle whether new connections are accepted.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Current committed world state.
    pub fn state(&self) -> Result<WorldState, GatewayError> {
        self.inner.snapshot()
    }

    pub async fn block_height(&self) -> u64 {
        *self.inner.ordering.lock().await
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn connect(&self, identity: &Identity) -> Result<Arc<dyn Connection>, GatewayError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable(
                "memory ledger is not accepting connections".to_string(),
            ));
        }
        if identity.credentials.certificate.is_empty() {
            return Err(GatewayError::Unauthorized {
                label: identity.label.clone(),
                message: "identity carries no certificate".to_string(),
            });
        }

        self.inner.connections.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(label = %identity.label, msp_id = %identity.msp_id, "Memory ledger connection opened");
        Ok(Arc::new(MemoryConnection {
            inner: self.inner.clone(),
        }))
    }
}

struct MemoryConnection {
    inner: Arc<LedgerInner>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn network(&self, channel: &str) -> Result<Arc<dyn Network>, GatewayError> {
        if channel != self.inner.channel {
            return Err(GatewayError::ChannelNotFound(channel.to_string()));
        }
        Ok(Arc::new(MemoryNetwork {
            inner: self.inner.clone(),
        }))
    }
}

struct MemoryNetwork {
    inner: Arc<LedgerInner>,
}

#[async_trait]
impl Network for MemoryNetwork {
    fn channel(&self) -> &str {
        &self.inner.channel
    }

    async fn contract(&self, name: &str) -> Result<Arc<dyn Contract>, GatewayError> {
        if name != self.inner.contract {
            return Err(GatewayError::ContractNotFound {
                channel: self.inner.channel.clone(),
                contract: name.to_string(),
            });
        }
        Ok(Arc::new(MemoryContract {
            inner: self.inner.clone(),
        }))
    }
}

struct MemoryContract {
    inner: Arc<LedgerInner>,
}

#[async_trait]
impl Contract for MemoryContract {
    fn name(&self) -> &str {
        &self.inner.contract
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        let mut scratch = self.inner.snapshot()?;
        chaincode::invoke(&mut scratch, function, args)
            .map_err(|e| GatewayError::Chaincode(e.to_string()))
    }

    async fn submit(&self, function: &str, args: &[String]) -> Result<Commit, GatewayError> {
        let mut height = self.inner.ordering.lock().await;

        let mut next = self.inner.snapshot()?;
        let payload = chaincode::invoke(&mut next, function, args)
            .map_err(|e| GatewayError::Chaincode(e.to_string()))?;

        if !self.inner.commit_delay.is_zero() {
            tokio::time::sleep(self.inner.commit_delay).await;
        }

        {
            let mut state = self
                .inner
                .state
                .write()
                .map_err(|_| GatewayError::Unreachable("world state lock poisoned".to_string()))?;
            *state = next;
        }
        *height += 1;

        let commit = Commit {
            transaction_id: uuid::Uuid::new_v4().simple().to_string(),
            block_number: *height,
            payload,
        };
        tracing::debug!(
            function = %function,
            transaction_id = %commit.transaction_id,
            block_number = commit.block_number,
            "Memory ledger committed transaction"
        );
        Ok(commit)
    }
}
