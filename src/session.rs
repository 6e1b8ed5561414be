// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Manager
//!
//! One [`Session`] exists per process. It owns the contract handle the
//! transaction proxy invokes and moves through a small state machine:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Ready
//!      ▲                        │
//!      │                        └──err──▶ Failed
//!      └────────reset────────────────────────┘ (from Ready or Failed)
//! ```
//!
//! Readers only ever clone the contract handle out of a `Ready` slot; any
//! other state answers [`ProxyError::NotReady`] immediately. The slot lock is
//! never held across an await.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::error::ProxyError;
use crate::gateway::{Contract, LedgerGateway};
use crate::identity::Identity;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Channel and contract the session binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub channel: String,
    pub contract: String,
    /// Transaction submitted once after the session becomes ready.
    pub init_function: Option<String>,
}

/// Outcome of the one-time ledger initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitLedgerOutcome {
    Initialized { transaction_id: String },
    /// Expected on every restart once the ledger holds data.
    Ignored(String),
}

/// Point-in-time view of the session for health reporting.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub channel: String,
    pub contract: String,
    /// Label of the identity the session connected with.
    pub identity: Option<String>,
    pub ready_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct ReadySession {
    contract: Arc<dyn Contract>,
    identity: String,
    ready_since: DateTime<Utc>,
}

enum Slot {
    Disconnected,
    Connecting,
    Ready(ReadySession),
    Failed(String),
}

impl Slot {
    fn state(&self) -> SessionState {
        match self {
            Slot::Disconnected => SessionState::Disconnected,
            Slot::Connecting => SessionState::Connecting,
            Slot::Ready(_) => SessionState::Ready,
            Slot::Failed(_) => SessionState::Failed,
        }
    }
}

/// Marks a connect attempt that has not settled yet. Dropping it unsettled
/// (the connect future was cancelled) moves the slot from `Connecting` to
/// `Failed` so a later connect is accepted.
struct PendingConnect<'a> {
    slot: &'a RwLock<Slot>,
    settled: bool,
}

impl PendingConnect<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if let Slot::Connecting = &*slot {
            tracing::warn!("Ledger session connect cancelled");
            *slot = Slot::Failed(CONNECT_CANCELLED.to_string());
        }
    }
}

/// Failure recorded when a connect attempt is dropped before it settles.
pub const CONNECT_CANCELLED: &str = "connect attempt was cancelled";

/// Process-wide ledger session.
pub struct Session {
    config: SessionConfig,
    slot: RwLock<Slot>,
    init_task: Mutex<Option<JoinHandle<InitLedgerOutcome>>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(Slot::Disconnected),
            init_task: Mutex::new(None),
        }
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn state(&self) -> SessionState {
        self.read_slot().state()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let slot = self.read_slot();
        let (identity, ready_since, last_error) = match &*slot {
            Slot::Ready(ready) => (Some(ready.identity.clone()), Some(ready.ready_since), None),
            Slot::Failed(message) => (None, None, Some(message.clone())),
            Slot::Disconnected | Slot::Connecting => (None, None, None),
        };
        SessionSnapshot {
            state: slot.state(),
            channel: self.config.channel.clone(),
            contract: self.config.contract.clone(),
            identity,
            ready_since,
            last_error,
        }
    }

    /// The resolved contract, or `NotReady` with the current state.
    pub async fn contract(&self) -> Result<Arc<dyn Contract>, ProxyError> {
        match &*self.read_slot() {
            Slot::Ready(ready) => Ok(ready.contract.clone()),
            other => Err(ProxyError::NotReady(other.state())),
        }
    }

    /// Connect with an already provisioned identity.
    pub async fn connect(
        &self,
        gateway: &dyn LedgerGateway,
        identity: &Identity,
    ) -> Result<(), ProxyError> {
        let identity = identity.clone();
        self.connect_with(gateway, async move { Ok(identity) }).await
    }

    /// Connect once `identity` resolves.
    ///
    /// The session is `Connecting` while the identity is provisioned, so a
    /// provisioning failure leaves it `Failed` like any connection failure.
    /// Calls made while `Connecting` or `Ready` are refused without touching
    /// the state.
    pub async fn connect_with<F>(
        &self,
        gateway: &dyn LedgerGateway,
        identity: F,
    ) -> Result<(), ProxyError>
    where
        F: Future<Output = Result<Identity, ProxyError>> + Send,
    {
        {
            let mut slot = self.write_slot();
            match slot.state() {
                state @ (SessionState::Connecting | SessionState::Ready) => {
                    return Err(ProxyError::Connection(format!(
                        "session is already {state}"
                    )));
                }
                SessionState::Disconnected | SessionState::Failed => *slot = Slot::Connecting,
            }
        }
        tracing::info!(channel = %self.config.channel, contract = %self.config.contract, "Connecting ledger session");

        let pending = PendingConnect {
            slot: &self.slot,
            settled: false,
        };
        let outcome = self.establish(gateway, identity).await;
        pending.settle();

        let mut slot = self.write_slot();
        match outcome {
            Ok(ready) => {
                let contract = ready.contract.clone();
                tracing::info!(
                    channel = %self.config.channel,
                    contract = %self.config.contract,
                    identity = %ready.identity,
                    "Ledger session ready"
                );
                *slot = Slot::Ready(ready);
                drop(slot);

                if let Some(function) = &self.config.init_function {
                    self.spawn_init(contract, function.clone());
                }
                Ok(())
            }
            Err(error) => {
                tracing::error!(channel = %self.config.channel, error = %error, "Ledger session failed");
                *slot = Slot::Failed(error.to_string());
                Err(error)
            }
        }
    }

    async fn establish<F>(
        &self,
        gateway: &dyn LedgerGateway,
        identity: F,
    ) -> Result<ReadySession, ProxyError>
    where
        F: Future<Output = Result<Identity, ProxyError>> + Send,
    {
        let identity = identity.await?;
        let connection = gateway
            .connect(&identity)
            .await
            .map_err(|e| ProxyError::Connection(e.to_string()))?;
        let network = connection
            .network(&self.config.channel)
            .await
            .map_err(|e| ProxyError::Connection(e.to_string()))?;
        let contract = network
            .contract(&self.config.contract)
            .await
            .map_err(|e| ProxyError::Connection(e.to_string()))?;

        Ok(ReadySession {
            contract,
            identity: identity.label,
            ready_since: Utc::now(),
        })
    }

    fn spawn_init(&self, contract: Arc<dyn Contract>, function: String) {
        let handle = tokio::spawn(async move {
            match contract.submit(&function, &[]).await {
                Ok(commit) => {
                    tracing::info!(
                        function = %function,
                        transaction_id = %commit.transaction_id,
                        "Ledger initialized"
                    );
                    InitLedgerOutcome::Initialized {
                        transaction_id: commit.transaction_id,
                    }
                }
                Err(error) => {
                    tracing::info!(
                        function = %function,
                        error = %error,
                        "Ledger initialization skipped"
                    );
                    InitLedgerOutcome::Ignored(error.to_string())
                }
            }
        });

        if let Ok(mut slot) = self.init_task.lock() {
            *slot = Some(handle);
        }
    }

    /// Hand over the initialization task started by the last successful
    /// connect, if any.
    pub fn take_init_task(&self) -> Option<JoinHandle<InitLedgerOutcome>> {
        self.init_task.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Drop the contract handle and return to `Disconnected`.
    pub async fn reset(&self) -> Result<(), ProxyError> {
        let mut slot = self.write_slot();
        if let Slot::Connecting = &*slot {
            return Err(ProxyError::Connection(
                "cannot reset a session while it is connecting".to_string(),
            ));
        }
        tracing::info!(from = %slot.state(), "Resetting ledger session");
        *slot = Slot::Disconnected;
        Ok(())
    }
}
