// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger network gateway.
//!
//! A [`LedgerGateway`] opens a connection for an identity; the connection
//! resolves a channel ([`Network`]) and the channel resolves a deployed
//! [`Contract`]. Two bindings exist:
//!
//! - [`HttpGateway`]: JSON over HTTP(S) to a gateway peer, requests signed
//!   with the connecting identity's key
//! - [`MemoryLedger`]: an in-process ledger hosting the car registry, for
//!   local development and tests

pub mod chaincode;
pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use http::HttpGateway;
pub use memory::MemoryLedger;

use crate::identity::Identity;

/// Transaction validation code of a committed transaction.
pub const VALID_STATUS: &str = "VALID";

/// Commit acknowledgment of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub transaction_id: String,
    pub block_number: u64,
    /// Value returned by the transaction function.
    pub payload: Vec<u8>,
}

/// Errors from the gateway and the contracts behind it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("gateway refused identity '{label}': {message}")]
    Unauthorized { label: String, message: String },

    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("contract '{contract}' not found on channel '{channel}'")]
    ContractNotFound { channel: String, contract: String },

    /// The transaction function itself returned an error.
    #[error("{0}")]
    Chaincode(String),

    #[error("transaction {transaction_id} failed to commit with status {status}")]
    CommitFailed {
        transaction_id: String,
        status: String,
    },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("cannot sign gateway request: {0}")]
    Signing(String),

    #[error("invalid gateway configuration: {0}")]
    Configuration(String),
}

/// Entry point to a ledger network.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Open a connection authenticated as `identity`.
    async fn connect(&self, identity: &Identity) -> Result<Arc<dyn Connection>, GatewayError>;
}

/// An open connection to the network.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn network(&self, channel: &str) -> Result<Arc<dyn Network>, GatewayError>;
}

/// A channel reachable through a connection.
#[async_trait]
pub trait Network: Send + Sync {
    fn channel(&self) -> &str;

    async fn contract(&self, name: &str) -> Result<Arc<dyn Contract>, GatewayError>;
}

/// A deployed contract.
#[async_trait]
pub trait Contract: Send + Sync {
    fn name(&self) -> &str;

    /// Run a transaction function against one peer's current state without
    /// ordering. Nothing is written.
    async fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError>;

    /// Run a transaction function through ordering and wait for its commit.
    async fn submit(&self, function: &str, args: &[String]) -> Result<Commit, GatewayError>;
}
