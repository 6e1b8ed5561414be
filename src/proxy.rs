// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Proxy
//!
//! Runs evaluate (read) and submit (write) calls against the session's
//! contract. Arguments are opaque strings handed to the contract as-is; the
//! only local check is that an operation has a name.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ContractPath, ErrorKind, ProxyError};
use crate::gateway::Commit;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Evaluated against one peer, never ordered.
    Query,
    /// Submitted for ordering and committed.
    Invoke,
}

/// A contract call as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub name: String,
    pub args: Vec<String>,
    pub mode: OperationMode,
}

impl OperationRequest {
    pub fn query(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            mode: OperationMode::Query,
        }
    }

    pub fn invoke(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            mode: OperationMode::Invoke,
        }
    }
}

/// Outcome of [`TransactionProxy::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Success(Vec<u8>),
    Failure { kind: ErrorKind, message: String },
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }
}

impl From<Result<Vec<u8>, ProxyError>> for OperationResult {
    fn from(result: Result<Vec<u8>, ProxyError>) -> Self {
        match result {
            Ok(payload) => OperationResult::Success(payload),
            Err(error) => OperationResult::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }
}

fn validate_name(name: &str) -> Result<(), ProxyError> {
    if name.trim().is_empty() {
        return Err(ProxyError::InvalidRequest(
            "operation name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Proxies operations onto the session's contract.
#[derive(Clone)]
pub struct TransactionProxy {
    session: Arc<Session>,
}

impl TransactionProxy {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Read-only call; returns the contract's payload.
    pub async fn evaluate(&self, name: &str, args: &[String]) -> Result<Vec<u8>, ProxyError> {
        let contract = self.session.contract().await?;
        validate_name(name)?;

        tracing::debug!(operation = %name, arity = args.len(), "Evaluating transaction");
        contract
            .evaluate(name, args)
            .await
            .map_err(|e| ProxyError::ContractInvocation {
                path: ContractPath::Evaluate,
                operation: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Ordered write; returns once the transaction is committed.
    pub async fn submit(&self, name: &str, args: &[String]) -> Result<Commit, ProxyError> {
        let contract = self.session.contract().await?;
        validate_name(name)?;

        tracing::debug!(operation = %name, arity = args.len(), "Submitting transaction");
        let commit = contract
            .submit(name, args)
            .await
            .map_err(|e| ProxyError::ContractInvocation {
                path: ContractPath::Submit,
                operation: name.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(
            operation = %name,
            transaction_id = %commit.transaction_id,
            block_number = commit.block_number,
            "Transaction committed"
        );
        Ok(commit)
    }

    /// Dispatch on the request's mode.
    pub async fn execute(&self, request: &OperationRequest) -> OperationResult {
        let result = match request.mode {
            OperationMode::Query => self.evaluate(&request.name, &request.args).await,
            OperationMode::Invoke => self
                .submit(&request.name, &request.args)
                .await
                .map(|commit| commit.payload),
        };
        result.into()
    }
}
