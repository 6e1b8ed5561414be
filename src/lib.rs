// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger Gateway Proxy - HTTP front door for a permissioned ledger contract
//!
//! This crate provisions a service identity with the network's certificate
//! authority, keeps one gateway session bound to a channel and contract, and
//! forwards plain HTTP requests as evaluate/submit transactions.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `ca` - Certificate authority clients (Fabric CA REST, in-process CA)
//! - `gateway` - Ledger gateway bindings (HTTP peer gateway, in-memory ledger)
//! - `identity` - Identities, signing and the enrollment provisioner
//! - `proxy` - Evaluate/submit forwarding guarded by session readiness
//! - `session` - Gateway session lifecycle and ledger initialization
//! - `storage` - Identity wallets (filesystem, in-memory)

pub mod api;
pub mod ca;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod profile;
pub mod proxy;
pub mod session;
pub mod startup;
pub mod state;
pub mod storage;
pub mod telemetry;
