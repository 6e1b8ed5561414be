// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate authority integration.
//!
//! This module provides:
//! - The [`CertificateAuthority`] seam the identity provisioner talks to
//! - An HTTP client for the CA's REST enrollment protocol
//! - A self-contained development authority for in-memory runs

pub mod client;
pub mod local;

use async_trait::async_trait;

pub use client::FabricCaClient;
pub use local::LocalAuthority;

use crate::identity::Identity;

/// Attribute type the proxy registers application users with.
pub const CLIENT_IDENTITY_TYPE: &str = "client";

/// Enrollment of a key against an enrollment id and secret.
#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    pub enrollment_id: String,
    pub secret: String,
    /// PEM certificate signing request for the key being enrolled.
    pub csr_pem: String,
}

/// Certificate issued by a successful enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub certificate: String,
}

/// Registration of a new enrollment id under a registrar's authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub enrollment_id: String,
    pub affiliation: String,
    pub identity_type: String,
}

impl RegistrationRequest {
    pub fn client(enrollment_id: impl Into<String>, affiliation: impl Into<String>) -> Self {
        Self {
            enrollment_id: enrollment_id.into(),
            affiliation: affiliation.into(),
            identity_type: CLIENT_IDENTITY_TYPE.to_string(),
        }
    }
}

/// Errors returned by a certificate authority.
#[derive(Debug, thiserror::Error)]
pub enum CaError {
    #[error("certificate authority unreachable: {0}")]
    Unreachable(String),

    #[error("certificate authority rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected certificate authority response: {0}")]
    InvalidResponse(String),

    #[error("cannot sign request: {0}")]
    Signing(String),

    #[error("invalid certificate authority configuration: {0}")]
    Configuration(String),
}

/// Enrollment and registration protocol of the network's CA.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Exchange an enrollment id/secret and a CSR for a certificate.
    async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, CaError>;

    /// Register a new enrollment id; returns the enrollment secret.
    async fn register(
        &self,
        request: RegistrationRequest,
        registrar: &Identity,
    ) -> Result<String, CaError>;
}
