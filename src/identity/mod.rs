// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service identities used to talk to the certificate authority and the
//! ledger gateway.
//!
//! An [`Identity`] is created once by the [`IdentityProvisioner`], written to
//! the identity store, and never mutated afterwards.

pub mod provisioner;
pub mod signing;

use serde::{Deserialize, Serialize};

pub use provisioner::{IdentityProvisioner, OrgEnrollment};
pub use signing::{generate_enrollment_key, EnrollmentKey, IdentitySigner, SigningError};

/// What an identity is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Organization registrar, used only to register application users.
    Admin,
    /// Identity the gateway session connects with.
    ApplicationUser,
}

/// X.509 certificate and its private key, both PEM encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub certificate: String,
    pub private_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// An enrolled identity as held in the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Store key; the enrollment id for users, `admin` for the registrar.
    pub label: String,
    pub role: Role,
    pub credentials: Credentials,
    /// Affiliation the identity was registered under (users only).
    pub affiliation: Option<String>,
    /// Owning organization.
    pub msp_id: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_private_key() {
        let credentials = Credentials {
            certificate: "CERT".into(),
            private_key: "SECRET-KEY".into(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("CERT"));
        assert!(!rendered.contains("SECRET-KEY"));
    }

    #[test]
    fn role_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Role::ApplicationUser).unwrap(),
            r#""application-user""#
        );
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
    }
}
