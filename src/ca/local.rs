// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process certificate authority for development runs.
//!
//! Issues real X.509 certificates from a throwaway root generated at start,
//! and enforces the same bootstrap-credential and registration rules as the
//! network CA: the bootstrap admin enrolls with fixed credentials, other ids
//! must be registered by an admin first, and an id registers only once.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams, DnType,
    IsCa, KeyPair, KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};

use super::{CaError, CertificateAuthority, Enrollment, EnrollmentRequest, RegistrationRequest};
use crate::identity::Identity;

struct RegisteredId {
    secret: String,
    affiliation: String,
}

/// Self-contained certificate authority.
pub struct LocalAuthority {
    root: Certificate,
    root_key: KeyPair,
    bootstrap_id: String,
    bootstrap_secret: String,
    registry: Mutex<HashMap<String, RegisteredId>>,
}

impl LocalAuthority {
    /// Create an authority with a fresh root named `ca_name`.
    pub fn new(
        ca_name: &str,
        bootstrap_id: impl Into<String>,
        bootstrap_secret: impl Into<String>,
    ) -> Result<Self, CaError> {
        let root_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| CaError::Configuration(e.to_string()))?;
        let mut params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| CaError::Configuration(e.to_string()))?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, ca_name.to_string());
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let root = params
            .self_signed(&root_key)
            .map_err(|e| CaError::Configuration(e.to_string()))?;

        Ok(Self {
            root,
            root_key,
            bootstrap_id: bootstrap_id.into(),
            bootstrap_secret: bootstrap_secret.into(),
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// PEM of the root every issued certificate chains to.
    pub fn root_certificate_pem(&self) -> String {
        self.root.pem()
    }

    /// Affiliation an id was registered under, if registered.
    pub fn affiliation_of(&self, enrollment_id: &str) -> Option<String> {
        self.registry
            .lock()
            .ok()?
            .get(enrollment_id)
            .map(|entry| entry.affiliation.clone())
    }

    fn authenticate(&self, enrollment_id: &str, secret: &str) -> Result<(), CaError> {
        if enrollment_id == self.bootstrap_id && secret == self.bootstrap_secret {
            return Ok(());
        }
        let registry = self
            .registry
            .lock()
            .map_err(|_| CaError::Rejected("registry unavailable".to_string()))?;
        match registry.get(enrollment_id) {
            Some(entry) if entry.secret == secret => Ok(()),
            _ => Err(CaError::Rejected(format!(
                "Authentication failure for '{enrollment_id}'"
            ))),
        }
    }
}

#[async_trait]
impl CertificateAuthority for LocalAuthority {
    async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, CaError> {
        self.authenticate(&request.enrollment_id, &request.secret)?;

        let csr = CertificateSigningRequestParams::from_pem(&request.csr_pem)
            .map_err(|e| CaError::Rejected(format!("invalid certificate request: {e}")))?;
        let certificate = csr
            .signed_by(&self.root, &self.root_key)
            .map_err(|e| CaError::Rejected(format!("cannot issue certificate: {e}")))?;

        tracing::debug!(enrollment_id = %request.enrollment_id, "Local authority issued certificate");
        Ok(Enrollment {
            certificate: certificate.pem(),
        })
    }

    async fn register(
        &self,
        request: RegistrationRequest,
        registrar: &Identity,
    ) -> Result<String, CaError> {
        if !registrar.is_admin() {
            return Err(CaError::Rejected(format!(
                "'{}' is not authorized to register identities",
                registrar.label
            )));
        }

        let mut registry = self
            .registry
            .lock()
            .map_err(|_| CaError::Rejected("registry unavailable".to_string()))?;
        if request.enrollment_id == self.bootstrap_id
            || registry.contains_key(&request.enrollment_id)
        {
            return Err(CaError::Rejected(format!(
                "Identity '{}' is already registered",
                request.enrollment_id
            )));
        }

        let secret = uuid::Uuid::new_v4().simple().to_string();
        registry.insert(
            request.enrollment_id.clone(),
            RegisteredId {
                secret: secret.clone(),
                affiliation: request.affiliation,
            },
        );
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{generate_enrollment_key, Credentials, Role};

    fn authority() -> LocalAuthority {
        LocalAuthority::new("ca.org1.example.com", "admin", "adminpw").unwrap()
    }

    fn enroll_request(id: &str, secret: &str) -> EnrollmentRequest {
        EnrollmentRequest {
            enrollment_id: id.into(),
            secret: secret.into(),
            csr_pem: generate_enrollment_key(id).unwrap().csr_pem,
        }
    }

    fn identity(label: &str, role: Role) -> Identity {
        Identity {
            label: label.into(),
            role,
            credentials: Credentials {
                certificate: String::new(),
                private_key: String::new(),
            },
            affiliation: None,
            msp_id: "Org1MSP".into(),
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_enrolls_with_fixed_credentials() {
        let ca = authority();
        let enrollment = ca.enroll(enroll_request("admin", "adminpw")).await.unwrap();
        assert!(enrollment.certificate.contains("-----BEGIN CERTIFICATE-----"));
        assert!(ca.root_certificate_pem().contains("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let ca = authority();
        assert!(matches!(
            ca.enroll(enroll_request("admin", "nope")).await,
            Err(CaError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn registered_user_enrolls_with_issued_secret() {
        let ca = authority();
        let secret = ca
            .register(
                RegistrationRequest::client("appUser", "org1.department1"),
                &identity("admin", Role::Admin),
            )
            .await
            .unwrap();

        assert_eq!(ca.affiliation_of("appUser").as_deref(), Some("org1.department1"));
        ca.enroll(enroll_request("appUser", &secret))
            .await
            .expect("enroll registered user");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let ca = authority();
        let admin = identity("admin", Role::Admin);
        ca.register(RegistrationRequest::client("appUser", "org1"), &admin)
            .await
            .unwrap();

        let err = ca
            .register(RegistrationRequest::client("appUser", "org1"), &admin)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn only_admins_may_register() {
        let ca = authority();
        let result = ca
            .register(
                RegistrationRequest::client("other", "org1"),
                &identity("appUser", Role::ApplicationUser),
            )
            .await;
        assert!(matches!(result, Err(CaError::Rejected(_))));
    }
}
