// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provisioning against the certificate authority.
//!
//! Both operations are idempotent: when the identity store already holds the
//! requested label, the certificate authority is not contacted at all.

use std::sync::Arc;

use super::{generate_enrollment_key, Credentials, Identity, Role};
use crate::ca::{CaError, CertificateAuthority, EnrollmentRequest, RegistrationRequest};
use crate::error::ProxyError;
use crate::storage::IdentityStore;

/// Store label of an organization's registrar identity.
pub const ADMIN_LABEL: &str = "admin";

/// Organization the provisioner enrolls identities for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgEnrollment {
    pub msp_id: String,
    pub admin_label: String,
    /// Bootstrap registrar credentials configured on the CA.
    pub bootstrap_id: String,
    pub bootstrap_secret: String,
}

impl OrgEnrollment {
    pub fn new(
        msp_id: impl Into<String>,
        bootstrap_id: impl Into<String>,
        bootstrap_secret: impl Into<String>,
    ) -> Self {
        Self {
            msp_id: msp_id.into(),
            admin_label: ADMIN_LABEL.to_string(),
            bootstrap_id: bootstrap_id.into(),
            bootstrap_secret: bootstrap_secret.into(),
        }
    }
}

/// Enrolls and persists the organization admin and application users.
pub struct IdentityProvisioner {
    ca: Arc<dyn CertificateAuthority>,
    store: Arc<dyn IdentityStore>,
    org: OrgEnrollment,
}

impl IdentityProvisioner {
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        store: Arc<dyn IdentityStore>,
        org: OrgEnrollment,
    ) -> Self {
        Self { ca, store, org }
    }

    /// Make sure the organization admin is in the store.
    ///
    /// Enrolls with the bootstrap credentials on first use only.
    pub async fn ensure_admin(&self) -> Result<Identity, ProxyError> {
        let label = &self.org.admin_label;
        if let Some(existing) = self.load(label)? {
            tracing::info!(label = %label, msp_id = %self.org.msp_id, "Admin identity already present in store");
            return Ok(existing);
        }

        tracing::info!(label = %label, msp_id = %self.org.msp_id, "Enrolling admin identity");
        let credentials = self
            .enroll(&self.org.bootstrap_id, &self.org.bootstrap_secret)
            .await?;

        let identity = Identity {
            label: label.clone(),
            role: Role::Admin,
            credentials,
            affiliation: None,
            msp_id: self.org.msp_id.clone(),
        };
        self.persist(&identity)?;

        tracing::info!(label = %label, "Admin identity enrolled and stored");
        Ok(identity)
    }

    /// Make sure `user_id` is in the store, registering it under the admin.
    ///
    /// The admin identity must already be stored; otherwise registration is
    /// refused rather than silently bootstrapping the admin.
    pub async fn enroll_user(
        &self,
        user_id: &str,
        affiliation: &str,
    ) -> Result<Identity, ProxyError> {
        if user_id.trim().is_empty() {
            return Err(ProxyError::Registration {
                user_id: user_id.to_string(),
                message: "user id must not be empty".to_string(),
            });
        }

        if let Some(existing) = self.load(user_id)? {
            tracing::info!(user_id = %user_id, "User identity already present in store");
            return Ok(existing);
        }

        let admin = self
            .load(&self.org.admin_label)?
            .ok_or_else(|| ProxyError::Registration {
                user_id: user_id.to_string(),
                message: format!(
                    "admin identity '{}' must be enrolled before registering users",
                    self.org.admin_label
                ),
            })?;

        tracing::info!(user_id = %user_id, affiliation = %affiliation, "Registering user identity");
        let secret = self
            .ca
            .register(RegistrationRequest::client(user_id, affiliation), &admin)
            .await
            .map_err(|e| ProxyError::Registration {
                user_id: user_id.to_string(),
                message: e.to_string(),
            })?;

        let credentials = self.enroll(user_id, &secret).await?;
        let identity = Identity {
            label: user_id.to_string(),
            role: Role::ApplicationUser,
            credentials,
            affiliation: Some(affiliation.to_string()),
            msp_id: self.org.msp_id.clone(),
        };
        self.persist(&identity)?;

        tracing::info!(user_id = %user_id, "User identity enrolled and stored");
        Ok(identity)
    }

    async fn enroll(&self, enrollment_id: &str, secret: &str) -> Result<Credentials, ProxyError> {
        let enrollment_error = |message: String| ProxyError::Enrollment {
            enrollment_id: enrollment_id.to_string(),
            message,
        };

        let key = generate_enrollment_key(enrollment_id)
            .map_err(|e| enrollment_error(e.to_string()))?;
        let enrollment = self
            .ca
            .enroll(EnrollmentRequest {
                enrollment_id: enrollment_id.to_string(),
                secret: secret.to_string(),
                csr_pem: key.csr_pem,
            })
            .await
            .map_err(|e: CaError| enrollment_error(e.to_string()))?;

        Ok(Credentials {
            certificate: enrollment.certificate,
            private_key: key.private_key_pem,
        })
    }

    fn load(&self, label: &str) -> Result<Option<Identity>, ProxyError> {
        self.store
            .get(label)
            .map_err(|e| ProxyError::Persistence(e.to_string()))
    }

    fn persist(&self, identity: &Identity) -> Result<(), ProxyError> {
        self.store.put(identity).map_err(|e| {
            tracing::error!(label = %identity.label, error = %e, "Failed to store identity");
            ProxyError::Persistence(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{Enrollment, LocalAuthority};
    use crate::storage::{FileWallet, InMemoryWallet, WalletPaths};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Certificate authority wrapper counting every call.
    struct CountingCa {
        inner: LocalAuthority,
        enrolls: AtomicUsize,
        registrations: AtomicUsize,
    }

    impl CountingCa {
        fn new() -> Self {
            Self {
                inner: LocalAuthority::new("ca.org1.example.com", "admin", "adminpw").unwrap(),
                enrolls: AtomicUsize::new(0),
                registrations: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.enrolls.load(Ordering::SeqCst) + self.registrations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CertificateAuthority for CountingCa {
        async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, CaError> {
            self.enrolls.fetch_add(1, Ordering::SeqCst);
            self.inner.enroll(request).await
        }

        async fn register(
            &self,
            request: RegistrationRequest,
            registrar: &Identity,
        ) -> Result<String, CaError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.inner.register(request, registrar).await
        }
    }

    struct UnreachableCa;

    #[async_trait]
    impl CertificateAuthority for UnreachableCa {
        async fn enroll(&self, _: EnrollmentRequest) -> Result<Enrollment, CaError> {
            Err(CaError::Unreachable("connection refused".into()))
        }

        async fn register(&self, _: RegistrationRequest, _: &Identity) -> Result<String, CaError> {
            Err(CaError::Unreachable("connection refused".into()))
        }
    }

    fn org() -> OrgEnrollment {
        OrgEnrollment::new("Org1MSP", "admin", "adminpw")
    }

    fn file_setup() -> (TempDir, Arc<CountingCa>, Arc<FileWallet>, IdentityProvisioner) {
        let dir = TempDir::new().unwrap();
        let wallet = Arc::new(FileWallet::open(WalletPaths::new(dir.path()), ADMIN_LABEL).unwrap());
        let ca = Arc::new(CountingCa::new());
        let provisioner = IdentityProvisioner::new(ca.clone(), wallet.clone(), org());
        (dir, ca, wallet, provisioner)
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let (_dir, ca, wallet, provisioner) = file_setup();

        let first = provisioner.ensure_admin().await.unwrap();
        let stored_first = wallet.get(ADMIN_LABEL).unwrap().unwrap();
        let calls_after_first = ca.calls();
        assert_eq!(calls_after_first, 1);

        let second = provisioner.ensure_admin().await.unwrap();
        let stored_second = wallet.get(ADMIN_LABEL).unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(stored_first, stored_second);
        assert_eq!(ca.calls(), calls_after_first);
        assert_eq!(stored_second.role, Role::Admin);
        assert_eq!(stored_second.msp_id, "Org1MSP");
    }

    #[tokio::test]
    async fn enroll_user_is_idempotent_per_user() {
        let (_dir, ca, wallet, provisioner) = file_setup();
        provisioner.ensure_admin().await.unwrap();

        let user = provisioner
            .enroll_user("appUser", "org1.department1")
            .await
            .unwrap();
        assert_eq!(user.role, Role::ApplicationUser);
        assert_eq!(user.affiliation.as_deref(), Some("org1.department1"));
        assert_eq!(ca.registrations.load(Ordering::SeqCst), 1);
        let calls = ca.calls();

        let again = provisioner
            .enroll_user("appUser", "org1.department1")
            .await
            .unwrap();
        assert_eq!(user, again);
        assert_eq!(ca.calls(), calls);
        assert_eq!(wallet.list().unwrap(), vec!["admin", "appUser"]);
    }

    #[tokio::test]
    async fn user_enrollment_requires_stored_admin() {
        let (_dir, ca, wallet, provisioner) = file_setup();

        let err = provisioner
            .enroll_user("appUser", "org1.department1")
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Registration { .. }));
        assert_eq!(ca.calls(), 0);
        assert!(!wallet.exists("appUser").unwrap());
    }

    #[tokio::test]
    async fn unreachable_ca_fails_admin_enrollment() {
        let store = Arc::new(InMemoryWallet::new());
        let provisioner = IdentityProvisioner::new(Arc::new(UnreachableCa), store.clone(), org());

        let err = provisioner.ensure_admin().await.unwrap_err();
        assert!(matches!(err, ProxyError::Enrollment { ref enrollment_id, .. } if enrollment_id == "admin"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rejected_bootstrap_credentials_fail_enrollment() {
        let store = Arc::new(InMemoryWallet::new());
        let ca = Arc::new(CountingCa::new());
        let provisioner = IdentityProvisioner::new(
            ca,
            store.clone(),
            OrgEnrollment::new("Org1MSP", "admin", "wrong"),
        );

        assert!(matches!(
            provisioner.ensure_admin().await,
            Err(ProxyError::Enrollment { .. })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_surfaces_registration_error() {
        let ca = Arc::new(CountingCa::new());
        let store = Arc::new(InMemoryWallet::new());
        let provisioner = IdentityProvisioner::new(ca.clone(), store.clone(), org());
        let admin = provisioner.ensure_admin().await.unwrap();

        // Another process registered the id but never stored an identity.
        ca.inner
            .register(RegistrationRequest::client("appUser", "org1"), &admin)
            .await
            .unwrap();

        let err = provisioner.enroll_user("appUser", "org1").await.unwrap_err();
        match err {
            ProxyError::Registration { user_id, message } => {
                assert_eq!(user_id, "appUser");
                assert!(message.contains("already registered"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_write_failure_is_a_persistence_error() {
        let ca = Arc::new(CountingCa::new());
        let store = Arc::new(InMemoryWallet::new());
        let provisioner = IdentityProvisioner::new(ca, store.clone(), org());
        provisioner.ensure_admin().await.unwrap();

        store.fail_writes(true);
        let err = provisioner.enroll_user("appUser", "org1").await.unwrap_err();

        assert!(matches!(err, ProxyError::Persistence(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn empty_user_id_is_refused() {
        let store = Arc::new(InMemoryWallet::new());
        let provisioner = IdentityProvisioner::new(Arc::new(CountingCa::new()), store, org());
        assert!(matches!(
            provisioner.enroll_user("  ", "org1").await,
            Err(ProxyError::Registration { .. })
        ));
    }
}
