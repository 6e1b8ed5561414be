// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Startup Task
//!
//! Provisions the service identities and connects the session, exactly once
//! per process. The HTTP server is already listening while this runs; a
//! failure here is logged and leaves the session `Failed`, it never stops
//! the server.
//!
//! | Ledger mode | Certificate authority | Gateway | Identity store |
//! |-------------|-----------------------|---------|----------------|
//! | `network` | [`FabricCaClient`] | [`HttpGateway`] | [`FileWallet`] at `WALLET_DIR` |
//! | `memory` | [`LocalAuthority`] | [`MemoryLedger`] | [`InMemoryWallet`] |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ca::{CaError, CertificateAuthority, FabricCaClient, LocalAuthority};
use crate::config::{LedgerMode, ProxyConfig, CA_URL_ENV, CONNECTION_PROFILE_ENV, GATEWAY_URL_ENV};
use crate::error::ProxyError;
use crate::gateway::chaincode::INIT_LEDGER;
use crate::gateway::{GatewayError, HttpGateway, LedgerGateway, MemoryLedger};
use crate::identity::provisioner::ADMIN_LABEL;
use crate::identity::{IdentityProvisioner, OrgEnrollment};
use crate::profile::{CaEndpoint, ConnectionProfile, PeerEndpoint, ProfileError};
use crate::session::{Session, SessionConfig};
use crate::storage::{FileWallet, IdentityStore, InMemoryWallet, StorageError, WalletPaths};

/// Errors building the startup collaborators from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    CertificateAuthority(#[from] CaError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("identity store: {0}")]
    Storage(#[from] StorageError),

    #[error("neither {0} nor {env} is set", env = CONNECTION_PROFILE_ENV)]
    MissingEndpoint(&'static str),
}

/// Session binding derived from configuration.
pub fn session_config(config: &ProxyConfig) -> SessionConfig {
    SessionConfig {
        channel: config.channel_name.clone(),
        contract: config.chaincode_name.clone(),
        init_function: config.init_ledger.then(|| INIT_LEDGER.to_string()),
    }
}

/// The one-shot provisioning and connection task.
pub struct Startup {
    provisioner: IdentityProvisioner,
    gateway: Arc<dyn LedgerGateway>,
    session: Arc<Session>,
    user_id: String,
    affiliation: String,
}

impl Startup {
    pub fn new(
        provisioner: IdentityProvisioner,
        gateway: Arc<dyn LedgerGateway>,
        session: Arc<Session>,
        user_id: impl Into<String>,
        affiliation: impl Into<String>,
    ) -> Self {
        Self {
            provisioner,
            gateway,
            session,
            user_id: user_id.into(),
            affiliation: affiliation.into(),
        }
    }

    /// Wire up the collaborators selected by `config`.
    pub fn from_config(config: &ProxyConfig, session: Arc<Session>) -> Result<Self, StartupError> {
        let org = OrgEnrollment::new(
            config.msp_id.clone(),
            config.ca_admin_id.clone(),
            config.ca_admin_secret.clone(),
        );

        let (ca, gateway, store): (
            Arc<dyn CertificateAuthority>,
            Arc<dyn LedgerGateway>,
            Arc<dyn IdentityStore>,
        ) = match config.ledger_mode {
            LedgerMode::Memory => {
                tracing::info!(channel = %config.channel_name, contract = %config.chaincode_name, "Using in-process ledger");
                let ca: Arc<dyn CertificateAuthority> = Arc::new(LocalAuthority::new(
                    &config.ca_host_name,
                    config.ca_admin_id.clone(),
                    config.ca_admin_secret.clone(),
                )?);
                let gateway: Arc<dyn LedgerGateway> = Arc::new(MemoryLedger::new(
                    config.channel_name.clone(),
                    config.chaincode_name.clone(),
                ));
                let store: Arc<dyn IdentityStore> = Arc::new(InMemoryWallet::new());
                (ca, gateway, store)
            }
            LedgerMode::Network => {
                let profile = config
                    .connection_profile
                    .as_ref()
                    .map(ConnectionProfile::load)
                    .transpose()?;
                let ca_endpoint = ca_endpoint(config, profile.as_ref())?;
                let peer = peer_endpoint(config, profile.as_ref())?;
                tracing::info!(ca = %ca_endpoint.url, gateway = %peer.url, wallet = %config.wallet_dir.display(), "Using network ledger");

                let ca: Arc<dyn CertificateAuthority> = Arc::new(FabricCaClient::new(&ca_endpoint)?);
                let gateway: Arc<dyn LedgerGateway> = Arc::new(HttpGateway::new(&peer)?);
                let store: Arc<dyn IdentityStore> = Arc::new(FileWallet::open(
                    WalletPaths::new(&config.wallet_dir),
                    ADMIN_LABEL,
                )?);
                (ca, gateway, store)
            }
        };

        Ok(Self::new(
            IdentityProvisioner::new(ca, store, org),
            gateway,
            session,
            config.app_user_id.clone(),
            config.app_user_affiliation.clone(),
        ))
    }

    /// Provision identities, then connect the session.
    ///
    /// Returns early without touching the session further when `shutdown`
    /// fires first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ProxyError> {
        tracing::info!(user_id = %self.user_id, "Startup task running");

        let provisioner = &self.provisioner;
        let user_id = self.user_id.as_str();
        let affiliation = self.affiliation.as_str();
        let identity = async move {
            provisioner.ensure_admin().await?;
            provisioner.enroll_user(user_id, affiliation).await
        };

        tokio::select! {
            result = self.session.connect_with(self.gateway.as_ref(), identity) => {
                if let Err(error) = &result {
                    tracing::error!(error = %error, "Startup failed; serving without a ledger session");
                }
                result
            }
            _ = shutdown.cancelled() => {
                tracing::info!("Startup task cancelled");
                Ok(())
            }
        }
    }
}

fn ca_endpoint(
    config: &ProxyConfig,
    profile: Option<&ConnectionProfile>,
) -> Result<CaEndpoint, StartupError> {
    match (&config.ca_url, profile) {
        (Some(url), _) => Ok(CaEndpoint::from_url(url)?),
        (None, Some(profile)) => Ok(profile.certificate_authority(&config.ca_host_name)?),
        (None, None) => Err(StartupError::MissingEndpoint(CA_URL_ENV)),
    }
}

fn peer_endpoint(
    config: &ProxyConfig,
    profile: Option<&ConnectionProfile>,
) -> Result<PeerEndpoint, StartupError> {
    match (&config.gateway_url, profile) {
        (Some(url), _) => Ok(PeerEndpoint::from_url(url)?),
        (None, Some(profile)) => {
            Ok(profile.gateway_peer(&config.msp_id, config.discovery_as_localhost)?)
        }
        (None, None) => Err(StartupError::MissingEndpoint(GATEWAY_URL_ENV)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{INIT_LEDGER_ENV, LEDGER_MODE_ENV, WALLET_DIR_ENV};
    use crate::session::{InitLedgerOutcome, SessionState};
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ProxyConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProxyConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn memory_mode_reaches_ready_and_initializes() {
        let config = config_from(&[(LEDGER_MODE_ENV, "memory")]);
        let session = Arc::new(Session::new(session_config(&config)));

        Startup::from_config(&config, session.clone())
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.state().await, SessionState::Ready);
        assert_eq!(session.snapshot().await.identity.as_deref(), Some("appUser"));
        let outcome = session.take_init_task().unwrap().await.unwrap();
        assert!(matches!(outcome, InitLedgerOutcome::Initialized { .. }));
    }

    #[tokio::test]
    async fn init_ledger_can_be_disabled() {
        let config = config_from(&[(LEDGER_MODE_ENV, "memory"), (INIT_LEDGER_ENV, "false")]);
        let session = Arc::new(Session::new(session_config(&config)));

        Startup::from_config(&config, session.clone())
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.state().await, SessionState::Ready);
        assert!(session.take_init_task().is_none());
    }

    #[tokio::test]
    async fn unreachable_ca_leaves_session_failed() {
        let wallet = tempfile::TempDir::new().unwrap();
        let ca_url = closed_port_url();
        let gateway_url = closed_port_url();
        let config = config_from(&[
            (CA_URL_ENV, ca_url.as_str()),
            (GATEWAY_URL_ENV, gateway_url.as_str()),
            (WALLET_DIR_ENV, wallet.path().to_str().unwrap()),
        ]);
        let session = Arc::new(Session::new(session_config(&config)));

        let err = Startup::from_config(&config, session.clone())
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Enrollment { .. }));
        assert_eq!(session.state().await, SessionState::Failed);
        assert!(session
            .snapshot()
            .await
            .last_error
            .unwrap()
            .contains("unreachable"));
    }

    #[test]
    fn network_mode_needs_endpoints() {
        let config = config_from(&[]);
        let session = Arc::new(Session::new(session_config(&config)));

        match Startup::from_config(&config, session) {
            Err(error @ StartupError::MissingEndpoint(CA_URL_ENV)) => assert_eq!(
                error.to_string(),
                "neither CA_URL nor CONNECTION_PROFILE is set"
            ),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("startup built without endpoints"),
        }
    }

    struct StalledCa;

    #[async_trait::async_trait]
    impl CertificateAuthority for StalledCa {
        async fn enroll(
            &self,
            _request: crate::ca::EnrollmentRequest,
        ) -> Result<crate::ca::Enrollment, CaError> {
            std::future::pending().await
        }

        async fn register(
            &self,
            _request: crate::ca::RegistrationRequest,
            _registrar: &crate::identity::Identity,
        ) -> Result<String, CaError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_during_provisioning_leaves_session_retryable() {
        let config = config_from(&[(LEDGER_MODE_ENV, "memory")]);
        let session = Arc::new(Session::new(session_config(&config)));
        let ledger = MemoryLedger::new(config.channel_name.clone(), config.chaincode_name.clone());
        let startup = Startup::new(
            IdentityProvisioner::new(
                Arc::new(StalledCa),
                Arc::new(InMemoryWallet::new()),
                OrgEnrollment::new("Org1MSP", "admin", "adminpw"),
            ),
            Arc::new(ledger.clone()),
            session.clone(),
            "appUser",
            "org1.department1",
        );

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(startup.run(shutdown.clone()));
        while session.state().await != SessionState::Connecting {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(session.state().await, SessionState::Failed);
        assert_eq!(ledger.connection_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_startup_returns_quietly() {
        let config = config_from(&[(LEDGER_MODE_ENV, "memory")]);
        let session = Arc::new(Session::new(session_config(&config)));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = Startup::from_config(&config, session.clone())
            .unwrap()
            .run(shutdown)
            .await;
        assert!(result.is_ok());
    }
}
