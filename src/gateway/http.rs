// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-over-HTTP binding to a gateway peer.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | channel lookup | `GET /api/v1/channels/{channel}` | 2xx / 404 |
//! | contract lookup | `GET /api/v1/channels/{channel}/contracts/{contract}` | 2xx / 404 |
//! | evaluate | `POST .../contracts/{contract}/evaluate` `{"function","args"}` | raw payload |
//! | submit | `POST .../contracts/{contract}/submit` `{"function","args"}` | `{"transactionId","status","blockNumber","result"}` |
//!
//! Every request carries the caller's MSP id in `X-Msp-Id` and an
//! `Authorization` token signed with the identity's key.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Commit, Connection, Contract, GatewayError, LedgerGateway, Network, VALID_STATUS};
use crate::identity::{Identity, IdentitySigner};
use crate::profile::PeerEndpoint;

pub const MSP_ID_HEADER: &str = "x-msp-id";

#[derive(Serialize)]
struct InvocationBody<'a> {
    function: &'a str,
    args: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    transaction_id: String,
    status: String,
    #[serde(default)]
    block_number: u64,
    #[serde(default)]
    result: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// Gateway reached over HTTP(S).
pub struct HttpGateway {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(endpoint: &PeerEndpoint) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        for pem in &endpoint.tls_roots {
            let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| GatewayError::Configuration(format!("invalid TLS root: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url: endpoint.url.clone(),
            client,
        })
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn connect(&self, identity: &Identity) -> Result<Arc<dyn Connection>, GatewayError> {
        let signer = IdentitySigner::from_identity(identity).map_err(|e| {
            GatewayError::Unauthorized {
                label: identity.label.clone(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!(url = %self.base_url, label = %identity.label, "Opening gateway connection");
        Ok(Arc::new(HttpConnection {
            shared: Arc::new(Shared {
                base_url: self.base_url.clone(),
                client: self.client.clone(),
                signer,
                label: identity.label.clone(),
                msp_id: identity.msp_id.clone(),
            }),
        }))
    }
}

struct Shared {
    base_url: Url,
    client: reqwest::Client,
    signer: IdentitySigner,
    label: String,
    msp_id: String,
}

impl Shared {
    fn url_for(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Configuration(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Vec<u8>), GatewayError> {
        let token = self
            .signer
            .authorization_token(method.as_str(), url.path(), &body)
            .map_err(|e| GatewayError::Signing(e.to_string()))?;

        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, token)
            .header(MSP_ID_HEADER, &self.msp_id);
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized {
                label: self.label.clone(),
                message: error_message(status, &bytes),
            });
        }
        Ok((status, bytes.to_vec()))
    }

    async fn invoke(
        &self,
        channel: &str,
        contract: &str,
        action: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.url_for(&["api", "v1", "channels", channel, "contracts", contract, action])?;
        let body = serde_json::to_vec(&InvocationBody { function, args })
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let (status, bytes) = self.send(Method::POST, url, body).await?;
        if !status.is_success() {
            return Err(GatewayError::Chaincode(error_message(status, &bytes)));
        }
        Ok(bytes)
    }
}

/// Error text from a JSON `{"error"}` body, falling back to the raw body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        text.to_string()
    }
}

struct HttpConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connection for HttpConnection {
    async fn network(&self, channel: &str) -> Result<Arc<dyn Network>, GatewayError> {
        let url = self.shared.url_for(&["api", "v1", "channels", channel])?;
        let (status, bytes) = self.shared.send(Method::GET, url, Vec::new()).await?;
        match status {
            s if s.is_success() => Ok(Arc::new(HttpNetwork {
                shared: self.shared.clone(),
                channel: channel.to_string(),
            })),
            StatusCode::NOT_FOUND => Err(GatewayError::ChannelNotFound(channel.to_string())),
            s => Err(GatewayError::InvalidResponse(error_message(s, &bytes))),
        }
    }
}

struct HttpNetwork {
    shared: Arc<Shared>,
    channel: String,
}

#[async_trait]
impl Network for HttpNetwork {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn contract(&self, name: &str) -> Result<Arc<dyn Contract>, GatewayError> {
        let url = self
            .shared
            .url_for(&["api", "v1", "channels", &self.channel, "contracts", name])?;
        let (status, bytes) = self.shared.send(Method::GET, url, Vec::new()).await?;
        match status {
            s if s.is_success() => Ok(Arc::new(HttpContract {
                shared: self.shared.clone(),
                channel: self.channel.clone(),
                name: name.to_string(),
            })),
            StatusCode::NOT_FOUND => Err(GatewayError::ContractNotFound {
                channel: self.channel.clone(),
                contract: name.to_string(),
            }),
            s => Err(GatewayError::InvalidResponse(error_message(s, &bytes))),
        }
    }
}

struct HttpContract {
    shared: Arc<Shared>,
    channel: String,
    name: String,
}

#[async_trait]
impl Contract for HttpContract {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        self.shared
            .invoke(&self.channel, &self.name, "evaluate", function, args)
            .await
    }

    async fn submit(&self, function: &str, args: &[String]) -> Result<Commit, GatewayError> {
        let bytes = self
            .shared
            .invoke(&self.channel, &self.name, "submit", function, args)
            .await?;
        let response: SubmitResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if response.status != VALID_STATUS {
            return Err(GatewayError::CommitFailed {
                transaction_id: response.transaction_id,
                status: response.status,
            });
        }
        Ok(Commit {
            transaction_id: response.transaction_id,
            block_number: response.block_number,
            payload: response.result.into_bytes(),
        })
    }
}
