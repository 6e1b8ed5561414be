// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network connection profile.
//!
//! The profile is the JSON document the network operator hands out for an
//! organization: its MSP id, its peers, and its certificate authorities,
//! each with TLS roots. Only the parts the proxy needs are modelled.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

/// Errors loading or resolving a connection profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("cannot read connection profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid connection profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("certificate authority `{0}` is not defined in the profile")]
    MissingCertificateAuthority(String),

    #[error("no organization with MSP id `{0}` in the profile")]
    MissingOrganization(String),

    #[error("organization `{0}` lists no peers")]
    NoPeers(String),

    #[error("peer `{0}` is not defined in the profile")]
    MissingPeer(String),

    #[error("invalid endpoint URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PemList {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TlsCaCerts {
    #[serde(default)]
    pem: Option<PemList>,
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct HttpOptions {
    #[serde(default = "default_verify")]
    verify: bool,
}

fn default_verify() -> bool {
    true
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationEntry {
    mspid: String,
    #[serde(default)]
    peers: Vec<String>,
    #[serde(default)]
    certificate_authorities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PeerEntry {
    url: String,
    #[serde(default, rename = "tlsCACerts")]
    tls_ca_certs: TlsCaCerts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaEntry {
    url: String,
    #[serde(default)]
    ca_name: Option<String>,
    #[serde(default, rename = "tlsCACerts")]
    tls_ca_certs: TlsCaCerts,
    #[serde(default)]
    http_options: HttpOptions,
}

/// Parsed connection profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    organizations: HashMap<String, OrganizationEntry>,
    #[serde(default)]
    peers: HashMap<String, PeerEntry>,
    #[serde(default)]
    certificate_authorities: HashMap<String, CaEntry>,
    /// Directory relative TLS `path` entries resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Where and how to reach a certificate authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaEndpoint {
    pub url: Url,
    /// CA instance name sent as `caname` (servers may host several CAs).
    pub ca_name: Option<String>,
    pub tls_roots: Vec<String>,
    pub verify_tls: bool,
}

impl CaEndpoint {
    /// Endpoint from a bare URL with system TLS roots.
    pub fn from_url(raw: &str) -> Result<Self, ProfileError> {
        Ok(Self {
            url: parse_url(raw)?,
            ca_name: None,
            tls_roots: Vec::new(),
            verify_tls: true,
        })
    }
}

/// Where and how to reach the gateway peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub name: String,
    pub url: Url,
    pub tls_roots: Vec<String>,
}

impl PeerEndpoint {
    pub fn from_url(raw: &str) -> Result<Self, ProfileError> {
        let url = gateway_url(parse_url(raw)?)?;
        Ok(Self {
            name: url.host_str().unwrap_or_default().to_string(),
            url,
            tls_roots: Vec::new(),
        })
    }
}

impl ConnectionProfile {
    /// Load a profile from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profile = Self::from_json(&raw)?;
        profile.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(profile)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Resolve the certificate authority registered under `name`.
    pub fn certificate_authority(&self, name: &str) -> Result<CaEndpoint, ProfileError> {
        let entry = self
            .certificate_authorities
            .get(name)
            .ok_or_else(|| ProfileError::MissingCertificateAuthority(name.to_string()))?;

        Ok(CaEndpoint {
            url: parse_url(&entry.url)?,
            ca_name: entry.ca_name.clone(),
            tls_roots: self.tls_roots(&entry.tls_ca_certs)?,
            verify_tls: entry.http_options.verify,
        })
    }

    /// Resolve the first peer of the organization owning `msp_id`.
    ///
    /// With `as_localhost`, the peer's advertised host name is replaced by
    /// `localhost`, for networks running in local containers whose internal
    /// names do not resolve from the host.
    pub fn gateway_peer(&self, msp_id: &str, as_localhost: bool) -> Result<PeerEndpoint, ProfileError> {
        let (org_name, org) = self
            .organizations
            .iter()
            .find(|(_, org)| org.mspid == msp_id)
            .ok_or_else(|| ProfileError::MissingOrganization(msp_id.to_string()))?;
        let peer_name = org
            .peers
            .first()
            .ok_or_else(|| ProfileError::NoPeers(org_name.clone()))?;
        let peer = self
            .peers
            .get(peer_name)
            .ok_or_else(|| ProfileError::MissingPeer(peer_name.clone()))?;

        let mut url = gateway_url(parse_url(&peer.url)?)?;
        if as_localhost {
            url.set_host(Some("localhost"))
                .map_err(|e| ProfileError::InvalidUrl {
                    url: peer.url.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(PeerEndpoint {
            name: peer_name.clone(),
            url,
            tls_roots: self.tls_roots(&peer.tls_ca_certs)?,
        })
    }

    /// Certificate authorities the organization owning `msp_id` lists.
    pub fn organization_cas(&self, msp_id: &str) -> Vec<String> {
        self.organizations
            .values()
            .find(|org| org.mspid == msp_id)
            .map(|org| org.certificate_authorities.clone())
            .unwrap_or_default()
    }

    fn tls_roots(&self, certs: &TlsCaCerts) -> Result<Vec<String>, ProfileError> {
        let mut roots = match &certs.pem {
            Some(PemList::One(pem)) => vec![pem.clone()],
            Some(PemList::Many(pems)) => pems.clone(),
            None => Vec::new(),
        };
        if let Some(path) = &certs.path {
            let path = self.base_dir.join(path);
            let pem = fs::read_to_string(&path).map_err(|source| ProfileError::Io { path, source })?;
            roots.push(pem);
        }
        Ok(roots)
    }
}

fn parse_url(raw: &str) -> Result<Url, ProfileError> {
    Url::parse(raw).map_err(|e| ProfileError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// Map a peer's gRPC URL onto the HTTP scheme its gateway endpoint uses.
fn gateway_url(url: Url) -> Result<Url, ProfileError> {
    let scheme = match url.scheme() {
        "grpcs" | "https" => "https",
        "grpc" | "http" => "http",
        other => {
            return Err(ProfileError::InvalidUrl {
                url: url.to_string(),
                message: format!("unsupported scheme `{other}`"),
            })
        }
    };
    if url.scheme() == scheme {
        return Ok(url);
    }
    // `Url::set_scheme` refuses grpc -> http, so rebuild from the tail.
    let tail = &url.as_str()[url.scheme().len()..];
    parse_url(&format!("{scheme}{tail}"))
}
