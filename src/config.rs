// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into a [`ProxyConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `CHANNEL_NAME` | Channel the session binds to | `mychannel` |
//! | `CHAINCODE_NAME` | Contract the session binds to | `basic` |
//! | `MSP_ID` | Organization (MSP) of the service identities | `Org1MSP` |
//! | `CA_HOST_NAME` | CA entry in the connection profile | `ca.org1.example.com` |
//! | `CONNECTION_PROFILE` | Path to the JSON connection profile | unset |
//! | `CA_URL` | CA endpoint, overrides the profile | unset |
//! | `GATEWAY_URL` | Gateway endpoint, overrides the profile | unset |
//! | `WALLET_DIR` | Identity store directory | `./wallet` |
//! | `APP_USER_ID` | Application user identity | `appUser` |
//! | `APP_USER_AFFILIATION` | Affiliation of the application user | `org1.department1` |
//! | `CA_ADMIN_ID` | Bootstrap admin enrollment id | `admin` |
//! | `CA_ADMIN_SECRET` | Bootstrap admin enrollment secret | `adminpw` |
//! | `DISCOVERY_AS_LOCALHOST` | Rewrite discovered peer hosts to `localhost` | `true` |
//! | `LEDGER_MODE` | `network` or `memory` | `network` |
//! | `INIT_LEDGER` | Submit `InitLedger` once connected | `true` |
//! | `ERROR_STATUS_POLICY` | `compatible` or `mapped` | `compatible` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS with these PEM files | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::StatusPolicy;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const CHANNEL_NAME_ENV: &str = "CHANNEL_NAME";
pub const CHAINCODE_NAME_ENV: &str = "CHAINCODE_NAME";
pub const MSP_ID_ENV: &str = "MSP_ID";
pub const CA_HOST_NAME_ENV: &str = "CA_HOST_NAME";
pub const CONNECTION_PROFILE_ENV: &str = "CONNECTION_PROFILE";
pub const CA_URL_ENV: &str = "CA_URL";
pub const GATEWAY_URL_ENV: &str = "GATEWAY_URL";

/// Environment variable name for the identity store directory.
///
/// Each identity is written as `<label>.id` inside this directory. The
/// directory is created on first use.
pub const WALLET_DIR_ENV: &str = "WALLET_DIR";

pub const APP_USER_ID_ENV: &str = "APP_USER_ID";
pub const APP_USER_AFFILIATION_ENV: &str = "APP_USER_AFFILIATION";
pub const CA_ADMIN_ID_ENV: &str = "CA_ADMIN_ID";
pub const CA_ADMIN_SECRET_ENV: &str = "CA_ADMIN_SECRET";
pub const DISCOVERY_AS_LOCALHOST_ENV: &str = "DISCOVERY_AS_LOCALHOST";
pub const LEDGER_MODE_ENV: &str = "LEDGER_MODE";
pub const INIT_LEDGER_ENV: &str = "INIT_LEDGER";
pub const ERROR_STATUS_POLICY_ENV: &str = "ERROR_STATUS_POLICY";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CHANNEL: &str = "mychannel";
const DEFAULT_CHAINCODE: &str = "basic";
const DEFAULT_MSP_ID: &str = "Org1MSP";
const DEFAULT_CA_HOST_NAME: &str = "ca.org1.example.com";
const DEFAULT_WALLET_DIR: &str = "./wallet";
const DEFAULT_APP_USER_ID: &str = "appUser";
const DEFAULT_APP_USER_AFFILIATION: &str = "org1.department1";
const DEFAULT_CA_ADMIN_ID: &str = "admin";
const DEFAULT_CA_ADMIN_SECRET: &str = "adminpw";

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Where contract calls are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LedgerMode {
    /// Remote gateway and certificate authority.
    #[default]
    Network,
    /// In-process ledger and development certificate authority.
    Memory,
}

impl FromStr for LedgerMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(LedgerMode::Network),
            "memory" => Ok(LedgerMode::Memory),
            other => Err(format!("unknown ledger mode `{other}`")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// PEM files for serving HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub channel_name: String,
    pub chaincode_name: String,
    pub msp_id: String,
    pub ca_host_name: String,
    pub connection_profile: Option<PathBuf>,
    pub ca_url: Option<String>,
    pub gateway_url: Option<String>,
    pub wallet_dir: PathBuf,
    pub app_user_id: String,
    pub app_user_affiliation: String,
    pub ca_admin_id: String,
    pub ca_admin_secret: String,
    pub discovery_as_localhost: bool,
    pub ledger_mode: LedgerMode,
    pub init_ledger: bool,
    pub status_policy: StatusPolicy,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl ProxyConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let text = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                name: PORT_ENV,
                message: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
        };

        Ok(Self {
            host: text(HOST_ENV, DEFAULT_HOST),
            port,
            channel_name: text(CHANNEL_NAME_ENV, DEFAULT_CHANNEL),
            chaincode_name: text(CHAINCODE_NAME_ENV, DEFAULT_CHAINCODE),
            msp_id: text(MSP_ID_ENV, DEFAULT_MSP_ID),
            ca_host_name: text(CA_HOST_NAME_ENV, DEFAULT_CA_HOST_NAME),
            connection_profile: get(CONNECTION_PROFILE_ENV).map(PathBuf::from),
            ca_url: get(CA_URL_ENV),
            gateway_url: get(GATEWAY_URL_ENV),
            wallet_dir: PathBuf::from(text(WALLET_DIR_ENV, DEFAULT_WALLET_DIR)),
            app_user_id: text(APP_USER_ID_ENV, DEFAULT_APP_USER_ID),
            app_user_affiliation: text(APP_USER_AFFILIATION_ENV, DEFAULT_APP_USER_AFFILIATION),
            ca_admin_id: text(CA_ADMIN_ID_ENV, DEFAULT_CA_ADMIN_ID),
            ca_admin_secret: text(CA_ADMIN_SECRET_ENV, DEFAULT_CA_ADMIN_SECRET),
            discovery_as_localhost: parse_flag(get(DISCOVERY_AS_LOCALHOST_ENV), DISCOVERY_AS_LOCALHOST_ENV, true)?,
            ledger_mode: parse_enum(get(LEDGER_MODE_ENV), LEDGER_MODE_ENV)?,
            init_ledger: parse_flag(get(INIT_LEDGER_ENV), INIT_LEDGER_ENV, true)?,
            status_policy: parse_enum(get(ERROR_STATUS_POLICY_ENV), ERROR_STATUS_POLICY_ENV)?,
            tls,
            log_format: parse_enum(get(LOG_FORMAT_ENV), LOG_FORMAT_ENV)?,
        })
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                name: HOST_ENV,
                message: e.to_string(),
            })
    }
}

fn parse_flag(raw: Option<String>, name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            message: format!("{raw:?} is not a boolean"),
        }),
    }
}

fn parse_enum<T>(raw: Option<String>, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr<Err = String> + Default,
{
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|message| ConfigError::InvalidValue { name, message }),
        None => Ok(T::default()),
    }
}
