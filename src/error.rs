// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Taxonomy and Translation
//!
//! Every failure the proxy can produce is expressed as a [`ProxyError`].
//! Subsystem errors (`CaError`, `GatewayError`, `StorageError`) are folded
//! into this taxonomy at component boundaries, and the [`ErrorTranslator`]
//! renders it as plain text at the HTTP boundary so that no failure ever
//! unwinds into the server runtime.
//!
//! ## Status policy
//!
//! | Policy | Behaviour |
//! |--------|-----------|
//! | `compatible` | every failure answers `200 OK` with a text diagnostic |
//! | `mapped` | retriable → 503, contract → 502, bad input → 400, other → 500 |

use std::fmt;
use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::proxy::OperationResult;
use crate::session::SessionState;

/// Prefix of every failure body returned to HTTP callers.
pub const FAILURE_PREFIX: &str = "Successfully caught the error: \n    ";

/// Which contract path a failed invocation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContractPath {
    Evaluate,
    Submit,
}

impl fmt::Display for ContractPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractPath::Evaluate => write!(f, "evaluate"),
            ContractPath::Submit => write!(f, "submit"),
        }
    }
}

/// Errors surfaced by the identity provisioner, the session, and the proxy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("enrollment of '{enrollment_id}' failed: {message}")]
    Enrollment {
        enrollment_id: String,
        message: String,
    },

    #[error("registration of '{user_id}' failed: {message}")]
    Registration { user_id: String, message: String },

    #[error("identity store error: {0}")]
    Persistence(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("ledger session is not ready (state: {0})")]
    NotReady(SessionState),

    #[error("{path} of '{operation}' failed: {message}")]
    ContractInvocation {
        path: ContractPath,
        operation: String,
        message: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse classification carried by failed operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Enrollment,
    Registration,
    Persistence,
    Connection,
    NotReady,
    EvaluateInvocation,
    SubmitInvocation,
    InvalidRequest,
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Enrollment { .. } => ErrorKind::Enrollment,
            ProxyError::Registration { .. } => ErrorKind::Registration,
            ProxyError::Persistence(_) => ErrorKind::Persistence,
            ProxyError::Connection(_) => ErrorKind::Connection,
            ProxyError::NotReady(_) => ErrorKind::NotReady,
            ProxyError::ContractInvocation {
                path: ContractPath::Evaluate,
                ..
            } => ErrorKind::EvaluateInvocation,
            ProxyError::ContractInvocation {
                path: ContractPath::Submit,
                ..
            } => ErrorKind::SubmitInvocation,
            ProxyError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// `NotReady` covers the startup window before the session resolves its
    /// contract; connection failures may clear once the network is back.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

impl ErrorKind {
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::NotReady | ErrorKind::Connection)
    }
}

/// How failures map onto HTTP status codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Every response is `200 OK`, failures included.
    #[default]
    Compatible,
    /// Failures get a non-success status reflecting their kind.
    Mapped,
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compatible" => Ok(StatusPolicy::Compatible),
            "mapped" => Ok(StatusPolicy::Mapped),
            other => Err(format!(
                "unknown status policy `{other}` (expected `compatible` or `mapped`)"
            )),
        }
    }
}

/// Plain-text HTTP response produced at the request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TextResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

impl IntoResponse for TextResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

/// Renders [`ProxyError`]s as caller-safe text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator {
    policy: StatusPolicy,
}

impl ErrorTranslator {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    /// Render a failure, keeping the underlying error text intact.
    pub fn translate(&self, error: &ProxyError) -> TextResponse {
        self.failure(error.kind(), &error.to_string())
    }

    /// Render the outcome of [`TransactionProxy::execute`].
    ///
    /// [`TransactionProxy::execute`]: crate::proxy::TransactionProxy::execute
    pub fn render(
        &self,
        result: OperationResult,
        on_success: impl FnOnce(Vec<u8>) -> String,
    ) -> TextResponse {
        match result {
            OperationResult::Success(payload) => TextResponse::ok(on_success(payload)),
            OperationResult::Failure { kind, message } => self.failure(kind, &message),
        }
    }

    fn failure(&self, kind: ErrorKind, message: &str) -> TextResponse {
        tracing::warn!(
            kind = ?kind,
            retriable = kind.is_retriable(),
            error = %message,
            "Request failed"
        );

        TextResponse {
            status: self.status_for(kind),
            body: format!("{FAILURE_PREFIX}{message}"),
        }
    }

    fn status_for(&self, kind: ErrorKind) -> StatusCode {
        match self.policy {
            StatusPolicy::Compatible => StatusCode::OK,
            StatusPolicy::Mapped => match kind {
                k if k.is_retriable() => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::EvaluateInvocation | ErrorKind::SubmitInvocation => {
                    StatusCode::BAD_GATEWAY
                }
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn contract_failure() -> ProxyError {
        ProxyError::ContractInvocation {
            path: ContractPath::Submit,
            operation: "ChangeColor".into(),
            message: "the car 999 does not exist".into(),
        }
    }

    #[test]
    fn kinds_split_contract_paths() {
        assert_eq!(contract_failure().kind(), ErrorKind::SubmitInvocation);

        let evaluate = ProxyError::ContractInvocation {
            path: ContractPath::Evaluate,
            operation: "GetAllCarsByColor".into(),
            message: "boom".into(),
        };
        assert_eq!(evaluate.kind(), ErrorKind::EvaluateInvocation);
    }

    #[test]
    fn only_startup_window_and_connection_failures_are_retriable() {
        assert!(ProxyError::NotReady(SessionState::Connecting).is_retriable());
        assert!(ProxyError::Connection("peer down".into()).is_retriable());
        assert!(!contract_failure().is_retriable());
        assert!(!ProxyError::Persistence("disk full".into()).is_retriable());
    }

    #[test]
    fn compatible_policy_keeps_success_status_and_error_text() {
        let translator = ErrorTranslator::default();
        let response = translator.translate(&contract_failure());

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            "Successfully caught the error: \n    submit of 'ChangeColor' failed: the car 999 does not exist"
        );
    }

    #[test]
    fn mapped_policy_distinguishes_failure_classes() {
        let translator = ErrorTranslator::new(StatusPolicy::Mapped);

        assert_eq!(
            translator
                .translate(&ProxyError::NotReady(SessionState::Disconnected))
                .status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            translator.translate(&contract_failure()).status,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            translator
                .translate(&ProxyError::InvalidRequest("missing field".into()))
                .status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            translator
                .translate(&ProxyError::Persistence("disk".into()))
                .status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn render_uses_failure_kind_for_status() {
        let translator = ErrorTranslator::new(StatusPolicy::Mapped);

        let ok = translator.render(OperationResult::Success(b"[]".to_vec()), |payload| {
            format!("Result: {}", String::from_utf8_lossy(&payload))
        });
        assert_eq!(ok, TextResponse::ok("Result: []"));

        let failed = translator.render(
            OperationResult::Failure {
                kind: ErrorKind::EvaluateInvocation,
                message: "function not found".into(),
            },
            |_| unreachable!(),
        );
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        assert_eq!(failed.body, format!("{FAILURE_PREFIX}function not found"));
    }

    #[test]
    fn status_policy_parses_case_insensitively() {
        assert_eq!("Mapped".parse::<StatusPolicy>(), Ok(StatusPolicy::Mapped));
        assert_eq!(
            " compatible ".parse::<StatusPolicy>(),
            Ok(StatusPolicy::Compatible)
        );
        assert!("strict".parse::<StatusPolicy>().is_err());
    }

    #[tokio::test]
    async fn into_response_returns_plain_text_body() {
        let failed =
            OperationResult::from(Err::<Vec<u8>, _>(ProxyError::Connection("refused".into())));
        let response = ErrorTranslator::default()
            .render(failed, |_| String::new())
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(
            body,
            "Successfully caught the error: \n    connection failed: refused"
        );
    }
}
