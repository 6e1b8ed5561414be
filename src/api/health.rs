// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::session::{SessionSnapshot, SessionState};
use crate::state::AppState;

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness response with the ledger session's state.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// "ok" once the session is ready, "not_ready" otherwise.
    pub status: String,
    pub session: SessionSnapshot,
}

/// Liveness check handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check handler.
///
/// Returns 200 only once the ledger session has resolved its contract.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ledger session is ready", body = ReadyResponse),
        (status = 503, description = "Ledger session is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let session = state.session().snapshot().await;
    let ready = session.state == SessionState::Ready;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = ReadyResponse {
        status: if ready { "ok" } else { "not_ready" }.to_string(),
        session,
    };

    (status, Json(response))
}
