// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Car registry endpoints.
//!
//! Every handler answers plain text: `Result: <payload>` for queries,
//! `Request sent` for committed submits, and the translated error otherwise.
//! Malformed query strings and bodies are rendered the same way.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};

use crate::{
    error::{ProxyError, TextResponse},
    gateway::chaincode::{
        CHANGE_COLOR, CREATE_FAILURE, GET_ALL_CARS_BY_COLOR, GET_ALL_CARS_BY_COLOR_AND_OWNER,
        REPAIR_FAILURE, TRANSFER_OWNERSHIP,
    },
    models::{
        ChangeColorRequest, ColorOwnerQuery, ColorQuery, CreateFailureRequest,
        RepairFailureRequest, TransferOwnershipRequest,
    },
    proxy::{OperationRequest, OperationResult},
    state::AppState,
};

/// Body of a successful submit.
pub const REQUEST_SENT: &str = "Request sent";

async fn run(state: &AppState, request: Result<OperationRequest, ProxyError>) -> OperationResult {
    match request {
        Ok(request) => state.proxy.execute(&request).await,
        Err(error) => OperationResult::from(Err::<Vec<u8>, _>(error)),
    }
}

async fn evaluate(
    state: &AppState,
    operation: &str,
    args: Result<Vec<String>, ProxyError>,
) -> TextResponse {
    let request = args.map(|args| OperationRequest::query(operation, args));
    state.translator.render(run(state, request).await, |payload| {
        format!("Result: {}", String::from_utf8_lossy(&payload))
    })
}

async fn submit(
    state: &AppState,
    operation: &str,
    args: Result<Vec<String>, ProxyError>,
) -> TextResponse {
    let request = args.map(|args| OperationRequest::invoke(operation, args));
    state
        .translator
        .render(run(state, request).await, |_| REQUEST_SENT.to_string())
}

fn query_args<T>(
    query: Result<Query<T>, QueryRejection>,
    into_args: impl FnOnce(T) -> Vec<String>,
) -> Result<Vec<String>, ProxyError> {
    query
        .map(|Query(query)| into_args(query))
        .map_err(|rejection| ProxyError::InvalidRequest(rejection.body_text()))
}

fn body_args<T>(
    body: Result<Json<T>, JsonRejection>,
    into_args: impl FnOnce(T) -> Vec<String>,
) -> Result<Vec<String>, ProxyError> {
    body.map(|Json(body)| into_args(body))
        .map_err(|rejection| ProxyError::InvalidRequest(rejection.body_text()))
}

#[utoipa::path(
    get,
    path = "/get-all-cars-by-color",
    params(ColorQuery),
    tag = "Cars",
    responses((status = 200, description = "`Result: <cars JSON>` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn get_all_cars_by_color(
    State(state): State<AppState>,
    query: Result<Query<ColorQuery>, QueryRejection>,
) -> TextResponse {
    let args = query_args(query, |q| vec![q.color]);
    evaluate(&state, GET_ALL_CARS_BY_COLOR, args).await
}

#[utoipa::path(
    get,
    path = "/get-all-cars-by-color-and-owner",
    params(ColorOwnerQuery),
    tag = "Cars",
    responses((status = 200, description = "`Result: <cars JSON>` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn get_all_cars_by_color_and_owner(
    State(state): State<AppState>,
    query: Result<Query<ColorOwnerQuery>, QueryRejection>,
) -> TextResponse {
    let args = query_args(query, |q| vec![q.color, q.owner]);
    evaluate(&state, GET_ALL_CARS_BY_COLOR_AND_OWNER, args).await
}

#[utoipa::path(
    post,
    path = "/create-failure",
    request_body = CreateFailureRequest,
    tag = "Cars",
    responses((status = 200, description = "`Request sent` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn create_failure(
    State(state): State<AppState>,
    body: Result<Json<CreateFailureRequest>, JsonRejection>,
) -> TextResponse {
    let args = body_args(body, CreateFailureRequest::into_args);
    submit(&state, CREATE_FAILURE, args).await
}

#[utoipa::path(
    post,
    path = "/transfer-ownership",
    request_body = TransferOwnershipRequest,
    tag = "Cars",
    responses((status = 200, description = "`Request sent` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn transfer_ownership(
    State(state): State<AppState>,
    body: Result<Json<TransferOwnershipRequest>, JsonRejection>,
) -> TextResponse {
    let args = body_args(body, TransferOwnershipRequest::into_args);
    submit(&state, TRANSFER_OWNERSHIP, args).await
}

#[utoipa::path(
    post,
    path = "/repair-failure",
    request_body = RepairFailureRequest,
    tag = "Cars",
    responses((status = 200, description = "`Request sent` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn repair_failure(
    State(state): State<AppState>,
    body: Result<Json<RepairFailureRequest>, JsonRejection>,
) -> TextResponse {
    let args = body_args(body, RepairFailureRequest::into_args);
    submit(&state, REPAIR_FAILURE, args).await
}

#[utoipa::path(
    post,
    path = "/change-color",
    request_body = ChangeColorRequest,
    tag = "Cars",
    responses((status = 200, description = "`Request sent` or an error diagnostic", body = String, content_type = "text/plain"))
)]
pub async fn change_color(
    State(state): State<AppState>,
    body: Result<Json<ChangeColorRequest>, JsonRejection>,
) -> TextResponse {
    let args = body_args(body, ChangeColorRequest::into_args);
    submit(&state, CHANGE_COLOR, args).await
}
