// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, routing::post, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ChangeColorRequest, CreateFailureRequest, RepairFailureRequest, TransferOwnershipRequest,
    },
    session::{SessionSnapshot, SessionState},
    state::AppState,
};

pub mod cars;
pub mod health;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/get-all-cars-by-color", get(cars::get_all_cars_by_color))
        .route(
            "/get-all-cars-by-color-and-owner",
            get(cars::get_all_cars_by_color_and_owner),
        )
        .route("/create-failure", post(cars::create_failure))
        .route("/transfer-ownership", post(cars::transfer_ownership))
        .route("/repair-failure", post(cars::repair_failure))
        .route("/change-color", post(cars::change_color))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        cars::get_all_cars_by_color,
        cars::get_all_cars_by_color_and_owner,
        cars::create_failure,
        cars::transfer_ownership,
        cars::repair_failure,
        cars::change_color,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CreateFailureRequest,
            TransferOwnershipRequest,
            RepairFailureRequest,
            ChangeColorRequest,
            SessionSnapshot,
            SessionState,
            health::HealthResponse,
            health::ReadyResponse
        )
    ),
    tags(
        (name = "Cars", description = "Car registry contract calls"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
