//! HTTP API handlers and routing.

pub mod error;
mod health;
mod occupancy;
pub mod request_context;
mod reserve;
mod rooms;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub use occupancy::{SuggestRequest, SuggestResponse};
pub use reserve::{LoginRequest, LoginResponse, ReserveResponse};
pub use rooms::RoomResponse;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    let api = Router::new()
        .merge(rooms::routes())
        .merge(occupancy::routes())
        .merge(reserve::routes());

    Router::new()
        .merge(health::routes())
        .nest("/api", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found(ctx: RequestContext) -> ApiError {
    ApiError::not_found("route_not_found", "No such route").with_request_id(ctx.request_id)
}
