//! Reservation and roster login endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use sentrydash_occupancy::{ReservationAssessment, ReservationRequest, Profile, Role};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reserve", post(reserve))
        .route("/login", post(login))
}

#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub assessment: ReservationAssessment,
}

async fn reserve(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<Json<ReserveResponse>, ApiError> {
    let request = ctx.body(payload)?;
    let assessment = state
        .service()
        .reserve(&request)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(ReserveResponse {
        message: "Reservation saved",
        assessment,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub role: Role,
    pub profile: Profile,
}

async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = ctx.body(payload)?;
    let profile = state
        .service()
        .login(request.email.as_deref())
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(LoginResponse {
        role: profile.role,
        profile,
    }))
}
