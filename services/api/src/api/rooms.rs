//! Room read endpoints.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use sentrydash_id::{ResourceVersion, RoomId};
use sentrydash_occupancy::{Room, RoomFilter};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::error::ServiceError;
use crate::service::RoomStatus;
use crate::state::AppState;
use crate::store::Versioned;

/// A room document plus its version stamp.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: Room,
    pub resource_version: ResourceVersion,
}

impl From<Versioned<Room>> for RoomResponse {
    fn from(record: Versioned<Room>) -> Self {
        Self {
            room: record.value,
            resource_version: record.version,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/room/{id}", get(get_room))
        .route("/room/{id}/status", get(room_status))
}

/// Path ids that cannot be valid keys name no room.
pub(crate) fn path_room_id(ctx: &RequestContext, raw: &str) -> Result<RoomId, ApiError> {
    RoomId::parse(raw).map_err(|_| {
        ApiError::not_found("room_not_found", format!("room {raw} not found"))
            .with_request_id(ctx.request_id.clone())
    })
}

async fn list_rooms(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<RoomFilter>, QueryRejection>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let filter = ctx.query(query)?;
    let records = state
        .service()
        .list_rooms(&filter)
        .await
        .map_err(|e: ServiceError| ctx.fail(e))?;
    Ok(Json(records.into_iter().map(RoomResponse::from).collect()))
}

async fn get_room(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let id = path_room_id(&ctx, &id)?;
    let record = state
        .service()
        .get_room(&id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(record.into()))
}

async fn room_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<RoomStatus>, ApiError> {
    let id = path_room_id(&ctx, &id)?;
    let status = state
        .service()
        .room_status(&id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(status))
}
