//! Entry/exit and overflow endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use sentrydash_occupancy::{parse_room_id, Candidate, EntryRequest, OverflowAssessment, Room};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::api::rooms::RoomResponse;
use crate::error::ServiceError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entry", post(record_entry))
        .route("/suggest", post(suggest))
}

async fn record_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<EntryRequest>, JsonRejection>,
) -> Result<Json<RoomResponse>, ApiError> {
    let request = ctx.body(payload)?;
    let record = state
        .service()
        .record_entry(&request)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(record.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuggestResponse {
    Overflow {
        overflow: u32,
        suggestion: Option<Candidate>,
    },
    NoOverflow {
        message: &'static str,
        room: Room,
    },
}

impl From<OverflowAssessment> for SuggestResponse {
    fn from(assessment: OverflowAssessment) -> Self {
        match assessment {
            OverflowAssessment::Overflow {
                overflow,
                suggestion,
            } => Self::Overflow {
                overflow,
                suggestion,
            },
            OverflowAssessment::WithinCapacity(room) => Self::NoOverflow {
                message: "No overflow detected",
                room,
            },
        }
    }
}

async fn suggest(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let request = ctx.body(payload)?;
    let room_id = parse_room_id(request.room_id.as_deref())
        .map_err(|e| ctx.fail(ServiceError::from(e)))?;
    let assessment = state
        .service()
        .suggest(&room_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(assessment.into()))
}
