//! Room cleaning and extra delivery endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, RoomId};
use orchestrator::{
    AssignedItem, CleaningReport, DEFAULT_RECENT_DELIVERIES, DeliveryReport, OrchestratorError,
};
use serde::{Deserialize, Serialize};
use stock_store::{ExtraDelivery, ReferenceStore, Room, StockStore};

use super::{explained, json_body, parse_id};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CleanRoomRequest {
    pub actor_id: ActorId,
}

#[derive(Debug, Deserialize)]
pub struct ItemLine {
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub actor_id: ActorId,
    pub items: Vec<ItemLine>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RoomStatusResponse {
    pub room: Room,
    pub last_cleaned_at: Option<DateTime<Utc>>,
    pub recently_cleaned: bool,
    pub assignment: Vec<AssignedItem>,
}

pub(crate) fn lines(items: Vec<ItemLine>) -> Vec<(CatalogItemId, u32)> {
    items
        .into_iter()
        .map(|line| (line.catalog_item_id, line.quantity))
        .collect()
}

/// GET /rooms/{room_id}: what a cleaning would swap and when it last ran.
#[tracing::instrument(skip(state))]
pub async fn status<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStatusResponse>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let room_id: RoomId = parse_id(&room_id, "room")?;
    let room = explained(
        state
            .reference
            .room(room_id)
            .await
            .map_err(OrchestratorError::from)
            .and_then(|room| room.ok_or(OrchestratorError::UnknownRoom(room_id))),
        &state.reference,
    )
    .await?;

    let now = Utc::now();
    let last_cleaned_at = state.cleaning.last_cleaned_at(room_id).await?;
    let recently_cleaned = state.history.recently_cleaned(room_id, now).await?;
    let assignment = state
        .cleaning
        .room_assignment(room_id)
        .await?
        .into_iter()
        .map(|(catalog_item_id, quantity)| AssignedItem {
            catalog_item_id,
            quantity,
        })
        .collect();

    Ok(Json(RoomStatusResponse {
        room,
        last_cleaned_at,
        recently_cleaned,
        assignment,
    }))
}

/// POST /rooms/{room_id}/clean
#[tracing::instrument(skip(state, body))]
pub async fn clean<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(room_id): Path<String>,
    body: Result<Json<CleanRoomRequest>, JsonRejection>,
) -> Result<Json<CleaningReport>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let room_id: RoomId = parse_id(&room_id, "room")?;
    let req = json_body(body)?;
    let report = explained(
        state.cleaning.clean_room(room_id, req.actor_id).await,
        &state.reference,
    )
    .await?;
    Ok(Json(report))
}

/// POST /rooms/{room_id}/deliveries
#[tracing::instrument(skip(state, body))]
pub async fn deliver<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(room_id): Path<String>,
    body: Result<Json<DeliveryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeliveryReport>), ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let room_id: RoomId = parse_id(&room_id, "room")?;
    let req = json_body(body)?;
    let report = explained(
        state
            .deliveries
            .deliver_extra(room_id, req.actor_id, lines(req.items), req.reason)
            .await,
        &state.reference,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /rooms/{room_id}/deliveries
#[tracing::instrument(skip(state))]
pub async fn room_deliveries<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ExtraDelivery>>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let room_id: RoomId = parse_id(&room_id, "room")?;
    Ok(Json(state.deliveries.deliveries_for_room(room_id).await?))
}

/// GET /deliveries: latest extra deliveries across rooms.
#[tracing::instrument(skip(state))]
pub async fn recent<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<ExtraDelivery>>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_DELIVERIES);
    Ok(Json(state.deliveries.recent_deliveries(limit).await?))
}
