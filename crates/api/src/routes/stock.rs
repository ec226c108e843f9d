//! Stock counter endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::CatalogItemId;
use serde::Deserialize;
use stock_store::{Bucket, ReferenceStore, StockCounters, StockStore};

use super::{explained, json_body, parse_id};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct WriteOffRequest {
    pub quantity: u32,
    pub from: Bucket,
}

/// GET /stock: counters of every registered item.
#[tracing::instrument(skip(state))]
pub async fn list<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
) -> Result<Json<Vec<StockCounters>>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    Ok(Json(state.ledger.all_counters().await?))
}

/// GET /stock/{item_id}
#[tracing::instrument(skip(state))]
pub async fn get<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(item_id): Path<String>,
) -> Result<Json<StockCounters>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let item_id: CatalogItemId = parse_id(&item_id, "item")?;
    let counters = explained(state.ledger.counters(item_id).await, &state.reference).await?;
    Ok(Json(counters))
}

/// POST /stock/{item_id}/restock
#[tracing::instrument(skip(state, body))]
pub async fn restock<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(item_id): Path<String>,
    body: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<StockCounters>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let item_id: CatalogItemId = parse_id(&item_id, "item")?;
    let req = json_body(body)?;
    let counters = explained(
        state.ledger.restock(item_id, req.quantity).await,
        &state.reference,
    )
    .await?;
    Ok(Json(counters))
}

/// POST /stock/{item_id}/write-off
#[tracing::instrument(skip(state, body))]
pub async fn write_off<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Path(item_id): Path<String>,
    body: Result<Json<WriteOffRequest>, JsonRejection>,
) -> Result<Json<StockCounters>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let item_id: CatalogItemId = parse_id(&item_id, "item")?;
    let req = json_body(body)?;
    let counters = explained(
        state.ledger.write_off(item_id, req.quantity, req.from).await,
        &state.reference,
    )
    .await?;
    Ok(Json(counters))
}
