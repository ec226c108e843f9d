//! Laundry reception endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::ActorId;
use orchestrator::ReceptionReport;
use serde::Deserialize;
use stock_store::{ReferenceStore, StockStore};

use super::rooms::{ItemLine, lines};
use super::{explained, json_body};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReceptionRequest {
    pub actor_id: Option<ActorId>,
    pub items: Vec<ItemLine>,
}

/// POST /laundry/receptions
#[tracing::instrument(skip(state, body))]
pub async fn receive<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    body: Result<Json<ReceptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReceptionReport>), ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let req = json_body(body)?;
    let report = explained(
        state
            .reception
            .receive_laundry_batch(req.actor_id, lines(req.items))
            .await,
        &state.reference,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(report)))
}
