//! Movement log and grouped history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use history::{HistoryFilter, HistoryStats, Period, ResolvedEvent};
use serde::{Deserialize, Serialize};
use stock_store::{
    MovementKind, MovementOrigin, MovementQuery, MovementRecord, ReferenceStore, StockStore,
};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest page a single movement request may ask for.
const MAX_MOVEMENTS: usize = 1000;

/// Query string of `GET /movements`. `kind` and `origin` take
/// comma-separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct MovementParams {
    pub item_id: Option<String>,
    pub room_id: Option<String>,
    pub kind: Option<String>,
    pub origin: Option<String>,
    pub correlation_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MovementParams {
    pub fn into_query(self) -> Result<MovementQuery, ApiError> {
        let mut query = MovementQuery::new();
        if let Some(id) = self.item_id {
            query = query.catalog_item_id(parse_id(&id, "item")?);
        }
        if let Some(id) = self.room_id {
            query = query.room_id(parse_id(&id, "room")?);
        }
        if let Some(kinds) = self.kind {
            query = query.kinds(parse_list(&kinds, MovementKind::parse, "kind")?);
        }
        if let Some(origins) = self.origin {
            query = query.origins(parse_list(&origins, MovementOrigin::parse, "origin")?);
        }
        if let Some(id) = self.correlation_id {
            query = query.correlation_id(parse_id(&id, "correlation")?);
        }
        if let Some(from) = self.from {
            query = query.from_timestamp(from);
        }
        if let Some(to) = self.to {
            query = query.to_timestamp(to);
        }
        query = query.limit(self.limit.unwrap_or(MAX_MOVEMENTS).min(MAX_MOVEMENTS));
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        Ok(query)
    }
}

fn parse_list<T>(
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
    what: &str,
) -> Result<Vec<T>, ApiError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse(part).ok_or_else(|| ApiError::BadRequest(format!("Unknown {what}: {part}"))))
        .collect()
}

/// GET /movements
#[tracing::instrument(skip(state))]
pub async fn movements<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Query(params): Query<MovementParams>,
) -> Result<Json<Vec<MovementRecord>>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let query = params.into_query()?;
    Ok(Json(state.ledger.query_movements(query).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub period: Option<String>,
    pub origin: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub stats: HistoryStats,
    pub events: Vec<ResolvedEvent>,
}

impl HistoryParams {
    pub fn into_filter(self) -> Result<HistoryFilter, ApiError> {
        let period = match self.period.as_deref() {
            Some(value) => Period::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown period: {value}")))?,
            None => Period::default(),
        };
        let mut filter = HistoryFilter::new(period);
        if let Some(value) = self.origin.as_deref() {
            let origin = MovementOrigin::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown origin: {value}")))?;
            filter = filter.origin(origin);
        }
        Ok(filter)
    }
}

/// GET /history: events grouped by correlation key with labels resolved.
///
/// Statistics cover every matching event; `limit` only trims the list.
#[tracing::instrument(skip(state))]
pub async fn events<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let limit = params.limit;
    let filter = params.into_filter()?;
    let now = Utc::now();

    let mut events = state.history.events(&filter, now).await?;
    let stats = HistoryStats::from_events(&events, now);
    if let Some(limit) = limit {
        events.truncate(limit);
    }
    let events = history::resolve_events(events, &state.reference).await?;

    Ok(Json(HistoryResponse { stats, events }))
}
