use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{stream::Stream, StreamExt};
use parkspot_booking::LotQuery;
use parkspot_shared::models::ParkingLot;
use parkspot_shared::LotAvailability;
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct LotResponse {
    #[serde(flatten)]
    pub lot: ParkingLot,
    pub is_full: bool,
}

impl From<ParkingLot> for LotResponse {
    fn from(lot: ParkingLot) -> Self {
        let is_full = lot.is_full();
        Self { lot, is_full }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lots", get(search_lots))
        .route("/lots/{id}", get(get_lot))
        .route("/lots/{id}/availability/stream", get(availability_stream))
}

async fn search_lots(
    State(state): State<AppState>,
    query: Result<Query<LotQuery>, QueryRejection>,
) -> Result<Json<Vec<LotResponse>>, AppError> {
    let Query(query) = query?;
    let lots = state.catalog.search(&query).await?;
    Ok(Json(lots.into_iter().map(LotResponse::from).collect()))
}

async fn get_lot(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LotResponse>, AppError> {
    let Path(lot_id) = path?;
    Ok(Json(state.catalog.lot(lot_id).await?.into()))
}

/// Current counters as a `snapshot` event, then one `availability` event per
/// committed lifecycle change on this lot. Frames carry no booking or user
/// ids; clients keep the highest `version` seen.
async fn availability_stream(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Path(lot_id) = path?;
    // Subscribe before reading the snapshot so no commit falls in between.
    let rx = state.events.subscribe();
    let lot = state.catalog.lot(lot_id).await?;

    let snapshot = Event::default()
        .event("snapshot")
        .json_data(LotResponse::from(lot))
        .ok()
        .map(Ok::<_, Infallible>);

    let updates = BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.lot_id == lot_id => Event::default()
                .event("availability")
                .json_data(LotAvailability::from(&event))
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(lot_id = %lot_id, skipped, "Availability subscriber lagged");
                None
            }
        }
    });

    let stream = futures_util::stream::iter(snapshot).chain(updates);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
