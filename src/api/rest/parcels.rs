use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::AssignmentOutcome;
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::parcel::{Parcel, ParcelStatus, Verification};
use crate::state::AppState;
use crate::zones::ZoneGroup;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(intake_order))
        .route("/parcels", get(list_parcels))
        .route("/parcels/:id", get(get_parcel))
        .route("/parcels/:id/verify", post(verify_parcel))
        .route("/parcels/:id/ready", post(mark_ready))
        .route("/parcels/:id/assign", post(assign_parcel))
        .route("/parcels/:id/delivered", post(record_delivered))
        .route("/zones", get(zone_board))
}

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    fn parse(&self) -> Result<Option<ParcelStatus>, AppError> {
        self.status
            .as_deref()
            .map(|raw| raw.parse::<ParcelStatus>().map_err(AppError::BadRequest))
            .transpose()
    }
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: String,
}

async fn intake_order(
    State(state): State<Arc<AppState>>,
    Json(order): Json<Order>,
) -> Result<Json<Parcel>, AppError> {
    if order.order_number.trim().is_empty() {
        return Err(AppError::BadRequest("order_number cannot be empty".to_string()));
    }

    let parcel = state.intake.create_from_order(&order).await?;
    Ok(Json(parcel))
}

async fn list_parcels(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Parcel>>, AppError> {
    let parcels = match filter.parse()? {
        Some(status) => state.store.list_by_status(status).await?,
        None => state.store.list().await?,
    };
    Ok(Json(parcels))
}

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(state.store.get(id).await?))
}

async fn verify_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Verification>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(state.workflow.verify(id, payload).await?))
}

async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(state.workflow.mark_ready(id).await?))
}

async fn assign_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    if payload.driver_id.trim().is_empty() {
        return Err(AppError::BadRequest("driver_id cannot be empty".to_string()));
    }

    Ok(Json(state.workflow.assign(id, &payload.driver_id).await?))
}

async fn record_delivered(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(state.workflow.record_delivered(id).await?))
}

async fn zone_board(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<ZoneGroup<Parcel>>>, AppError> {
    let status = filter.parse()?.unwrap_or(ParcelStatus::ReadyForDelivery);
    Ok(Json(state.workflow.zone_board(status).await?))
}
