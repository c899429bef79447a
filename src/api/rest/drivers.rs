use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::parcel::Parcel;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers))
        .route("/drivers/:id/parcels", get(driver_parcels))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(state.directory.list_available().await?))
}

async fn driver_parcels(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Parcel>>, AppError> {
    Ok(Json(state.store.assigned_to(&id).await?))
}
