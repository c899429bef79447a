use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::parcel::ParcelStatus;
use crate::ports::PortError;

/// Failures of the parcel lifecycle and dispatch operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("verification rejected")]
    VerificationRejected,

    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ParcelStatus,
        actual: ParcelStatus,
    },

    #[error("invalid tracking number: {0:?}")]
    InvalidTrackingNumber(String),

    #[error("driver {0} is not available")]
    DriverUnavailable(String),

    #[error("parcel is {0}, not ready for assignment")]
    NotReadyForAssignment(ParcelStatus),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("parcel {0} not found")]
    ParcelNotFound(Uuid),

    #[error("driver {0} not found")]
    DriverNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation interrupted: {0}")]
    Interrupted(String),
}

impl DispatchError {
    /// Stable kind string for clients that branch on the failure.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::VerificationRejected => "verification_rejected",
            DispatchError::InvalidState { .. } => "invalid_state",
            DispatchError::InvalidTrackingNumber(_) => "invalid_tracking_number",
            DispatchError::DriverUnavailable(_) => "driver_unavailable",
            DispatchError::NotReadyForAssignment(_) => "not_ready_for_assignment",
            DispatchError::Upstream(_) => "upstream_error",
            DispatchError::ParcelNotFound(_) => "parcel_not_found",
            DispatchError::DriverNotFound(_) => "driver_not_found",
            DispatchError::Storage(_) => "storage_error",
            DispatchError::Interrupted(_) => "interrupted",
        }
    }
}

impl From<PortError> for DispatchError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Storage(msg) => DispatchError::Storage(msg),
            other => DispatchError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Dispatch(err) => (dispatch_status(err), err.code()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

fn dispatch_status(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::VerificationRejected | DispatchError::InvalidTrackingNumber(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DispatchError::InvalidState { .. }
        | DispatchError::NotReadyForAssignment(_)
        | DispatchError::DriverUnavailable(_) => StatusCode::CONFLICT,
        DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        DispatchError::ParcelNotFound(_) | DispatchError::DriverNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DispatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::Interrupted(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
