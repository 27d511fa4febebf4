use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::position::Position;

/// Failure of the time-aware A* search (§4.2). Never fatal: callers treat it as
/// "this leg cannot be driven from here at this time" and react accordingly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("no path from {from} to {to} departing {departure}")]
    NoPath {
        from: Position,
        to: Position,
        departure: chrono::NaiveDateTime,
    },
}

/// Failure of the plan builder (§4.3). A `PlanError` means the instruction
/// sequence cannot be realized for this vehicle snapshot; it is not a panic
/// condition, the caller (the optimizer) just discards the candidate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("leg unreachable: {0}")]
    Unreachable(#[from] PathErrorWrapper),
    #[error("no fuel-capable depot reachable from {0}")]
    NoFuelCapableDepot(Position),
    #[error("no depot holds enough lpg for the requested amount")]
    NoLpgCapableDepot,
}

/// `PathError` wrapped so it can carry `#[from]` without colliding with the
/// blanket impl chain; kept as a thin newtype rather than duplicating fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathErrorWrapper(pub PathError);

impl std::fmt::Display for PathErrorWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PathError> for PathErrorWrapper {
    fn from(e: PathError) -> Self {
        PathErrorWrapper(e)
    }
}

impl std::error::Error for PathErrorWrapper {}

/// Error envelope returned by the control API (§6.2): `{status:"error", message:"..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            code,
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}
