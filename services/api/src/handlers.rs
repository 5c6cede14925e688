//! Axum Handlers for the HTTP API
//!
//! This module contains the logic for handling connection offers. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    lifecycle::OfferError,
    models::{AnswerResponse, ErrorResponse, OfferRequest},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<OfferError> for ApiError {
    fn from(err: OfferError) -> Self {
        match err {
            OfferError::InvalidOffer(_) => Self::BadRequest(err.to_string()),
            OfferError::SessionNotFound(_) => Self::NotFound(err.to_string()),
            OfferError::Negotiation(e) => Self::InternalServerError(e.into()),
        }
    }
}

/// Negotiate a voice session: creates one for a fresh offer, renegotiates
/// when the offer carries a known `pc_id`.
#[utoipa::path(
    post,
    path = "/api/offer",
    request_body = OfferRequest,
    responses(
        (status = 200, description = "Negotiated answer", body = AnswerResponse),
        (status = 400, description = "Malformed offer", body = ErrorResponse),
        (status = 404, description = "Unknown pc_id", body = ErrorResponse),
        (status = 500, description = "Negotiation failed", body = ErrorResponse)
    )
)]
pub async fn offer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OfferRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = state.lifecycle.handle_offer(payload).await?;
    Ok(Json(AnswerResponse::from(answer)))
}

/// Serves the bundled demo client.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}
