//! Axum Router Configuration
//!
//! This module defines the HTTP routing for the application, including the
//! offer endpoint, the demo page, and OpenAPI documentation.

use crate::{
    handlers,
    models::{AnswerResponse, ErrorResponse, OfferRequest},
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::offer),
    components(schemas(OfferRequest, AnswerResponse, ErrorResponse)),
    tags(
        (name = "Voxbridge API", description = "Connection negotiation for the voice conversation service")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::index))
        .route("/api/offer", post(handlers::offer))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
