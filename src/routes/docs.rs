//! Interactive documentation for the game, health and gateway surfaces.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Mount Swagger UI at `/docs`, serving the aggregated OpenAPI document
/// from `/api-doc/openapi.json`.
pub fn router(state: SharedState) -> Router<SharedState> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    swagger.with_state(state)
}
