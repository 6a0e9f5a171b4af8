//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    health::{CheckResult, HealthReport},
    models::{
        ActivityCount, CreatePatientPayload, ErrorResponse, LoginPayload, SsoLoginPayload, User,
    },
    state::AppState,
    ws::ws_handler,
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
    paths(
        handlers::login,
        handlers::sso_login,
        handlers::create_patient,
        handlers::list_therapists,
        handlers::list_patients,
        handlers::list_scenarios,
        handlers::activity_counts,
        handlers::health,
    ),
    components(
        schemas(
            User,
            LoginPayload,
            SsoLoginPayload,
            CreatePatientPayload,
            ActivityCount,
            ErrorResponse,
            HealthReport,
            CheckResult
        )
    ),
    tags(
        (name = "Samtale API", description = "Accounts, scenarios, and progress views for the conversation trainer")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/sso", post(handlers::sso_login))
        .route(
            "/users/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route("/users/therapists", get(handlers::list_therapists))
        .route("/scenarios", get(handlers::list_scenarios))
        .route("/activity/counts", get(handlers::activity_counts))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
