//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for
//! authentication, account management, and the review views. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use samtale_core::identity::{
    CAP_VIEW_COLLECTED_DATA, CAP_VIEW_PROGRESS, CAP_VIEW_USER_DATA, Role, authorize,
};
use samtale_core::scenario::ScenarioContext;
use std::sync::Arc;
use tracing::error;

use crate::{
    health::{HealthReport, run_health_checks},
    models::{ActivityCount, CreatePatientPayload, ErrorResponse, LoginPayload, SsoLoginPayload, User},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(ErrorResponse { message })).into_response()
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

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Resolves the acting account from the `x-username` header.
async fn acting_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let username = headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("x-username header is required".to_string()))?;
    state
        .db
        .get_user(&username.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Ukendt bruger.".to_string()))
}

/// Log in with a local username and password.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Credentials accepted", body = User),
        (status = 401, description = "Credentials rejected", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("Forkert brugernavn eller kodeord.".to_string())
        })?;
    Ok(Json(user))
}

/// Provision a staff account after the identity provider has verified the email.
#[utoipa::path(
    post,
    path = "/auth/sso",
    request_body = SsoLoginPayload,
    responses(
        (status = 200, description = "Staff account provisioned", body = User),
        (status = 400, description = "Role or email domain rejected", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn sso_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SsoLoginPayload>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .auth
        .provision_sso_user(&payload.email, payload.role)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(user))
}

/// Create a patient account.
#[utoipa::path(
    post,
    path = "/users/patients",
    request_body = CreatePatientPayload,
    responses(
        (status = 201, description = "Patient created", body = User),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Acting role may not create patients", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-username" = String, Header, description = "The acting account")
    )
)]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreatePatientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let acting = acting_user(&state, &headers).await?;
    // Therapists always become the assigned therapist themselves; only a
    // developer may assign someone else.
    let therapist = match acting.role {
        Role::Therapist => Some(acting.username.clone()),
        Role::Developer => payload
            .therapist_username
            .clone()
            .or(Some(acting.username.clone())),
        _ => {
            return Err(ApiError::Forbidden(
                "Kun terapeuter kan oprette patienter.".to_string(),
            ));
        }
    };
    let user = state
        .auth
        .create_local_user(
            &payload.username,
            &payload.password,
            Role::Patient,
            &payload.display_name,
            therapist.as_deref(),
        )
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// List all therapist accounts.
#[utoipa::path(
    get,
    path = "/users/therapists",
    responses(
        (status = 200, description = "Therapist accounts", body = [User]),
        (status = 403, description = "Acting role may not view accounts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-username" = String, Header, description = "The acting account")
    )
)]
pub async fn list_therapists(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let acting = acting_user(&state, &headers).await?;
    if !authorize(&acting.to_identity(), CAP_VIEW_USER_DATA) {
        return Err(ApiError::Forbidden(
            "Du har ikke adgang til brugerdata.".to_string(),
        ));
    }
    Ok(Json(state.db.get_therapists().await?))
}

/// List the patients visible to the acting account.
#[utoipa::path(
    get,
    path = "/users/patients",
    responses(
        (status = 200, description = "Patient accounts", body = [User]),
        (status = 403, description = "Acting role may not view patients", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-username" = String, Header, description = "The acting account")
    )
)]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let acting = acting_user(&state, &headers).await?;
    // Therapists see their own patients; data roles see every patient.
    match acting.role {
        Role::Therapist => Ok(Json(
            state.db.get_patients_for_therapist(&acting.username).await?,
        )),
        _ if authorize(&acting.to_identity(), CAP_VIEW_USER_DATA) => {
            let patients = state
                .db
                .list_users()
                .await?
                .into_iter()
                .filter(|u| u.role == Role::Patient)
                .collect();
            Ok(Json(patients))
        }
        _ => Err(ApiError::Forbidden(
            "Du har ikke adgang til brugerdata.".to_string(),
        )),
    }
}

/// List the available predefined scenarios.
#[utoipa::path(
    get,
    path = "/scenarios",
    responses(
        (status = 200, description = "Scenario catalogue")
    )
)]
pub async fn list_scenarios(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ScenarioContext>> {
    Json(state.scenarios.list())
}

/// Activity event totals for the progress views.
#[utoipa::path(
    get,
    path = "/activity/counts",
    responses(
        (status = 200, description = "Event totals per user, busiest first", body = [ActivityCount]),
        (status = 403, description = "Acting role may not view progress", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-username" = String, Header, description = "The acting account")
    )
)]
pub async fn activity_counts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ActivityCount>>, ApiError> {
    let acting = acting_user(&state, &headers).await?;
    let identity = acting.to_identity();
    if !authorize(&identity, CAP_VIEW_PROGRESS) {
        return Err(ApiError::Forbidden(
            "Du har ikke adgang til fremskridtsdata.".to_string(),
        ));
    }
    // Therapists only see their own patients unless they also hold the
    // collected-data capability.
    let restriction = if acting.role == Role::Therapist
        && !authorize(&identity, CAP_VIEW_COLLECTED_DATA)
    {
        let patients = state.db.get_patients_for_therapist(&acting.username).await?;
        Some(patients.into_iter().map(|p| p.username).collect::<Vec<_>>())
    } else {
        None
    };
    let counts = state.db.activity_counts(restriction.as_deref()).await?;
    Ok(Json(counts))
}

/// Diagnostic checks for the external collaborators. Developer only.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health report", body = HealthReport),
        (status = 403, description = "Acting role may not view diagnostics", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-username" = String, Header, description = "The acting account")
    )
)]
pub async fn health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<HealthReport>, ApiError> {
    let acting = acting_user(&state, &headers).await?;
    if acting.role != Role::Developer {
        return Err(ApiError::Forbidden(
            "Kun udviklere kan se systemstatus.".to_string(),
        ));
    }
    Ok(Json(run_health_checks(&state.config).await))
}
