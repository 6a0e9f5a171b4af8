//! API and Database Models
//!
//! This module defines the data structures used for database mapping with
//! `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use samtale_core::identity::{Identity, Role};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A stored account. The password hash never leaves the data layer.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct User {
    pub username: String,
    pub display_name: String,
    #[schema(value_type = String, example = "patient")]
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// `local` for password accounts, `sso` for provisioned staff.
    pub auth_source: String,
    /// The therapist a patient is assigned to.
    pub therapist_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginPayload {
    #[schema(example = "devadmin")]
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SsoLoginPayload {
    #[schema(example = "mette.jensen@klinik.dk")]
    pub email: String,
    #[schema(value_type = String, example = "therapist")]
    pub role: Role,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePatientPayload {
    pub username: String,
    pub display_name: String,
    pub password: String,
    /// Defaults to the acting therapist when omitted.
    pub therapist_username: Option<String>,
}

/// Per-user activity event totals for the review views.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct ActivityCount {
    pub username: String,
    pub events: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_role_as_lowercase() {
        let user = User {
            username: "lars".to_string(),
            display_name: "Lars".to_string(),
            role: Role::Patient,
            auth_source: "local".to_string(),
            therapist_username: Some("mette".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"role\":\"patient\""));
        assert!(json.contains("\"therapist_username\":\"mette\""));
    }

    #[test]
    fn to_identity_carries_username_and_role() {
        let user = User {
            username: "mette".to_string(),
            display_name: "Mette Jensen".to_string(),
            role: Role::Therapist,
            auth_source: "sso".to_string(),
            therapist_username: None,
            created_at: Utc::now(),
        };
        let identity = user.to_identity();
        assert_eq!(identity.id, "mette");
        assert_eq!(identity.role, Role::Therapist);
    }

    #[test]
    fn payloads_deserialize_from_json() {
        let login: LoginPayload =
            serde_json::from_str(r#"{"username":"devadmin","password":"changeme123"}"#).unwrap();
        assert_eq!(login.username, "devadmin");

        let sso: SsoLoginPayload =
            serde_json::from_str(r#"{"email":"a@b.dk","role":"manager"}"#).unwrap();
        assert_eq!(sso.role, Role::Manager);

        let create: CreatePatientPayload = serde_json::from_str(
            r#"{"username":"lars","display_name":"Lars","password":"hemmeligt1"}"#,
        )
        .unwrap();
        assert_eq!(create.therapist_username, None);
    }
}
