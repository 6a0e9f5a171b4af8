//! Data Access Layer
//!
//! This module contains all the functions for interacting with the
//! PostgreSQL database. Queries are runtime-checked so the crate builds
//! without a live database; `sqlx` still provides the pooling and the
//! migration runner.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use samtale_core::activity::{ActivityLog, EventType};
use samtale_core::identity::{Identity, Role};
use sqlx::{FromRow, PgPool};

use crate::models::{ActivityCount, User};

const USER_COLUMNS: &str =
    "username, display_name, role, auth_source, therapist_username, created_at";

#[derive(FromRow)]
struct UserWithHash {
    username: String,
    display_name: String,
    #[sqlx(try_from = "String")]
    role: Role,
    auth_source: String,
    therapist_username: Option<String>,
    created_at: DateTime<Utc>,
    password_hash: Option<String>,
}

impl UserWithHash {
    fn split(self) -> (User, Option<String>) {
        (
            User {
                username: self.username,
                display_name: self.display_name,
                role: self.role,
                auth_source: self.auth_source,
                therapist_username: self.therapist_username,
                created_at: self.created_at,
            },
            self.password_hash,
        )
    }
}

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Fetches a user together with the stored password hash, for
    /// authentication only.
    pub async fn get_user_with_hash(
        &self,
        username: &str,
    ) -> Result<Option<(User, Option<String>)>> {
        let row = sqlx::query_as::<_, UserWithHash>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserWithHash::split))
    }

    pub async fn insert_user(
        &self,
        username: &str,
        display_name: &str,
        role: Role,
        auth_source: &str,
        password_hash: Option<&str>,
        therapist_username: Option<&str>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, display_name, role, auth_source, password_hash, therapist_username)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(display_name)
        .bind(role.as_str())
        .bind(auth_source)
        .bind(password_hash)
        .bind(therapist_username)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Inserts or refreshes a provisioned staff account. SSO accounts never
    /// hold a local password hash or a therapist link.
    pub async fn upsert_sso_user(
        &self,
        username: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, display_name, role, auth_source)
            VALUES ($1, $2, $3, 'sso')
            ON CONFLICT (username) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                auth_source = 'sso',
                password_hash = NULL,
                therapist_username = NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(display_name)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn count_users(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY role, username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn get_therapists(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'therapist' ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn get_patients_for_therapist(&self, therapist: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE role = 'patient' AND therapist_username = $1
            ORDER BY username
            "#
        ))
        .bind(therapist)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn insert_event(
        &self,
        username: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query("INSERT INTO activity_logs (username, event_type, payload) VALUES ($1, $2, $3)")
            .bind(username)
            .bind(event_type)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Event totals per user, optionally restricted to a set of usernames,
    /// busiest users first.
    pub async fn activity_counts(
        &self,
        usernames: Option<&[String]>,
    ) -> Result<Vec<ActivityCount>> {
        let counts = sqlx::query_as::<_, ActivityCount>(
            r#"
            SELECT username, COUNT(id) AS events
            FROM activity_logs
            WHERE $1::text[] IS NULL OR username = ANY($1)
            GROUP BY username
            ORDER BY events DESC
            "#,
        )
        .bind(usernames)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[async_trait]
impl ActivityLog for Db {
    async fn record_event(
        &self,
        identity: &Identity,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.insert_event(&identity.id, event_type.as_str(), &payload)
            .await
    }
}
