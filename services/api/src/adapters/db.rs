//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coaching_core::domain::{
    ChatMessage, Phase, Role, Scenario, Session, SessionStatus, UserProfile,
};
use coaching_core::ports::{PortError, PortResult, SessionStore};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionStore` port.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new `PgSessionStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    scenario: String,
    status: String,
    current_phase: String,
    message_count: i32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i32>,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let scenario = Scenario::from_str(&self.scenario)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown scenario '{}'", self.scenario)))?;
        let status = SessionStatus::from_str(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown status '{}'", self.status)))?;
        let current_phase = Phase::from_str(&self.current_phase).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown phase '{}'", self.current_phase))
        })?;

        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            scenario,
            status,
            current_phase,
            message_count: self.message_count,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_seconds: self.duration_seconds,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    phase: String,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let role = Role::from_str(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown role '{}'", self.role)))?;
        let phase = Phase::from_str(&self.phase)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown phase '{}'", self.phase)))?;

        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            role,
            content: self.content,
            phase,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    role: Option<String>,
    business_line: Option<String>,
    work_style: Option<String>,
    development_goal: Option<String>,
    work_challenge: Option<String>,
}

impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            role: self.role,
            business_line: self.business_line,
            work_style: self.work_style,
            development_goal: self.development_goal,
            work_challenge: self.work_challenge,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, scenario, status, current_phase, message_count, started_at, ended_at, duration_seconds";

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, user_id: Uuid, scenario: Scenario) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, user_id, scenario) VALUES ($1, $2, $3) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(scenario.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Session {} not found", session_id)))?;

        record.to_domain()
    }

    async fn list_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn complete_session(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE sessions
             SET status = 'completed',
                 ended_at = now(),
                 duration_seconds = EXTRACT(EPOCH FROM (now() - started_at))::INT
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Session {} not found", session_id)))?;

        record.to_domain()
    }

    async fn create_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
        phase: Phase,
    ) -> PortResult<ChatMessage> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, session_id, role, content, phase)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, session_id, role, content, phase, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(phase.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn get_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, session_id, role, content, phase, created_at
             FROM messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn increment_message_count(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET message_count = message_count + 1 WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_current_phase(&self, session_id: Uuid, phase: Phase) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET current_phase = $1 WHERE id = $2")
            .bind(phase.as_str())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_user_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        // A user without an onboarding row is not an error: the composer
        // renders every missing field as a placeholder.
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT role, business_line, work_style, development_goal, work_challenge
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(|r| r.to_domain()).unwrap_or_default())
    }
}
