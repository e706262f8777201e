//! crates/coaching_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{ChatMessage, Phase, Role, Scenario, Session, UserProfile};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The referenced session (or other entity) does not exist.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A required turn input was missing or malformed. Raised before any persistence.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// The language-model collaborator failed, returned an empty completion,
    /// or produced a stream with no content.
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Language-Model Request Types
//=========================================================================================

/// Message roles understood by the chat-completions API. Unlike
/// [`Role`], this includes the system prompt slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        }
    }
}

/// One role-tagged entry in a chat-completions request.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        PromptMessage {
            role,
            content: content.into(),
        }
    }
}

/// A complete request to the language-model collaborator. The model name is
/// adapter configuration, not part of the core contract.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<PromptMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// An incremental sequence of decoded reply fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistence collaborator for sessions, messages, and user profiles.
#[async_trait]
pub trait SessionStore: Send + Sync {
    // --- Session Lifecycle ---
    async fn create_session(&self, user_id: Uuid, scenario: Scenario) -> PortResult<Session>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    async fn list_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<Session>>;

    /// Marks the session completed, recording its end time and duration.
    async fn complete_session(&self, session_id: Uuid) -> PortResult<Session>;

    // --- Turn State ---
    async fn create_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
        phase: Phase,
    ) -> PortResult<ChatMessage>;

    /// Returns every message of the session, ordered by creation time ascending.
    async fn get_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    async fn increment_message_count(&self, session_id: Uuid) -> PortResult<()>;

    async fn update_current_phase(&self, session_id: Uuid, phase: Phase) -> PortResult<()>;

    // --- Profile ---
    /// Fetches the onboarding profile for a user. A missing profile is not an
    /// error; implementations return an empty profile so every field renders
    /// as a placeholder.
    async fn get_user_profile(&self, user_id: Uuid) -> PortResult<UserProfile>;
}

/// The external language-model collaborator.
#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// One request, one complete response string.
    async fn complete(&self, request: ChatRequest) -> PortResult<String>;

    /// One request, an incremental stream of decoded text fragments.
    async fn complete_stream(&self, request: ChatRequest) -> PortResult<ChatStream>;
}
