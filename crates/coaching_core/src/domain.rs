//! crates/coaching_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four stages of a GROW coaching conversation, in order.
///
/// A session only ever moves forward through this sequence; `Will` is the
/// terminal stage and holds until the session is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Goal,
    Reality,
    Options,
    Will,
}

impl Phase {
    /// The stage that follows this one, or `None` for the terminal stage.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Goal => Some(Phase::Reality),
            Phase::Reality => Some(Phase::Options),
            Phase::Options => Some(Phase::Will),
            Phase::Will => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Goal => "goal",
            Phase::Reality => "reality",
            Phase::Options => "options",
            Phase::Will => "will",
        }
    }

    pub fn from_str(s: &str) -> Option<Phase> {
        match s {
            "goal" => Some(Phase::Goal),
            "reality" => Some(Phase::Reality),
            "options" => Some(Phase::Options),
            "will" => Some(Phase::Will),
            _ => None,
        }
    }

    /// Human-readable Chinese label, used for logging only.
    pub fn display_name(self) -> &'static str {
        match self {
            Phase::Goal => "目标设定",
            Phase::Reality => "现状分析",
            Phase::Options => "方案选择",
            Phase::Will => "行动计划",
        }
    }

    /// The label substituted into the coaching persona prompt.
    pub fn prompt_label(self) -> &'static str {
        match self {
            Phase::Goal => "G - 目标设定",
            Phase::Reality => "R - 现状分析",
            Phase::Options => "O - 方案选择",
            Phase::Will => "W - 行动计划",
        }
    }
}

/// The conversation topic chosen when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    WorkProblem,
    CareerDevelopment,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::WorkProblem => "work_problem",
            Scenario::CareerDevelopment => "career_development",
        }
    }

    pub fn from_str(s: &str) -> Option<Scenario> {
        match s {
            "work_problem" => Some(Scenario::WorkProblem),
            "career_development" => Some(Scenario::CareerDevelopment),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Scenario::WorkProblem => "工作难题",
            Scenario::CareerDevelopment => "职业发展",
        }
    }
}

/// Who authored a message within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<SessionStatus> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// Represents one coaching conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scenario: Scenario,
    pub status: SessionStatus,
    pub current_phase: Phase,
    pub message_count: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
}

/// One turn of dialogue within a session. Append-only, never mutated.
///
/// `phase` records the stage that was active when the message was produced,
/// not the stage after any transition triggered by the same turn.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// The minimal view of a message consumed by the phase detector and the
/// language-model request builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Onboarding profile fields interpolated into the system prompt.
///
/// The core only reads this; ownership lives with the persistence layer.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub role: Option<String>,
    pub business_line: Option<String>,
    pub work_style: Option<String>,
    pub development_goal: Option<String>,
    pub work_challenge: Option<String>,
}

const FIELD_NOT_SET: &str = "未设置";

impl UserProfile {
    /// Renders the profile block interpolated into the system prompt.
    ///
    /// Missing fields are rendered as an explicit 未设置 placeholder rather
    /// than omitted, so the model never fills the gap with invention.
    pub fn as_prompt_text(&self) -> String {
        let field = |v: &Option<String>| -> String {
            match v {
                Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => FIELD_NOT_SET.to_string(),
            }
        };
        format!(
            "角色：{}\n业务线：{}\n工作风格：{}\n发展目标：{}\n工作挑战：{}",
            field(&self.role),
            field(&self.business_line),
            field(&self.work_style),
            field(&self.development_goal),
            field(&self.work_challenge),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_sequence_is_forward_only() {
        assert_eq!(Phase::Goal.next(), Some(Phase::Reality));
        assert_eq!(Phase::Reality.next(), Some(Phase::Options));
        assert_eq!(Phase::Options.next(), Some(Phase::Will));
        assert_eq!(Phase::Will.next(), None);
        assert!(Phase::Goal < Phase::Will);
    }

    #[test]
    fn enum_string_round_trips() {
        for phase in [Phase::Goal, Phase::Reality, Phase::Options, Phase::Will] {
            assert_eq!(Phase::from_str(phase.as_str()), Some(phase));
        }
        for scenario in [Scenario::WorkProblem, Scenario::CareerDevelopment] {
            assert_eq!(Scenario::from_str(scenario.as_str()), Some(scenario));
        }
        assert_eq!(Phase::from_str("grow"), None);
    }

    #[test]
    fn empty_profile_renders_placeholders() {
        let text = UserProfile::default().as_prompt_text();
        assert_eq!(text.matches("未设置").count(), 5);
        assert!(text.starts_with("角色：未设置"));
    }

    #[test]
    fn profile_fields_appear_verbatim() {
        let profile = UserProfile {
            role: Some("产品经理".to_string()),
            work_challenge: Some("  跨团队沟通  ".to_string()),
            ..Default::default()
        };
        let text = profile.as_prompt_text();
        assert!(text.contains("角色：产品经理"));
        assert!(text.contains("工作挑战：跨团队沟通"));
        assert_eq!(text.matches("未设置").count(), 3);
    }
}
