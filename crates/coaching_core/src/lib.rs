pub mod conversation;
pub mod domain;
pub mod phase;
pub mod ports;
pub mod prompts;

pub use conversation::{ConversationDriver, TurnOutcome};
pub use domain::{ChatMessage, ChatTurn, Phase, Role, Scenario, Session, SessionStatus, UserProfile};
pub use phase::{PhaseDetector, RuleBasedDetector};
pub use ports::{
    ChatCompletionService, ChatRequest, ChatStream, PortError, PortResult, PromptMessage,
    PromptRole, SessionStore,
};
pub use prompts::compose_system_prompt;
