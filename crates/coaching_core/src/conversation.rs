//! crates/coaching_core/src/conversation.rs
//!
//! Orchestrates one full turn of a coaching conversation: persist the user
//! message, compose the system prompt, call the language model (batch or
//! streaming), persist the reply, and run phase detection over the updated
//! history.

use crate::domain::{ChatMessage, Phase, Role, Session, UserProfile};
use crate::phase::PhaseDetector;
use crate::ports::{
    ChatCompletionService, ChatRequest, PortError, PortResult, PromptMessage, PromptRole,
    SessionStore,
};
use crate::prompts::compose_system_prompt;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Sampling parameters sent with every chat-completions request.
const MAX_COMPLETION_TOKENS: u32 = 1024;
const SAMPLING_TEMPERATURE: f32 = 0.7;

/// The result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant's full reply text.
    pub reply: String,
    /// The session phase after detection ran (possibly advanced).
    pub phase: Phase,
}

/// Everything prepared before the language-model call is made.
struct PreparedTurn {
    session_id: Uuid,
    /// The phase the turn runs under; both messages of the turn are tagged
    /// with it, and detection compares against it afterwards.
    phase: Phase,
}

/// Drives multi-turn coaching dialogues against the two external
/// collaborators. One instance is shared across all requests.
pub struct ConversationDriver {
    store: Arc<dyn SessionStore>,
    chat: Arc<dyn ChatCompletionService>,
    detector: Arc<dyn PhaseDetector>,
}

impl ConversationDriver {
    pub fn new(
        store: Arc<dyn SessionStore>,
        chat: Arc<dyn ChatCompletionService>,
        detector: Arc<dyn PhaseDetector>,
    ) -> Self {
        Self {
            store,
            chat,
            detector,
        }
    }

    /// Handles one turn in batch mode: a single request, a single complete
    /// reply.
    pub async fn handle_turn(&self, session_id: Uuid, user_text: &str) -> PortResult<TurnOutcome> {
        let (prepared, request) = self.prepare_turn(session_id, user_text).await?;

        let reply = self.chat.complete(request).await?;
        if reply.trim().is_empty() {
            return Err(PortError::Upstream(
                "language model returned an empty completion".to_string(),
            ));
        }

        self.finish_turn(prepared, reply).await
    }

    /// Handles one turn in streaming mode.
    ///
    /// Each decoded fragment is forwarded through `fragment_tx` as soon as it
    /// arrives while being accumulated into the full reply. A closed receiver
    /// (client disconnected mid-stream) stops the forwarding but never the
    /// turn: whatever was generated is still persisted so the conversation
    /// stays consistent for the next turn.
    pub async fn handle_turn_streaming(
        &self,
        session_id: Uuid,
        user_text: &str,
        fragment_tx: mpsc::Sender<String>,
    ) -> PortResult<TurnOutcome> {
        let (prepared, request) = self.prepare_turn(session_id, user_text).await?;

        let mut stream = self.chat.complete_stream(request).await?;
        let mut reply = String::new();
        let mut forwarding = true;

        while let Some(next) = stream.next().await {
            let fragment = match next {
                Ok(fragment) => fragment,
                Err(e) => {
                    // Treat a transport failure like an unterminated close:
                    // whatever arrived so far stands as the final content.
                    warn!(session_id = %session_id, error = %e, "reply stream ended early");
                    break;
                }
            };
            if fragment.is_empty() {
                continue;
            }
            reply.push_str(&fragment);
            if forwarding && fragment_tx.send(fragment).await.is_err() {
                warn!(session_id = %session_id, "client went away mid-stream; continuing to accumulate");
                forwarding = false;
            }
        }

        if reply.trim().is_empty() {
            return Err(PortError::Upstream(
                "reply stream closed without producing content".to_string(),
            ));
        }

        self.finish_turn(prepared, reply).await
    }

    /// Steps 1-5 of a turn: load state, persist the user message at the
    /// current phase, and build the full request for the stateless model.
    async fn prepare_turn(
        &self,
        session_id: Uuid,
        user_text: &str,
    ) -> PortResult<(PreparedTurn, ChatRequest)> {
        if session_id.is_nil() {
            return Err(PortError::Validation("session id is required".to_string()));
        }
        if user_text.trim().is_empty() {
            return Err(PortError::Validation(
                "message text is required".to_string(),
            ));
        }

        let session = self.store.get_session(session_id).await?;
        let profile = self.store.get_user_profile(session.user_id).await?;
        let history = self.store.get_messages(session_id).await?;

        let phase = session.current_phase;

        // The user message is accepted before the model call and is never
        // rolled back if the call fails (at-least-once write).
        self.store
            .create_message(session_id, Role::User, user_text, phase)
            .await?;
        self.store.increment_message_count(session_id).await?;

        let request = build_request(&session, &profile, phase, &history, user_text);

        Ok((PreparedTurn { session_id, phase }, request))
    }

    /// Steps 7-12 of a turn: persist the reply, re-detect the phase over the
    /// full updated history, and persist a forward transition if one fired.
    async fn finish_turn(&self, prepared: PreparedTurn, reply: String) -> PortResult<TurnOutcome> {
        let PreparedTurn { session_id, phase } = prepared;

        self.store
            .create_message(session_id, Role::Assistant, &reply, phase)
            .await?;
        self.store.increment_message_count(session_id).await?;

        let history: Vec<_> = self
            .store
            .get_messages(session_id)
            .await?
            .iter()
            .map(|message| message.to_turn())
            .collect();

        let detected = self.detector.detect(&history, phase);
        if detected != phase {
            self.store.update_current_phase(session_id, detected).await?;
            info!(
                session_id = %session_id,
                "[GROW阶段切换] {} → {}",
                phase.display_name(),
                detected.display_name(),
            );
        }

        Ok(TurnOutcome {
            reply,
            phase: detected,
        })
    }
}

/// Builds the complete message list for the stateless model: system prompt,
/// the entire prior history in chronological order, then the new user message.
fn build_request(
    session: &Session,
    profile: &UserProfile,
    phase: Phase,
    history: &[ChatMessage],
    user_text: &str,
) -> ChatRequest {
    let system_prompt = compose_system_prompt(phase, session.scenario, &profile.as_prompt_text());

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::new(PromptRole::System, system_prompt));
    for message in history {
        messages.push(PromptMessage::new(message.role.into(), message.content.clone()));
    }
    messages.push(PromptMessage::new(PromptRole::User, user_text));

    ChatRequest {
        messages,
        max_tokens: MAX_COMPLETION_TOKENS,
        temperature: SAMPLING_TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatTurn, Scenario, SessionStatus};
    use crate::phase::RuleBasedDetector;
    use crate::ports::ChatStream;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory `SessionStore` for driver tests.
    struct MemoryStore {
        session: Mutex<Session>,
        profile: UserProfile,
        messages: Mutex<Vec<ChatMessage>>,
    }

    impl MemoryStore {
        fn new(scenario: Scenario, phase: Phase) -> Self {
            let session = Session {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                scenario,
                status: SessionStatus::InProgress,
                current_phase: phase,
                message_count: 0,
                started_at: Utc::now(),
                ended_at: None,
                duration_seconds: None,
            };
            Self {
                session: Mutex::new(session),
                profile: UserProfile::default(),
                messages: Mutex::new(Vec::new()),
            }
        }

        fn session_id(&self) -> Uuid {
            self.session.lock().unwrap().id
        }

        fn current_phase(&self) -> Phase {
            self.session.lock().unwrap().current_phase
        }

        fn stored_messages(&self) -> Vec<ChatMessage> {
            self.messages.lock().unwrap().clone()
        }

        /// Seeds prior turns so threshold gates can be exercised.
        fn seed_turns(&self, turns: &[ChatTurn], phase: Phase) {
            let mut messages = self.messages.lock().unwrap();
            let session_id = self.session.lock().unwrap().id;
            for turn in turns {
                messages.push(ChatMessage {
                    id: Uuid::new_v4(),
                    session_id,
                    role: turn.role,
                    content: turn.content.clone(),
                    phase,
                    created_at: Utc::now(),
                });
            }
        }
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn create_session(&self, _user_id: Uuid, _scenario: Scenario) -> PortResult<Session> {
            unimplemented!("not exercised by driver tests")
        }

        async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
            let session = self.session.lock().unwrap().clone();
            if session.id == session_id {
                Ok(session)
            } else {
                Err(PortError::NotFound(format!("Session {} not found", session_id)))
            }
        }

        async fn list_sessions_by_user(&self, _user_id: Uuid) -> PortResult<Vec<Session>> {
            Ok(vec![self.session.lock().unwrap().clone()])
        }

        async fn complete_session(&self, _session_id: Uuid) -> PortResult<Session> {
            unimplemented!("not exercised by driver tests")
        }

        async fn create_message(
            &self,
            session_id: Uuid,
            role: Role,
            content: &str,
            phase: Phase,
        ) -> PortResult<ChatMessage> {
            let message = ChatMessage {
                id: Uuid::new_v4(),
                session_id,
                role,
                content: content.to_string(),
                phase,
                created_at: Utc::now(),
            };
            self.messages.lock().unwrap().push(message.clone());
            Ok(message)
        }

        async fn get_messages(&self, _session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
            Ok(self.messages.lock().unwrap().clone())
        }

        async fn increment_message_count(&self, _session_id: Uuid) -> PortResult<()> {
            self.session.lock().unwrap().message_count += 1;
            Ok(())
        }

        async fn update_current_phase(&self, _session_id: Uuid, phase: Phase) -> PortResult<()> {
            self.session.lock().unwrap().current_phase = phase;
            Ok(())
        }

        async fn get_user_profile(&self, _user_id: Uuid) -> PortResult<UserProfile> {
            Ok(self.profile.clone())
        }
    }

    /// Chat service returning a canned reply, recording the last request.
    struct FixedChat {
        reply: Option<String>,
        fragments: Vec<String>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl FixedChat {
        fn batch(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                fragments: Vec::new(),
                last_request: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                fragments: Vec::new(),
                last_request: Mutex::new(None),
            }
        }

        fn streaming(fragments: &[&str]) -> Self {
            Self {
                reply: None,
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatCompletionService for FixedChat {
        async fn complete(&self, request: ChatRequest) -> PortResult<String> {
            *self.last_request.lock().unwrap() = Some(request);
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(PortError::Upstream(
                    "completion response contained no choices".to_string(),
                )),
            }
        }

        async fn complete_stream(&self, request: ChatRequest) -> PortResult<ChatStream> {
            *self.last_request.lock().unwrap() = Some(request);
            let fragments = self.fragments.clone();
            Ok(Box::pin(futures::stream::iter(
                fragments.into_iter().map(Ok::<String, PortError>),
            )) as ChatStream)
        }
    }

    fn driver(store: Arc<MemoryStore>, chat: Arc<FixedChat>) -> ConversationDriver {
        ConversationDriver::new(store, chat, Arc::new(RuleBasedDetector::new()))
    }

    #[tokio::test]
    async fn batch_turn_persists_both_messages_and_counts() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::batch("听起来这件事对你很重要，可以展开说说吗？"));
        let driver = driver(store.clone(), chat.clone());

        let outcome = driver
            .handle_turn(store.session_id(), "最近团队协作出了些问题")
            .await
            .unwrap();

        assert_eq!(outcome.phase, Phase::Goal);
        let messages = store.stored_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].phase, Phase::Goal);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].phase, Phase::Goal);
        assert_eq!(store.session.lock().unwrap().message_count, 2);
    }

    #[tokio::test]
    async fn request_replays_full_history_with_system_prompt_first() {
        let store = Arc::new(MemoryStore::new(Scenario::CareerDevelopment, Phase::Goal));
        store.seed_turns(
            &[
                ChatTurn::user("想聊聊职业方向"),
                ChatTurn::assistant("好的，你最想探索什么？"),
            ],
            Phase::Goal,
        );
        let chat = Arc::new(FixedChat::batch("我们继续。"));
        let driver = driver(store.clone(), chat.clone());

        driver
            .handle_turn(store.session_id(), "我想转向产品岗位")
            .await
            .unwrap();

        let request = chat.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, PromptRole::System);
        assert!(request.messages[0].content.contains("职业发展"));
        assert_eq!(request.messages[1].role, PromptRole::User);
        assert_eq!(request.messages[2].role, PromptRole::Assistant);
        assert_eq!(request.messages[3].content, "我想转向产品岗位");
        assert_eq!(request.max_tokens, 1024);
    }

    #[tokio::test]
    async fn third_goal_turn_with_signal_advances_to_reality() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let goal_text = "我的目标是在三个月内提升团队协作效率，衡量标准是项目delay率下降";
        store.seed_turns(
            &[
                ChatTurn::user(goal_text),
                ChatTurn::assistant("这个目标对你意味着什么？"),
                ChatTurn::user(goal_text),
                ChatTurn::assistant("如何衡量它的达成？"),
            ],
            Phase::Goal,
        );
        let chat = Arc::new(FixedChat::batch("目标听起来已经很清晰了。"));
        let driver = driver(store.clone(), chat);

        let outcome = driver.handle_turn(store.session_id(), goal_text).await.unwrap();

        assert_eq!(outcome.phase, Phase::Reality);
        assert_eq!(store.current_phase(), Phase::Reality);
        // Both messages of the turn are tagged with the phase they were
        // produced under, not the phase after the transition.
        let messages = store.stored_messages();
        assert!(messages.iter().all(|m| m.phase == Phase::Goal));
    }

    #[tokio::test]
    async fn upstream_failure_keeps_user_message_and_phase() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::failing());
        let driver = driver(store.clone(), chat);

        let err = driver
            .handle_turn(store.session_id(), "帮我理理思路")
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Upstream(_)));
        let messages = store.stored_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(store.current_phase(), Phase::Goal);
    }

    #[tokio::test]
    async fn empty_batch_reply_is_upstream_error() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::batch("   "));
        let driver = driver(store.clone(), chat);

        let err = driver
            .handle_turn(store.session_id(), "在吗")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
    }

    #[tokio::test]
    async fn validation_happens_before_any_persistence() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::batch("好的"));
        let driver = driver(store.clone(), chat);

        let err = driver.handle_turn(store.session_id(), "   ").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        let err = driver.handle_turn(Uuid::nil(), "你好").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        assert!(store.stored_messages().is_empty());
        assert_eq!(store.session.lock().unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::batch("好的"));
        let driver = driver(store, chat);

        let err = driver.handle_turn(Uuid::new_v4(), "你好").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn streaming_turn_forwards_fragments_and_persists_full_reply() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::streaming(&["你好", "！", "今天想聊什么？"]));
        let driver = driver(store.clone(), chat);

        let (tx, mut rx) = mpsc::channel(8);
        let outcome = driver
            .handle_turn_streaming(store.session_id(), "你好", tx)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "你好！今天想聊什么？");
        let mut forwarded = String::new();
        while let Ok(fragment) = rx.try_recv() {
            forwarded.push_str(&fragment);
        }
        assert_eq!(forwarded, outcome.reply);

        let messages = store.stored_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "你好！今天想聊什么？");
    }

    #[tokio::test]
    async fn streaming_turn_survives_dropped_receiver() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::streaming(&["第一段", "第二段", "第三段"]));
        let driver = driver(store.clone(), chat);

        let (tx, rx) = mpsc::channel(8);
        drop(rx); // client disconnected before the first fragment
        let outcome = driver
            .handle_turn_streaming(store.session_id(), "继续", tx)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "第一段第二段第三段");
        assert_eq!(store.stored_messages().len(), 2);
    }

    #[tokio::test]
    async fn empty_stream_is_upstream_error() {
        let store = Arc::new(MemoryStore::new(Scenario::WorkProblem, Phase::Goal));
        let chat = Arc::new(FixedChat::streaming(&[]));
        let driver = driver(store.clone(), chat);

        let (tx, _rx) = mpsc::channel(8);
        let err = driver
            .handle_turn_streaming(store.session_id(), "在吗", tx)
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Upstream(_)));
        // The user message from step 2 is kept even though the turn failed.
        assert_eq!(store.stored_messages().len(), 1);
    }
}
