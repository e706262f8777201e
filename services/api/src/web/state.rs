//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use coaching_core::conversation::ConversationDriver;
use coaching_core::ports::SessionStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub driver: Arc<ConversationDriver>,
    pub config: Arc<Config>,
}
