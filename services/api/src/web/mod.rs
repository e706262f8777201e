pub mod chat;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use chat::{chat_handler, chat_stream_handler};
pub use rest::{
    complete_session_handler, create_session_handler, get_session_handler, list_sessions_handler,
};
