pub mod chat_llm;
pub mod db;

pub use chat_llm::DeepseekChatAdapter;
pub use db::PgSessionStore;
