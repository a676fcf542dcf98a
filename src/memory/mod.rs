//! Conversation Memory
//!
//! Session state, the session store that owns it, and the context window
//! builder that decides what part of a transcript the provider sees.

pub mod context_manager;
pub mod session_store;
pub mod store;

pub use context_manager::{ContextConfig, ContextManager};
pub use session_store::{
    spawn_eviction_task, InMemorySessionStore, SessionHandle, SessionStore, TeardownHook,
};
pub use store::ConversationSession;
