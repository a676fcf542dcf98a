//! Remote language-model provider
//!
//! The provider carries the dialogue and decides when to request a tool. It
//! never does the arithmetic itself.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::{ConversationTurn, ToolInvocation};
use crate::tools::ToolDefinition;
use crate::Result;

pub mod openai_compat;
pub mod scripted;

pub use openai_compat::OpenAiCompatProvider;
pub use scripted::{ScriptedProvider, ScriptedReply};

/// Incremental narrative text from a streaming call
pub type TokenStream = BoxStream<'static, Result<String>>;

/// One provider round
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
    pub tools: Vec<ToolDefinition>,
}

/// Complete (non-streaming) provider response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_invocations: Vec::new(),
        }
    }

    pub fn with_invocations(tool_invocations: Vec<ToolInvocation>) -> Self {
        Self {
            content: None,
            tool_invocations,
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Whether credentials are present. An unconfigured provider fails the
    /// turn up front instead of degrading mid-stream.
    fn is_configured(&self) -> bool;

    /// Single-shot call with tool choice enabled
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;

    /// Token-streaming call
    async fn stream(&self, request: ChatRequest) -> Result<TokenStream>;
}
