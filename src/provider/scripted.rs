//! Scripted provider
//!
//! Plays back a fixed queue of replies in order. Used by the demo binary when
//! no API key is configured, and by the orchestrator tests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{ChatCompletion, ChatProvider, ChatRequest, TokenStream};
use crate::error::OrchestrationError;
use crate::Result;

/// One canned provider answer
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Answer to a non-streaming call
    Completion(ChatCompletion),
    /// Answer to a streaming call, one item per fragment
    Stream(Vec<String>),
    /// Stream that breaks after yielding `partial`
    BrokenStream { partial: Vec<String>, error: String },
    /// Either call fails before producing anything
    Fail(String),
}

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    latency: Duration,
    configured: bool,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            configured: true,
        }
    }

    /// Sleep this long before answering each call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Behave like a provider with no credentials
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Vec::new())
        }
    }

    /// Every request received so far, in call order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }

    async fn next_reply(&self, request: ChatRequest) -> Result<ScriptedReply> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        debug!(remaining = self.remaining(), "Scripted provider answering");
        reply.ok_or_else(|| OrchestrationError::ProviderUnavailable("script exhausted".to_string()))
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        match self.next_reply(request).await? {
            ScriptedReply::Completion(completion) => Ok(completion),
            ScriptedReply::Fail(message) => Err(OrchestrationError::ProviderUnavailable(message)),
            other => Err(OrchestrationError::ProviderResponse(format!(
                "expected a completion, script had {:?}",
                other
            ))),
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<TokenStream> {
        match self.next_reply(request).await? {
            ScriptedReply::Stream(fragments) => {
                Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            ScriptedReply::BrokenStream { partial, error } => {
                let items = partial
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(OrchestrationError::ProviderUnavailable(
                        error,
                    ))));
                Ok(stream::iter(items).boxed())
            }
            ScriptedReply::Completion(completion) => {
                let text = completion.content.unwrap_or_default();
                Ok(stream::iter(std::iter::once(Ok(text))).boxed())
            }
            ScriptedReply::Fail(message) => Err(OrchestrationError::ProviderUnavailable(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationTurn;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ConversationTurn::user("hi")],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_replies_in_order_and_records_requests() {
        let provider = ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::text("first")),
            ScriptedReply::Stream(vec!["a".into(), "b".into()]),
        ]);

        let completion = provider.complete(request()).await.unwrap();
        assert_eq!(completion.content.as_deref(), Some("first"));

        let pieces: Vec<String> = provider
            .stream(request())
            .await
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(pieces, vec!["a", "b"]);
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.remaining(), 0);
    }

    #[test]
    fn test_unconfigured_flag() {
        let provider = ScriptedProvider::unconfigured();
        assert!(!provider.is_configured());
        let err = tokio_test::block_on(provider.stream(request())).err().unwrap();
        assert!(matches!(err, OrchestrationError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_exhausted_script_is_provider_failure() {
        let provider = ScriptedProvider::new(Vec::new());
        let err = provider.complete(request()).await.unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn test_broken_stream_ends_with_error() {
        let provider = ScriptedProvider::new([ScriptedReply::BrokenStream {
            partial: vec!["Part".into()],
            error: "reset".into(),
        }]);

        let items: Vec<Result<String>> = provider.stream(request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
