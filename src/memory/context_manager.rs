//! Context Window Management
//!
//! Derives the bounded slice of a transcript sent to the provider each round.
//! The leading system turn is always kept, and the trailing slice never opens
//! on a tool result whose originating assistant turn was cut off.

use crate::models::{ConversationTurn, Role};
use tracing::debug;

/// Configuration for context window management
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Number of most recent turns kept after the system turn; 0 is read as 1
    pub window_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { window_size: 10 }
    }
}

/// Builds provider context windows
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn with_window_size(window_size: usize) -> Self {
        Self::with_config(ContextConfig { window_size })
    }

    /// Ordered subsequence of `turns` to send to the provider
    pub fn build_window<'a>(&self, turns: &'a [ConversationTurn]) -> Vec<&'a ConversationTurn> {
        let window = self.config.window_size.max(1);

        if turns.len() <= window + 1 {
            return turns.iter().collect();
        }

        let mut start = turns.len() - window;
        while start > 1 && turns[start].role == Role::Tool {
            start -= 1;
        }

        debug!(
            total_turns = turns.len(),
            trailing_start = start,
            "Trimmed context window"
        );

        let mut context = Vec::with_capacity(turns.len() - start + 1);
        context.push(&turns[0]);
        context.extend(turns[start..].iter());
        context
    }
}
