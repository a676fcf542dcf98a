//! Conversation session state
//!
//! Holds the append-only transcript for one session key together with its
//! scenario and the advisory parameters gathered so far.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extractor::ExtractedParameters;
use crate::models::{ConversationTurn, Role, Scenario};

/// Full conversation state for one session key
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    scenario: Scenario,
    turns: Vec<ConversationTurn>,
    parameters: ExtractedParameters,
}

impl ConversationSession {
    /// Create a session seeded with the scenario's system turn
    pub fn new(session_key: impl Into<String>, scenario: Scenario) -> Self {
        Self {
            session_key: session_key.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            scenario,
            turns: vec![ConversationTurn::system(scenario.instructions())],
            parameters: ExtractedParameters::new(),
        }
    }

    /// Scenario fixed at creation
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Append a turn to the transcript
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn parameters(&self) -> &ExtractedParameters {
        &self.parameters
    }

    pub fn merge_parameters(&mut self, found: ExtractedParameters) {
        self.parameters.merge(found);
    }

    pub fn merge_raw_arguments(&mut self, arguments: &serde_json::Value) {
        self.parameters.merge_raw_arguments(arguments);
    }

    /// Every assistant invocation has a correlated tool turn after it
    pub fn has_dangling_invocations(&self) -> bool {
        self.turns.iter().enumerate().any(|(index, turn)| {
            turn.role == Role::Assistant
                && turn.tool_invocations.iter().any(|invocation| {
                    !self.turns[index + 1..].iter().any(|later| {
                        later.role == Role::Tool
                            && later.tool_call_id.as_deref() == Some(invocation.id.as_str())
                    })
                })
        })
    }
}
