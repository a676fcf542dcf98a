//! Core data models for the advisor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::OrchestrationError;

//
// ================= Scenario =================
//

/// Conversation scenario, fixed when a session is created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    BuyVsRent,
    RefinanceCheck,
    Affordability,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::BuyVsRent,
        Scenario::RefinanceCheck,
        Scenario::Affordability,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Scenario::BuyVsRent => "buy-vs-rent",
            Scenario::RefinanceCheck => "refinance-check",
            Scenario::Affordability => "affordability",
        }
    }

    /// Fixed instructions seeded as the first turn of every session
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Scenario::BuyVsRent => BUY_VS_RENT_PROMPT,
            Scenario::RefinanceCheck => REFINANCE_PROMPT,
            Scenario::Affordability => AFFORDABILITY_PROMPT,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Scenario {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.tag() == normalized)
            .ok_or_else(|| OrchestrationError::InvalidRequest(format!("unknown scenario '{}'", s)))
    }
}

const SHARED_RULES: &str = r#"Rules:
- Never compute mortgage, EMI, loan-to-value, rent comparison or refinance figures yourself. Always call the matching tool and quote its numbers.
- Amounts are in AED. Rates are annual decimal fractions (4.5% is 0.045). Durations are in years.
- If a required input is missing, ask the user for it instead of guessing.
- Keep answers short, structured and free of jargon."#;

const BUY_VS_RENT_PROMPT: &str = r#"You are a property-finance advisor helping a user decide whether to buy a home or keep renting.
Use analyze_buy_vs_rent once you know the property price and the monthly rent. Use calculate_mortgage for financing questions and calculate_emi for quick instalment checks.
Explain the recommendation in terms of how long the user plans to stay."#;

const REFINANCE_PROMPT: &str = r#"You are a property-finance advisor helping a user decide whether refinancing an existing mortgage is worthwhile.
Use analyze_refinance once you know the outstanding loan, the current rate, the remaining tenure, the offered rate and the switching costs. Use calculate_emi for quick instalment checks.
Always mention the break-even point."#;

const AFFORDABILITY_PROMPT: &str = r#"You are a property-finance advisor helping a user understand what a property purchase would cost them.
Use calculate_mortgage to work out the down payment, upfront costs and monthly instalment, and calculate_emi for what-if instalment checks."#;

impl Scenario {
    /// System instructions including the shared tool-use rules
    pub fn instructions(&self) -> String {
        format!("{}\n\n{}", self.system_prompt(), SHARED_RULES)
    }
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured request emitted by the provider to run a named calculation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw argument payload exactly as the provider sent it
    pub arguments: String,
}

/// One role-tagged entry in a session transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub turn_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    fn base(role: Role, content: String) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            role,
            content,
            tool_invocations: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content.into())
    }

    /// Assistant turn that requested one or more tool invocations
    pub fn assistant_with_invocations(
        content: impl Into<String>,
        invocations: Vec<ToolInvocation>,
    ) -> Self {
        Self {
            tool_invocations: invocations,
            ..Self::base(Role::Assistant, content.into())
        }
    }

    /// Tool result correlated to the invocation that produced it
    pub fn tool(invocation: &ToolInvocation, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(invocation.id.clone()),
            tool_name: Some(invocation.name.clone()),
            ..Self::base(Role::Tool, content.into())
        }
    }
}

//
// ================= Turn I/O =================
//

/// Inbound user turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub session_key: String,
    #[serde(alias = "scenarioTag")]
    pub scenario: String,
    #[serde(alias = "userText")]
    pub message: String,
}

/// Records produced for the caller during one turn
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Fragment {
        text: String,
        #[serde(rename = "toolUsed", skip_serializing_if = "Option::is_none")]
        tool_used: Option<String>,
    },
    Done,
}

impl TurnEvent {
    pub fn fragment(text: impl Into<String>, tool_used: Option<String>) -> Self {
        TurnEvent::Fragment {
            text: text.into(),
            tool_used,
        }
    }
}
