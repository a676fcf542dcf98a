//! Tool definitions and dispatcher
//!
//! Tools are deterministic, side-effect-free calculations. The dispatcher
//! turns a provider-emitted invocation into a typed `ToolCall`, runs it
//! against the calculator, and always hands back a serializable
//! `ToolResult`. Nothing here returns an error to the caller.

use serde::Serialize;
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calculator;
use crate::models::{Scenario, ToolInvocation};

pub mod args;

pub use args::{BuyVsRentArgs, EmiArgs, MortgageArgs, RefinanceArgs, ToolArguments};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("missing required argument(s): {}", .0.join(", "))]
    MissingArguments(Vec<String>),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("malformed tool arguments: {0}")]
    MalformedArguments(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool execution failed: {0}")]
    Internal(String),
}

//
// ================= Tool catalogue =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Mortgage,
    BuyVsRent,
    Refinance,
    Emi,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Mortgage,
        ToolKind::BuyVsRent,
        ToolKind::Refinance,
        ToolKind::Emi,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Mortgage => "calculate_mortgage",
            ToolKind::BuyVsRent => "analyze_buy_vs_rent",
            ToolKind::Refinance => "analyze_refinance",
            ToolKind::Emi => "calculate_emi",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Calculation kinds accepted by the direct calculation endpoint
    pub fn from_calculation_kind(kind: &str) -> Option<Self> {
        match kind.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "mortgage" => Some(ToolKind::Mortgage),
            "buyvsrent" => Some(ToolKind::BuyVsRent),
            "refinance" => Some(ToolKind::Refinance),
            "emi" => Some(ToolKind::Emi),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Mortgage => "Work out down payment, loan amount, loan-to-value, upfront costs and monthly EMI for a property purchase. Applies the minimum down payment and maximum loan-to-value rules.",
            ToolKind::BuyVsRent => "Compare buying a property with renting over the user's planned stay and return a rent/buy/neutral recommendation with the mortgage figures behind it.",
            ToolKind::Refinance => "Compare the current mortgage with a new rate over the remaining tenure: monthly savings, break-even point, total savings and a recommendation.",
            ToolKind::Emi => "Compute the monthly instalment (EMI) for a loan amount, annual rate and tenure in years.",
        }
    }

    pub fn parameters(&self) -> Value {
        let amount = |description: &str| json!({ "type": "number", "description": description });

        match self {
            ToolKind::Mortgage => json!({
                "type": "object",
                "properties": {
                    "propertyPrice": amount("Property price in AED"),
                    "downPayment": amount("Down payment in AED (minimum 20% of price)"),
                    "tenure": amount("Loan tenure in years (maximum 25)"),
                    "rate": amount("Annual interest rate as a decimal, e.g. 0.045"),
                },
                "required": MortgageArgs::REQUIRED,
            }),
            ToolKind::BuyVsRent => json!({
                "type": "object",
                "properties": {
                    "propertyPrice": amount("Property price in AED"),
                    "monthlyRent": amount("Current or expected monthly rent in AED"),
                    "downPayment": amount("Down payment in AED"),
                    "tenure": amount("Loan tenure in years"),
                    "stayDuration": amount("How many years the user plans to stay"),
                    "rate": amount("Annual interest rate as a decimal"),
                },
                "required": BuyVsRentArgs::REQUIRED,
            }),
            ToolKind::Refinance => json!({
                "type": "object",
                "properties": {
                    "currentLoanAmount": amount("Outstanding loan balance in AED"),
                    "currentRate": amount("Current annual rate as a decimal"),
                    "currentTenure": amount("Remaining tenure in years"),
                    "newRate": amount("Offered annual rate as a decimal"),
                    "switchingCosts": amount("Total cost of switching in AED"),
                },
                "required": RefinanceArgs::REQUIRED,
            }),
            ToolKind::Emi => json!({
                "type": "object",
                "properties": {
                    "loanAmount": amount("Loan amount in AED"),
                    "rate": amount("Annual interest rate as a decimal"),
                    "tenure": amount("Tenure in years"),
                },
                "required": EmiArgs::REQUIRED,
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool schema advertised to the provider
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tools offered to the provider for a scenario
pub fn tools_for(scenario: Scenario) -> &'static [ToolKind] {
    match scenario {
        Scenario::BuyVsRent => &[ToolKind::BuyVsRent, ToolKind::Mortgage, ToolKind::Emi],
        Scenario::RefinanceCheck => &[ToolKind::Refinance, ToolKind::Emi],
        Scenario::Affordability => &[ToolKind::Mortgage, ToolKind::Emi],
    }
}

//
// ================= Typed calls =================
//

/// A validated invocation, one variant per tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Mortgage(MortgageArgs),
    BuyVsRent(BuyVsRentArgs),
    Refinance(RefinanceArgs),
    Emi(EmiArgs),
}

impl ToolCall {
    pub fn parse(kind: ToolKind, arguments: &Value) -> Result<Self, DispatchError> {
        Ok(match kind {
            ToolKind::Mortgage => ToolCall::Mortgage(MortgageArgs::from_value(arguments)?),
            ToolKind::BuyVsRent => ToolCall::BuyVsRent(BuyVsRentArgs::from_value(arguments)?),
            ToolKind::Refinance => ToolCall::Refinance(RefinanceArgs::from_value(arguments)?),
            ToolKind::Emi => ToolCall::Emi(EmiArgs::from_value(arguments)?),
        })
    }

    fn execute(self) -> Result<Value, DispatchError> {
        let output = match self {
            ToolCall::Mortgage(args) => serde_json::to_value(calculator::mortgage(args.into())),
            ToolCall::BuyVsRent(args) => serde_json::to_value(calculator::buy_vs_rent(args.into())),
            ToolCall::Refinance(args) => serde_json::to_value(calculator::refinance(args.into())),
            ToolCall::Emi(args) => {
                let monthly_emi = calculator::emi(args.loan_amount, args.annual_rate(), args.tenure);
                Ok(json!({
                    "loanAmount": args.loan_amount,
                    "rate": args.annual_rate(),
                    "tenure": args.tenure,
                    "monthlyEmi": monthly_emi,
                }))
            }
        };

        output.map_err(|e| DispatchError::Internal(e.to_string()))
    }
}

//
// ================= Results =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    MalformedArguments,
    UnknownTool,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolFailure {
    pub error: String,
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl From<DispatchError> for ToolFailure {
    fn from(error: DispatchError) -> Self {
        let (kind, missing_fields) = match &error {
            DispatchError::MissingArguments(fields) => (FailureKind::Validation, fields.clone()),
            DispatchError::InvalidArguments(_) => (FailureKind::Validation, Vec::new()),
            DispatchError::MalformedArguments(_) => (FailureKind::MalformedArguments, Vec::new()),
            DispatchError::UnknownTool(_) => (FailureKind::UnknownTool, Vec::new()),
            DispatchError::Internal(_) => (FailureKind::Internal, Vec::new()),
        };

        Self {
            error: error.to_string(),
            kind,
            missing_fields,
        }
    }
}

/// Outcome of one tool invocation, always serializable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Success(Value),
    Failure(ToolFailure),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// Content of the tool turn recorded in the transcript
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({ "error": format!("unserializable tool result: {}", e), "kind": "internal" })
                .to_string()
        })
    }
}

impl From<DispatchError> for ToolResult {
    fn from(error: DispatchError) -> Self {
        ToolResult::Failure(error.into())
    }
}

impl From<Result<Value, DispatchError>> for ToolResult {
    fn from(result: Result<Value, DispatchError>) -> Self {
        match result {
            Ok(value) => ToolResult::Success(value),
            Err(error) => error.into(),
        }
    }
}

//
// ================= Dispatcher =================
//

/// Parse the raw argument payload of an invocation. An empty payload is an
/// empty object.
pub fn parse_arguments(raw: &str) -> Result<Value, DispatchError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| DispatchError::MalformedArguments(e.to_string()))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(DispatchError::MalformedArguments(
            "arguments must be a JSON object".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolDispatcher;

impl ToolDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn definitions(&self, scenario: Scenario) -> Vec<ToolDefinition> {
        tools_for(scenario).iter().map(ToolKind::definition).collect()
    }

    /// Run a named tool. Never fails: every problem becomes a `ToolResult::Failure`.
    pub fn dispatch(&self, tool_name: &str, arguments: &Value, scenario: Scenario) -> ToolResult {
        let Some(kind) = ToolKind::from_name(tool_name) else {
            warn!(tool = %tool_name, %scenario, "Unknown tool requested");
            return DispatchError::UnknownTool(tool_name.to_string()).into();
        };

        if !tools_for(scenario).contains(&kind) {
            debug!(tool = %tool_name, %scenario, "Tool is outside the scenario's advertised set");
        }

        self.run(kind, arguments)
    }

    /// Run a tool selected by kind (direct calculation path)
    pub fn run(&self, kind: ToolKind, arguments: &Value) -> ToolResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ToolCall::parse(kind, arguments).and_then(ToolCall::execute)
        }))
        .unwrap_or_else(|_| {
            Err(DispatchError::Internal(format!(
                "{} panicked during execution",
                kind.name()
            )))
        });

        match &outcome {
            Ok(_) => debug!(tool = kind.name(), "Tool executed"),
            Err(error) => warn!(tool = kind.name(), %error, "Tool returned an error result"),
        }

        outcome.into()
    }

    /// Parse and run a provider invocation. Returns the result and, when the
    /// payload parsed, the raw argument object.
    pub fn dispatch_invocation(
        &self,
        invocation: &ToolInvocation,
        scenario: Scenario,
    ) -> (ToolResult, Option<Value>) {
        match parse_arguments(&invocation.arguments) {
            Ok(arguments) => {
                let result = self.dispatch(&invocation.name, &arguments, scenario);
                (result, Some(arguments))
            }
            Err(error) => {
                warn!(tool = %invocation.name, call_id = %invocation.id, %error, "Malformed tool arguments");
                (error.into(), None)
            }
        }
    }
}
