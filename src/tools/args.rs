//! Typed tool arguments
//!
//! Each tool owns one argument struct. Required fields are plain `f64` so a
//! successfully parsed struct cannot be missing them; optional fields are
//! `Option<f64>` and resolved to defaults by the calculator.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::DispatchError;
use crate::calculator::{BuyVsRentInputs, MortgageInputs, RefinanceInputs};
use crate::extractor::parse_amount;

/// Argument struct for one tool
pub trait ToolArguments: DeserializeOwned {
    /// Wire names of the fields that must be present and non-null
    const REQUIRED: &'static [&'static str];

    /// Range checks that run after the struct has been parsed
    fn validate(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Check presence of every required field, then parse and validate
    fn from_value(arguments: &Value) -> Result<Self, DispatchError> {
        let object = arguments.as_object().ok_or_else(|| {
            DispatchError::MalformedArguments("arguments must be a JSON object".to_string())
        })?;

        let missing: Vec<String> = Self::REQUIRED
            .iter()
            .filter(|field| object.get(**field).map_or(true, Value::is_null))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DispatchError::MissingArguments(missing));
        }

        let parsed: Self = serde_json::from_value(arguments.clone())
            .map_err(|e| DispatchError::InvalidArguments(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(parse_amount))
        .filter(|n| n.is_finite())
}

fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_number(&value).ok_or_else(|| de::Error::custom(format!("expected a number, got {}", value)))
}

fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_number(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected a number, got {}", value))),
    }
}

/// Rates above 1 are taken as percentages ("4.5" means 4.5%)
fn normalize_rate(rate: f64) -> f64 {
    if rate > 1.0 {
        rate / 100.0
    } else {
        rate
    }
}

fn positive(field: &str, value: f64) -> Result<(), DispatchError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(DispatchError::InvalidArguments(format!(
            "{} must be greater than zero",
            field
        )))
    }
}

fn non_negative(field: &str, value: Option<f64>) -> Result<(), DispatchError> {
    match value {
        Some(v) if v < 0.0 => Err(DispatchError::InvalidArguments(format!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MortgageArgs {
    #[serde(deserialize_with = "number")]
    pub property_price: f64,
    #[serde(default, deserialize_with = "optional_number")]
    pub down_payment: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub tenure: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub rate: Option<f64>,
}

impl ToolArguments for MortgageArgs {
    const REQUIRED: &'static [&'static str] = &["propertyPrice"];

    fn validate(&self) -> Result<(), DispatchError> {
        positive("propertyPrice", self.property_price)?;
        non_negative("downPayment", self.down_payment)?;
        non_negative("tenure", self.tenure)?;
        non_negative("rate", self.rate)
    }
}

impl From<MortgageArgs> for MortgageInputs {
    fn from(args: MortgageArgs) -> Self {
        MortgageInputs {
            property_price: args.property_price,
            down_payment: args.down_payment,
            tenure_years: args.tenure,
            annual_rate: args.rate.map(normalize_rate),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyVsRentArgs {
    #[serde(deserialize_with = "number")]
    pub property_price: f64,
    #[serde(deserialize_with = "number")]
    pub monthly_rent: f64,
    #[serde(default, deserialize_with = "optional_number")]
    pub down_payment: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub tenure: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub stay_duration: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub rate: Option<f64>,
}

impl ToolArguments for BuyVsRentArgs {
    const REQUIRED: &'static [&'static str] = &["propertyPrice", "monthlyRent"];

    fn validate(&self) -> Result<(), DispatchError> {
        positive("propertyPrice", self.property_price)?;
        non_negative("monthlyRent", Some(self.monthly_rent))?;
        non_negative("downPayment", self.down_payment)?;
        non_negative("tenure", self.tenure)?;
        non_negative("stayDuration", self.stay_duration)?;
        non_negative("rate", self.rate)
    }
}

impl From<BuyVsRentArgs> for BuyVsRentInputs {
    fn from(args: BuyVsRentArgs) -> Self {
        BuyVsRentInputs {
            property_price: args.property_price,
            monthly_rent: args.monthly_rent,
            down_payment: args.down_payment,
            tenure_years: args.tenure,
            stay_years: args.stay_duration,
            annual_rate: args.rate.map(normalize_rate),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefinanceArgs {
    #[serde(deserialize_with = "number")]
    pub current_loan_amount: f64,
    #[serde(deserialize_with = "number")]
    pub current_rate: f64,
    #[serde(deserialize_with = "number")]
    pub current_tenure: f64,
    #[serde(deserialize_with = "number")]
    pub new_rate: f64,
    #[serde(deserialize_with = "number")]
    pub switching_costs: f64,
}

impl ToolArguments for RefinanceArgs {
    const REQUIRED: &'static [&'static str] = &[
        "currentLoanAmount",
        "currentRate",
        "currentTenure",
        "newRate",
        "switchingCosts",
    ];

    fn validate(&self) -> Result<(), DispatchError> {
        positive("currentLoanAmount", self.current_loan_amount)?;
        positive("currentTenure", self.current_tenure)?;
        non_negative("currentRate", Some(self.current_rate))?;
        non_negative("newRate", Some(self.new_rate))?;
        non_negative("switchingCosts", Some(self.switching_costs))
    }
}

impl From<RefinanceArgs> for RefinanceInputs {
    fn from(args: RefinanceArgs) -> Self {
        RefinanceInputs {
            current_loan_amount: args.current_loan_amount,
            current_rate: normalize_rate(args.current_rate),
            remaining_tenure_years: args.current_tenure,
            new_rate: normalize_rate(args.new_rate),
            switching_costs: args.switching_costs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmiArgs {
    #[serde(deserialize_with = "number")]
    pub loan_amount: f64,
    #[serde(deserialize_with = "number")]
    pub rate: f64,
    #[serde(deserialize_with = "number")]
    pub tenure: f64,
}

impl ToolArguments for EmiArgs {
    const REQUIRED: &'static [&'static str] = &["loanAmount", "rate", "tenure"];
}

impl EmiArgs {
    pub fn annual_rate(&self) -> f64 {
        normalize_rate(self.rate)
    }
}
