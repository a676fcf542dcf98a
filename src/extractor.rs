//! Parameter Extractor
//!
//! Best-effort scan of free user text for numbers the advisor cares about
//! ("rent is 8k", "property 1.5m", "staying 7 years"). The output is
//! advisory context for the provider only. It never reaches the calculator:
//! `ExtractedParameters` has no conversion into validated tool arguments.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const PROPERTY_PRICE: &str = "propertyPrice";
pub const MONTHLY_RENT: &str = "monthlyRent";
pub const DOWN_PAYMENT: &str = "downPayment";
pub const TENURE: &str = "tenure";
pub const STAY_DURATION: &str = "stayDuration";
pub const RATE: &str = "rate";

/// Amounts without a label above this size are assumed to be a property price
const UNLABELLED_PRICE_FLOOR: f64 = 100_000.0;

const AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)\s*(million|thousand|mn|k|m)?\b";

/// Words allowed between "rent" and its amount. A closed list keeps
/// "rent or buy a 1.2m apartment" from reading the price as rent.
const RENT_GAP: &str = r"(?:[\s:=,-]|\b(?:is|was|of|at|about|around|roughly|approx|approximately|currently|now|costs?|paying|pay|per|month|monthly|my|our|the|a|aed|dhs|dirhams?)\b)*?";

/// Unverified numeric hints keyed by parameter name.
///
/// Merging is last-write-wins per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParameters(BTreeMap<String, f64>);

impl ExtractedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        if value.is_finite() {
            self.0.insert(key.into(), value);
        }
    }

    pub fn merge(&mut self, other: ExtractedParameters) {
        self.0.extend(other.0);
    }

    /// Merge the numeric members of a raw tool-argument object
    pub fn merge_raw_arguments(&mut self, arguments: &serde_json::Value) {
        let Some(object) = arguments.as_object() else {
            return;
        };

        for (key, value) in object {
            let number = value
                .as_f64()
                .or_else(|| value.as_str().and_then(parse_amount));
            if let Some(number) = number {
                self.insert(key.clone(), number);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// One-line rendering used as provider context
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

struct Pattern {
    key: &'static str,
    regex: Regex,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    Amount,
    Years,
    Percent,
}

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |key, source: String, kind| Pattern {
            key,
            regex: Regex::new(&source).expect("extractor pattern is valid"),
            kind,
        };

        vec![
            build(
                MONTHLY_RENT,
                format!(r"(?i)\brent(?:al|ing)?\b{}{}", RENT_GAP, AMOUNT),
                ValueKind::Amount,
            ),
            build(
                DOWN_PAYMENT,
                format!(r"(?i){}\s*(?:aed|dhs|dirhams?)?\s*(?:as\s+(?:a\s+)?)?down\b", AMOUNT),
                ValueKind::Amount,
            ),
            build(
                DOWN_PAYMENT,
                format!(r"(?i)\bdown[\s-]*payment\b[^\d]{{0,25}}?{}", AMOUNT),
                ValueKind::Amount,
            ),
            build(
                PROPERTY_PRICE,
                format!(
                    r"(?i)\b(?:property|price|home|house|apartment|flat|villa|townhouse|priced|worth)\b[^\d]{{0,25}}?{}",
                    AMOUNT
                ),
                ValueKind::Amount,
            ),
            build(
                PROPERTY_PRICE,
                format!(
                    r"(?i){}\s*(?:aed|dhs|dirhams?)?\s*(?:property|home|house|apartment|flat|villa|townhouse)\b",
                    AMOUNT
                ),
                ValueKind::Amount,
            ),
            build(
                STAY_DURATION,
                r"(?i)\b(?:stay|staying|live|living|remain|remaining in)\b[^\d]{0,25}?(\d+(?:\.\d+)?)\s*(?:years?|yrs?)\b".to_string(),
                ValueKind::Years,
            ),
            build(
                TENURE,
                r"(?i)\b(?:tenure|term)\b[^\d]{0,20}?(\d+(?:\.\d+)?)\s*(?:years?|yrs?)?\b".to_string(),
                ValueKind::Years,
            ),
            build(
                TENURE,
                r"(?i)(\d+(?:\.\d+)?)[\s-]*(?:years?|yrs?)[\s-]+(?:loan|mortgage|tenure|term)\b".to_string(),
                ValueKind::Years,
            ),
            build(
                RATE,
                r"(?i)\b(?:rate|interest)\b[^\d]{0,20}?(\d+(?:\.\d+)?)\s*%".to_string(),
                ValueKind::Percent,
            ),
            build(
                RATE,
                r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:rate|interest|fixed|variable)".to_string(),
                ValueKind::Percent,
            ),
        ]
    })
}

fn currency_amount() -> &'static Regex {
    static CURRENCY: OnceLock<Regex> = OnceLock::new();
    CURRENCY.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(?:aed|dhs|dirhams?)\s*{}", AMOUNT))
            .expect("currency pattern is valid")
    })
}

fn bare_amount() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| Regex::new(&format!(r"(?i)^\s*(?:aed|dhs)?\s*{}\s*(?:aed|dhs)?\s*$", AMOUNT))
        .expect("amount pattern is valid"))
}

fn scale(number: &str, suffix: Option<&str>) -> Option<f64> {
    let base: f64 = number.replace(',', "").parse().ok()?;
    let multiplier = match suffix.map(|s| s.to_lowercase()).as_deref() {
        Some("k") | Some("thousand") => 1_000.0,
        Some("m") | Some("mn") | Some("million") => 1_000_000.0,
        _ => 1.0,
    };
    let value = base * multiplier;
    value.is_finite().then_some(value)
}

/// Parse a standalone amount such as "20k", "1.5m", "AED 1,200,000".
pub fn parse_amount(text: &str) -> Option<f64> {
    let captures = bare_amount().captures(text)?;
    scale(captures.get(1)?.as_str(), captures.get(2).map(|m| m.as_str()))
}

/// Scan free text for recognisable parameters. Never fails; returns an empty
/// mapping when nothing matches.
pub fn extract(text: &str) -> ExtractedParameters {
    let mut found = ExtractedParameters::new();

    for pattern in patterns() {
        if found.get(pattern.key).is_some() {
            continue;
        }
        let Some(captures) = pattern.regex.captures(text) else {
            continue;
        };
        let Some(number) = captures.get(1) else {
            continue;
        };

        let value = match pattern.kind {
            ValueKind::Amount => scale(number.as_str(), captures.get(2).map(|m| m.as_str())),
            ValueKind::Years => number.as_str().parse::<f64>().ok(),
            ValueKind::Percent => number.as_str().parse::<f64>().ok().map(|p| p / 100.0),
        };

        if let Some(value) = value {
            found.insert(pattern.key, value);
        }
    }

    if found.get(PROPERTY_PRICE).is_none() {
        let labelled: Vec<f64> = [MONTHLY_RENT, DOWN_PAYMENT]
            .iter()
            .filter_map(|key| found.get(key))
            .collect();

        let unlabelled = currency_amount()
            .captures_iter(text)
            .filter_map(|c| scale(c.get(1)?.as_str(), c.get(2).map(|m| m.as_str())))
            .find(|amount| *amount >= UNLABELLED_PRICE_FLOOR && !labelled.contains(amount));

        if let Some(price) = unlabelled {
            found.insert(PROPERTY_PRICE, price);
        }
    }

    found
}
