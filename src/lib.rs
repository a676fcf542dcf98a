//! Property Advisor
//!
//! A conversational property-finance advisor that:
//! - Keeps one append-only transcript per session key
//! - Lets a remote language model carry the dialogue
//! - Routes every figure through deterministic finance calculators
//! - Streams the narrative back to the caller fragment by fragment
//!
//! TURN LOOP:
//! INGEST → EXTRACT → CONTEXT → PROVIDER → TOOLS? → STREAM → PERSIST

pub mod agent;
pub mod api;
pub mod calculator;
pub mod config;
pub mod error;
pub mod extractor;
pub mod memory;
pub mod models;
pub mod provider;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{Orchestrator, TurnStream};
pub use models::*;
