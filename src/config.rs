//! Runtime configuration
//!
//! Everything is read from the process environment (optionally seeded from a
//! `.env` file by the binaries).

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Settings for the remote chat-completions provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Pacing of the no-tool narrative path
#[derive(Debug, Clone, Copy)]
pub struct StreamingConfig {
    /// Characters per fragment
    pub chunk_chars: usize,
    /// Pause between fragments
    pub chunk_delay: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 24,
            chunk_delay: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub provider: ProviderConfig,
    pub streaming: StreamingConfig,
    pub context_window_size: usize,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            streaming: StreamingConfig::default(),
            context_window_size: 10,
            session_ttl: Duration::from_secs(3600),
            session_sweep_interval: Duration::from_secs(60),
            port: 8080,
        }
    }
}

impl AdvisorConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = ProviderConfig {
            api_key: get("LLM_API_KEY")
                .or_else(|| get("OPENAI_API_KEY"))
                .unwrap_or_default(),
            base_url: get("LLM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.provider.base_url),
            model: get("LLM_MODEL").unwrap_or(defaults.provider.model),
            temperature: parse_or(get("LLM_TEMPERATURE"), "LLM_TEMPERATURE", defaults.provider.temperature)?,
            max_tokens: parse_or(get("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS", defaults.provider.max_tokens)?,
            request_timeout: Duration::from_secs(parse_or(
                get("LLM_TIMEOUT_SECS"),
                "LLM_TIMEOUT_SECS",
                defaults.provider.request_timeout.as_secs(),
            )?),
        };

        let streaming = StreamingConfig {
            chunk_chars: parse_or(
                get("STREAM_CHUNK_CHARS"),
                "STREAM_CHUNK_CHARS",
                defaults.streaming.chunk_chars,
            )?
            .max(1),
            chunk_delay: Duration::from_millis(parse_or(
                get("STREAM_CHUNK_DELAY_MS"),
                "STREAM_CHUNK_DELAY_MS",
                defaults.streaming.chunk_delay.as_millis() as u64,
            )?),
        };

        let port_value = get("PORT").or_else(|| get("API_PORT"));

        let context_window_size = parse_or(
            get("CONTEXT_WINDOW_SIZE"),
            "CONTEXT_WINDOW_SIZE",
            defaults.context_window_size,
        )?;
        if context_window_size == 0 {
            return Err(OrchestrationError::Config(
                "CONTEXT_WINDOW_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            provider,
            streaming,
            context_window_size,
            session_ttl: Duration::from_secs(parse_or(
                get("SESSION_TTL_SECS"),
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            session_sweep_interval: Duration::from_secs(
                parse_or(
                    get("SESSION_SWEEP_SECS"),
                    "SESSION_SWEEP_SECS",
                    defaults.session_sweep_interval.as_secs(),
                )?
                .max(1),
            ),
            port: parse_or(port_value, "PORT", defaults.port)?,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            OrchestrationError::Config(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
