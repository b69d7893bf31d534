//! Process configuration for the pipeline. Credential loading is the
//! deployment's concern; this only reads the agreed environment contract.

use std::time::Duration;

/// Splitter runs cold for determinism of the capability round.
pub const SPLITTER_TEMPERATURE: f32 = 0.1;
pub const REVIEWER_TEMPERATURE: f32 = 0.3;
pub const CHAIRMAN_TEMPERATURE: f32 = 0.0;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model for the splitter and the four reviewers.
    pub fast_model: String,
    /// Model for the chairman narrative.
    pub think_model: String,
    /// Per-service-call budget; expiry degrades like a decode failure.
    pub call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            fast_model: "gpt-4o-mini".to_string(),
            think_model: "gpt-4o".to_string(),
            call_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = std::env::var("TRIBUNAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout);
        Self {
            base_url: env_or("BASE_URL", &defaults.base_url),
            api_key: env_or("OPENAI_API_KEY", ""),
            fast_model: env_or("FAST_MODEL", &defaults.fast_model),
            think_model: env_or("THINK_MODEL", &defaults.think_model),
            call_timeout: timeout,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
