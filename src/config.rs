// src/config.rs

use thiserror::Error;
use tracing::{debug, info};

/// Default endpoint of the Google Custom Search JSON API.
pub const DEFAULT_SEARCH_API_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Default chat-completions endpoint used for risk triage.
pub const DEFAULT_CLASSIFIER_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
/// Default model requested from the classifier backend.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "deepseek-chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required secret was absent at startup. This is fatal for the whole
    /// run and is raised before any network call is attempted.
    #[error("required environment variable `{0}` is not set")]
    MissingVar(&'static str),
}

/// Resolved configuration handed down the pipeline explicitly; there is no
/// process-wide configuration state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub search_api_key: String,
    pub search_engine_id: String,
    pub search_api_url: String,
    pub classifier_api_key: String,
    pub classifier_api_url: String,
    pub classifier_model: String,
}

impl Settings {
    /// Reads settings from the environment (after an optional `.env` load
    /// performed by the caller). The three secrets are mandatory; endpoint
    /// and model names fall back to the public defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            search_api_key: require_var("API_KEY_SEARCH_GOOGLE")?,
            search_engine_id: require_var("SEARCH_ENGINE_ID")?,
            search_api_url: var_or("SEARCH_API_URL", DEFAULT_SEARCH_API_URL),
            classifier_api_key: require_var("DEEPSEEK_API_KEY")?,
            classifier_api_url: var_or("CLASSIFIER_API_URL", DEFAULT_CLASSIFIER_API_URL),
            classifier_model: var_or("CLASSIFIER_MODEL", DEFAULT_CLASSIFIER_MODEL),
        };
        info!("Configuration loaded from environment.");
        Ok(settings)
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn var_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            debug!(name, default, "Variable unset, using default.");
            default.to_string()
        }
    }
}
