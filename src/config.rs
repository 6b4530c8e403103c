use std::time::Duration;

use thiserror::Error;

use crate::pacing::PacingPolicy;
use crate::quiz::{dispatch::DispatchSettings, gemini, prompt::PromptSettings};

pub const DEFAULT_AUDIENCE: &str = "Licensed Examination for Teachers (LET) Philippines";
pub const MAX_QUESTION_COUNT: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Gemini {
        api_key: String,
        model: String,
        base_url: String,
    },
    ChatGpt {
        api_key: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub backend: Backend,
    pub generation_timeout: Duration,
    pub prompt: PromptSettings,
    pub explanations: bool,
    pub dispatch: DispatchSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source; blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let backend_name = get("QUIZ_BACKEND").map(|v| v.to_ascii_lowercase());
        let backend = match backend_name.as_deref().unwrap_or("gemini") {
            "gemini" => Backend::Gemini {
                api_key: require("GEMINI_API_KEY")?,
                model: get("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
                base_url: get("GEMINI_API_URL")
                    .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            },
            "chatgpt" => Backend::ChatGpt {
                api_key: require("CHATGPT_API_KEY")?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "QUIZ_BACKEND",
                    value: other.to_string(),
                    reason: "expected gemini or chatgpt",
                })
            }
        };

        let question_count = number(&get, "QUIZ_QUESTION_COUNT", 20)?;
        if question_count == 0 || question_count > MAX_QUESTION_COUNT as u64 {
            return Err(ConfigError::Invalid {
                key: "QUIZ_QUESTION_COUNT",
                value: question_count.to_string(),
                reason: "expected 1 to 50",
            });
        }

        let timeout_secs = number(&get, "GENERATION_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "GENERATION_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
                reason: "expected at least 1 second",
            });
        }

        let defaults = PacingPolicy::default();
        let pacing = PacingPolicy {
            private_interval: millis(&get, "PACE_PRIVATE_MS", defaults.private_interval)?,
            group_interval: millis(&get, "PACE_GROUP_MS", defaults.group_interval)?,
            after_poll: millis(&get, "PACE_AFTER_POLL_MS", defaults.after_poll)?,
        };

        Ok(Self {
            telegram_token: require("TELEGRAM_BOT_TOKEN")?,
            backend,
            generation_timeout: Duration::from_secs(timeout_secs),
            prompt: PromptSettings {
                question_count: question_count as usize,
                audience: get("QUIZ_AUDIENCE").unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            },
            explanations: flag(&get, "QUIZ_EXPLANATIONS", true)?,
            dispatch: DispatchSettings {
                pin_questions: flag(&get, "QUIZ_PIN_QUESTIONS", true)?,
                announce_body: flag(&get, "QUIZ_ANNOUNCE_BODY", false)?,
                pacing,
            },
        })
    }
}

fn number<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key,
            value,
            reason: "expected a non-negative integer",
        }),
    }
}

fn millis<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    number(get, key, default.as_millis() as u64).map(Duration::from_millis)
}

fn flag<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false",
        }),
    }
}
