use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: set {env_var}")]
    MissingApiKey {
        provider_name: &'static str,
        env_var: &'static str,
    },

    #[error("Unknown provider {name} (expected grok, openai or gemini)")]
    Unknown { name: String },
}

/// OpenAI-compatible chat-completions providers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Grok,
    Openai,
    #[default]
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub default_model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                default_model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                default_model: "gpt-4o-mini",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                default_model: "gemini-2.0-flash",
                env_var: "GEMINI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
        }
    }

    /// Per-category safety thresholds are only understood by Gemini.
    pub fn supports_safety_settings(&self) -> bool {
        matches!(self, Provider::Gemini)
    }

    /// Read the API key from the provider's environment variable.
    pub fn api_key_from_env(&self) -> Result<String, ProviderError> {
        let config = self.config();
        std::env::var(config.env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider_name: self.name(),
                env_var: config.env_var,
            })
    }
}

impl std::str::FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grok" => Ok(Provider::Grok),
            "openai" => Ok(Provider::Openai),
            "gemini" => Ok(Provider::Gemini),
            other => Err(ProviderError::Unknown {
                name: other.to_string(),
            }),
        }
    }
}
