use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{chunker::ChunkBounds, error::ConfigError, prompt::Prompts, provider::Provider};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub billing: Billing,
    #[serde(default)]
    pub job: JobLimits,
    #[serde(default)]
    pub generation: Generation,
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking
            .bounds()
            .validate()
            .map_err(|e| invalid("chunking.chunk_overlap", e.to_string()))?;

        if self.job.generation_timeout_seconds == 0 {
            return Err(invalid("job.generation_timeout_seconds", "must be > 0"));
        }
        if self.job.job_timeout_seconds == 0 {
            return Err(invalid("job.job_timeout_seconds", "must be > 0"));
        }
        if self.job.transcript_timeout_seconds == 0 {
            return Err(invalid("job.transcript_timeout_seconds", "must be > 0"));
        }
        if self.generation.map_concurrency == 0 {
            return Err(invalid("generation.map_concurrency", "must be > 0"));
        }
        if self.billing.minimum_cost <= 0 {
            return Err(invalid("billing.minimum_cost", "must be > 0"));
        }

        let templates = [
            ("prompts.map", Some(&self.prompts.map)),
            ("prompts.combine", Some(&self.prompts.combine)),
            (
                "prompts.conservative_combine",
                self.prompts.conservative_combine.as_ref(),
            ),
        ];
        for (key, template) in templates {
            if let Some(t) = template
                && !t.has_placeholder()
            {
                return Err(invalid(key, "template must contain {text}"));
            }
        }

        for (key, profile) in [
            ("generation.standard", &self.generation.standard),
            ("generation.conservative", &self.generation.conservative),
        ] {
            if profile.max_output_tokens == 0 {
                return Err(invalid(key, "max_output_tokens must be > 0"));
            }
            if !(0.0..=2.0).contains(&profile.temperature) {
                return Err(invalid(key, "temperature must be within 0.0..=2.0"));
            }
            if profile.max_retries > MAX_RETRIES {
                return Err(invalid(
                    key,
                    format!("max_retries must be <= {MAX_RETRIES}"),
                ));
            }
        }

        Ok(())
    }
}

/// Upper bound for `max_retries`; backoff doubles per attempt.
pub const MAX_RETRIES: u32 = 10;

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunking {
    /// Tokens per chunk.
    pub max_chunk_size: usize,
    /// Tokens shared between consecutive chunks.
    pub chunk_overlap: usize,
}
impl Default for Chunking {
    fn default() -> Self {
        Self {
            max_chunk_size: 8000,
            chunk_overlap: 200,
        }
    }
}
impl Chunking {
    pub fn bounds(&self) -> ChunkBounds {
        ChunkBounds {
            max_chunk_size: self.max_chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Billing {
    /// Coins required up front and debited per delivered summary.
    pub minimum_cost: i64,
}
impl Default for Billing {
    fn default() -> Self {
        Self { minimum_cost: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobLimits {
    pub generation_timeout_seconds: u64,
    pub job_timeout_seconds: u64,
    /// Limit for one caption download.
    pub transcript_timeout_seconds: u64,
}
impl Default for JobLimits {
    fn default() -> Self {
        Self {
            generation_timeout_seconds: 120,
            job_timeout_seconds: 600,
            transcript_timeout_seconds: 120,
        }
    }
}
impl JobLimits {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn transcript_timeout(&self) -> Duration {
        Duration::from_secs(self.transcript_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub provider: Provider,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Map-step calls in flight at once for one job.
    pub map_concurrency: usize,
    pub standard: GenerationProfile,
    pub conservative: GenerationProfile,
}
impl Default for Generation {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            map_concurrency: 4,
            standard: GenerationProfile::standard(),
            conservative: GenerationProfile::conservative(),
        }
    }
}
impl Generation {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(self.provider.config().default_model)
    }
}

/// Generation parameters for one backend instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProfile {
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Transient HTTP failures (429, 5xx) retried inside the backend.
    pub max_retries: u32,
    #[serde(default)]
    pub safety: SafetySettings,
}
impl GenerationProfile {
    pub fn standard() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: 0.3,
            max_retries: 3,
            safety: SafetySettings::uniform(BlockThreshold::BlockOnlyHigh),
        }
    }

    pub fn conservative() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.1,
            max_retries: 2,
            safety: SafetySettings::uniform(BlockThreshold::BlockLowAndAbove),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl BlockThreshold {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            BlockThreshold::BlockNone => "BLOCK_NONE",
            BlockThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            BlockThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            BlockThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySettings {
    pub harassment: BlockThreshold,
    pub hate_speech: BlockThreshold,
    pub sexually_explicit: BlockThreshold,
    pub dangerous_content: BlockThreshold,
}
impl Default for SafetySettings {
    fn default() -> Self {
        Self::uniform(BlockThreshold::BlockMediumAndAbove)
    }
}
impl SafetySettings {
    pub fn uniform(threshold: BlockThreshold) -> Self {
        Self {
            harassment: threshold,
            hate_speech: threshold,
            sexually_explicit: threshold,
            dangerous_content: threshold,
        }
    }

    /// (API category, threshold) pairs in a stable order.
    pub fn categories(&self) -> [(&'static str, BlockThreshold); 4] {
        [
            ("HARM_CATEGORY_HARASSMENT", self.harassment),
            ("HARM_CATEGORY_HATE_SPEECH", self.hate_speech),
            ("HARM_CATEGORY_SEXUALLY_EXPLICIT", self.sexually_explicit),
            ("HARM_CATEGORY_DANGEROUS_CONTENT", self.dangerous_content),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storage {
    /// Root for the job ledger and caption cache. Defaults to the user cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}
impl Storage {
    pub fn root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::cache::get_root_cache_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
