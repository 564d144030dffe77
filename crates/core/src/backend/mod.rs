//! Generative-text backends.
//!
//! One backend instance serves one generation profile. The reducer owns a
//! standard and a conservative instance and picks between them.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::GenerationError, types::ProfileKind};

pub use http::HttpGenerationBackend;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Profile this instance was constructed with.
    fn profile(&self) -> ProfileKind;

    /// Generate text for a fully rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: GenerationBackend + ?Sized> GenerationBackend for Arc<T> {
    fn profile(&self) -> ProfileKind {
        (**self).profile()
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

/// The pair of backends the reducer switches between.
#[derive(Clone)]
pub struct Backends {
    pub standard: Arc<dyn GenerationBackend>,
    pub conservative: Arc<dyn GenerationBackend>,
}

impl Backends {
    pub fn new(
        standard: Arc<dyn GenerationBackend>,
        conservative: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            standard,
            conservative,
        }
    }

    pub fn for_profile(&self, profile: ProfileKind) -> &Arc<dyn GenerationBackend> {
        match profile {
            ProfileKind::Standard => &self.standard,
            ProfileKind::Conservative => &self.conservative,
        }
    }
}
