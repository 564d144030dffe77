//! Map-reduce summarization with a conservative fallback pass.

use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::{Backends, GenerationBackend},
    config::Config,
    error::{FailureReason, GenerationError, ReduceError},
    prompt::{PromptTemplate, Prompts},
    types::{Chunk, ProfileKind},
};

/// Final text and the profile that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub profile: ProfileKind,
}

pub struct SummaryReducer {
    backends: Backends,
    prompts: Prompts,
    generation_timeout: Duration,
    map_concurrency: usize,
}

impl SummaryReducer {
    pub fn new(backends: Backends, prompts: Prompts, generation_timeout: Duration) -> Self {
        Self {
            backends,
            prompts,
            generation_timeout,
            map_concurrency: 4,
        }
    }

    pub fn from_config(backends: Backends, cfg: &Config) -> Self {
        Self::new(backends, cfg.prompts.clone(), cfg.job.generation_timeout())
            .with_map_concurrency(cfg.generation.map_concurrency)
    }

    pub fn with_map_concurrency(mut self, map_concurrency: usize) -> Self {
        self.map_concurrency = map_concurrency.max(1);
        self
    }

    fn combine_prompt(&self, profile: ProfileKind) -> &PromptTemplate {
        match profile {
            ProfileKind::Standard => &self.prompts.combine,
            ProfileKind::Conservative => self.prompts.combine_for_conservative(),
        }
    }

    async fn call(
        &self,
        backend: &dyn GenerationBackend,
        prompt: String,
    ) -> Result<String, GenerationError> {
        tokio::time::timeout(self.generation_timeout, backend.generate(&prompt))
            .await
            .map_err(|_| GenerationError::Timeout)?
    }

    /// One map-reduce pass over `chunks` with a single profile.
    ///
    /// Map calls run up to `map_concurrency` at a time; the first failure
    /// drops every call still in flight. Partials are combined in chunk order.
    #[instrument(skip_all, fields(profile = profile.name(), chunks = chunks.len()))]
    pub async fn reduce(
        &self,
        chunks: &[Chunk],
        profile: ProfileKind,
    ) -> Result<String, GenerationError> {
        let backend = self.backends.for_profile(profile).as_ref();

        let partials: Vec<String> = stream::iter(chunks)
            .map(|chunk| {
                let prompt = self.prompts.map.render(&chunk.text);
                async move {
                    let partial = self.call(backend, prompt).await?;
                    debug!(chunk = chunk.index, chars = partial.len(), "chunk summarized");
                    Ok::<_, GenerationError>(partial)
                }
            })
            .buffered(self.map_concurrency)
            .try_collect()
            .await?;

        let combined = partials.join("\n\n");
        let text = self
            .call(backend, self.combine_prompt(profile).render(&combined))
            .await?;

        info!(chars = text.len(), "reduction complete");
        Ok(text)
    }

    /// Reduce at the standard profile, repeating the whole pass once at the
    /// conservative profile if the standard pass is rejected by safety filtering.
    ///
    /// Any failure of the conservative pass is reported as `content-policy`.
    pub async fn summarize(&self, chunks: &[Chunk]) -> Result<Summary, ReduceError> {
        match self.reduce(chunks, ProfileKind::Standard).await {
            Ok(text) => Ok(Summary {
                text,
                profile: ProfileKind::Standard,
            }),
            Err(err) if err.is_safety_rejection() => {
                warn!(error = %err, "standard pass rejected by safety filtering, retrying conservatively");
                match self.reduce(chunks, ProfileKind::Conservative).await {
                    Ok(text) => Ok(Summary {
                        text,
                        profile: ProfileKind::Conservative,
                    }),
                    Err(fallback) => {
                        warn!(error = %fallback, "conservative pass failed");
                        Err(ReduceError::new(
                            FailureReason::ContentPolicy,
                            fallback.to_string(),
                        ))
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::ScriptedBackend;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.into(),
            token_count: text.split_whitespace().count(),
        }
    }

    fn passthrough_prompts() -> Prompts {
        Prompts {
            map: PromptTemplate::new("{text}"),
            combine: PromptTemplate::new("{text}"),
            conservative_combine: None,
        }
    }

    #[tokio::test]
    async fn combines_partials_in_chunk_order() {
        // later chunks finish first
        let standard = Arc::new(
            ScriptedBackend::new(ProfileKind::Standard, |prompt| Ok(prompt.to_uppercase()))
                .with_delay_fn(|prompt| match prompt {
                    "one" => Duration::from_millis(30),
                    "two" => Duration::from_millis(20),
                    _ => Duration::from_millis(0),
                }),
        );
        let conservative = Arc::new(ScriptedBackend::echo(ProfileKind::Conservative));
        let reducer = SummaryReducer::new(
            Backends::new(standard.clone(), conservative),
            passthrough_prompts(),
            Duration::from_secs(5),
        );

        let chunks = [chunk(0, "one"), chunk(1, "two"), chunk(2, "three")];
        let text = reducer.reduce(&chunks, ProfileKind::Standard).await.unwrap();

        assert_eq!(text, "ONE\n\nTWO\n\nTHREE");
        assert_eq!(standard.calls(), 4);
    }

    #[tokio::test]
    async fn slow_call_becomes_timeout() {
        let standard = Arc::new(
            ScriptedBackend::echo(ProfileKind::Standard).with_delay(Duration::from_millis(200)),
        );
        let conservative = Arc::new(ScriptedBackend::echo(ProfileKind::Conservative));
        let reducer = SummaryReducer::new(
            Backends::new(standard, conservative.clone()),
            passthrough_prompts(),
            Duration::from_millis(20),
        );

        let err = reducer.summarize(&[chunk(0, "words")]).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Timeout);
        assert_eq!(conservative.calls(), 0);
    }

    #[tokio::test]
    async fn conservative_pass_uses_its_own_combine_prompt() {
        let standard = Arc::new(ScriptedBackend::rejecting(ProfileKind::Standard));
        let conservative = Arc::new(ScriptedBackend::new(ProfileKind::Conservative, |p| {
            Ok(p.to_string())
        }));
        let mut prompts = passthrough_prompts();
        prompts.conservative_combine = Some(PromptTemplate::new("SAFE: {text}"));
        let reducer = SummaryReducer::new(
            Backends::new(standard, conservative),
            prompts,
            Duration::from_secs(5),
        );

        let summary = reducer.summarize(&[chunk(0, "words")]).await.unwrap();
        assert_eq!(summary.profile, ProfileKind::Conservative);
        assert_eq!(summary.text, "SAFE: words");
    }

    #[tokio::test]
    async fn conservative_backend_error_reports_content_policy() {
        let standard = Arc::new(ScriptedBackend::rejecting(ProfileKind::Standard));
        let conservative = Arc::new(ScriptedBackend::failing(
            ProfileKind::Conservative,
            GenerationError::Backend {
                message: "503 Service Unavailable".into(),
            },
        ));
        let reducer = SummaryReducer::new(
            Backends::new(standard, conservative.clone()),
            passthrough_prompts(),
            Duration::from_secs(5),
        );

        let err = reducer.summarize(&[chunk(0, "words")]).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::ContentPolicy);
        assert!(err.detail.contains("503"));
        assert_eq!(conservative.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn conservative_timeout_reports_content_policy() {
        let standard = Arc::new(ScriptedBackend::rejecting(ProfileKind::Standard));
        let conservative = Arc::new(
            ScriptedBackend::echo(ProfileKind::Conservative).with_delay(Duration::from_secs(60)),
        );
        let reducer = SummaryReducer::new(
            Backends::new(standard, conservative),
            passthrough_prompts(),
            Duration::from_secs(1),
        );

        let err = reducer.summarize(&[chunk(0, "words")]).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::ContentPolicy);
    }

    #[tokio::test]
    async fn combine_rejection_reruns_the_whole_pass() {
        let standard = Arc::new(ScriptedBackend::new(ProfileKind::Standard, |prompt| {
            if prompt.starts_with("COMBINE:") {
                Err(GenerationError::ContentSafetyRejected {
                    reason: "finish_reason=content_filter".into(),
                })
            } else {
                Ok(prompt.to_string())
            }
        }));
        let conservative = Arc::new(ScriptedBackend::echo(ProfileKind::Conservative));
        let mut prompts = passthrough_prompts();
        prompts.combine = PromptTemplate::new("COMBINE: {text}");
        let reducer = SummaryReducer::new(
            Backends::new(standard.clone(), conservative.clone()),
            prompts,
            Duration::from_secs(5),
        );

        let chunks = [chunk(0, "one"), chunk(1, "two")];
        let summary = reducer.summarize(&chunks).await.unwrap();

        assert_eq!(summary.profile, ProfileKind::Conservative);
        assert_eq!(summary.text, "COMBINE: one\n\ntwo");
        assert_eq!(standard.calls(), 3);
        assert_eq!(conservative.calls(), 3);
    }
}
