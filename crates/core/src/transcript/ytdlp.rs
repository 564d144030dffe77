use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    cache::{find_captions_in_cache, get_cache_dir, get_transcript_path},
    error::TranscriptError,
    format::format_timestamp,
    transcript::{TranscriptSource, validate_video_url, vtt::parse_vtt},
    types::TranscriptSegment,
};

/// Fetches captions with `yt-dlp` and caches the parsed transcript per URL.
#[derive(Debug, Clone)]
pub struct YtDlpTranscriptSource {
    cache_root: PathBuf,
    language: String,
    timeout: Duration,
}

impl YtDlpTranscriptSource {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            language: "en".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn download_captions(&self, url: &str, cache_dir: &Path) -> Result<Option<String>, String> {
        let output_template = cache_dir.join("captions.%(ext)s");
        let child = Command::new("yt-dlp")
            .arg(url)
            .arg("--skip-download")
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--sub-lang")
            .arg(&self.language)
            .arg("--sub-format")
            .arg("vtt")
            .arg("--print")
            .arg("title")
            .arg("--no-simulate")
            .arg("-o")
            .arg(&output_template)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to run yt-dlp: {e}")),
            Err(_) => return Err(format!("yt-dlp timed out after {:?}", self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("yt-dlp exited with {}: {}", output.status, stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}

async fn load_cached(path: &Path) -> Option<Vec<TranscriptSegment>> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<Vec<TranscriptSegment>>(&raw) {
        Ok(segments) if !segments.is_empty() => Some(segments),
        Ok(_) => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable cached transcript");
            None
        }
    }
}

#[async_trait]
impl TranscriptSource for YtDlpTranscriptSource {
    async fn fetch(&self, url: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        validate_video_url(url)?;

        let no_transcript = |reason: String| TranscriptError::NoTranscript {
            url: url.to_string(),
            reason,
        };

        let cache_dir = get_cache_dir(&self.cache_root, url);
        let transcript_path = get_transcript_path(&cache_dir);
        if let Some(segments) = load_cached(&transcript_path).await {
            debug!(url, segments = segments.len(), "transcript cache hit");
            return Ok(segments);
        }

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| no_transcript(format!("cannot create cache dir: {e}")))?;

        info!(url, "fetching captions");
        let title = self.download_captions(url, &cache_dir).await.map_err(no_transcript)?;

        let captions = find_captions_in_cache(&cache_dir)
            .ok_or_else(|| no_transcript("video has no captions".to_string()))?;
        let raw = tokio::fs::read_to_string(&captions)
            .await
            .map_err(|e| no_transcript(format!("cannot read captions: {e}")))?;

        let mut segments = parse_vtt(&raw);
        if segments.is_empty() {
            return Err(no_transcript("captions are empty".to_string()));
        }
        if let (Some(first), Some(title)) = (segments.first_mut(), title) {
            first.title = Some(title);
        }

        match serde_json::to_string(&segments) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&transcript_path, json).await {
                    warn!(error = %e, "failed to cache transcript");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize transcript"),
        }

        let duration = segments.last().map(|s| s.end).unwrap_or(0.0);
        info!(
            url,
            segments = segments.len(),
            duration = %format_timestamp(duration),
            "transcript ready"
        );
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_url_before_running_anything() {
        let dir = tempfile::tempdir().unwrap();
        let source = YtDlpTranscriptSource::new(dir.path());

        let err = source.fetch("https://vimeo.com/1").await.unwrap_err();
        assert!(matches!(err, TranscriptError::InvalidUrl { .. }));
        assert!(!dir.path().join("videos").exists());
    }

    #[tokio::test]
    async fn serves_cached_transcript_without_yt_dlp() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        let cache_dir = get_cache_dir(dir.path(), url);
        std::fs::create_dir_all(&cache_dir).unwrap();
        let segments = vec![TranscriptSegment::new("cached words").with_title("Cached")];
        std::fs::write(
            get_transcript_path(&cache_dir),
            serde_json::to_string(&segments).unwrap(),
        )
        .unwrap();

        let source = YtDlpTranscriptSource::new(dir.path());
        let fetched = source.fetch(url).await.unwrap();
        assert_eq!(fetched, segments);
    }
}
