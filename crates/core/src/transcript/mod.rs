//! Transcript sources and video URL validation.

pub mod vtt;
pub mod ytdlp;

use async_trait::async_trait;
use url::Url;

use crate::{error::TranscriptError, types::TranscriptSegment};

pub use ytdlp::YtDlpTranscriptSource;

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Ordered, non-empty transcript for `url`, title on the first segment.
    async fn fetch(&self, url: &str) -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

pub fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com" || h == "youtu.be" || h.ends_with(".youtube.com")
}

/// Check that `raw` is a YouTube video URL and return its video id.
pub fn validate_video_url(raw: &str) -> Result<String, TranscriptError> {
    let invalid = || TranscriptError::InvalidUrl {
        url: raw.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = url.host_str().ok_or_else(invalid)?;
    if !is_youtube_host(host) {
        return Err(invalid());
    }

    let id = if host.eq_ignore_ascii_case("youtu.be") {
        url.path_segments()
            .and_then(|mut segs| segs.next())
            .map(str::to_string)
    } else if url.path() == "/watch" {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
    } else {
        let mut segs = url.path_segments().into_iter().flatten();
        match (segs.next(), segs.next()) {
            (Some("shorts" | "embed" | "live"), Some(id)) => Some(id.to_string()),
            _ => None,
        }
    };

    id.filter(|id| is_video_id(id)).ok_or_else(invalid)
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
