use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
};

/// Root directory for everything summarist keeps on disk.
pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("summarist")
}

/// Per-video directory for a given URL under `root`.
pub fn get_cache_dir(root: &Path, url: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let url_hash = hasher.finish();

    root.join("videos").join(url_hash.to_string())
}

/// Find a WebVTT caption file written by yt-dlp in a video directory.
pub fn find_captions_in_cache(cache_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return None;
    };

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("vtt"))
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Path of the parsed transcript for a video directory.
pub fn get_transcript_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("transcript.json")
}

/// Path of the JSON job ledger and coin accounts.
pub fn get_ledger_path(root: &Path) -> PathBuf {
    root.join("ledger.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_is_stable_per_url() {
        let root = Path::new("/cache");
        let a = get_cache_dir(root, "https://youtu.be/abcdefghijk");
        let b = get_cache_dir(root, "https://youtu.be/abcdefghijk");
        let c = get_cache_dir(root, "https://youtu.be/bbcdefghijk");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/cache/videos"));
    }

    #[test]
    fn finds_vtt_files_only() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_captions_in_cache(dir.path()).is_none());

        std::fs::write(dir.path().join("transcript.json"), "[]").unwrap();
        std::fs::write(dir.path().join("captions.en.vtt"), "WEBVTT").unwrap();
        assert_eq!(
            find_captions_in_cache(dir.path()),
            Some(dir.path().join("captions.en.vtt"))
        );
    }
}
