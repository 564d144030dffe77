//! WebVTT caption parsing.
//!
//! YouTube auto-captions roll: each cue repeats the previous cue's last line
//! and carries inline word timings (`<00:00:01.500><c> word</c>`). Both are
//! removed so every spoken line appears once.

use crate::types::TranscriptSegment;

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim().replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, *s),
        [m, s] => (0.0, m.parse::<f64>().ok()?, *s),
        _ => return None,
    };
    let s = s.parse::<f64>().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start)?, parse_timestamp(end)?))
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn clean_line(line: &str) -> String {
    decode_entities(&strip_tags(line))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse caption cues into ordered segments, dropping rolled-over duplicates.
pub fn parse_vtt(vtt: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut last_line = String::new();
    let mut lines = vtt.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((start, end)) = parse_timing_line(line) else {
            continue;
        };

        let mut fresh: Vec<String> = Vec::new();
        while let Some(text) = lines.next_if(|l| !l.trim().is_empty()) {
            let cleaned = clean_line(text);
            if cleaned.is_empty() || cleaned == last_line {
                continue;
            }
            last_line = cleaned.clone();
            fresh.push(cleaned);
        }

        if !fresh.is_empty() {
            segments.push(TranscriptSegment {
                start,
                end,
                text: fresh.join(" "),
                title: None,
            });
        }
    }

    segments
}
