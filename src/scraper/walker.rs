//! Schema-tolerant walk over provider JSON.
//!
//! Provider payloads change shape between releases, so nothing here assumes a
//! layout. Every node is inspected by type and anything unexpected is skipped.

use super::types::Subtitle;
use serde_json::{Map, Value};
use std::collections::HashSet;

const MAX_DEPTH: usize = 64;

/// Keys whose string value is a media URL even without a telling extension
const URL_KEYS: &[&str] = &[
    "url", "file", "src", "link", "playlist", "stream", "source", "hls", "m3u8", "video",
];

/// Sibling keys carrying a quality label
const LABEL_KEYS: &[&str] = &["quality", "label", "resolution", "res", "name"];

/// Sibling keys carrying an explicit pixel height
const HEIGHT_KEYS: &[&str] = &["height", "res", "resolution"];

const MEDIA_EXTENSIONS: &[&str] = &[".m3u8", ".mp4", ".mkv", ".webm", ".m4v", ".ts"];
const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".vtt"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".svg"];

/// A URL found in a payload together with whatever quality hints surrounded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCandidate {
    pub url: String,
    pub height: Option<u64>,
    /// Label hints, most specific first
    pub labels: Vec<String>,
}

impl StreamCandidate {
    pub fn label_refs(&self) -> Vec<&str> {
        self.labels.iter().map(String::as_str).collect()
    }
}

/// Collect every playable-looking URL in `value`, in document order
pub fn collect_stream_candidates(value: &Value) -> Vec<StreamCandidate> {
    let mut out = Vec::new();
    visit(value, None, 0, &mut out);
    out
}

fn visit(value: &Value, key: Option<&str>, depth: usize, out: &mut Vec<StreamCandidate>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => visit_object(map, key, depth, out),
        Value::Array(items) => {
            for item in items {
                visit(item, key, depth + 1, out);
            }
        }
        Value::String(s) if looks_playable(s, key) => out.push(StreamCandidate {
            url: s.trim().to_string(),
            height: None,
            labels: key.map(str::to_string).into_iter().collect(),
        }),
        _ => {}
    }
}

fn visit_object(
    map: &Map<String, Value>,
    parent_key: Option<&str>,
    depth: usize,
    out: &mut Vec<StreamCandidate>,
) {
    let height = HEIGHT_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(as_height);

    let mut labels: Vec<String> = LABEL_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .filter_map(as_label)
        .collect();
    if let Some(parent) = parent_key {
        labels.push(parent.to_string());
    }

    for (key, value) in map {
        if is_subtitle_key(key) {
            continue;
        }

        match value {
            Value::String(s) if looks_playable(s, Some(key)) => {
                let mut labels = labels.clone();
                // {"1080p": "https://..."} keeps the key as the most specific hint
                if !is_url_key(key) {
                    labels.insert(0, key.clone());
                }
                out.push(StreamCandidate {
                    url: s.trim().to_string(),
                    height,
                    labels,
                });
            }
            Value::Object(_) | Value::Array(_) => visit(value, Some(key), depth + 1, out),
            _ => {}
        }
    }
}

/// Collect subtitle tracks from any subtitle/caption keyed subtree
pub fn collect_subtitles(value: &Value) -> Vec<Subtitle> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    find_subtitle_roots(value, 0, &mut out, &mut seen);
    out
}

fn find_subtitle_roots(
    value: &Value,
    depth: usize,
    out: &mut Vec<Subtitle>,
    seen: &mut HashSet<String>,
) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_subtitle_key(key) {
                    gather_subtitles(child, depth + 1, out, seen);
                } else {
                    find_subtitle_roots(child, depth + 1, out, seen);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                find_subtitle_roots(item, depth + 1, out, seen);
            }
        }
        _ => {}
    }
}

fn gather_subtitles(
    value: &Value,
    depth: usize,
    out: &mut Vec<Subtitle>,
    seen: &mut HashSet<String>,
) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::String(s) if is_http(s) => {
            if seen.insert(s.trim().to_string()) {
                out.push(Subtitle {
                    url: s.trim().to_string(),
                    language: None,
                    label: None,
                });
            }
        }
        Value::Array(items) => {
            for item in items {
                gather_subtitles(item, depth + 1, out, seen);
            }
        }
        Value::Object(map) => {
            let url = ["url", "file", "src"]
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .find(|s| is_http(s));

            match url {
                Some(url) => {
                    if seen.insert(url.trim().to_string()) {
                        out.push(Subtitle {
                            url: url.trim().to_string(),
                            language: first_str(map, &["language", "lang", "srclang"]),
                            label: first_str(map, &["label", "name", "display"]),
                        });
                    }
                }
                None => {
                    // Keyed by language: {"English": "https://...vtt"}
                    for (key, child) in map {
                        if let Some(s) = child.as_str().filter(|s| is_http(s)) {
                            if seen.insert(s.trim().to_string()) {
                                out.push(Subtitle {
                                    url: s.trim().to_string(),
                                    language: Some(key.clone()),
                                    label: None,
                                });
                            }
                        } else {
                            gather_subtitles(child, depth + 1, out, seen);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn first_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_subtitle_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("subtitle") || lower.contains("caption")
}

fn is_url_key(key: &str) -> bool {
    URL_KEYS.contains(&key.to_lowercase().as_str())
}

fn is_http(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("http://") || s.starts_with("https://")
}

fn looks_playable(s: &str, key: Option<&str>) -> bool {
    if !is_http(s) {
        return false;
    }

    let lower = s.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();

    if SUBTITLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    {
        return false;
    }

    lower.contains(".m3u8")
        || MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || key.is_some_and(is_url_key)
}

fn as_height(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            let rest = s.trim()[digits.len()..].to_lowercase();
            // "1080" or "1080p", not "1920x1080"
            (rest.is_empty() || rest == "p").then(|| digits.parse().ok()).flatten()
        }
        _ => None,
    }
}

fn as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finds_nested_playlist() {
        let payload = json!({
            "sourceId": "abc",
            "stream": {
                "playlist": "https://cdn.example.com/hls/abc/master.m3u8",
                "type": "hls"
            }
        });

        let found = collect_stream_candidates(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example.com/hls/abc/master.m3u8");
        assert!(found[0].labels.contains(&"stream".to_string()));
    }

    #[test]
    fn test_uses_sibling_quality_hints() {
        let payload = json!({
            "sources": [
                { "file": "https://cdn.example.com/v/a.mp4", "label": "720p" },
                { "url": "https://cdn.example.com/v/b.mp4", "height": 1080 }
            ]
        });

        let found = collect_stream_candidates(&payload);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].labels.first().map(String::as_str), Some("720p"));
        assert_eq!(found[1].height, Some(1080));
    }

    #[test]
    fn test_quality_keyed_map() {
        let payload = json!({
            "qualities": {
                "1080": { "url": "https://cdn.example.com/1080.mp4" },
                "720p": "https://cdn.example.com/low.mp4"
            }
        });

        let found = collect_stream_candidates(&payload);
        assert_eq!(found.len(), 2);
        let low = found.iter().find(|c| c.url.ends_with("low.mp4")).unwrap();
        assert_eq!(low.labels[0], "720p");
        let high = found.iter().find(|c| c.url.ends_with("1080.mp4")).unwrap();
        assert!(high.labels.contains(&"1080".to_string()));
    }

    #[test]
    fn test_skips_subtitles() {
        let payload = json!({
            "stream": "https://cdn.example.com/master.m3u8",
            "subtitles": [{ "file": "https://cdn.example.com/en.mp4" }],
            "captionTracks": ["https://cdn.example.com/en.m3u8"],
            "extra": { "file": "https://cdn.example.com/en.vtt" },
            "poster": { "src": "https://cdn.example.com/poster.jpg" }
        });

        let found = collect_stream_candidates(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example.com/master.m3u8");
    }

    #[test]
    fn test_never_fails_on_odd_shapes() {
        let payload = json!([
            null,
            true,
            42,
            "not a url",
            { "file": 7, "url": null, "sources": [[], {}, [null]] },
            [[["https://cdn.example.com/deep.m3u8"]]]
        ]);

        let found = collect_stream_candidates(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example.com/deep.m3u8");
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut payload = json!("https://cdn.example.com/bottom.m3u8");
        for _ in 0..200 {
            payload = json!({ "next": payload });
        }

        assert!(collect_stream_candidates(&payload).is_empty());
    }

    #[test]
    fn test_collect_subtitles() {
        let payload = json!({
            "stream": {
                "captions": [
                    { "url": "https://subs.example.com/en.vtt", "language": "English" },
                    { "file": "https://subs.example.com/fr.srt", "label": "French" },
                    { "url": "https://subs.example.com/en.vtt", "language": "English" }
                ]
            },
            "subtitle": { "Spanish": "https://subs.example.com/es.vtt" }
        });

        let subs = collect_subtitles(&payload);
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].language.as_deref(), Some("English"));
        assert_eq!(subs[1].label.as_deref(), Some("French"));
        assert_eq!(subs[2].language.as_deref(), Some("Spanish"));
    }
}
