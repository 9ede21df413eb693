//! Quality canonicalization and link list normalization

use super::patterns::PATTERNS;
use super::types::{ExtractedLink, StreamType};
use std::collections::HashSet;

pub const QUALITY_AUTO: &str = "Auto";
pub const QUALITY_UNKNOWN: &str = "Unknown";

/// Substring tokens checked in order; the first hit wins.
const QUALITY_TOKENS: &[(&[&str], &str)] = &[
    (&["2160", "4k"], "4K"),
    (&["1440"], "1440p"),
    (&["1080", "fhd"], "1080p"),
    (&["720", "hd"], "720p"),
    (&["480", "sd"], "480p"),
    (&["360"], "360p"),
    (&["240"], "240p"),
];

/// Map a pixel height onto a canonical quality label
pub fn quality_from_height(height: u64) -> String {
    match height {
        0 => QUALITY_UNKNOWN.to_string(),
        h if h >= 2160 => "4K".to_string(),
        h if h >= 1440 => "1440p".to_string(),
        h if h >= 1080 => "1080p".to_string(),
        h if h >= 720 => "720p".to_string(),
        h if h >= 480 => "480p".to_string(),
        h if h >= 360 => "360p".to_string(),
        h if h >= 240 => "240p".to_string(),
        h => format!("{h}p"),
    }
}

/// Best-effort match of a free-form label, file name or URL against known quality tokens
fn match_quality(label: &str) -> Option<String> {
    let lower = label.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if lower == "auto" || lower == "adaptive" {
        return Some(QUALITY_AUTO.to_string());
    }

    if let Some((_, quality)) = QUALITY_TOKENS
        .iter()
        .find(|(tokens, _)| tokens.iter().any(|t| lower.contains(t)))
    {
        return Some((*quality).to_string());
    }

    let height = PATTERNS
        .dimensions
        .captures(&lower)
        .or_else(|| PATTERNS.height_suffix.captures(&lower))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())?;

    Some(quality_from_height(height))
}

/// Canonical quality for a single label, falling back to "Unknown"
pub fn canonical_quality(label: &str) -> String {
    match_quality(label).unwrap_or_else(|| QUALITY_UNKNOWN.to_string())
}

/// Resolve the quality of a discovered URL.
///
/// Priority: explicit height, then each label hint in order, then the URL itself.
/// HLS playlists that resolve to nothing are labeled "Auto", everything else "Unknown".
pub fn resolve_quality(
    height: Option<u64>,
    hints: &[&str],
    url: &str,
    stream_type: StreamType,
) -> String {
    if let Some(h) = height.filter(|h| *h > 0) {
        return quality_from_height(h);
    }

    hints
        .iter()
        .find_map(|hint| match_quality(hint))
        .or_else(|| match_quality(url_path(url)))
        .unwrap_or_else(|| match stream_type {
            StreamType::Hls => QUALITY_AUTO.to_string(),
            StreamType::Direct => QUALITY_UNKNOWN.to_string(),
        })
}

/// Numeric sort rank. Adaptive streams outrank every fixed resolution, unknown ranks zero.
pub fn quality_rank(quality: &str) -> u32 {
    let lower = quality.trim().to_lowercase();
    match lower.as_str() {
        "auto" | "adaptive" => u32::MAX,
        "4k" | "uhd" => 2160,
        "" | "unknown" => 0,
        _ => {
            let digits: String = lower.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        }
    }
}

/// Whether a link must be replayed with its Referer/Origin headers
pub fn requires_referer(url: &str, gated_hosts: &[&str]) -> bool {
    if StreamType::from_url(url) == StreamType::Hls {
        return true;
    }

    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));

    match host {
        Some(host) => gated_hosts
            .iter()
            .any(|gated| host == *gated || host.ends_with(&format!(".{gated}"))),
        None => false,
    }
}

/// Deduplicate by exact URL (first occurrence wins) and sort by quality rank, best first
pub fn normalize_links(links: Vec<ExtractedLink>) -> Vec<ExtractedLink> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ExtractedLink> = links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect();

    // Stable: equal ranks keep discovery order
    unique.sort_by(|a, b| quality_rank(&b.quality).cmp(&quality_rank(&a.quality)));
    unique
}

/// Host-less tail of a URL, so domain names never feed the token match
fn url_path(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => url,
    }
}
