//! YouTube link extraction and mirror rewriting.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::types::LinkRecord;

/// Mirror front-ends offered as additional alternatives in replies.
pub const ALTERNATIVE_MIRRORS: &[&str] = &["yewtu.be", "invidio.us", "piped.video"];

/// Length of a YouTube video identifier.
const VIDEO_ID_LEN: usize = 11;

/// The URL shapes a rule recognizes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkShape {
    Watch,
    Short,
    Mobile,
    Embed,
    Shorts,
    NoCookie,
    Playlist,
    Gaming,
    Tv,
}

struct Rule {
    shape: LinkShape,
    pattern: Regex,
}

/// Any run of id characters; length is checked separately so that a URL with
/// a too-short or too-long token is rejected instead of truncated.
const ID: &str = "([A-Za-z0-9_-]+)";

/// Query string up to the first `v=` parameter, in any position.
const QUERY_V: &str = r"\?(?:[^\s#&]*&)*?v=";

/// A link starts at the beginning of the text or after a character that
/// cannot continue a host name, so `notyoutube.com` and `not-youtube.com`
/// never match. Group 1 is the link, group 2 the id.
const BOUNDARY: &str = r"(?:^|[^\w.-])";

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let rule = |shape, body: String| Rule {
        shape,
        pattern: Regex::new(&format!(r"(?i){}((?:https?://)?{})", BOUNDARY, body))
            .expect("Invalid link pattern"),
    };

    vec![
        rule(LinkShape::Watch, format!(r"(?:www\.)?youtube\.com/watch{QUERY_V}{ID}")),
        rule(LinkShape::Short, format!(r"youtu\.be/{ID}")),
        rule(LinkShape::Mobile, format!(r"m\.youtube\.com/watch{QUERY_V}{ID}")),
        rule(LinkShape::Embed, format!(r"(?:www\.|m\.)?youtube\.com/embed/{ID}")),
        rule(LinkShape::Shorts, format!(r"(?:www\.|m\.)?youtube\.com/shorts/{ID}")),
        rule(LinkShape::NoCookie, format!(r"(?:www\.)?youtube-nocookie\.com/embed/{ID}")),
        rule(LinkShape::Playlist, format!(r"(?:www\.|m\.)?youtube\.com/playlist{QUERY_V}{ID}")),
        rule(LinkShape::Gaming, format!(r"gaming\.youtube\.com/watch{QUERY_V}{ID}")),
        rule(LinkShape::Tv, format!(r"(?:www\.|m\.)?youtube\.com/tv[^\s]*?[?&]v={ID}")),
    ]
});

static VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid video id pattern"));

/// Check that a token is a well-formed video identifier.
pub fn is_valid_video_id(token: &str) -> bool {
    token.len() == VIDEO_ID_LEN && VIDEO_ID.is_match(token)
}

/// Extract the first valid video identifier from a single URL.
///
/// Rules are tried in priority order, mirroring how the extractor assigns
/// ownership of an identifier.
pub fn video_id_from_url(url: &str) -> Option<String> {
    RULES.iter().find_map(|rule| {
        rule.pattern
            .captures_iter(url)
            .filter_map(|caps| caps.get(2))
            .map(|m| m.as_str())
            .find(|id| is_valid_video_id(id))
            .map(str::to_string)
    })
}

/// Finds video links in text and rewrites them to a privacy mirror.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    mirror_host: String,
}

impl LinkExtractor {
    /// Create an extractor that rewrites to the given mirror host.
    pub fn new(mirror_host: impl Into<String>) -> Self {
        Self {
            mirror_host: mirror_host.into(),
        }
    }

    /// Extract deduplicated link records from a title and body.
    ///
    /// Matching is case-insensitive over `title` followed by `body`. Records
    /// come back in order of first occurrence; when two rules match at the
    /// same position the earlier rule wins. Each video id appears once, with
    /// the URL of its first occurrence.
    pub fn extract(&self, title: &str, body: &str) -> Vec<LinkRecord> {
        let content = format!("{} {}", title, body);

        let mut hits: Vec<(usize, usize, &str, &str)> = Vec::new();
        for (rule_index, rule) in RULES.iter().enumerate() {
            for caps in rule.pattern.captures_iter(&content) {
                let (Some(whole), Some(id)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };

                if !is_valid_video_id(id.as_str()) {
                    debug!(
                        shape = ?rule.shape,
                        candidate = id.as_str(),
                        "link_candidate_rejected"
                    );
                    continue;
                }

                hits.push((whole.start(), rule_index, whole.as_str(), id.as_str()));
            }
        }

        hits.sort_by_key(|&(start, rule_index, _, _)| (start, rule_index));

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for (_, rule_index, matched, id) in hits {
            if !seen.insert(id) {
                continue;
            }
            debug!(
                shape = ?RULES[rule_index].shape,
                video_id = id,
                url = matched,
                "link_detected"
            );
            records.push(LinkRecord::new(matched.to_string(), id.to_string()));
        }

        if !records.is_empty() {
            info!(unique_videos = records.len(), "links_extracted");
        }

        records
    }

    /// Rewrite a record to the mirror's watch URL.
    ///
    /// A record without an identifier falls back to its source URL.
    pub fn to_mirror_url(&self, record: &LinkRecord) -> String {
        if record.canonical_id.is_empty() {
            warn!(url = %record.source_url, "mirror_rewrite_missing_id");
            return record.source_url.clone();
        }

        watch_url(&self.mirror_host, &record.canonical_id)
    }

    /// Watch URLs for a video on every alternative mirror other than ours.
    pub fn alternatives(&self, video_id: &str) -> Vec<String> {
        ALTERNATIVE_MIRRORS
            .iter()
            .filter(|host| !host.eq_ignore_ascii_case(&self.mirror_host))
            .map(|host| watch_url(host, video_id))
            .collect()
    }
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIRROR_HOST)
    }
}

fn watch_url(host: &str, video_id: &str) -> String {
    format!("https://{}/watch?v={}", host, video_id)
}
