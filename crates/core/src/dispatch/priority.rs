//! URL priority heuristic used when priority scheduling is enabled.
//!
//! Scores run from 1 to 10; higher scores are dispatched first.

use std::cmp::Reverse;

use url::Url;

const DEFAULT_PRIORITY: i32 = 5;
const SHORT_PATH_LEN: usize = 20;

const NEWS_DOMAINS: &[&str] = &[
    "news.", "cnn.", "bbc.", "nytimes.", "reuters.", "ap.", "afp.", "xinhua.", "people.", "sina.", "sohu.", "netease.",
];
const TECH_DOMAINS: &[&str] = &["github.", "stackoverflow.", "medium.", "dev.to", "towardsdatascience.", "geeksforgeeks."];
/// Slow to fetch and render.
const VIDEO_DOMAINS: &[&str] = &["youtube.", "bilibili.", "tiktok.", "douyin.", "youku.", "iqiyi."];

fn host_matches(host: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| host.contains(needle))
}

/// Score `url` for dispatch ordering.
///
/// Unparseable URLs get the default midpoint score.
pub fn url_priority(url: &str) -> u8 {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_PRIORITY as u8;
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();

    let mut priority = DEFAULT_PRIORITY;
    if parsed.path().len() < SHORT_PATH_LEN {
        priority += 2;
    }
    if host_matches(&host, NEWS_DOMAINS) {
        priority += 3;
    }
    if host_matches(&host, TECH_DOMAINS) {
        priority += 2;
    }
    if host_matches(&host, VIDEO_DOMAINS) {
        priority -= 2;
    }

    priority.clamp(1, 10) as u8
}

/// Reorder `urls` by descending priority, keeping input order among ties.
pub fn prioritize(urls: &mut [String]) {
    urls.sort_by_key(|url| Reverse(url_priority(url)));
}
