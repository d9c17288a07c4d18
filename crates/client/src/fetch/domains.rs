//! Host allow/block filtering.

use url::Url;

/// Substring-based host filter. The blocklist wins over the allowlist; an
/// empty allowlist admits every host that is not blocked.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    allowlist: Vec<String>,
    blocklist: Vec<String>,
}

impl DomainFilter {
    pub fn new(allowlist: &[String], blocklist: &[String]) -> Self {
        let clean = |list: &[String]| {
            list.iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        };
        Self { allowlist: clean(allowlist), blocklist: clean(blocklist) }
    }

    /// Whether `url` may be fetched. Unparseable URLs are rejected.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) else {
            return false;
        };

        if let Some(blocked) = self.blocklist.iter().find(|d| host.contains(d.as_str())) {
            tracing::debug!(url, blocked = %blocked, "domain blocked");
            return false;
        }

        self.allowlist.is_empty() || self.allowlist.iter().any(|d| host.contains(d.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_allows_all() {
        let filter = DomainFilter::default();
        assert!(filter.is_allowed("https://anything.example/path"));
        assert!(!filter.is_allowed("not a url"));
    }

    #[test]
    fn test_blocklist() {
        let filter = DomainFilter::new(&[], &list(&["ads.", "Tracker.example"]));
        assert!(!filter.is_allowed("https://ads.example.com/"));
        assert!(!filter.is_allowed("https://cdn.tracker.example/x"));
        assert!(filter.is_allowed("https://news.example.com/"));
    }

    #[test]
    fn test_allowlist() {
        let filter = DomainFilter::new(&list(&["github.com"]), &[]);
        assert!(filter.is_allowed("https://github.com/rust-lang"));
        assert!(!filter.is_allowed("https://gitlab.com/"));
    }

    #[test]
    fn test_blocklist_wins() {
        let filter = DomainFilter::new(&list(&["example.com"]), &list(&["bad.example.com"]));
        assert!(filter.is_allowed("https://good.example.com/"));
        assert!(!filter.is_allowed("https://bad.example.com/"));
    }
}
