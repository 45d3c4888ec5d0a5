//! EndpointClassifier: is a request target worth inspecting?
//!
//! Tiers, first applicable wins:
//! 1. learned endpoint: origin + path starts with it
//! 2. pinned path substring from config
//! 3. discovery: host belongs to the trusted domain family
//!
//! Classification is pure. The interceptor owns the `DiscoveryLog` and notes
//! paths seen in discovery mode.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EndpointConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointTier {
    Learned,
    Pinned,
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointVerdict {
    Allowed(EndpointTier),
    Disallowed,
}

impl EndpointVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, EndpointVerdict::Allowed(_))
    }
}

pub struct EndpointClassifier {
    pinned_path: Option<String>,
    trusted_domains: Vec<String>,
    page_url: Option<Url>,
}

impl EndpointClassifier {
    /// `page_url` resolves relative targets and supplies the default domain
    /// family when none is configured.
    pub fn new(config: &EndpointConfig, page_url: Option<&str>) -> Self {
        let page_url = page_url.and_then(|u| Url::parse(u).ok());

        let mut trusted_domains: Vec<String> = config
            .trusted_domains
            .iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if trusted_domains.is_empty() {
            if let Some(family) = page_url.as_ref().and_then(|u| u.host_str()).and_then(host_family) {
                trusted_domains.push(family);
            }
        }

        Self {
            pinned_path: config.pinned_path.clone().filter(|p| !p.is_empty()),
            trusted_domains,
            page_url,
        }
    }

    /// Parse `target`, resolving it against the page URL when relative.
    pub fn resolve(&self, target: &str) -> Option<Url> {
        match &self.page_url {
            Some(base) => base.join(target).ok(),
            None => Url::parse(target).ok(),
        }
    }

    pub fn classify(&self, url: &Url, learned_endpoint: Option<&str>) -> EndpointVerdict {
        if let Some(endpoint) = learned_endpoint {
            return if endpoint_of(url).starts_with(endpoint) {
                EndpointVerdict::Allowed(EndpointTier::Learned)
            } else {
                EndpointVerdict::Disallowed
            };
        }
        if let Some(pinned) = &self.pinned_path {
            return if url.path().contains(pinned.as_str()) {
                EndpointVerdict::Allowed(EndpointTier::Pinned)
            } else {
                EndpointVerdict::Disallowed
            };
        }
        match url.host_str() {
            Some(host) if self.in_family(host) => EndpointVerdict::Allowed(EndpointTier::Discovery),
            _ => EndpointVerdict::Disallowed,
        }
    }

    /// True when neither a learned endpoint nor a pinned path narrows traffic.
    pub fn is_discovery_mode(&self, learned_endpoint: Option<&str>) -> bool {
        learned_endpoint.is_none() && self.pinned_path.is_none()
    }

    pub fn trusted_domains(&self) -> &[String] {
        &self.trusted_domains
    }

    fn in_family(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.trusted_domains.iter().any(|d| {
            host == *d || (host.len() > d.len() && host.ends_with(d.as_str()) && host[..host.len() - d.len()].ends_with('.'))
        })
    }
}

/// Origin + path, the form a learned endpoint is stored in.
pub fn endpoint_of(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

/// Last two labels of a host name; IP literals have no family.
fn host_family(host: &str) -> Option<String> {
    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return None;
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => None,
        1 => Some(labels[0].to_ascii_lowercase()),
        n => Some(format!("{}.{}", labels[n - 2], labels[n - 1]).to_ascii_lowercase()),
    }
}

// =============================================================================
// DiscoveryLog
// =============================================================================

/// Bounded, deduplicated record of request paths seen in discovery mode.
/// Paths only: never query strings, never bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryLog {
    limit: usize,
    paths: Vec<String>,
    dropped: usize,
}

impl DiscoveryLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            paths: Vec::new(),
            dropped: 0,
        }
    }

    pub fn note(&mut self, path: &str) {
        if self.paths.iter().any(|p| p == path) {
            return;
        }
        if self.paths.len() >= self.limit {
            self.dropped += 1;
            return;
        }
        self.paths.push(path.to_string());
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Distinct paths not recorded because the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(config: EndpointConfig) -> EndpointClassifier {
        EndpointClassifier::new(&config, Some("https://disneyworld.disney.go.com/resorts/"))
    }

    fn url(c: &EndpointClassifier, s: &str) -> Url {
        c.resolve(s).expect("url")
    }

    #[test]
    fn test_default_family_from_page_host() {
        let c = classifier(EndpointConfig::default());
        assert_eq!(c.trusted_domains(), &["go.com".to_string()]);
        let u = url(&c, "https://api.disney.go.com/pricing?x=1");
        assert_eq!(c.classify(&u, None), EndpointVerdict::Allowed(EndpointTier::Discovery));
        let u = url(&c, "https://tracker.example.net/collect");
        assert_eq!(c.classify(&u, None), EndpointVerdict::Disallowed);
        // suffix without a label boundary is not family
        let u = url(&c, "https://notgo.com/x");
        assert_eq!(c.classify(&u, None), EndpointVerdict::Disallowed);
    }

    #[test]
    fn test_relative_targets_resolve_against_page() {
        let c = classifier(EndpointConfig::default());
        let u = url(&c, "/api/availability?checkIn=2024-03-01");
        assert_eq!(u.host_str(), Some("disneyworld.disney.go.com"));
        assert!(c.classify(&u, None).is_allowed());
    }

    #[test]
    fn test_pinned_path_tier() {
        let c = classifier(EndpointConfig {
            pinned_path: Some("/pricing".to_string()),
            ..EndpointConfig::default()
        });
        let u = url(&c, "https://cdn.other.com/v1/pricing/quote");
        assert_eq!(c.classify(&u, None), EndpointVerdict::Allowed(EndpointTier::Pinned));
        let u = url(&c, "https://api.disney.go.com/availability");
        assert_eq!(c.classify(&u, None), EndpointVerdict::Disallowed);
        assert!(!c.is_discovery_mode(None));
    }

    #[test]
    fn test_learned_endpoint_narrows_discovery() {
        let c = classifier(EndpointConfig::default());
        let other = url(&c, "https://api.disney.go.com/availability");
        assert!(c.classify(&other, None).is_allowed());

        let learned = "https://api.disney.go.com/pricing";
        assert_eq!(c.classify(&other, Some(learned)), EndpointVerdict::Disallowed);
        let same = url(&c, "https://api.disney.go.com/pricing?adults=2");
        assert_eq!(c.classify(&same, Some(learned)), EndpointVerdict::Allowed(EndpointTier::Learned));
        assert!(!c.is_discovery_mode(Some(learned)));
    }

    #[test]
    fn test_endpoint_of_drops_query_and_fragment() {
        let u = Url::parse("https://api.example.com:8443/a/b?c=1#d").unwrap();
        assert_eq!(endpoint_of(&u), "https://api.example.com:8443/a/b");
    }

    #[test]
    fn test_configured_family_and_ip_page() {
        let c = EndpointClassifier::new(
            &EndpointConfig {
                trusted_domains: vec![".Example.com".to_string()],
                ..EndpointConfig::default()
            },
            Some("http://127.0.0.1:8080/"),
        );
        assert_eq!(c.trusted_domains(), &["example.com".to_string()]);
        let u = c.resolve("https://API.example.com/x").unwrap();
        assert!(c.classify(&u, None).is_allowed());

        let bare = EndpointClassifier::new(&EndpointConfig::default(), Some("http://127.0.0.1/"));
        assert!(bare.trusted_domains().is_empty());
        let u = bare.resolve("/x").unwrap();
        assert!(!bare.classify(&u, None).is_allowed());
    }

    #[test]
    fn test_discovery_log_bounded_and_deduped() {
        let mut log = DiscoveryLog::new(2);
        log.note("/a");
        log.note("/a");
        log.note("/b");
        log.note("/c");
        assert_eq!(log.paths(), &["/a".to_string(), "/b".to_string()]);
        assert_eq!(log.dropped(), 1);
        log.clear();
        assert!(log.paths().is_empty());
    }
}
