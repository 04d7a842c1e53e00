//! URL normalization and crawl scope rules.

use std::net::IpAddr;

use url::Url;

use llmstxt_shared::CrawlConfig;

/// Decides whether a discovered URL belongs to the crawl.
pub trait ScopePredicate: Send + Sync {
    fn allows(&self, url: &Url) -> bool;
}

impl<F> ScopePredicate for F
where
    F: Fn(&Url) -> bool + Send + Sync,
{
    fn allows(&self, url: &Url) -> bool {
        self(url)
    }
}

/// Normalize a URL for deduplication: `scheme://host[:port]/path`.
///
/// Query and fragment are dropped, the host is lowercased and trailing
/// slashes are removed, so the root renders without a path. Returns `None`
/// for anything that is not http(s) or has no host.
pub fn normalize_url(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let mut normalized = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(url.path().trim_end_matches('/'));
    Some(normalized)
}

// ---------------------------------------------------------------------------
// CrawlScope
// ---------------------------------------------------------------------------

/// Default scope: same host, under the root path, no excluded file types.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    /// Root path prefix without trailing slash (empty for the site root).
    base_path: String,
    /// Lowercased host that URLs must match.
    base_host: String,
    /// Port that URLs must match (`None` for the scheme default).
    base_port: Option<u16>,
    /// Lowercased extensions never fetched.
    excluded_extensions: Vec<String>,
    /// Include patterns (if non-empty, the path must match at least one).
    include_patterns: Vec<regex::Regex>,
    /// Exclude patterns (if the path matches any, it's excluded).
    exclude_patterns: Vec<regex::Regex>,
    allow_private_hosts: bool,
}

impl CrawlScope {
    pub fn new(root: &Url, config: &CrawlConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<regex::Regex> {
            patterns.iter().filter_map(|p| glob_to_regex(p)).collect()
        };

        Self {
            base_path: root.path().trim_end_matches('/').to_string(),
            base_host: root.host_str().unwrap_or("").to_ascii_lowercase(),
            base_port: root.port(),
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            include_patterns: compile(&config.include_patterns),
            exclude_patterns: compile(&config.exclude_patterns),
            allow_private_hosts: config.allow_private_hosts,
        }
    }

    fn has_excluded_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or("");
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.excluded_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

impl ScopePredicate for CrawlScope {
    fn allows(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let host = url.host_str().unwrap_or("").to_ascii_lowercase();
        if host != self.base_host || url.port() != self.base_port {
            return false;
        }

        if !self.allow_private_hosts && is_ssrf_target(url) {
            return false;
        }

        let path = url.path().trim_end_matches('/');
        let under_root = self.base_path.is_empty()
            || path == self.base_path
            || path.starts_with(&format!("{}/", self.base_path));
        if !under_root {
            return false;
        }

        if self.has_excluded_extension(path) {
            return false;
        }

        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }

        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| p.is_match(path))
    }
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Whether a URL points at a loopback, private, or local-only host.
fn is_ssrf_target(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return is_private_ip(&ip);
    }
    host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
