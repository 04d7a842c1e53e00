//! Fetch capability: retrieve a page and pull out its text and links.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use llmstxt_shared::{LlmsTxtError, Result};

use crate::scope::normalize_url;

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("llmstxt/", env!("CARGO_PKG_VERSION"));

/// Elements whose text never counts as visible page content.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "nav", "template", "svg"];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static H1_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static META_DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// What a successful fetch yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedDocument {
    /// HTTP status code.
    pub status: u16,
    /// `<title>` text.
    pub title: Option<String>,
    /// First `<h1>` text.
    pub heading: Option<String>,
    /// `<meta name="description">` content.
    pub meta_description: Option<String>,
    /// Visible body text, whitespace collapsed.
    pub text: String,
    /// Absolute, normalized outbound links in document order.
    pub links: Vec<String>,
}

/// Retrieves a single page. One attempt per call; no retries.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// [`Fetcher`] backed by `reqwest` and `scraper`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| LlmsTxtError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument> {
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| LlmsTxtError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmsTxtError::Network(format!("{url}: HTTP {status}")));
        }

        // Links resolve against the final URL after redirects.
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| LlmsTxtError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(parse_html(&body, &final_url, status.as_u16()))
    }
}

// ---------------------------------------------------------------------------
// HTML extraction
// ---------------------------------------------------------------------------

/// Extract title, heading, description, visible text, and links from HTML.
pub fn parse_html(body: &str, base_url: &Url, status: u16) -> FetchedDocument {
    let doc = Html::parse_document(body);

    FetchedDocument {
        status,
        title: first_text(&doc, &TITLE_SEL),
        heading: first_text(&doc, &H1_SEL),
        meta_description: doc
            .select(&META_DESC_SEL)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty()),
        text: visible_text(&doc),
        links: extract_links(&doc, base_url),
    }
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
}

fn visible_text(doc: &Html) -> String {
    let Some(body) = doc.select(&BODY_SEL).next() else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Resolve every `<a href>` against the page URL, dropping non-page links.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Some(normalized) = base_url.join(href).ok().and_then(|u| normalize_url(&u)) else {
            continue;
        };
        if !links.contains(&normalized) {
            links.push(normalized);
        }
    }

    links
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html>
        <head>
            <title>  Graduate   Programs | Example </title>
            <meta name="description" content="Explore our graduate programs. Apply today.">
            <style>.x { color: red }</style>
        </head>
        <body>
            <nav><a href="/about">About</a></nav>
            <main>
                <h1>Graduate Programs</h1>
                <p>We offer   MBA and MSF degrees.</p>
                <script>var tracking = 1;</script>
                <a href="mba/">MBA</a>
                <a href="/programs/msf?utm=1#top">MSF</a>
                <a href="#section">Anchor</a>
                <a href="mailto:info@example.edu">Mail</a>
                <a href="tel:+15551234">Call</a>
                <a href="javascript:void(0)">JS</a>
                <a href="https://external.com/page">External</a>
                <a href="/about">About again</a>
            </main>
        </body>
    </html>"##;

    #[test]
    fn parses_title_heading_and_description() {
        let base = Url::parse("https://example.edu/programs/").unwrap();
        let doc = parse_html(PAGE, &base, 200);

        assert_eq!(doc.status, 200);
        assert_eq!(doc.title.as_deref(), Some("Graduate Programs | Example"));
        assert_eq!(doc.heading.as_deref(), Some("Graduate Programs"));
        assert_eq!(
            doc.meta_description.as_deref(),
            Some("Explore our graduate programs. Apply today.")
        );
    }

    #[test]
    fn visible_text_skips_scripts_and_nav() {
        let base = Url::parse("https://example.edu/programs/").unwrap();
        let doc = parse_html(PAGE, &base, 200);

        assert!(doc.text.contains("We offer MBA and MSF degrees."));
        assert!(!doc.text.contains("tracking"));
        assert!(!doc.text.contains("color: red"));
        assert!(!doc.text.starts_with("About"));
    }

    #[test]
    fn links_are_resolved_normalized_and_deduplicated() {
        let base = Url::parse("https://example.edu/programs/").unwrap();
        let doc = parse_html(PAGE, &base, 200);

        assert_eq!(
            doc.links,
            vec![
                "https://example.edu/about",
                "https://example.edu/programs/mba",
                "https://example.edu/programs/msf",
                "https://external.com/page",
            ]
        );
    }

    #[tokio::test]
    async fn http_fetcher_reads_pages_and_rejects_errors() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><head><title>Home</title></head><body><a href=\"/a\">A</a></body></html>"),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let root = Url::parse(&server.uri()).unwrap();
        let doc = fetcher.fetch(&root).await.unwrap();
        assert_eq!(doc.title.as_deref(), Some("Home"));
        assert_eq!(doc.links, vec![format!("{}/a", server.uri())]);

        let missing = root.join("/missing").unwrap();
        let err = fetcher.fetch(&missing).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
