//! Web tools: live search, encyclopedia lookup, page scraping, and report
//! export.
//!
//! The search tools return their result as formatted text and degrade to an
//! error *message* rather than failing: the agents hand whatever comes back
//! to the model, which is expected to explain errors to the user.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::config::SearchConfig;

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";

/// DuckDuckGo endpoints, tried in order until one yields results.
const DDG_BACKENDS: &[&str] = &[
    "https://html.duckduckgo.com/html/",
    "https://lite.duckduckgo.com/lite/",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebTools {
    client: Client,
    scrape_max_chars: usize,
}

impl WebTools {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            scrape_max_chars: config.scrape_max_chars,
        })
    }

    /// Live web search via DuckDuckGo.
    /// Good for: news, current events, prices.
    pub async fn search_web(&self, query: &str, max_results: usize) -> String {
        debug!("Searching the web for: {}", query);

        for backend in DDG_BACKENDS {
            let response = self
                .client
                .get(*backend)
                .query(&[("q", query)])
                .send()
                .await;

            let body = match response {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => body,
                    Err(_) => continue,
                },
                _ => continue,
            };

            let hits = parse_ddg_results(&body, max_results);
            if !hits.is_empty() {
                return format_search_results(&hits);
            }
        }

        "Error: All search backends failed. Try again later.".to_string()
    }

    /// Wikipedia summary lookup via the public MediaWiki API.
    /// Good for: definitions, history, science, biography.
    pub async fn search_wikipedia(&self, query: &str) -> String {
        debug!("Checking Wikipedia for: {}", query);

        match self.wikipedia_inner(query).await {
            Ok(summary) => summary,
            Err(e) => format!("Wikipedia tool error: {}", e),
        }
    }

    async fn wikipedia_inner(&self, query: &str) -> Result<String> {
        // Step 1: find the top matching page id
        let search: Value = self
            .client
            .get(WIKIPEDIA_API)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("utf8", "1"),
                ("srlimit", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let page_id = match top_wiki_page_id(&search) {
            Some(id) => id,
            None => return Ok("No Wikipedia articles found.".to_string()),
        };

        // Step 2: fetch the plain-text intro of that page
        let extract: Value = self
            .client
            .get(WIKIPEDIA_API)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts"),
                ("pageids", page_id.to_string().as_str()),
                ("exintro", "1"),
                ("explaintext", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let (title, text) = wiki_extract(&extract, page_id)
            .ok_or_else(|| anyhow::anyhow!("Malformed extract response"))?;

        Ok(format!("### Wikipedia: {}\n{}", title, text))
    }

    /// Visit a URL and extract the readable text.
    /// Good for: reading a specific article found in search results.
    pub async fn scrape_url(&self, url: &str) -> String {
        debug!("Scraping URL: {}", url);

        match self.scrape_inner(url).await {
            Ok(text) => text,
            Err(e) => format!("Scraping error: Could not read page. ({})", e),
        }
    }

    async fn scrape_inner(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let html = response.text().await?;

        let text = clean_page_text(&html, self.scrape_max_chars);
        Ok(format!("### Content from {}:\n{}", url, text))
    }
}

/// Save a report to the export directory, returning a confirmation line.
pub fn export_report(dir: &Path, title: &str, content: &str) -> Result<String> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let filename = format!(
        "{}_{}.md",
        sanitize_title(title),
        chrono::Utc::now().timestamp()
    );
    let filepath: PathBuf = dir.join(filename);

    std::fs::write(&filepath, content)
        .with_context(|| format!("Failed to write report: {}", filepath.display()))?;

    Ok(format!(
        "Report saved successfully to: {}",
        filepath.display()
    ))
}

/// Keep alphanumerics and spaces, then turn spaces into underscores.
fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    let trimmed = kept.trim();
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.replace(' ', "_")
    }
}

// ── DuckDuckGo HTML parsing ──

static DDG_RESULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).expect("valid regex")
});

static DDG_SNIPPET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="result__snippet"[^>]*>(.*?)</a>"#).expect("valid regex"));

static DDG_LITE_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="([^"]*)"[^>]*class=['"]result-link['"][^>]*>(.*?)</a>"#)
        .expect("valid regex")
});

static DDG_LITE_SNIPPET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class=['"]result-snippet['"][^>]*>(.*?)</td>"#).expect("valid regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Parse search results out of either DuckDuckGo HTML flavor.
fn parse_ddg_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let (link_re, snippet_re): (&Regex, &Regex) = if html.contains("result__a") {
        (&DDG_RESULT_RE, &DDG_SNIPPET_RE)
    } else {
        (&DDG_LITE_LINK_RE, &DDG_LITE_SNIPPET_RE)
    };

    let links: Vec<_> = link_re.captures_iter(html).collect();
    let snippets: Vec<_> = snippet_re.captures_iter(html).collect();

    links
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, cap)| {
            let url = cap.get(1).map_or("", |m| m.as_str());
            let title = cap.get(2).map_or("", |m| m.as_str());
            let snippet = snippets
                .get(i)
                .and_then(|s| s.get(1))
                .map_or("", |m| m.as_str());

            SearchHit {
                title: strip_tags(title),
                url: clean_ddg_url(url),
                snippet: strip_tags(snippet),
            }
        })
        .filter(|hit| !hit.url.is_empty())
        .collect()
}

/// DuckDuckGo wraps result links in a redirect; unwrap the `uddg` target.
fn clean_ddg_url(url: &str) -> String {
    if let Some(encoded) = url.split("uddg=").nth(1) {
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.to_string();
        }
    }
    url.to_string()
}

fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_search_results(hits: &[SearchHit]) -> String {
    let mut formatted = String::new();
    for (i, hit) in hits.iter().enumerate() {
        formatted.push_str(&format!("Source {}: {}\n", i + 1, hit.title));
        formatted.push_str(&format!("URL: {}\n", hit.url));
        formatted.push_str(&format!("Snippet: {}\n\n", hit.snippet));
    }
    formatted
}

// ── Wikipedia API parsing ──

fn top_wiki_page_id(response: &Value) -> Option<i64> {
    response["query"]["search"].as_array()?.first()?["pageid"].as_i64()
}

fn wiki_extract(response: &Value, page_id: i64) -> Option<(String, String)> {
    let page = &response["query"]["pages"][page_id.to_string()];
    let title = page["title"].as_str()?.to_string();
    let extract = page["extract"].as_str()?.to_string();
    Some((title, extract))
}

// ── Page scraping ──

/// Render HTML to plain text, collapse whitespace, and cap the length so a
/// scraped page cannot blow the context window.
fn clean_page_text(html: &str, max_chars: usize) -> String {
    let rendered = html2text::from_read(html.as_bytes(), 100).unwrap_or_default();

    let cleaned: String = rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.chars().count() > max_chars {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDG_HTML_FIXTURE: &str = r#"
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">The <b>Rust</b> Programming Language</a>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F">A language empowering everyone to build reliable software.</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://doc.rust-lang.org/book/">The Rust Book</a>
          <a class="result__snippet" href="https://doc.rust-lang.org/book/">Learn Rust step by step.</a>
        </div>
    "#;

    const DDG_LITE_FIXTURE: &str = r#"
        <tr><td><a rel="nofollow" href="https://example.com/one" class='result-link'>First result</a></td></tr>
        <tr><td class='result-snippet'>Snippet one here.</td></tr>
        <tr><td><a rel="nofollow" href="https://example.com/two" class='result-link'>Second result</a></td></tr>
        <tr><td class='result-snippet'>Snippet two here.</td></tr>
    "#;

    #[test]
    fn parses_html_backend_results() {
        let hits = parse_ddg_results(DDG_HTML_FIXTURE, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Rust Programming Language");
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert!(hits[0].snippet.contains("reliable software"));
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn respects_max_results() {
        let hits = parse_ddg_results(DDG_HTML_FIXTURE, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn parses_lite_backend_results() {
        let hits = parse_ddg_results(DDG_LITE_FIXTURE, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "First result");
        assert_eq!(hits[0].url, "https://example.com/one");
        assert_eq!(hits[1].snippet, "Snippet two here.");
    }

    #[test]
    fn unwraps_redirect_urls() {
        assert_eq!(
            clean_ddg_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=x"),
            "https://example.com/page"
        );
        // Direct URLs pass through
        assert_eq!(clean_ddg_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn formats_results_as_numbered_sources() {
        let hits = vec![SearchHit {
            title: "Title".to_string(),
            url: "https://example.com".to_string(),
            snippet: "A snippet.".to_string(),
        }];

        let formatted = format_search_results(&hits);
        assert!(formatted.starts_with("Source 1: Title\n"));
        assert!(formatted.contains("URL: https://example.com\n"));
        assert!(formatted.contains("Snippet: A snippet.\n"));
    }

    #[test]
    fn wiki_search_response_yields_page_id() {
        let response: Value = serde_json::from_str(
            r#"{"query":{"search":[{"pageid":25555,"title":"Rust"}]}}"#,
        )
        .unwrap();
        assert_eq!(top_wiki_page_id(&response), Some(25555));

        let empty: Value = serde_json::from_str(r#"{"query":{"search":[]}}"#).unwrap();
        assert_eq!(top_wiki_page_id(&empty), None);
    }

    #[test]
    fn wiki_extract_response_yields_title_and_text() {
        let response: Value = serde_json::from_str(
            r#"{"query":{"pages":{"25555":{"title":"Rust","extract":"Rust is a language."}}}}"#,
        )
        .unwrap();

        let (title, text) = wiki_extract(&response, 25555).unwrap();
        assert_eq!(title, "Rust");
        assert_eq!(text, "Rust is a language.");

        assert!(wiki_extract(&response, 999).is_none());
    }

    #[test]
    fn clean_page_text_strips_markup_and_truncates() {
        let html = "<html><head><script>var x = 1;</script></head>\
                    <body><h1>Heading</h1><p>Paragraph text.</p></body></html>";
        let text = clean_page_text(html, 3000);
        assert!(text.contains("Heading"));
        assert!(text.contains("Paragraph text."));
        assert!(!text.contains("var x"));

        let truncated = clean_page_text(html, 5);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 8);
    }

    #[test]
    fn sanitize_title_keeps_alphanumerics() {
        assert_eq!(sanitize_title("Deep Research: AI?"), "Deep_Research_AI");
        assert_eq!(sanitize_title("  hello  world  "), "hello__world");
        assert_eq!(sanitize_title("!!!"), "report");
    }

    #[test]
    fn export_report_writes_markdown_file() {
        let tmp = tempfile::tempdir().unwrap();
        let msg = export_report(tmp.path(), "My Report", "# Contents").unwrap();
        assert!(msg.contains("Report saved successfully to:"));

        let files: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with("My_Report_"));
        assert!(name.ends_with(".md"));
        assert_eq!(
            std::fs::read_to_string(files[0].path()).unwrap(),
            "# Contents"
        );
    }
}
