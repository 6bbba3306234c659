//! Bounded web page fetch and HTML-to-text extraction.
//!
//! The fetch enforces the configured byte ceiling twice: up front from
//! `Content-Length` when the server sends one, and again while streaming
//! the body, so a lying or absent header cannot push past the limit.

use std::time::Duration;

use reqwest::Url;
use scraper::{Html, Node};
use study_harness_core::StudyError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Elements whose text is never part of the page's readable content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that start a new run of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// HTTP client for fetching study pages.
#[derive(Clone)]
pub struct WebFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl WebFetcher {
    pub fn new(timeout_secs: u64, max_bytes: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, max_bytes })
    }

    /// Fetch `url` and return the page's visible text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, StudyError> {
        let html = self.fetch_html(url).await?;
        Ok(html_to_text(&html))
    }

    /// Fetch `url` and return the raw body, bounded to `max_bytes`.
    pub async fn fetch_html(&self, url: &str) -> Result<String, StudyError> {
        let url = parse_http_url(url)?;
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StudyError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StudyError::FetchFailed(format!("{} returned {}", url, status)));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(StudyError::ContentTooLarge {
                limit: self.max_bytes,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StudyError::FetchFailed(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(StudyError::ContentTooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(%url, bytes = body.len(), "fetched web page");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Parse an absolute `http`/`https` URL.
pub fn parse_http_url(raw: &str) -> Result<Url, StudyError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| StudyError::InvalidSource(format!("invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StudyError::InvalidSource(format!(
            "unsupported URL scheme '{}'",
            other
        ))),
    }
}

/// Extract the readable text of an HTML document.
///
/// The page is parsed as HTML, so markup inside attribute values never
/// leaks and every named or numeric entity is decoded. Text under
/// [`HIDDEN_ELEMENTS`] is dropped; block elements are separated from
/// their neighbours by a space. Whitespace is left for the normalizer to
/// collapse.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    for node in document.root_element().descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => out.push(' '),
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .any(|a| is_element_in(a.value(), HIDDEN_ELEMENTS));
                if hidden {
                    continue;
                }
                // Text right after a closed block (possibly inside inline
                // elements) starts a new run.
                let after_block = std::iter::once(node)
                    .chain(node.ancestors())
                    .take_while(|n| !is_element_in(n.value(), BLOCK_ELEMENTS))
                    .any(|n| {
                        n.prev_sibling().is_some_and(|s| {
                            is_element_in(s.value(), BLOCK_ELEMENTS)
                                || is_element_in(s.value(), HIDDEN_ELEMENTS)
                        })
                    });
                if after_block {
                    out.push(' ');
                }
                out.push_str(text);
            }
            _ => {}
        }
    }
    out
}

fn is_element_in(node: &Node, names: &[&str]) -> bool {
    node.as_element()
        .is_some_and(|el| names.contains(&el.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_harness_core::text::normalize_text;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script type="text/javascript">var x = "<p>not text</p>";</script></head>
            <body><h1>Photosynthesis</h1><!-- hidden --><p>Plants make <b>sugar</b>.</p></body></html>"#;
        let text = normalize_text(&html_to_text(html));
        assert_eq!(text, "Photosynthesis Plants make sugar.");
    }

    #[test]
    fn attribute_markup_does_not_leak() {
        let html = r#"<p><img alt="x > y" src="a.png">Caf&eacute; &rarr; menu</p><p>Price &euro;5</p>"#;
        assert_eq!(normalize_text(&html_to_text(html)), "Café → menu Price €5");
    }

    #[test]
    fn blocks_are_separated_and_inline_runs_joined() {
        let html = "<div>Cell<i>ular</i> respiration</div><ul><li>ATP</li><li>NADH</li></ul>\
                    <noscript>Enable JavaScript</noscript>line one<br>line two\
                    <p>Glycolysis</p><span>Krebs cycle</span>";
        assert_eq!(
            normalize_text(&html_to_text(html)),
            "Cellular respiration ATP NADH line one line two Glycolysis Krebs cycle"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            parse_http_url("ftp://example.com/x"),
            Err(StudyError::InvalidSource(_))
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(StudyError::InvalidSource(_))
        ));
        assert!(parse_http_url(" https://example.com/page ").is_ok());
    }
}
