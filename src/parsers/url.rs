//! Web page parser: fetches a URL and renders its HTML body as markdown.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Node, Selector};
use serde_json::json;
use tracing::info;
use url::Url;

use crate::errors::IngestError;
use crate::parsers::{extract_markdown_title, ParseResult, Parser};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("url regex"));

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Parser for HTTP/HTTPS sources.
#[derive(Debug)]
pub struct UrlParser {
    client: reqwest::Client,
}

impl UrlParser {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for UrlParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Parser for UrlParser {
    fn can_parse(&self, source: &str) -> bool {
        URL_RE.is_match(source)
    }

    async fn parse(&self, source: &str) -> Result<ParseResult, IngestError> {
        let url = Url::parse(source)
            .map_err(|err| IngestError::Parsing(format!("invalid URL {source}: {err}")))?;

        info!(%url, "fetching URL");
        let response = self
            .client
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let html = response.text().await?;

        let (content, dom_title) = convert_html(&html);
        if content.trim().is_empty() {
            return Err(IngestError::Parsing(format!(
                "URL parsing resulted in empty content: {source}"
            )));
        }

        let title = extract_markdown_title(&content).or(dom_title);
        info!(%url, chars = content.chars().count(), "URL parsed");

        Ok(ParseResult {
            content,
            title,
            metadata: json!({
                "source_url": source,
                "content_type": content_type,
                "status_code": status_code,
            }),
        })
    }
}

/// Renders HTML as markdown and extracts the `<title>` element.
///
/// Synchronous on purpose: the parsed DOM is not `Send` and must not live
/// across an await point.
fn convert_html(html: &str) -> (String, Option<String>) {
    let doc = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("title selector");
    let dom_title = doc
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut out = String::new();
    for child in doc.tree.root().children() {
        render(child, &mut out, RenderState::default());
    }

    (tidy_markdown(&out), dom_title)
}

#[derive(Clone, Copy, Default)]
struct RenderState {
    list_depth: usize,
    preformatted: bool,
}

fn render(node: ego_tree::NodeRef<'_, Node>, out: &mut String, state: RenderState) {
    match node.value() {
        Node::Text(text) => {
            if state.preformatted {
                out.push_str(&text);
            } else {
                push_inline_text(out, &text);
            }
        }
        Node::Element(el) => {
            let name = el.name();
            match name {
                "script" | "style" | "head" | "noscript" | "template" => {}
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    ensure_blank_line(out);
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    render_children(node, out, state);
                    ensure_blank_line(out);
                }
                "p" | "div" | "section" | "article" | "main" | "blockquote" | "table" | "tr" => {
                    ensure_blank_line(out);
                    render_children(node, out, state);
                    ensure_blank_line(out);
                }
                "ul" | "ol" => {
                    ensure_blank_line(out);
                    render_children(
                        node,
                        out,
                        RenderState {
                            list_depth: state.list_depth + 1,
                            ..state
                        },
                    );
                    ensure_blank_line(out);
                }
                "li" => {
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&"  ".repeat(state.list_depth.saturating_sub(1)));
                    out.push_str("- ");
                    render_children(node, out, state);
                }
                "a" => {
                    let mut text = String::new();
                    render_children(node, &mut text, state);
                    let text = text.trim();
                    match el.attr("href") {
                        Some(href) if !text.is_empty() => {
                            out.push_str(&format!("[{text}]({href})"));
                        }
                        _ => out.push_str(text),
                    }
                }
                "pre" => {
                    ensure_blank_line(out);
                    out.push_str("```\n");
                    render_children(
                        node,
                        out,
                        RenderState {
                            preformatted: true,
                            ..state
                        },
                    );
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str("```");
                    ensure_blank_line(out);
                }
                "code" if !state.preformatted => {
                    out.push('`');
                    render_children(node, out, state);
                    out.push('`');
                }
                "strong" | "b" => {
                    out.push_str("**");
                    render_children(node, out, state);
                    out.push_str("**");
                }
                "em" | "i" => {
                    out.push('*');
                    render_children(node, out, state);
                    out.push('*');
                }
                "br" => out.push('\n'),
                _ => render_children(node, out, state),
            }
        }
        _ => {}
    }
}

fn render_children(node: ego_tree::NodeRef<'_, Node>, out: &mut String, state: RenderState) {
    for child in node.children() {
        render(child, out, state);
    }
}

/// Appends text with whitespace runs collapsed to single spaces.
fn push_inline_text(out: &mut String, text: &str) {
    let mut pending_space = out
        .chars()
        .last()
        .is_some_and(|c| !c.is_whitespace() && c != '(' && c != '[');
    let mut seen_space = false;
    for word in text.split_whitespace() {
        if pending_space || seen_space {
            out.push(' ');
        }
        out.push_str(word);
        pending_space = false;
        seen_space = true;
    }
    if !seen_space && text.chars().any(char::is_whitespace) && !out.ends_with(' ') && !out.is_empty()
    {
        out.push(' ');
    }
}

fn ensure_blank_line(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

/// Collapses runs of 3+ newlines and trims the result.
fn tidy_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut newlines = 0usize;
    for c in raw.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_http_and_https() {
        let parser = UrlParser::new();
        assert!(parser.can_parse("https://example.com/page"));
        assert!(parser.can_parse("HTTP://EXAMPLE.COM"));
        assert!(!parser.can_parse("ftp://example.com"));
        assert!(!parser.can_parse("document.pdf"));
    }

    #[test]
    fn headings_become_atx_markdown() {
        let (md, title) = convert_html(
            "<html><head><title>Page</title></head>\
             <body><h1>Top</h1><p>Body text.</p><h2>Sub</h2></body></html>",
        );
        assert!(md.contains("# Top"));
        assert!(md.contains("## Sub"));
        assert!(md.contains("Body text."));
        assert_eq!(title.as_deref(), Some("Page"));
    }

    #[test]
    fn scripts_and_styles_are_dropped() {
        let (md, _) = convert_html(
            "<body><script>var x = 1;</script><style>p{}</style><p>kept</p></body>",
        );
        assert!(!md.contains("var x"));
        assert!(!md.contains("p{}"));
        assert!(md.contains("kept"));
    }

    #[test]
    fn links_and_lists_render() {
        let (md, _) = convert_html(
            "<body><ul><li><a href=\"https://a.example\">first</a></li>\
             <li>second</li></ul></body>",
        );
        assert!(md.contains("- [first](https://a.example)"));
        assert!(md.contains("- second"));
    }

    #[test]
    fn pre_blocks_keep_whitespace() {
        let (md, _) = convert_html("<body><pre>fn main() {\n    run();\n}</pre></body>");
        assert!(md.contains("```\nfn main() {\n    run();\n}\n```"));
    }
}
