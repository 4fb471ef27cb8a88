//! HTML and Markdown parsing (spec §4.3), ported from the original
//! implementation's `parsers/html.py` and `parsers/markdown.py`.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

const REMOVE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "form",
    "button", "input", "svg", "canvas", "video", "audio",
];

const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    "#content",
    "#main-content",
    ".content",
    ".main-content",
    ".article",
    ".post",
    ".documentation",
    ".docs",
];

const MIN_MAIN_CONTENT_CHARS: usize = 200;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub content: String,
    pub title: Option<String>,
    pub language: String,
    pub metadata: BTreeMap<String, String>,
}

/// Parse an HTML document. `REMOVE_TAGS` elements are dropped first so they
/// never leak into the main-content text, then a priority selector list
/// picks the content root (first candidate with >= 200 trimmed chars),
/// falling back to `<body>`.
pub fn parse_html(content: &str, origin_url: Option<&str>) -> ParsedDocument {
    let document = Html::parse_document(content);

    let title = extract_title(&document);
    let language = extract_language(&document);
    let metadata = extract_metadata(&document, origin_url);

    let text = find_main_content_text(&document).unwrap_or_else(|| body_text(&document));

    ParsedDocument {
        content: clean_text(&text),
        title,
        language,
        metadata,
    }
}

fn find_main_content_text(document: &Html) -> Option<String> {
    for raw_selector in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            if text.trim().chars().count() >= MIN_MAIN_CONTENT_CHARS {
                return Some(text);
            }
        }
    }
    None
}

fn body_text(document: &Html) -> String {
    static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
    document
        .select(&BODY_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Collects text from an element, skipping subtrees rooted at `REMOVE_TAGS`.
fn element_text(element: ElementRef) -> String {
    let mut lines = Vec::new();
    collect_text(element, &mut lines);
    lines
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<String>) {
    if REMOVE_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push(text.to_string());
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
    if let Some(el) = document.select(&TITLE_SELECTOR).next() {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }

    static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
    if let Some(el) = document.select(&H1_SELECTOR).next() {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }

    static OG_TITLE_SELECTOR: Lazy<Selector> =
        Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
    document
        .select(&OG_TITLE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_language(document: &Html) -> String {
    static HTML_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("html").unwrap());
    if let Some(lang) = document
        .select(&HTML_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("lang"))
    {
        return collapse_language(lang);
    }

    static LANG_META_SELECTOR: Lazy<Selector> =
        Lazy::new(|| Selector::parse(r#"meta[http-equiv="Content-Language"]"#).unwrap());
    if let Some(content) = document
        .select(&LANG_META_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
    {
        return collapse_language(content);
    }

    "en".to_string()
}

fn collapse_language(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split('-')
        .next()
        .unwrap_or("en")
        .to_string()
}

fn extract_metadata(document: &Html, origin_url: Option<&str>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(url) = origin_url {
        metadata.insert("url".to_string(), url.to_string());
    }

    static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").unwrap());
    for el in document.select(&META_SELECTOR) {
        let value = el.value();
        let content = value.attr("content").unwrap_or("").to_string();

        if let Some(property) = value.attr("property") {
            if let Some(key) = property.strip_prefix("og:") {
                metadata.insert(key.to_string(), content);
                continue;
            }
        }
        if let Some(name) = value.attr("name") {
            if let Some(key) = name.strip_prefix("twitter:") {
                metadata.insert(key.to_string(), content);
                continue;
            }
            if matches!(name, "description" | "keywords" | "author") {
                metadata.insert(name.to_string(), content);
            }
        }
    }

    metadata
}

/// Parse a Markdown document: title is the first heading, `#`-style or
/// underline-style.
pub fn parse_markdown(content: &str, origin_url: Option<&str>) -> ParsedDocument {
    let title = extract_markdown_title(content);
    let mut metadata = BTreeMap::new();
    if let Some(url) = origin_url {
        metadata.insert("url".to_string(), url.to_string());
    }

    ParsedDocument {
        content: clean_text(content),
        title,
        language: "en".to_string(),
        metadata,
    }
}

fn extract_markdown_title(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    for (i, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();

        if let Some(title) = line.strip_prefix('#') {
            let title = title.trim_start_matches('#').trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }

        if !line.is_empty() {
            if let Some(next_line) = lines.get(i + 1) {
                let next_line = next_line.trim();
                if !next_line.is_empty() && next_line.chars().all(|c| c == '=' || c == '-') {
                    return Some(line.to_string());
                }
            }
        }
    }
    None
}

/// Collapse whitespace runs the way the original `utils.clean_text` does:
/// trims each line and drops blank-line runs longer than one.
fn clean_text(text: &str) -> String {
    let mut out = String::new();
    let mut prev_blank = false;
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if prev_blank {
                continue;
            }
            prev_blank = true;
        } else {
            prev_blank = false;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nav_and_finds_article() {
        let html = r#"
            <html lang="en-US">
            <head><title>Doc Title</title></head>
            <body>
                <nav>skip me</nav>
                <article>
                    <p>This is the real content of the article and it needs to be long enough to pass the two hundred character minimum content threshold enforced by the main content finder, so let's keep writing some filler text here.</p>
                </article>
            </body>
            </html>
        "#;
        let parsed = parse_html(html, Some("https://example.com/doc"));
        assert_eq!(parsed.title, Some("Doc Title".to_string()));
        assert_eq!(parsed.language, "en");
        assert!(!parsed.content.contains("skip me"));
        assert!(parsed.content.contains("real content"));
        assert_eq!(parsed.metadata.get("url").unwrap(), "https://example.com/doc");
    }

    #[test]
    fn falls_back_to_body_when_no_main_content() {
        let html = "<html><body><p>short</p></body></html>";
        let parsed = parse_html(html, None);
        assert_eq!(parsed.content, "short");
    }

    #[test]
    fn extracts_og_title_when_no_title_or_h1() {
        let html = r#"<html><head><meta property="og:title" content="OG Title"></head><body><p>hi there this has no title tag or heading at all just body text</p></body></html>"#;
        let parsed = parse_html(html, None);
        assert_eq!(parsed.title, Some("OG Title".to_string()));
    }

    #[test]
    fn markdown_title_from_hash_heading() {
        let md = "# My Guide\n\nSome content here.";
        let parsed = parse_markdown(md, None);
        assert_eq!(parsed.title, Some("My Guide".to_string()));
    }

    #[test]
    fn markdown_title_from_underline_heading() {
        let md = "My Guide\n========\n\nSome content here.";
        let parsed = parse_markdown(md, None);
        assert_eq!(parsed.title, Some("My Guide".to_string()));
    }
}
