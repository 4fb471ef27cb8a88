//! Code snippet extraction and quality scoring (spec §4.5), ported from the
//! original implementation's `code_extractor.py`.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const LANGUAGE_PATTERNS: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "java",
    "csharp",
    "cpp",
    "c",
    "go",
    "rust",
    "ruby",
    "php",
    "swift",
    "kotlin",
    "scala",
    "shell",
    "bash",
    "sql",
    "html",
    "css",
    "json",
    "yaml",
    "xml",
    "markdown",
];

const MIN_SNIPPET_LEN: usize = 10;
const CONTEXT_LOOKBACK_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct CodeSnippet {
    pub content: String,
    pub language: Option<String>,
    pub code_quality_score: f32,
    pub formatting_score: f32,
    pub metadata_score: f32,
    pub initialization_score: f32,
    pub context: Option<String>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
}

impl CodeSnippet {
    fn new(content: String, language: Option<String>, context: Option<String>) -> Self {
        let mut snippet = Self {
            content,
            language,
            code_quality_score: 0.0,
            formatting_score: 0.0,
            metadata_score: 0.0,
            initialization_score: 0.0,
            context,
            start_char: None,
            end_char: None,
        };
        score_snippet(&mut snippet);
        snippet
    }
}

/// Extract from `<pre><code>` blocks and `<script type="text/plain">` tags.
pub fn extract_from_html(html: &str) -> Vec<CodeSnippet> {
    let document = Html::parse_document(html);
    let mut snippets = Vec::new();

    static CODE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("pre code").unwrap());
    for code_el in document.select(&CODE_SELECTOR) {
        let content: String = code_el.text().collect();
        if content.trim().chars().count() < MIN_SNIPPET_LEN {
            continue;
        }
        let language = detect_language_from_classes(code_el);
        let context = extract_html_context(code_el);
        snippets.push(CodeSnippet::new(content, language, context));
    }

    static SCRIPT_SELECTOR: Lazy<Selector> =
        Lazy::new(|| Selector::parse(r#"script[type="text/plain"]"#).unwrap());
    for script_el in document.select(&SCRIPT_SELECTOR) {
        let content: String = script_el.text().collect();
        if content.trim().chars().count() < MIN_SNIPPET_LEN {
            continue;
        }
        let language = detect_language_from_classes(script_el);
        let context = extract_html_context(script_el);
        snippets.push(CodeSnippet::new(content, language, context));
    }

    snippets
}

fn detect_language_from_classes(element: ElementRef) -> Option<String> {
    let class_attr = element.value().attr("class")?;
    for class in class_attr.split_whitespace() {
        let lower = class.to_ascii_lowercase();
        for lang in LANGUAGE_PATTERNS {
            if lower.contains(lang) {
                return Some(lang.to_string());
            }
        }
        if let Some(rest) = lower.strip_prefix("hljs-") {
            return Some(rest.to_string());
        }
    }
    None
}

fn extract_html_context(element: ElementRef) -> Option<String> {
    let mut parts = Vec::new();

    static HEADING_SELECTOR: Lazy<Selector> =
        Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
    static PARA_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

    if let Some(root) = find_document_root(element) {
        if let Some(heading) = root.select(&HEADING_SELECTOR).filter(|h| precedes(*h, element)).last() {
            parts.push(heading.text().collect::<String>().trim().to_string());
        }
        if let Some(para) = root.select(&PARA_SELECTOR).filter(|p| precedes(*p, element)).last() {
            parts.push(para.text().collect::<String>().trim().to_string());
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn find_document_root(element: ElementRef) -> Option<ElementRef> {
    let mut current = element;
    while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
        current = parent;
    }
    Some(current)
}

fn precedes(candidate: ElementRef, target: ElementRef) -> bool {
    candidate.id() < target.id()
}

/// Extract from fenced ```` ```lang ```` blocks and 4-space/tab-indented
/// blocks.
pub fn extract_from_markdown(markdown: &str) -> Vec<CodeSnippet> {
    let mut snippets = Vec::new();

    static FENCE_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").unwrap());
    for capture in FENCE_PATTERN.captures_iter(markdown) {
        let whole = capture.get(0).unwrap();
        let language = capture.get(1).map(|m| m.as_str().to_string());
        let content = capture.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        if content.chars().count() < MIN_SNIPPET_LEN {
            continue;
        }
        let context = markdown_context(markdown, whole.start());
        snippets.push(snippet_with_span(content, language, context, whole.start(), whole.end()));
    }

    static INDENTED_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)(?:^|\n)((?:(?:    |\t).+\n?)+)").unwrap());
    static LEADING_INDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(?:    |\t)").unwrap());
    for capture in INDENTED_PATTERN.captures_iter(markdown) {
        let whole = capture.get(0).unwrap();
        let raw = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        let content = LEADING_INDENT.replace_all(raw, "").trim().to_string();
        if content.chars().count() < MIN_SNIPPET_LEN {
            continue;
        }
        let context = markdown_context(markdown, whole.start());
        snippets.push(snippet_with_span(content, None, context, whole.start(), whole.end()));
    }

    snippets
}

fn markdown_context(markdown: &str, start: usize) -> Option<String> {
    let context_start = start.saturating_sub(CONTEXT_LOOKBACK_CHARS);
    // byte boundary safety: walk back to a char boundary.
    let mut safe_start = context_start;
    while safe_start > 0 && !markdown.is_char_boundary(safe_start) {
        safe_start -= 1;
    }
    let context = markdown[safe_start..start].trim().to_string();
    if context.is_empty() {
        None
    } else {
        Some(context)
    }
}

fn snippet_with_span(
    content: String,
    language: Option<String>,
    context: Option<String>,
    start: usize,
    end: usize,
) -> CodeSnippet {
    let mut snippet = CodeSnippet::new(content, language, context);
    snippet.start_char = Some(start);
    snippet.end_char = Some(end);
    snippet
}

static IMPORT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(?:import|from|require|include|using)\s+").unwrap());
static DECL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:def|function|fn|func|class|public|private)\s+").unwrap());
static COMMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?://|#|/\*|"""|''')"#).unwrap());
static STRUCTURE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}\[\]()]").unwrap());
static OPERATOR_SPACING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s[+\-*/=<>]=?\s").unwrap());
static MAIN_GUARD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"if\s+__name__\s*==\s*['"]__main__['"]"#).unwrap());
static INSTANTIATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"new\s+\w+|=\s*\w+\(").unwrap());

const INIT_KEYWORDS: &[&str] = &[
    "install",
    "setup",
    "initialize",
    "init",
    "getting started",
    "quick start",
    "example",
    "usage",
    "basic",
    "simple",
];

fn score_snippet(snippet: &mut CodeSnippet) {
    let content = &snippet.content;

    let mut quality = 0.0f32;
    if IMPORT_PATTERN.is_match(content) {
        quality += 0.2;
    }
    if DECL_PATTERN.is_match(content) {
        quality += 0.2;
    }
    if COMMENT_PATTERN.is_match(content) {
        quality += 0.2;
    }
    let line_count = content.lines().count();
    if (5..=50).contains(&line_count) {
        quality += 0.2;
    } else if line_count > 50 {
        quality += 0.1;
    }
    if STRUCTURE_PATTERN.is_match(content) {
        quality += 0.2;
    }
    snippet.code_quality_score = quality.min(1.0);

    let mut formatting = 0.0f32;
    let lines: Vec<&str> = content.lines().collect();
    let mut indent_pattern: Option<usize> = None;
    let mut consistent = true;
    for line in &lines {
        if line.trim().is_empty() {
            continue;
        }
        let indent_len = line.len() - line.trim_start().len();
        if indent_len == 0 {
            continue;
        }
        match indent_pattern {
            None => indent_pattern = Some(indent_len),
            Some(base) if base > 0 && indent_len % base != 0 => {
                consistent = false;
                break;
            }
            _ => {}
        }
    }
    if consistent {
        formatting += 0.5;
    }
    let max_line_length = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if max_line_length <= 100 {
        formatting += 0.3;
    } else if max_line_length <= 120 {
        formatting += 0.2;
    }
    if OPERATOR_SPACING_PATTERN.is_match(content) {
        formatting += 0.2;
    }
    snippet.formatting_score = formatting.min(1.0);

    let mut metadata = 0.0f32;
    if snippet.language.is_some() {
        metadata += 0.3;
    }
    if let Some(context) = &snippet.context {
        metadata += 0.4;
        let trimmed = context.trim();
        if trimmed.starts_with('#') || trimmed.starts_with('=') {
            metadata += 0.3;
        }
    }
    snippet.metadata_score = metadata.min(1.0);

    let mut init = 0.0f32;
    let context_lower = snippet.context.as_deref().unwrap_or("").to_ascii_lowercase();
    let content_lower = content.to_ascii_lowercase();
    for keyword in INIT_KEYWORDS {
        if context_lower.contains(keyword) {
            init += 0.3;
        }
        if content_lower.contains(keyword) {
            init += 0.2;
        }
    }
    if MAIN_GUARD_PATTERN.is_match(content) {
        init += 0.3;
    }
    if INSTANTIATION_PATTERN.is_match(content) {
        init += 0.2;
    }
    snippet.initialization_score = init.min(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_snippets() {
        let html = "<pre><code>x=1</code></pre>";
        assert!(extract_from_html(html).is_empty());
    }

    #[test]
    fn detects_language_from_class() {
        let html = r#"<pre><code class="language-python">def foo():\n    return 1\n</code></pre>"#;
        let snippets = extract_from_html(html);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].language, Some("python".to_string()));
    }

    #[test]
    fn markdown_fence_extracts_language_and_content() {
        let md = "Before text\n```rust\nfn main() {\n    println!(\"hi\");\n}\n```\nAfter";
        let snippets = extract_from_markdown(md);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].language, Some("rust".to_string()));
        assert!(snippets[0].content.contains("println"));
    }

    #[test]
    fn markdown_indented_block_has_no_language() {
        let md = "Setup:\n\n    def foo():\n        return 1\n\nDone.";
        let snippets = extract_from_markdown(md);
        assert!(snippets.iter().any(|s| s.language.is_none()));
    }

    #[test]
    fn quality_score_rewards_imports_and_functions() {
        let mut snippet = CodeSnippet::new(
            "import os\n\ndef main():\n    # comment\n    print(os.getcwd())\n".to_string(),
            Some("python".to_string()),
            None,
        );
        score_snippet(&mut snippet);
        assert!(snippet.code_quality_score >= 0.6);
    }

    #[test]
    fn initialization_score_detects_main_guard() {
        let mut snippet = CodeSnippet::new(
            "if __name__ == \"__main__\":\n    main()\n".to_string(),
            None,
            None,
        );
        score_snippet(&mut snippet);
        assert!(snippet.initialization_score > 0.0);
    }
}
