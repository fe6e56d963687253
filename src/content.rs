//! Content post-processing helpers.
//!
//! Generated text arrives as loose markdown-ish prose; these helpers turn
//! it into publishable HTML and derive SEO metadata from it.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// A heading found in formatted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// SEO metadata derived from content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoMeta {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub og_title: String,
    pub og_description: String,
}

fn heading_regex() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex_lite::Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>").expect("valid regex")
    })
}

fn tag_regex() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| regex_lite::Regex::new(r"<[^>]+>").expect("valid regex"))
}

fn image_regex() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex_lite::Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("valid regex")
    })
}

/// Convert raw generated text into simple HTML.
///
/// Markdown-style `#`/`##`/`###` headings become `<h1>`..`<h3>`, and
/// blank-line-separated paragraphs are wrapped in `<p>` unless they already
/// start with a block-level tag.
pub fn format_content(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        let converted = if let Some(rest) = trimmed.strip_prefix("### ") {
            format!("<h3>{}</h3>", rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            format!("<h2>{}</h2>", rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            format!("<h1>{}</h1>", rest.trim())
        } else {
            line.to_string()
        };
        lines.push(converted);
    }
    let content = lines.join("\n");

    let paragraphs: Vec<String> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let starts_block = ["<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<ul", "<ol", "<li",
                "<blockquote", "<table", "<p"]
            .iter()
            .any(|tag| p.starts_with(tag));
            if starts_block {
                p.to_string()
            } else {
                format!("<p>{}</p>", p)
            }
        })
        .collect();

    paragraphs.join("\n\n")
}

/// Extract headings from HTML content in document order.
pub fn extract_headings(content: &str) -> Vec<Heading> {
    heading_regex()
        .captures_iter(content)
        .filter_map(|caps| {
            let level: u8 = caps[1].parse().ok()?;
            Some(Heading {
                level,
                text: strip_tags(&caps[2]).trim().to_string(),
            })
        })
        .collect()
}

/// Remove HTML tags from a string.
pub fn strip_tags(content: &str) -> String {
    tag_regex().replace_all(content, "").to_string()
}

/// First `count` words of a string, joined by single spaces.
pub fn trim_words(content: &str, count: usize) -> String {
    content
        .split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "that", "have", "for", "not", "with", "you", "this", "but", "his", "from",
];

/// Most frequent meaningful words in the content, up to `max_keywords`.
pub fn extract_keywords(content: &str, max_keywords: usize) -> Vec<String> {
    let text = strip_tags(content).to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.len() > 3 && !STOP_WORDS.contains(&word) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Count descending, then alphabetical for a stable order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Derive SEO metadata from content, preferring an explicit title.
pub fn generate_seo_meta(content: &str, title: &str) -> SeoMeta {
    let text = strip_tags(content);
    let excerpt = trim_words(&text, 30);

    SeoMeta {
        title: if title.is_empty() {
            trim_words(&text, 10)
        } else {
            title.to_string()
        },
        description: excerpt,
        keywords: extract_keywords(content, 5),
        og_title: if title.is_empty() {
            trim_words(&text, 8)
        } else {
            title.to_string()
        },
        og_description: trim_words(&text, 20),
    }
}

/// URL of the first `<img>` in the content, if any.
pub fn first_image(content: &str) -> Option<String> {
    image_regex()
        .captures(content)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_content_headings_and_paragraphs() {
        let raw = "# Title\n\nFirst paragraph.\n\n## Section\n\nSecond paragraph.";
        let html = format_content(raw);

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<h2>Section</h2>"));
        assert!(html.contains("<p>First paragraph.</p>"));
        assert!(html.contains("<p>Second paragraph.</p>"));
    }

    #[test]
    fn test_format_content_keeps_existing_blocks() {
        let html = format_content("<ul><li>one</li></ul>");
        assert_eq!(html, "<ul><li>one</li></ul>");
    }

    #[test]
    fn test_format_content_empty() {
        assert_eq!(format_content("   "), "");
    }

    #[test]
    fn test_extract_headings() {
        let html = "<h1>Main</h1><p>x</p><h2 class=\"sub\">Detail</h2>";
        let headings = extract_headings(html);

        assert_eq!(
            headings,
            vec![
                Heading {
                    level: 1,
                    text: "Main".to_string()
                },
                Heading {
                    level: 2,
                    text: "Detail".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_extract_keywords_skips_stop_words() {
        let content = "Rust makes systems programming productive. Rust systems code is fast, and the compiler helps.";
        let keywords = extract_keywords(content, 3);

        assert_eq!(keywords[0], "rust");
        assert!(keywords.contains(&"systems".to_string()));
        assert!(!keywords.contains(&"the".to_string()));
    }

    #[test]
    fn test_generate_seo_meta_prefers_title() {
        let meta = generate_seo_meta("<p>Some long body of text here</p>", "Given Title");
        assert_eq!(meta.title, "Given Title");
        assert_eq!(meta.og_title, "Given Title");
        assert!(meta.description.starts_with("Some long body"));
    }

    #[test]
    fn test_generate_seo_meta_derives_title() {
        let meta = generate_seo_meta("one two three four five six seven eight nine ten eleven", "");
        assert_eq!(meta.title.split_whitespace().count(), 10);
    }

    #[test]
    fn test_first_image() {
        let html = r#"<p>intro</p><img alt="x" src="https://cdn.example.com/a.png"><img src="b.png">"#;
        assert_eq!(
            first_image(html).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(first_image("<p>none</p>"), None);
    }

    #[test]
    fn test_trim_words() {
        assert_eq!(trim_words("a  b   c d", 3), "a b c");
        assert_eq!(trim_words("a b", 5), "a b");
    }
}
