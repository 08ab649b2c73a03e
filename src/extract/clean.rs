//! HTML cleaning pipeline, trimmed down from the teacher's
//! `scraping/rust_scraper/clean.rs` and `metadata.rs`: kept is the
//! strip-script/style → remove-tags → collapse-whitespace → decode-entities
//! structure and the scraper/whatlang-based metadata extraction; dropped are
//! the teacher's per-domain regex hacks (Amazon/eBay/LinkedIn/etc.) and its
//! SPA hydration-state JSON scanning, neither of which this spec's extractor
//! surface calls for.

use scraper::{Html, Selector};
use std::sync::OnceLock;
use whatlang::{detect, Lang};

fn script_style_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("script, style, noscript").unwrap())
}

/// Strips `<script>`/`<style>`/`<noscript>` blocks, removes remaining tags,
/// collapses whitespace, and decodes the handful of HTML entities the
/// teacher's cleaner also special-cases.
pub fn clean_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        if let Some(el) = node.value().as_element() {
            if matches!(el.name(), "script" | "style" | "noscript") {
                continue;
            }
        }
        if let Some(t) = node.value().as_text() {
            text.push_str(t);
            text.push(' ');
        }
    }

    let _ = script_style_selector();
    collapse_whitespace(&decode_entities(&text))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates at a word boundary so no word is cut mid-token (SPEC_FULL.md §4.5).
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(idx) => truncated[..idx].to_string(),
        None => truncated,
    }
}

pub struct Metadata {
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub language: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// Best-effort title/author/date/language/links/images extraction, grounded
/// on the teacher's `extract_title`/`extract_author`/`extract_published_time`
/// /`detect_language` (trimmed: no embedded-JSON-state scanning).
pub fn extract_metadata(html: &str, base: &url::Url, want_links: bool) -> Metadata {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let author = extract_author(&document);
    let published_date = extract_published_time(&document);
    let language = detect_language(&document, html);
    let (links, images) = if want_links { extract_links_and_images(&document, base) } else { (Vec::new(), Vec::new()) };

    Metadata { title, author, published_date, language, links, images }
}

fn extract_title(document: &Html) -> String {
    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = document.select(&sel).next() {
            let t = el.text().collect::<String>().trim().to_string();
            if !t.is_empty() {
                return t;
            }
        }
    }
    if let Ok(sel) = Selector::parse("h1") {
        if let Some(el) = document.select(&sel).next() {
            let t = el.text().collect::<String>().trim().to_string();
            if !t.is_empty() {
                return t;
            }
        }
    }
    "Untitled".to_string()
}

fn extract_author(document: &Html) -> Option<String> {
    for sel_str in ["meta[name=\"author\"]", "meta[property=\"article:author\"]"] {
        if let Ok(sel) = Selector::parse(sel_str) {
            if let Some(el) = document.select(&sel).next() {
                if let Some(content) = el.value().attr("content") {
                    let v = content.trim();
                    if !v.is_empty() {
                        return Some(v.to_string());
                    }
                }
            }
        }
    }
    None
}

fn extract_published_time(document: &Html) -> Option<String> {
    for sel_str in ["meta[property=\"article:published_time\"]", "meta[name=\"date\"]"] {
        if let Ok(sel) = Selector::parse(sel_str) {
            if let Some(el) = document.select(&sel).next() {
                if let Some(content) = el.value().attr("content") {
                    let v = content.trim();
                    if !v.is_empty() {
                        return Some(v.to_string());
                    }
                }
            }
        }
    }
    None
}

fn detect_language(document: &Html, html: &str) -> String {
    if let Ok(sel) = Selector::parse("html") {
        if let Some(el) = document.select(&sel).next() {
            if let Some(lang) = el.value().attr("lang") {
                let trimmed = lang.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    match detect(html) {
        Some(info) => match info.lang() {
            Lang::Eng => "en".to_string(),
            Lang::Spa => "es".to_string(),
            Lang::Fra => "fr".to_string(),
            Lang::Deu => "de".to_string(),
            Lang::Kor => "ko".to_string(),
            Lang::Cmn => "zh".to_string(),
            Lang::Jpn => "ja".to_string(),
            other => format!("{other:?}").to_lowercase(),
        },
        None => "unknown".to_string(),
    }
}

fn extract_links_and_images(document: &Html, base: &url::Url) -> (Vec<String>, Vec<String>) {
    let mut links = Vec::new();
    if let Ok(sel) = Selector::parse("a[href]") {
        for el in document.select(&sel) {
            if let Some(href) = el.value().attr("href") {
                if let Ok(joined) = base.join(href) {
                    if matches!(joined.scheme(), "http" | "https") {
                        links.push(joined.to_string());
                    }
                }
            }
        }
    }

    let mut images = Vec::new();
    if let Ok(sel) = Selector::parse("img[src]") {
        for el in document.select(&sel) {
            if let Some(src) = el.value().attr("src") {
                if let Ok(joined) = base.join(src) {
                    if matches!(joined.scheme(), "http" | "https") {
                        images.push(joined.to_string());
                    }
                }
            }
        }
    }

    (links, images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><p>Hello  world</p></body></html>";
        let text = clean_text(html);
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn truncates_at_word_boundary() {
        let text = "the quick brown fox jumps over the lazy dog";
        let truncated = truncate_at_word_boundary(text, 12);
        assert!(!truncated.ends_with("fo"));
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn leaves_short_text_untouched() {
        let text = "short";
        assert_eq!(truncate_at_word_boundary(text, 100), "short");
    }
}
