use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;

/// Tags whose subtrees carry no readable content.
const SKIP_TAGS: [&str; 8] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "iframe",
];

/// Class names for ads and wiki chrome.
const SKIP_CLASSES: [&str; 4] = ["advertisement", "ad", "wiki-nav", "wiki-category"];

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("document has no extractable text")]
    EmptyDocument,
}

/// Normalized visible text of one page. `text` is always non-empty.
#[derive(Debug, Clone, Serialize)]
pub struct CleanedText {
    pub source_url: String,
    pub title: Option<String>,
    pub text: String,
}

/// Extract the visible text of a page: parse leniently, skip script/style and
/// boilerplate subtrees, collapse whitespace. Empty pages are an error so the
/// caller can drop them before the summarizer is ever invoked.
pub fn clean(url: &str, raw_html: &str) -> Result<CleanedText, CleanError> {
    let document = Html::parse_document(raw_html);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let body_selector = Selector::parse("body").unwrap();
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut raw_text = String::new();
    collect_text(root, &mut raw_text);

    let text = collapse_whitespace(&raw_text);
    if text.is_empty() {
        return Err(CleanError::EmptyDocument);
    }

    Ok(CleanedText {
        source_url: url.to_string(),
        title,
        text,
    })
}

fn collect_text(element: ElementRef, out: &mut String) {
    if is_boilerplate(&element) {
        return;
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

fn is_boilerplate(element: &ElementRef) -> bool {
    if SKIP_TAGS.contains(&element.value().name()) {
        return true;
    }
    element.value().attr("class").is_some_and(|classes| {
        classes
            .split_whitespace()
            .any(|class| SKIP_CLASSES.contains(&class))
    })
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
