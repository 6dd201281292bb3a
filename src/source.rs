use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::Url;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One unit of work: a page to fetch and summarize. The title is optional
/// seed metadata; when absent the cleaner falls back to the page <title>.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTask {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Load a task list from disk. `.json` files hold an array of
/// `{"url": ..., "title": ...}` objects; anything else is treated as one URL
/// per line (blank lines and `#` comments skipped).
pub fn load_tasks(path: &Path) -> Result<Vec<PageTask>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read task list {}", path.display()))?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let tasks = parse_tasks(&raw, is_json)
        .with_context(|| format!("failed to parse task list {}", path.display()))?;

    if tasks.is_empty() {
        bail!("no URLs found in {}", path.display());
    }
    info!("Loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

fn parse_tasks(raw: &str, json: bool) -> Result<Vec<PageTask>> {
    let tasks: Vec<PageTask> = if json {
        serde_json::from_str(raw).context("expected a JSON array of {url, title} objects")?
    } else {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| PageTask {
                url: line.to_string(),
                title: None,
            })
            .collect()
    };
    Ok(dedupe(tasks))
}

/// Drop duplicate URLs, keeping the first occurrence.
fn dedupe(tasks: Vec<PageTask>) -> Vec<PageTask> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| seen.insert(task.url.clone()))
        .collect()
}

/// Extract same-host links from an index page as a new task list. The anchor
/// text becomes the seed title. `prefix` filters on the target path, e.g.
/// `/w/` to keep only wiki articles.
pub fn discover_tasks(index_url: &str, html: &str, prefix: Option<&str>) -> Result<Vec<PageTask>> {
    let base = Url::parse(index_url).with_context(|| format!("invalid index URL {index_url}"))?;
    let document = Html::parse_document(html);
    let anchor = Selector::parse("a[href]").unwrap();

    let mut tasks = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(target) = base.join(href) else {
            continue;
        };
        if target.host_str() != base.host_str() {
            continue;
        }
        if let Some(prefix) = prefix {
            if !target.path().starts_with(prefix) {
                continue;
            }
        }
        let mut url = target;
        url.set_fragment(None);
        if url.as_str() == base.as_str() {
            continue;
        }

        let text = element.text().collect::<String>();
        let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
        tasks.push(PageTask {
            url: url.into(),
            title: (!title.is_empty()).then_some(title),
        });
    }

    Ok(dedupe(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_lines_with_comments_and_blanks() {
        let raw = "# seed list\nhttps://example.com/a\n\n  https://example.com/b  \n";
        let tasks = parse_tasks(raw, false).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].url, "https://example.com/a");
        assert_eq!(tasks[1].url, "https://example.com/b");
        assert!(tasks[0].title.is_none());
    }

    #[test]
    fn parses_json_seed_with_optional_titles() {
        let raw = r#"[
            {"url": "https://example.com/a", "title": "A"},
            {"url": "https://example.com/b"}
        ]"#;
        let tasks = parse_tasks(raw, true).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title.as_deref(), Some("A"));
        assert!(tasks[1].title.is_none());
    }

    #[test]
    fn dedupes_by_url_keeping_first() {
        let raw = "https://example.com/a\nhttps://example.com/b\nhttps://example.com/a\n";
        let tasks = parse_tasks(raw, false).unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn discover_keeps_same_host_links_under_prefix() {
        let html = r#"
            <body>
              <a href="/w/First Page">First  Page</a>
              <a href="/w/Second">Second</a>
              <a href="/about">About</a>
              <a href="https://other.example.net/w/External">External</a>
              <a href="/w/First Page">First again</a>
            </body>
        "#;
        let tasks = discover_tasks("https://wiki.example.com/w/Index", html, Some("/w/")).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].url, "https://wiki.example.com/w/First%20Page");
        assert_eq!(tasks[0].title.as_deref(), Some("First Page"));
        assert_eq!(tasks[1].url, "https://wiki.example.com/w/Second");
    }

    #[test]
    fn discover_skips_the_index_page_itself() {
        let html = r#"<a href="/w/Index">self</a><a href="/w/Other">other</a>"#;
        let tasks = discover_tasks("https://wiki.example.com/w/Index", html, Some("/w/")).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].url, "https://wiki.example.com/w/Other");
    }
}
