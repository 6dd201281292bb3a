use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::cleaner::CleanedText;
use crate::gemini::SummaryResult;

/// Streams summary records as JSON lines, either to stdout or a file.
pub enum ResultWriter {
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

impl ResultWriter {
    pub fn create(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                Ok(ResultWriter::File(BufWriter::new(file)))
            }
            None => Ok(ResultWriter::Stdout(io::stdout())),
        }
    }

    pub fn write(&mut self, result: &SummaryResult) -> Result<()> {
        let line = to_jsonl_line(result)?;
        match self {
            // stdout is line-buffered for interactive runs; flush so results
            // appear as they complete
            ResultWriter::Stdout(out) => {
                out.write_all(line.as_bytes())?;
                out.flush()?;
            }
            ResultWriter::File(file) => file.write_all(line.as_bytes())?,
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if let ResultWriter::File(file) = self {
            file.flush()?;
        }
        Ok(())
    }
}

fn to_jsonl_line(result: &SummaryResult) -> Result<String> {
    let mut line = serde_json::to_string(result).context("failed to serialize summary")?;
    line.push('\n');
    Ok(line)
}

/// Write one cleaned page as a text file named after its title, with a small
/// provenance header. Returns the path written.
pub fn write_clean_text(
    dir: &Path,
    cleaned: &CleanedText,
    fetched_at: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let name = cleaned
        .title
        .as_deref()
        .unwrap_or(&cleaned.source_url);
    let path = dir.join(format!("{}.txt", sanitize_file_name(name)));

    let mut content = String::new();
    if let Some(title) = &cleaned.title {
        content.push_str(&format!("Title: {title}\n"));
    }
    content.push_str(&format!("Source: {}\n", cleaned.source_url));
    content.push_str(&format!("Fetched: {}\n", fetched_at.to_rfc3339()));
    content.push_str(&"=".repeat(80));
    content.push_str("\n\n");
    content.push_str(&cleaned.text);
    content.push('\n');

    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Replace filesystem-hostile characters and whitespace runs with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let forbidden = Regex::new(r#"[\\/:*?"<>|]+"#).unwrap();
    let spaces = Regex::new(r"\s+").unwrap();
    let cleaned = forbidden.replace_all(name.trim(), "_");
    spaces.replace_all(&cleaned, "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_hostile_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_name("what? \"why\""), "what_why");
        assert_eq!(sanitize_file_name("  two  words  "), "two_words");
        assert_eq!(sanitize_file_name("plain"), "plain");
    }

    #[test]
    fn jsonl_line_is_single_terminated_line() {
        let result = SummaryResult {
            source_url: "https://example.com".into(),
            title: Some("T".into()),
            summary: "S".into(),
            model: "m".into(),
            latency_ms: 1,
            generated_at: Utc::now(),
        };
        let line = to_jsonl_line(&result).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed["summary"], "S");
    }
}
