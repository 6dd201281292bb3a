/// Steers the model toward grounded, compact summaries.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a careful research assistant summarizing web pages.
Rules:
1. Use only information present in the provided page text.
2. Do not guess; omit anything the text does not support.
3. Write plain prose, no markdown headings or code fences.
4. Keep the summary under 200 words.";

/// Hard cap on page text sent per request. Pages past this are truncated,
/// not rejected; the lead of an article carries most of the signal.
const MAX_PROMPT_CHARS: usize = 24_000;

/// Build the user prompt for one page: instruction, source header, then the
/// cleaned text.
pub fn summary_prompt(title: Option<&str>, url: &str, text: &str) -> String {
    let mut prompt = String::with_capacity(text.len().min(MAX_PROMPT_CHARS) + 512);
    prompt.push_str(
        "Summarize the following web page. State what the page is about, \
         the key facts or claims it makes, and any notable context.\n\n",
    );
    if let Some(title) = title {
        prompt.push_str("Title: ");
        prompt.push_str(title);
        prompt.push('\n');
    }
    prompt.push_str("Source: ");
    prompt.push_str(url);
    prompt.push_str("\n\nPage text:\n");
    prompt.push_str(truncate_chars(text, MAX_PROMPT_CHARS));
    prompt
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_source_and_text() {
        let prompt = summary_prompt(Some("A Page"), "https://example.com/a", "Some content.");
        assert!(prompt.contains("Title: A Page"));
        assert!(prompt.contains("Source: https://example.com/a"));
        assert!(prompt.ends_with("Some content."));
    }

    #[test]
    fn prompt_without_title_omits_title_line() {
        let prompt = summary_prompt(None, "https://example.com/a", "x");
        assert!(!prompt.contains("Title:"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // '한' is 3 bytes in UTF-8; cutting at 4 must back off to 3.
        let text = "한한";
        assert_eq!(truncate_chars(text, 4), "한");
        assert_eq!(truncate_chars(text, 6), "한한");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
