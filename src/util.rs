use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Lowercase, alphanumeric-and-dashes slug. Runs of other characters
/// collapse into a single dash.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_dash = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Shortens `text` to at most `max_length` characters, cutting at the last
/// space inside the window so words stay whole, and appends an ellipsis.
pub fn smart_trim(text: &str, max_length: usize) -> String {
    const APPENDIX: &str = "...";
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let budget = max_length.saturating_sub(APPENDIX.len());
    let cut: String = text.chars().take(budget).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) => &cut[..idx],
        None => cut.as_str(),
    };
    format!("{trimmed}{APPENDIX}")
}

pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG.replace_all(text, "").into_owned()
}

/// First 160 characters of the tag-stripped content.
pub fn meta_description(content: &str) -> String {
    strip_html_tags(content).chars().take(160).collect()
}
