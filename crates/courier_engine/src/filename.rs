use chrono::NaiveDateTime;

use crate::{UNKNOWN_AUTHOR, UNTITLED};

const TITLE_MAX_CHARS: usize = 60;
const AUTHOR_MAX_CHARS: usize = 30;
const PUBLISHER_MAX_CHARS: usize = 25;
const STEM_MAX_CHARS: usize = 120;

/// Descriptive stem for a single-article document:
/// `{title} - by {author} ({publisher})`, capped at 120 characters.
///
/// The author part is dropped when absent or a placeholder; the publisher part
/// only appears when it differs from the author and survives cleaning with
/// more than two characters.
pub fn article_stem(title: Option<&str>, author: Option<&str>, publisher: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(3);

    let clean_title = clean(title.unwrap_or(UNTITLED), |c| {
        c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.')
    });
    let clean_title = truncate(&clean_title, TITLE_MAX_CHARS);
    parts.push(if clean_title.is_empty() {
        UNTITLED.to_string()
    } else {
        clean_title
    });

    if let Some(shown) = author.filter(|a| !a.is_empty() && *a != UNKNOWN_AUTHOR) {
        let clean_author = clean(shown, is_name_char);
        if !clean_author.is_empty() {
            parts.push(format!("by {}", truncate(&clean_author, AUTHOR_MAX_CHARS)));
        }
    }

    // Compared against the raw author, placeholder included.
    if let Some(publisher) = publisher.filter(|p| !p.is_empty() && Some(*p) != author) {
        let clean_publisher = clean(publisher, is_name_char);
        if clean_publisher.chars().count() > 2 {
            parts.push(format!("({})", truncate(&clean_publisher, PUBLISHER_MAX_CHARS)));
        }
    }

    truncate(&parts.join(" - "), STEM_MAX_CHARS)
}

/// `{stem}_{YYYYmmdd_HHMMSS}.html`
pub fn article_filename(stem: &str, now: NaiveDateTime) -> String {
    format!("{stem}_{}.html", now.format("%Y%m%d_%H%M%S"))
}

pub fn compilation_filename(article_count: usize, now: NaiveDateTime) -> String {
    format!(
        "Karakeep {} at {} - {} Articles.html",
        now.format("%Y-%m-%d"),
        now.format("%H%M"),
        article_count
    )
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '-' | '_')
}

/// Keep allowed characters and collapse whitespace runs to one space.
fn clean(input: &str, keep: impl Fn(char) -> bool) -> String {
    let kept: String = input.chars().filter(|c| keep(*c)).collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Char-based truncation; trailing spaces left by the cut are dropped.
fn truncate(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].trim_end().to_string(),
        None => input.to_string(),
    }
}
