//! Markdown to Telegram HTML, and message splitting

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Telegram rejects messages above 4096 characters
pub const MAX_MESSAGE_CHARS: usize = 4000;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[\w]*\n?([\s\S]*?)```").expect("valid regex"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("valid regex"));
static QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s*(.*)$").expect("valid regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static BOLD_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.+?)__").expect("valid regex"));
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s)_([^_\n]+)_").expect("valid regex"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").expect("valid regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-*]\s+").expect("valid regex"));

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert the model's markdown into the HTML subset Telegram accepts
pub fn markdown_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Code is stashed so the inline rules below leave it untouched
    let mut code_blocks: Vec<String> = Vec::new();
    let mut result = CODE_BLOCK
        .replace_all(text, |caps: &Captures| {
            code_blocks.push(caps[1].to_string());
            format!("\x00CB{}\x00", code_blocks.len() - 1)
        })
        .to_string();

    let mut inline_codes: Vec<String> = Vec::new();
    result = INLINE_CODE
        .replace_all(&result, |caps: &Captures| {
            inline_codes.push(caps[1].to_string());
            format!("\x00IC{}\x00", inline_codes.len() - 1)
        })
        .to_string();

    result = HEADER.replace_all(&result, "<b>$1</b>").to_string();
    result = QUOTE.replace_all(&result, "$1").to_string();

    // Escape after headers so the inserted tags survive
    result = escape_html(&result)
        .replace("&lt;b&gt;", "<b>")
        .replace("&lt;/b&gt;", "</b>");

    result = LINK
        .replace_all(&result, r#"<a href="$2">$1</a>"#)
        .to_string();
    result = BOLD.replace_all(&result, "<b>$1</b>").to_string();
    result = BOLD_UNDERSCORE.replace_all(&result, "<b>$1</b>").to_string();
    result = ITALIC.replace_all(&result, "$1<i>$2</i>").to_string();
    result = STRIKE.replace_all(&result, "<s>$1</s>").to_string();
    result = BULLET.replace_all(&result, "• ").to_string();

    for (i, code) in inline_codes.iter().enumerate() {
        result = result.replace(
            &format!("\x00IC{}\x00", i),
            &format!("<code>{}</code>", escape_html(code)),
        );
    }
    for (i, code) in code_blocks.iter().enumerate() {
        result = result.replace(
            &format!("\x00CB{}\x00", i),
            &format!("<pre><code>{}</code></pre>", escape_html(code)),
        );
    }

    result
}

/// Split into chunks of at most `max_chars`, preferring line boundaries
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|c| c.trim_end().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
