//! Quote stripping for forum markup.
//!
//! The pipeline marks quote tags with control-character sentinels and resolves
//! them with a single stack scan, innermost pair first. Control characters are
//! dropped from the input up front, so sentinels can never collide with text.
//! Code spans are escaped before marking so their contents are never read as
//! quote tags.

use std::sync::OnceLock;

use regex::Regex;

const FENCE: &str = "```";
const ESCAPED_OPEN: char = '\u{1}';
const QUOTE_OPEN: char = '\u{2}';
const QUOTE_CLOSE: char = '\u{3}';
const QUOTE_REMOVED: char = '\u{4}';

fn quote_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[quote(?:[=\s][^\]\n]*)?\]").expect("quote open regex is valid")
    })
}

fn quote_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[/quote\]").expect("quote close regex is valid"))
}

/// Removes every quote block (nested, attributed or unterminated) and every
/// complete fenced code block from `raw`.
///
/// Stray closing tags are dropped. An opening tag without a partner swallows
/// the rest of the text.
pub fn strip_quotes(raw: &str) -> String {
    let text = normalize_control(raw);
    let text = protect_code(&text);
    let text = mark_quote_tags(&text);
    let text = collapse_quotes(&text);
    let text = unmark(&text);
    remove_fenced_blocks(&text)
}

fn normalize_control(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\r' { '\n' } else { c })
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect()
}

fn protect_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('`') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match code_span_len(tail) {
            Some(len) => {
                out.extend(tail[..len].chars().map(|c| if c == '[' { ESCAPED_OPEN } else { c }));
                rest = &tail[len..];
            }
            None => {
                out.push('`');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Length of the code span starting at `tail`, if any. A fence without a
/// closing fence runs to the end of the text; an inline span must close on
/// the same line.
fn code_span_len(tail: &str) -> Option<usize> {
    if let Some(body) = tail.strip_prefix(FENCE) {
        return Some(match body.find(FENCE) {
            Some(end) => FENCE.len() + end + FENCE.len(),
            None => tail.len(),
        });
    }
    let body = &tail[1..];
    let end = body.find(['`', '\n'])?;
    body[end..].starts_with('`').then_some(end + 2)
}

fn mark_quote_tags(text: &str) -> String {
    let open = QUOTE_OPEN.to_string();
    let close = QUOTE_CLOSE.to_string();
    let marked = quote_open_re().replace_all(text, open.as_str());
    quote_close_re()
        .replace_all(&marked, close.as_str())
        .into_owned()
}

fn collapse_quotes(marked: &str) -> String {
    let mut out = String::with_capacity(marked.len());
    let mut open_at: Vec<usize> = Vec::new();
    for c in marked.chars() {
        match c {
            QUOTE_OPEN => {
                open_at.push(out.len());
                out.push(c);
            }
            QUOTE_CLOSE => match open_at.pop() {
                Some(start) => {
                    out.truncate(start);
                    out.push(QUOTE_REMOVED);
                }
                None => out.push(c),
            },
            _ => out.push(c),
        }
    }
    if let Some(&start) = open_at.first() {
        out.truncate(start);
        out.push(QUOTE_REMOVED);
    }
    out
}

fn unmark(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            ESCAPED_OPEN => Some('['),
            QUOTE_OPEN | QUOTE_CLOSE | QUOTE_REMOVED => None,
            other => Some(other),
        })
        .collect()
}

fn remove_fenced_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(FENCE) {
        let body = &rest[start + FENCE.len()..];
        let Some(end) = body.find(FENCE) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &body[end + FENCE.len()..];
    }
    out.push_str(rest);
    out
}
