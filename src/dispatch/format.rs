use serde::de::IgnoredAny;
use serde::{Serialize, Serializer};

use super::escape::{beautify_hex_escapes, escape, is_printable};

/// How a scalar's content was rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    /// A JSON object or array, pretty-printed with tabs.
    Structured,
    /// Printable text, returned unchanged.
    Plain,
    /// Escaped binary, or empty content.
    Opaque,
    /// The value was not fetched because it exceeds the display limit.
    TooLarge,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Structured => "JSON",
            ContentFormat::Plain => "NORMAL",
            ContentFormat::Opaque => "UNKNOWN",
            ContentFormat::TooLarge => "Unknown!",
        }
    }
}

impl Serialize for ContentFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Render a scalar for display and report which format was chosen.
///
/// The first matching rule wins: empty input is opaque, a JSON object or
/// array is pretty-printed, printable text passes through, and anything
/// else is escaped with `\xHH` sequences rewritten as `HH `.
pub fn format_scalar(raw: &[u8]) -> (String, ContentFormat) {
    if raw.is_empty() {
        return (String::new(), ContentFormat::Opaque);
    }

    if let Some(pretty) = pretty_json(raw) {
        return (pretty, ContentFormat::Structured);
    }

    if is_printable(raw) {
        return (String::from_utf8_lossy(raw).into_owned(), ContentFormat::Plain);
    }

    (beautify_hex_escapes(&escape(raw)), ContentFormat::Opaque)
}

/// Render one hash field or value. Printable text passes through, anything
/// else is escaped but keeps its `\xHH` sequences.
pub fn format_hash_text(raw: &[u8]) -> String {
    if raw.is_empty() || is_printable(raw) {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        escape(raw)
    }
}

fn pretty_json(raw: &[u8]) -> Option<String> {
    if !matches!(raw.first(), Some(b'{') | Some(b'[')) {
        return None;
    }
    let text = std::str::from_utf8(raw).ok()?;
    serde_json::from_str::<IgnoredAny>(text).ok()?;
    Some(reindent_json(text))
}

/// Re-indent already validated JSON with tabs. Tokens are copied as they
/// appear, so number spelling, string escapes and duplicate keys survive.
/// Empty containers stay on one line and trailing whitespace is kept.
fn reindent_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut depth = 0usize;
    let mut just_opened = false;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if depth == 0 && !out.is_empty() {
                out.push_str(&text[i..]);
                break;
            }
            continue;
        }

        if matches!(c, '}' | ']') {
            depth = depth.saturating_sub(1);
            if just_opened {
                just_opened = false;
            } else {
                new_line(&mut out, depth);
            }
            out.push(c);
            continue;
        }

        if just_opened {
            just_opened = false;
            new_line(&mut out, depth);
        }
        match c {
            '{' | '[' => {
                out.push(c);
                depth += 1;
                just_opened = true;
            }
            ',' => {
                out.push(c);
                new_line(&mut out, depth);
            }
            ':' => out.push_str(": "),
            '"' => {
                out.push(c);
                in_string = true;
            }
            _ => out.push(c),
        }
    }
    out
}

fn new_line(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push('\t');
    }
}
