//! Binary-safe quoting for display and for generated command scripts.
//!
//! Quoting follows the usual double-quoted literal rules: `\"` and `\\`,
//! the single-letter control escapes, `\xHH` for other ASCII control bytes
//! and for bytes that are not valid UTF-8, and `\uHHHH` / `\UHHHHHHHH` for
//! non-printable code points. Hex digits are lowercase.

const HEX: &[u8; 16] = b"0123456789abcdef";

/// One decoding step over raw bytes.
enum Unit {
    Char(char),
    Invalid(u8),
}

fn units(mut input: &[u8]) -> Vec<Unit> {
    let mut out = Vec::with_capacity(input.len());
    while !input.is_empty() {
        match std::str::from_utf8(input) {
            Ok(text) => {
                out.extend(text.chars().map(Unit::Char));
                break;
            }
            Err(e) => {
                let (valid, rest) = input.split_at(e.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    out.extend(text.chars().map(Unit::Char));
                }
                let bad = e.error_len().unwrap_or(rest.len());
                out.extend(rest[..bad].iter().map(|b| Unit::Invalid(*b)));
                input = &rest[bad..];
            }
        }
    }
    out
}

/// Whether a code point renders as visible text: letters, marks, numbers,
/// punctuation, symbols and the ASCII space. Control, format, private-use,
/// unassigned and non-ASCII separator code points are not printable.
pub fn is_printable_char(c: char) -> bool {
    match c {
        ' ' | '\\' | '"' | '\'' => true,
        c if c.is_control() => false,
        c => {
            // Debug escaping leaves exactly the printable code points alone.
            // The leading space keeps grapheme extenders from being escaped.
            let mut sample = String::with_capacity(8);
            sample.push(' ');
            sample.push(c);
            sample.escape_debug().skip(1).eq(std::iter::once(c))
        }
    }
}

/// True when `raw` is valid UTF-8 made only of printable code points.
pub fn is_printable(raw: &[u8]) -> bool {
    match std::str::from_utf8(raw) {
        Ok(text) => text.chars().all(is_printable_char),
        Err(_) => false,
    }
}

fn push_hex(out: &mut String, value: u32, digits: u32) {
    for shift in (0..digits).rev() {
        out.push(HEX[((value >> (shift * 4)) & 0xf) as usize] as char);
    }
}

/// Escape `raw` as the body of a double-quoted literal, without the quotes.
pub fn escape(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for unit in units(raw) {
        match unit {
            Unit::Invalid(byte) => {
                out.push_str("\\x");
                push_hex(&mut out, byte as u32, 2);
            }
            Unit::Char(c) => match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                c if is_printable_char(c) => out.push(c),
                '\u{07}' => out.push_str("\\a"),
                '\u{08}' => out.push_str("\\b"),
                '\u{0c}' => out.push_str("\\f"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\u{0b}' => out.push_str("\\v"),
                c if (c as u32) < 0x20 || c == '\u{7f}' => {
                    out.push_str("\\x");
                    push_hex(&mut out, c as u32, 2);
                }
                c if (c as u32) < 0x10000 => {
                    out.push_str("\\u");
                    push_hex(&mut out, c as u32, 4);
                }
                c => {
                    out.push_str("\\U");
                    push_hex(&mut out, c as u32, 8);
                }
            },
        }
    }
    out
}

/// Escape `raw` and wrap it in double quotes.
pub fn quote(raw: &[u8]) -> String {
    format!("\"{}\"", escape(raw))
}

/// Rewrite every `\x` followed by two characters into those two characters
/// and a space, e.g. `a\x01b` becomes `a01 b`.
pub fn beautify_hex_escapes(escaped: &str) -> String {
    let chars: Vec<char> = escaped.chars().collect();
    let mut out = String::with_capacity(escaped.len());
    let mut i = 0;
    while i < chars.len() {
        let is_hex_escape = chars[i] == '\\'
            && i + 3 < chars.len()
            && chars[i + 1] == 'x'
            && chars[i + 2] != '\n'
            && chars[i + 3] != '\n';
        if is_hex_escape {
            out.push(chars[i + 2]);
            out.push(chars[i + 3]);
            out.push(' ');
            i += 4;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn hex_value(c: u8) -> Option<u32> {
    (c as char).to_digit(16)
}

/// Decode a double-quoted literal into raw bytes.
///
/// Accepts the escapes produced by [`quote`] plus three-digit octal escapes.
/// Fails with `"invalid syntax"` on anything else, including surrogate code
/// points, unescaped quotes and raw newlines.
pub fn unquote(literal: &str) -> Result<Vec<u8>, String> {
    const SYNTAX: &str = "invalid syntax";
    let bytes = literal.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return Err(SYNTAX.to_string());
    }
    let body = &bytes[1..bytes.len() - 1];
    if body.contains(&b'\n') {
        return Err(SYNTAX.to_string());
    }

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'"' => return Err(SYNTAX.to_string()),
            b'\\' => {
                let Some(&kind) = body.get(i + 1) else {
                    return Err(SYNTAX.to_string());
                };
                i += 2;
                match kind {
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0b),
                    b'\\' => out.push(b'\\'),
                    b'"' => out.push(b'"'),
                    b'x' | b'u' | b'U' => {
                        let digits = match kind {
                            b'x' => 2,
                            b'u' => 4,
                            _ => 8,
                        };
                        let hex = body.get(i..i + digits).ok_or_else(|| SYNTAX.to_string())?;
                        let mut value: u32 = 0;
                        for &h in hex {
                            value = (value << 4) | hex_value(h).ok_or_else(|| SYNTAX.to_string())?;
                        }
                        i += digits;
                        if kind == b'x' {
                            out.push(value as u8);
                        } else {
                            let c = char::from_u32(value).ok_or_else(|| SYNTAX.to_string())?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        }
                    }
                    b'0'..=b'7' => {
                        let octal = body.get(i - 1..i + 2).ok_or_else(|| SYNTAX.to_string())?;
                        let mut value: u32 = 0;
                        for &o in octal {
                            if !(b'0'..=b'7').contains(&o) {
                                return Err(SYNTAX.to_string());
                            }
                            value = (value << 3) | (o - b'0') as u32;
                        }
                        if value > 255 {
                            return Err(SYNTAX.to_string());
                        }
                        i += 2;
                        out.push(value as u8);
                    }
                    _ => return Err(SYNTAX.to_string()),
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_chars() {
        assert!(is_printable_char('a'));
        assert!(is_printable_char(' '));
        assert!(is_printable_char('é'));
        assert!(is_printable_char('中'));
        assert!(is_printable_char('\u{301}'));
        assert!(!is_printable_char('\n'));
        assert!(!is_printable_char('\u{01}'));
        assert!(!is_printable_char('\u{7f}'));
        assert!(!is_printable_char('\u{a0}'));
        assert!(!is_printable_char('\u{200b}'));
        assert!(!is_printable_char('\u{e000}'));
    }

    #[test]
    fn test_is_printable_rejects_invalid_utf8() {
        assert!(is_printable(b"hello world"));
        assert!(is_printable(b""));
        assert!(!is_printable(b"caf\xe9"));
        assert!(!is_printable(b"tab\there"));
    }

    #[test]
    fn test_escape_control_and_quotes() {
        assert_eq!(escape(b"a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape(b"line\nnext\ttab"), "line\\nnext\\ttab");
        assert_eq!(escape(b"\x01\x7f"), "\\x01\\x7f");
        assert_eq!(escape(b"\x07\x08\x0b\x0c\r"), "\\a\\b\\v\\f\\r");
    }

    #[test]
    fn test_escape_invalid_utf8_bytes() {
        assert_eq!(escape(b"\xff\xfeok"), "\\xff\\xfeok");
        assert_eq!(escape(b"\xe2\x82"), "\\xe2\\x82");
    }

    #[test]
    fn test_escape_non_printable_code_points() {
        assert_eq!(escape("a\u{a0}b".as_bytes()), "a\\u00a0b");
        assert_eq!(escape("\u{e0001}".as_bytes()), "\\U000e0001");
        assert_eq!(escape("naïve".as_bytes()), "naïve");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(b"key"), "\"key\"");
        assert_eq!(quote(b""), "\"\"");
    }

    #[test]
    fn test_beautify_hex_escapes() {
        assert_eq!(beautify_hex_escapes("\\x01"), "01 ");
        assert_eq!(beautify_hex_escapes("a\\xffb\\x00"), "aff b00 ");
        assert_eq!(beautify_hex_escapes("no escapes"), "no escapes");
        assert_eq!(beautify_hex_escapes("\\n\\x7"), "\\n\\x7");
        // A literal backslash before "x41" is rewritten too.
        assert_eq!(beautify_hex_escapes("\\\\x41"), "\\41 ");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"hello\"").unwrap(), b"hello");
        assert_eq!(unquote("\"a\\nb\\t\\\"c\\\\\"").unwrap(), b"a\nb\t\"c\\");
        assert_eq!(unquote("\"\\x00\\xff\"").unwrap(), vec![0x00, 0xff]);
        assert_eq!(unquote("\"\\u00e9\"").unwrap(), "é".as_bytes());
        assert_eq!(unquote("\"\\101\"").unwrap(), b"A");
        assert_eq!(unquote("\"中文\"").unwrap(), "中文".as_bytes());
    }

    #[test]
    fn test_unquote_rejects() {
        for bad in ["hello", "\"", "\"a\"b\"", "\"\\/\"", "\"\\ud83d\"", "\"\\q\"", "\"\\x4\"", "\"\\777\""] {
            assert_eq!(unquote(bad).unwrap_err(), "invalid syntax", "input {}", bad);
        }
    }

    #[test]
    fn test_quote_unquote_round_trip() {
        let raw = b"bin\x00\x01\xff text \"q\" \\ \n".to_vec();
        assert_eq!(unquote(&quote(&raw)).unwrap(), raw);
    }
}
