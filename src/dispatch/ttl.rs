//! Unit-suffixed duration text, as used for key TTLs (`"10s"`, `"1h30m"`,
//! `"1.5m"`, `"-1s"`).

use std::time::Duration;

use super::escape::quote;

/// TTL text meaning "no expiry".
pub const NO_EXPIRY: &str = "-1s";

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "µs" | "μs" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

fn quoted(text: &str) -> String {
    quote(text.as_bytes())
}

/// Parse duration text into signed nanoseconds.
///
/// Accepts an optional sign followed by one or more `<number><unit>` terms,
/// where the number may carry a fraction. A bare `0` is also accepted.
pub fn parse_duration(text: &str) -> Result<i64, String> {
    let invalid = || format!("time: invalid duration {}", quoted(text));

    let mut rest = text;
    let mut negative = false;
    if let Some(sign @ ('-' | '+')) = rest.chars().next() {
        negative = sign == '-';
        rest = &rest[1..];
    }
    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let bytes = rest.as_bytes();
        if !(bytes[0] == b'.' || bytes[0].is_ascii_digit()) {
            return Err(invalid());
        }

        let int_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        let mut whole: u64 = 0;
        for &digit in &bytes[..int_len] {
            whole = whole
                .checked_mul(10)
                .and_then(|v| v.checked_add((digit - b'0') as u64))
                .filter(|v| *v <= 1 << 63)
                .ok_or_else(invalid)?;
        }
        let mut pos = int_len;

        let mut fraction: u64 = 0;
        let mut scale: f64 = 1.0;
        let mut frac_len = 0;
        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            frac_len = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
            let mut overflowed = false;
            for &digit in &bytes[pos..pos + frac_len] {
                if overflowed {
                    continue;
                }
                match fraction
                    .checked_mul(10)
                    .and_then(|v| v.checked_add((digit - b'0') as u64))
                    .filter(|v| *v <= 1 << 63)
                {
                    Some(v) => {
                        fraction = v;
                        scale *= 10.0;
                    }
                    None => overflowed = true,
                }
            }
            pos += frac_len;
        }
        if int_len == 0 && frac_len == 0 {
            return Err(invalid());
        }

        let unit_len = rest[pos..]
            .bytes()
            .take_while(|b| !(*b == b'.' || b.is_ascii_digit()))
            .count();
        if unit_len == 0 {
            return Err(format!("time: missing unit in duration {}", quoted(text)));
        }
        let unit = &rest[pos..pos + unit_len];
        let nanos = unit_nanos(unit).ok_or_else(|| {
            format!("time: unknown unit {} in duration {}", quoted(unit), quoted(text))
        })?;

        if whole > (1 << 63) / nanos {
            return Err(invalid());
        }
        let mut term = whole * nanos;
        if fraction > 0 {
            term += (fraction as f64 * (nanos as f64 / scale)) as u64;
            if term > 1 << 63 {
                return Err(invalid());
            }
        }
        total = total.checked_add(term).filter(|v| *v <= 1 << 63).ok_or_else(invalid)?;
        rest = &rest[pos + unit_len..];
    }

    if negative {
        Ok((total as i128).wrapping_neg() as i64)
    } else if total > i64::MAX as u64 {
        Err(invalid())
    } else {
        Ok(total as i64)
    }
}

/// Interpret TTL text for a write. `None` means the key gets no expiry:
/// the `-1s` sentinel, empty text, and any non-positive duration.
pub fn parse_ttl(text: &str) -> Result<Option<Duration>, String> {
    if text.is_empty() || text == NO_EXPIRY {
        return Ok(None);
    }
    let nanos = parse_duration(text)?;
    if nanos <= 0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_nanos(nanos as u64)))
    }
}

/// Render a TTL in whole seconds as duration text, e.g. `90` as `"1m30s"`.
/// The store's `-1` and `-2` replies render as `"-1s"` and `"-2s"`.
pub fn format_ttl(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    let (hours, minutes, secs) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{}{}h{}m{}s", sign, hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}{}m{}s", sign, minutes, secs)
    } else {
        format!("{}{}s", sign, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("10s"), Ok(10 * SECOND as i64));
        assert_eq!(parse_duration("5m"), Ok(5 * MINUTE as i64));
        assert_eq!(parse_duration("2h"), Ok(2 * HOUR as i64));
        assert_eq!(parse_duration("300ms"), Ok(300 * MILLISECOND as i64));
        assert_eq!(parse_duration("7us"), Ok(7_000));
        assert_eq!(parse_duration("7µs"), Ok(7_000));
        assert_eq!(parse_duration("12ns"), Ok(12));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_duration("1h30m"), Ok((HOUR + 30 * MINUTE) as i64));
        assert_eq!(parse_duration("1.5s"), Ok(1_500_000_000));
        assert_eq!(parse_duration(".5m"), Ok(30 * SECOND as i64));
        assert_eq!(parse_duration("1.s"), Ok(SECOND as i64));
        assert_eq!(parse_duration("-1s"), Ok(-(SECOND as i64)));
        assert_eq!(parse_duration("+2s"), Ok(2 * SECOND as i64));
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_duration("0"), Ok(0));
        assert_eq!(parse_duration("-0"), Ok(0));
        assert_eq!(parse_duration("0s"), Ok(0));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_duration(""), Err("time: invalid duration \"\"".to_string()));
        assert_eq!(parse_duration("x"), Err("time: invalid duration \"x\"".to_string()));
        assert_eq!(parse_duration("."), Err("time: invalid duration \".\"".to_string()));
        assert_eq!(
            parse_duration("1"),
            Err("time: missing unit in duration \"1\"".to_string())
        );
        assert_eq!(
            parse_duration("1x"),
            Err("time: unknown unit \"x\" in duration \"1x\"".to_string())
        );
        assert_eq!(
            parse_duration("99999999999h"),
            Err("time: invalid duration \"99999999999h\"".to_string())
        );
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl(""), Ok(None));
        assert_eq!(parse_ttl("-1s"), Ok(None));
        assert_eq!(parse_ttl("0s"), Ok(None));
        assert_eq!(parse_ttl("-5m"), Ok(None));
        assert_eq!(parse_ttl("90s"), Ok(Some(Duration::from_secs(90))));
        assert_eq!(parse_ttl("250ms"), Ok(Some(Duration::from_millis(250))));
        assert!(parse_ttl("soon").is_err());
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(-1), "-1s");
        assert_eq!(format_ttl(-2), "-2s");
        assert_eq!(format_ttl(0), "0s");
        assert_eq!(format_ttl(45), "45s");
        assert_eq!(format_ttl(90), "1m30s");
        assert_eq!(format_ttl(3600), "1h0m0s");
        assert_eq!(format_ttl(86_461), "24h1m1s");
    }

    #[test]
    fn test_format_parses_back() {
        for secs in [1, 59, 61, 3599, 3601, 100_000] {
            assert_eq!(parse_duration(&format_ttl(secs)), Ok(secs * SECOND as i64));
        }
    }
}
