use bytes::{Buf, BytesMut};
use std::io;

/// RESP (Redis Serialization Protocol) value types.
///
/// Bulk strings carry raw bytes so binary values survive the round trip.
/// RESP3 null and double are decoded for tolerance but never sent.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),             // +
    Error(String),                    // -
    Integer(i64),                     // :
    BulkString(Option<Vec<u8>>),      // $ (None = null)
    Array(Option<Vec<RespValue>>),    // * (None = null)

    // RESP3
    Null,                             // _
    Double(f64),                      // ,
}

impl RespValue {
    /// Build a command as an array of binary-safe bulk strings.
    pub fn command<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        RespValue::Array(Some(
            args.into_iter()
                .map(|a| RespValue::BulkString(Some(a.as_ref().to_vec())))
                .collect(),
        ))
    }

    /// Serialize this value to Redis wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => out.extend_from_slice(format!("+{}\r\n", s).as_bytes()),
            RespValue::Error(e) => out.extend_from_slice(format!("-{}\r\n", e).as_bytes()),
            RespValue::Integer(i) => out.extend_from_slice(format!(":{}\r\n", i).as_bytes()),
            RespValue::BulkString(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => out.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(Some(items)) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            RespValue::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            RespValue::Null => out.extend_from_slice(b"_\r\n"),
            RespValue::Double(d) => out.extend_from_slice(format!(",{}\r\n", d).as_bytes()),
        }
    }
}

/// Format a float the way the store prints scores: shortest round-trip
/// decimal, no exponent, `inf`/`-inf` for infinities.
pub fn format_double(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{}", value)
    }
}

/// Stateful parser for Redis protocol replies.
///
/// Accumulates data in a buffer and only consumes it once a complete value
/// is available, so a reply split across reads parses correctly.
pub struct RespParser {
    buffer: BytesMut,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add incoming bytes to the parser buffer.
    pub fn add_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Reset the parser buffer to recover from errors.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Parse next complete value. Returns None if incomplete.
    pub fn parse(&mut self) -> Result<Option<RespValue>, io::Error> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        tracing::trace!("Parsing buffer: {} bytes", self.buffer.len());

        match parse_value(&self.buffer)? {
            Some((value, consumed)) => {
                self.buffer.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Parse one value from the front of `buf`, returning it with the number of
/// bytes it occupies.
fn parse_value(buf: &[u8]) -> Result<Option<(RespValue, usize)>, io::Error> {
    let Some(&type_byte) = buf.first() else {
        return Ok(None);
    };
    let Some((line, line_end)) = read_line(&buf[1..])? else {
        return Ok(None);
    };
    let header = 1 + line_end;

    match type_byte {
        b'+' => Ok(Some((RespValue::SimpleString(line), header))),
        b'-' => Ok(Some((RespValue::Error(line), header))),
        b':' => {
            let num = line.parse::<i64>().map_err(|_| invalid("Invalid integer"))?;
            Ok(Some((RespValue::Integer(num), header)))
        }
        b'$' => {
            let length = line
                .parse::<i64>()
                .map_err(|_| invalid("Invalid bulk string length"))?;
            if length == -1 {
                return Ok(Some((RespValue::BulkString(None), header)));
            }
            if length < 0 {
                return Err(invalid("Invalid bulk string length"));
            }

            let length = length as usize;
            let rest = &buf[header..];
            if rest.len() < length + 2 {
                return Ok(None); // Not enough data
            }
            if &rest[length..length + 2] != b"\r\n" {
                return Err(invalid("Bulk string missing terminator"));
            }
            Ok(Some((
                RespValue::BulkString(Some(rest[..length].to_vec())),
                header + length + 2,
            )))
        }
        b'*' => {
            let length = line
                .parse::<i64>()
                .map_err(|_| invalid("Invalid array length"))?;
            if length == -1 {
                return Ok(Some((RespValue::Array(None), header)));
            }
            if length < 0 {
                return Err(invalid("Invalid array length"));
            }

            let mut consumed = header;
            let mut elements = Vec::with_capacity(length as usize);
            for _ in 0..length {
                match parse_value(&buf[consumed..])? {
                    Some((element, used)) => {
                        elements.push(element);
                        consumed += used;
                    }
                    None => return Ok(None), // Not enough data
                }
            }
            Ok(Some((RespValue::Array(Some(elements)), consumed)))
        }
        b'_' => Ok(Some((RespValue::Null, header))),
        b',' => {
            let num = line.parse::<f64>().map_err(|_| invalid("Invalid double"))?;
            Ok(Some((RespValue::Double(num), header)))
        }
        _ => Err(invalid(format!(
            "Invalid RESP type byte: {}",
            type_byte as char
        ))),
    }
}

/// Read a CRLF-terminated line. Returns the line and the offset just past the CRLF.
fn read_line(buf: &[u8]) -> Result<Option<(String, usize)>, io::Error> {
    match buf.windows(2).position(|w| w == b"\r\n") {
        Some(pos) => {
            let line = String::from_utf8(buf[..pos].to_vec()).map_err(|_| invalid("Invalid UTF-8"))?;
            Ok(Some((line, pos + 2)))
        }
        None => Ok(None),
    }
}
