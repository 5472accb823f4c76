use serde::{Serialize, Serializer};
use std::fmt;

/// The shape of a stored value, as classified from the store's type tag.
///
/// Every dispatching component matches on this exhaustively, so adding a
/// shape forces each of them to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Hash,
    List,
    Set,
    SortedSet,
    Unknown,
}

impl ValueType {
    /// Classify a type tag. Anything other than the five known tags,
    /// including `"none"` for a missing key, is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => ValueType::String,
            "hash" => ValueType::Hash,
            "list" => ValueType::List,
            "set" => ValueType::Set,
            "zset" => ValueType::SortedSet,
            _ => ValueType::Unknown,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Hash => "hash",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::SortedSet => "zset",
            ValueType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags() {
        for tag in ["string", "hash", "list", "set", "zset"] {
            assert_eq!(ValueType::from_tag(tag).as_tag(), tag);
        }
    }

    #[test]
    fn test_everything_else_is_unknown() {
        assert_eq!(ValueType::from_tag("none"), ValueType::Unknown);
        assert_eq!(ValueType::from_tag("stream"), ValueType::Unknown);
        assert_eq!(ValueType::from_tag(""), ValueType::Unknown);
        assert_eq!(ValueType::from_tag("STRING"), ValueType::Unknown);
    }

    #[test]
    fn test_serializes_as_tag() {
        assert_eq!(serde_json::to_string(&ValueType::SortedSet).unwrap(), "\"zset\"");
    }
}
