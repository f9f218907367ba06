//! JSON type tags used in method signatures.
//!
//! Each tag is a predicate over `serde_json::Value`. There is no coercion:
//! the string `"3"` never satisfies `num`.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A type tag from a signature declaration (`<num>`, `<str>`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    /// Integer or floating point number
    Num,
    Str,
    Bool,
    Array,
    Object,
    /// Matches every value. An absent optional `any` param binds as `null`.
    Any,
    Nil,
}

impl JsonType {
    /// Every canonical tag, in the order they are listed in error messages
    pub const ALL: [JsonType; 7] = [
        JsonType::Num,
        JsonType::Str,
        JsonType::Bool,
        JsonType::Array,
        JsonType::Object,
        JsonType::Any,
        JsonType::Nil,
    ];

    /// Canonical tag name
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Num => "num",
            JsonType::Str => "str",
            JsonType::Bool => "bool",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Any => "any",
            JsonType::Nil => "nil",
        }
    }

    /// Looks up a tag, accepting the short aliases `bit`, `arr` and `obj`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "num" => Some(JsonType::Num),
            "str" => Some(JsonType::Str),
            "bool" | "bit" => Some(JsonType::Bool),
            "array" | "arr" => Some(JsonType::Array),
            "object" | "obj" => Some(JsonType::Object),
            "any" => Some(JsonType::Any),
            "nil" => Some(JsonType::Nil),
            _ => None,
        }
    }

    /// Comma separated list of the canonical tags
    pub fn allowed_tags() -> String {
        Self::ALL
            .iter()
            .map(JsonType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::Num => value.is_number(),
            JsonType::Str => value.is_string(),
            JsonType::Bool => value.is_boolean(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
            JsonType::Any => true,
            JsonType::Nil => value.is_null(),
        }
    }

    /// The tag a concrete value belongs to (never `any`)
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Nil,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(_) => JsonType::Num,
            Value::String(_) => JsonType::Str,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JsonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| format!("Invalid type tag \"{}\"", s))
    }
}

impl Serialize for JsonType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
