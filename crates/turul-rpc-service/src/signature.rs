//! Method signature declarations
//!
//! A declaration looks like `get_sum(foo=<num>, bar=<num>?) -> <num>`: the
//! method name, its parameters in order with a type tag each (a trailing `?`
//! marks the parameter optional), and the return type. Whitespace between
//! tokens is ignored.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::SignatureError;
use crate::json_type::JsonType;

static SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<name>[A-Za-z_][\w.]*)\s*\((?P<args>[^()]*)\)\s*->\s*<\s*(?P<rtype>\w+)\s*>\s*$",
    )
    .expect("signature pattern is valid")
});

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_]\w*)\s*=\s*<\s*(?P<type>\w+)\s*>\s*(?P<optional>\?)?$")
        .expect("parameter pattern is valid")
});

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: JsonType,
    pub optional: bool,
    /// Value bound when an optional parameter is omitted. Supplied at
    /// registration, never by the declaration itself.
    #[serde(skip)]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: JsonType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: JsonType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, param_type)
        }
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=<{}>", self.name, self.param_type)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// The parsed calling contract of one method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub method_name: String,
    pub params: Vec<ParamSpec>,
    pub return_type: JsonType,
}

impl MethodSignature {
    /// Parse a declaration string
    pub fn parse(declaration: &str) -> Result<Self, SignatureError> {
        let captures = SIGNATURE_RE
            .captures(declaration)
            .ok_or_else(|| SignatureError::Malformed {
                declaration: declaration.to_string(),
            })?;

        let method_name = captures["name"].to_string();
        let return_type = parse_type(declaration, &captures["rtype"])?;

        let args = captures["args"].trim();
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        if !args.is_empty() {
            for raw in args.split(',') {
                let param = parse_param(declaration, raw.trim())?;
                if !seen.insert(param.name.clone()) {
                    return Err(SignatureError::DuplicateParam {
                        declaration: declaration.to_string(),
                        name: param.name,
                    });
                }
                params.push(param);
            }
        }

        Ok(Self {
            method_name,
            params,
            return_type,
        })
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_mut(&mut self, name: &str) -> Option<&mut ParamSpec> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.optional)
    }
}

impl FromStr for MethodSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders the canonical declaration; parsing it yields an equal signature
/// (defaults aside).
impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method_name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> <{}>", self.return_type)
    }
}

fn parse_param(declaration: &str, raw: &str) -> Result<ParamSpec, SignatureError> {
    let captures = PARAM_RE
        .captures(raw)
        .ok_or_else(|| SignatureError::MalformedParam {
            declaration: declaration.to_string(),
            param: raw.to_string(),
        })?;

    Ok(ParamSpec {
        name: captures["name"].to_string(),
        param_type: parse_type(declaration, &captures["type"])?,
        optional: captures.name("optional").is_some(),
        default: None,
    })
}

fn parse_type(declaration: &str, token: &str) -> Result<JsonType, SignatureError> {
    JsonType::from_tag(token).ok_or_else(|| SignatureError::UnknownType {
        declaration: declaration.to_string(),
        token: token.to_string(),
        allowed: JsonType::allowed_tags(),
    })
}
