//! XSD built-in simple types
//!
//! Text conversion for the simple types leaf elements can carry. Decoding
//! turns element text into a [`Value`]; encoding is the inverse used when
//! rendering.

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

use crate::error::{Error, Result};
use crate::values::Value;

/// XSD 1.0 Namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// ISO 8601 duration: P[n]Y[n]M[n]DT[n]H[n]M[n]S
static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$")
        .unwrap_or_else(|e| panic!("invalid duration pattern: {e}"))
});

/// Built-in simple types supported by leaf elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// xs:string
    String,
    /// xs:boolean
    Boolean,
    /// xs:integer (and the bounded integer types)
    Integer,
    /// xs:decimal
    Decimal,
    /// xs:date
    Date,
    /// xs:dateTime
    DateTime,
    /// xs:duration
    Duration,
    /// xs:base64Binary
    Base64Binary,
}

impl BuiltinType {
    /// Look up a type by its local name in the XSD namespace
    pub fn from_name(name: &str) -> Option<Self> {
        let local = name
            .strip_prefix(&format!("{{{}}}", XSD_NAMESPACE))
            .unwrap_or(name);
        match local {
            "string" | "normalizedString" | "token" | "anyURI" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "integer" | "long" | "int" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "unsignedLong" | "unsignedInt" | "unsignedShort" => {
                Some(Self::Integer)
            }
            "decimal" => Some(Self::Decimal),
            "date" => Some(Self::Date),
            "dateTime" => Some(Self::DateTime),
            "duration" => Some(Self::Duration),
            "base64Binary" => Some(Self::Base64Binary),
            _ => None,
        }
    }

    /// Local name of the type
    pub fn local_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Duration => "duration",
            Self::Base64Binary => "base64Binary",
        }
    }

    /// Prefixed name used in signatures, e.g. `xsd:string`
    pub fn name(&self) -> String {
        format!("xsd:{}", self.local_name())
    }

    /// Convert element text into a value
    pub fn decode(&self, text: &str) -> Result<Value> {
        match self {
            Self::String => Ok(Value::String(text.to_string())),
            Self::Boolean => match text.trim() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                other => Err(self.invalid(other)),
            },
            Self::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.invalid(text)),
            Self::Decimal => text
                .trim()
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|_| self.invalid(text)),
            Self::Date => {
                let trimmed = text.trim();
                let date = trimmed.strip_suffix('Z').unwrap_or(trimmed);
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| self.invalid(text))
            }
            Self::DateTime => parse_datetime(text.trim())
                .map(Value::DateTime)
                .ok_or_else(|| self.invalid(text)),
            Self::Duration => {
                let trimmed = text.trim();
                if !DURATION_REGEX.is_match(trimmed) || trimmed == "P" || trimmed == "-P" {
                    return Err(self.invalid(text));
                }
                Ok(Value::Duration(trimmed.to_string()))
            }
            Self::Base64Binary => {
                let cleaned: String = text.split_whitespace().collect();
                base64::engine::general_purpose::STANDARD
                    .decode(cleaned)
                    .map(Value::Binary)
                    .map_err(|_| self.invalid(text))
            }
        }
    }

    /// Convert a value into element text
    pub fn encode(&self, value: &Value) -> Result<String> {
        let compatible = matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Boolean, Value::Boolean(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Decimal, Value::Decimal(_) | Value::Integer(_))
                | (Self::Date, Value::Date(_))
                | (Self::DateTime, Value::DateTime(_))
                | (Self::Duration, Value::Duration(_))
                | (Self::Base64Binary, Value::Binary(_))
        );

        if compatible {
            if let Some(text) = value.to_text() {
                return Ok(text);
            }
        }

        // Lexical strings are checked against the type before use
        if let Value::String(text) = value {
            return self
                .decode(text)?
                .to_text()
                .ok_or_else(|| self.invalid(text));
        }

        Err(Error::Type(format!(
            "cannot render {} as {}",
            value,
            self.name()
        )))
    }

    fn invalid(&self, text: &str) -> Error {
        Error::Value(format!("'{}' is not a valid {}", text, self.name()))
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// dateTime with optional timezone; a missing zone is read as UTC
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let utc = FixedOffset::east_opt(0)?;
    naive.and_local_timezone(utc).single()
}
