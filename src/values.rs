//! Structured values produced by parsing and consumed by rendering
//!
//! Compositors only look inside values through [`ValueAccess`], which is
//! implemented by the plain associative container ([`ValueMap`]) and by the
//! attribute-bearing record produced for complex types ([`CompoundValue`]).

use crate::documents::Element;
use crate::namespaces::QName;
use crate::xsd::elements::XsdElement;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// Reserved key recording which concrete element produced a value
pub const XSD_ELM_KEY: &str = "_xsd_elm";

/// Ordered name → value mapping
pub type ValueMap = IndexMap<String, Value>;

/// Keyword arguments handed to binding; same shape as a [`ValueMap`]
pub type Kwargs = ValueMap;

/// Any value flowing through bind, parse and render
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// String value
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Decimal value
    Decimal(Decimal),
    /// Date value
    Date(NaiveDate),
    /// DateTime value with offset
    DateTime(DateTime<FixedOffset>),
    /// Duration value (ISO 8601 lexical form)
    Duration(String),
    /// Binary value (base64 decoded)
    Binary(Vec<u8>),
    /// Repeated occurrences
    List(Vec<Value>),
    /// Plain associative container
    Map(ValueMap),
    /// Record built for a complex-typed element
    Compound(CompoundValue),
    /// Raw element captured by a wildcard
    Xml(Element),
    /// Wildcard content decoded through a global element declaration
    Any(AnyObject),
}

/// Narrow capability interface used by compositors to read values
pub trait ValueAccess {
    /// Check whether a name is present
    fn contains(&self, name: &str) -> bool;

    /// Get a value by name
    fn get(&self, name: &str) -> Option<&Value>;

    /// Names present, in order
    fn keys(&self) -> Vec<&str>;

    /// Produce a plain name → value mapping
    fn as_mapping(&self) -> ValueMap;
}

impl ValueAccess for ValueMap {
    fn contains(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&Value> {
        IndexMap::get(self, name)
    }

    fn keys(&self) -> Vec<&str> {
        IndexMap::keys(self).map(String::as_str).collect()
    }

    fn as_mapping(&self) -> ValueMap {
        self.clone()
    }
}

/// Record value with named fields, tagged with the element that produced it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundValue {
    /// Name of the complex type, if known
    pub type_name: Option<QName>,
    /// Element that produced this value
    pub xsd_elm: Option<QName>,
    /// Field values, in declaration order
    pub fields: ValueMap,
}

impl CompoundValue {
    /// Create an empty record for a type
    pub fn new(type_name: Option<QName>) -> Self {
        Self {
            type_name,
            xsd_elm: None,
            fields: ValueMap::new(),
        }
    }

    /// Tag the record with the element that produced it
    pub fn with_element(mut self, qname: QName) -> Self {
        self.xsd_elm = Some(qname);
        self
    }

    /// Set a field
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

/// Value taken by a wildcard, paired with the declaration that decoded it.
///
/// The declaration is kept so the value can be rendered back as the same
/// element.
#[derive(Debug, Clone)]
pub struct AnyObject {
    /// Global element declaration used for decoding
    pub element: Arc<XsdElement>,
    /// Decoded value
    pub value: Box<Value>,
}

impl AnyObject {
    /// Pair a decoded value with its declaration
    pub fn new(element: Arc<XsdElement>, value: Value) -> Self {
        Self {
            element,
            value: Box::new(value),
        }
    }

    /// Name of the element that produced the value
    pub fn qname(&self) -> &QName {
        &self.element.qname
    }
}

impl PartialEq for AnyObject {
    fn eq(&self, other: &Self) -> bool {
        self.qname() == other.qname() && self.value == other.value
    }
}

impl ValueAccess for CompoundValue {
    fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn keys(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    fn as_mapping(&self) -> ValueMap {
        self.fields.clone()
    }
}

impl Value {
    /// Build a mapping value from (name, value) pairs
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check for the absent value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Capability view for mapping-like values
    pub fn access(&self) -> Option<&dyn ValueAccess> {
        match self {
            Value::Map(map) => Some(map),
            Value::Compound(record) => Some(record),
            Value::Any(object) => object.value.access(),
            _ => None,
        }
    }

    /// Look up a named sub-value on mapping-like values
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.access().and_then(|access| access.get(name))
    }

    /// Whether the value is "empty" for binding purposes
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Compound(record) => record.fields.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// View the value as occurrences: a list yields its items, anything
    /// else is a single occurrence
    pub fn occurrences(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Owned variant of [`Value::occurrences`]
    pub fn into_occurrences(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }

    /// Lexical XML text for simple values
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) | Value::Duration(s) => Some(s.clone()),
            Value::Boolean(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Some(dt.to_rfc3339()),
            Value::Binary(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            _ => None,
        }
    }

    /// Convert to a JSON value for diagnostics
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => map_to_json(map),
            Value::Compound(record) => map_to_json(&record.fields),
            Value::Any(object) => object.value.to_json(),
            Value::Xml(element) => JsonValue::String(
                element
                    .to_xml_string()
                    .unwrap_or_else(|_| format!("<{}/>", element.qname)),
            ),
            simple => simple
                .to_text()
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
        }
    }
}

fn map_to_json(map: &ValueMap) -> JsonValue {
    let mut object = Map::new();
    for (key, value) in map {
        object.insert(key.clone(), value.to_json());
    }
    JsonValue::Object(object)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(value)
    }
}

impl From<CompoundValue> for Value {
    fn from(value: CompoundValue) -> Self {
        Value::Compound(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Element> for Value {
    fn from(value: Element) -> Self {
        Value::Xml(value)
    }
}

impl From<AnyObject> for Value {
    fn from(value: AnyObject) -> Self {
        Value::Any(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
