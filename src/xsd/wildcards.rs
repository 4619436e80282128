//! XSD Wildcards
//!
//! This module implements the xs:any element wildcard: a leaf that takes
//! any element allowed by its namespace constraint.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Wildcards

use std::collections::{HashSet, VecDeque};

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::values::{AnyObject, Kwargs, Value, ValueMap};

use super::particles::{Occurs, Particle};
use super::schemas::Schema;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// Element must be declared
    #[default]
    Strict,
    /// Use the declaration if found, otherwise keep the raw element
    Lax,
    /// Always keep the raw element
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Namespace constraint for wildcards
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    #[default]
    Any,
    /// Any namespace except target namespace and no namespace (##other)
    Other {
        /// The target namespace to exclude
        target_namespace: Option<String>,
    },
    /// Specific set of allowed namespaces; "" stands for no namespace
    Enumeration(HashSet<String>),
}

impl NamespaceConstraint {
    /// Create from namespace attribute value
    pub fn from_namespace_attr(value: &str, target_namespace: Option<&str>) -> Result<Self> {
        match value.trim() {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other {
                target_namespace: target_namespace.map(String::from),
            }),
            value => {
                let mut namespaces = HashSet::new();
                for ns in value.split_whitespace() {
                    match ns {
                        "##local" => {
                            namespaces.insert(String::new());
                        }
                        "##targetNamespace" => {
                            namespaces.insert(target_namespace.unwrap_or_default().to_string());
                        }
                        s if s.starts_with("##") => {
                            return Err(Error::Value(format!(
                                "wrong value '{}' in 'namespace' attribute",
                                s
                            )));
                        }
                        uri => {
                            namespaces.insert(uri.to_string());
                        }
                    }
                }
                Ok(Self::Enumeration(namespaces))
            }
        }
    }

    /// Check if a namespace is allowed by this constraint
    pub fn is_allowed(&self, namespace: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other { target_namespace } => {
                !namespace.is_empty() && Some(namespace) != target_namespace.as_deref()
            }
            Self::Enumeration(set) => set.contains(namespace),
        }
    }
}

/// xs:any element wildcard
#[derive(Debug, Clone, Default)]
pub struct XsdAnyElement {
    /// Allowed namespaces
    pub namespace: NamespaceConstraint,
    /// How matched elements are interpreted
    pub process_contents: ProcessContents,
    /// Occurrence constraints
    pub occurs: Occurs,
}

impl XsdAnyElement {
    /// Create a wildcard accepting any element once
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Set the namespace constraint
    pub fn with_namespace(mut self, namespace: NamespaceConstraint) -> Self {
        self.namespace = namespace;
        self
    }

    /// Set the process contents mode
    pub fn with_process_contents(mut self, process_contents: ProcessContents) -> Self {
        self.process_contents = process_contents;
        self
    }

    /// Check if an element name is allowed
    pub fn is_matching(&self, qname: &QName) -> bool {
        self.namespace.is_allowed(qname.namespace_or_empty())
    }

    /// Values a wildcard can carry: raw or decoded elements, and
    /// element-tagged records
    pub fn accept(&self, value: &Value) -> bool {
        match value {
            Value::Xml(_) | Value::Any(_) => true,
            Value::Compound(record) => record.xsd_elm.is_some(),
            Value::List(items) => {
                self.occurs.is_multiple() && items.iter().all(|item| self.accept(item))
            }
            _ => false,
        }
    }

    /// Parse leading elements allowed by the namespace constraint
    pub fn parse_xmlelements(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
    ) -> Result<Value> {
        let mut result = Vec::new();
        for _ in self.occurs.iter() {
            match xmlelements.front() {
                Some(node) if self.is_matching(&node.qname) => {}
                _ => break,
            }
            if let Some(node) = xmlelements.pop_front() {
                result.push(self.parse_xmlelement(node, schema)?);
            }
        }

        if self.occurs.is_multiple() {
            Ok(Value::List(result))
        } else {
            Ok(result.into_iter().next().unwrap_or(Value::Null))
        }
    }

    fn parse_xmlelement(&self, node: Element, schema: &Schema) -> Result<Value> {
        if self.process_contents != ProcessContents::Skip {
            if let Some(Particle::Element(decl)) = schema.get_element(&node.qname) {
                let value = decl.parse_xmlelement(&node, schema)?;
                return Ok(Value::Any(AnyObject::new(decl.clone(), value)));
            }
        }
        Ok(Value::Xml(node))
    }

    /// Bind the value stored under the slot name
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs, name: Option<&str>) -> Option<ValueMap> {
        let name = name?;
        let value = kwargs.shift_remove(name)?;
        Some(ValueMap::from([(name.to_string(), value)]))
    }

    /// Append captured elements to `parent`
    pub fn render(&self, parent: &mut Element, value: &Value) -> Result<()> {
        let items = if self.occurs.is_multiple() {
            value.occurrences()
        } else {
            vec![value]
        };

        for item in items {
            match item {
                Value::Null if self.occurs.is_emptiable() => {}
                Value::Null => {
                    return Err(Error::Value("missing value for required xsd:any".to_string()))
                }
                Value::Xml(node) => parent.add_child(node.clone()),
                Value::Any(object) => object.element.render(parent, &object.value)?,
                other => {
                    return Err(Error::Type(format!(
                        "xsd:any can only render XML elements, got {}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Signature for diagnostics
    pub fn signature(&self) -> String {
        "ANY".to_string()
    }
}
