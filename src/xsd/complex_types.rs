//! XSD Complex Types
//!
//! A complex type wraps one compositor particle describing its element
//! content. It maps that content onto the fields of a [`CompoundValue`]
//! using the same naming rule as a compositor's nested view: a single
//! sequence/all/group contributes its members directly, anything else is
//! stored under a synthetic name.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Complex_Type_Definitions

use std::collections::VecDeque;
use std::slice;

use once_cell::sync::OnceCell;
use tracing::trace;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::values::{CompoundValue, Kwargs, Value, ValueMap};

use super::particles::{default_values, parse_args, slot_default, Particle, MAX_SIGNATURE_DEPTH};
use super::refs::ResolveState;
use super::schemas::{Registry, Schema};
use super::views::{FlatEntry, NameViews, NestedEntry};

/// XSD Complex Type definition with element content
#[derive(Debug, Clone, Default)]
pub struct ComplexType {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Content model (None for empty content)
    pub content: Option<Particle>,
    views: OnceCell<NameViews>,
}

impl ComplexType {
    /// Create a complex type with empty content
    pub fn new(name: Option<QName>) -> Self {
        Self {
            name,
            content: None,
            views: OnceCell::new(),
        }
    }

    /// Set the content model
    pub fn with_content(mut self, content: impl Into<Particle>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Check if the type has no element content
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    fn views(&self) -> Result<&NameViews> {
        self.views.get_or_try_init(|| match &self.content {
            Some(content) => NameViews::build(slice::from_ref(content)),
            None => Ok(NameViews {
                nested: Vec::new(),
                flattened: Vec::new(),
            }),
        })
    }

    /// Field-level view of the content
    pub fn nested_elements(&self) -> Result<&[NestedEntry]> {
        Ok(&self.views()?.nested)
    }

    /// Flattened field names of a value of this type
    pub fn elements(&self) -> Result<&[FlatEntry]> {
        Ok(&self.views()?.flattened)
    }

    /// Fields with empty placeholders
    pub fn default_value(&self) -> Result<ValueMap> {
        Ok(default_values(self.elements()?))
    }

    /// Parse the children of `node` into a record
    pub fn parse_xmlelement(&self, node: &Element, schema: &Schema) -> Result<CompoundValue> {
        let mut children: VecDeque<Element> = node.children().iter().cloned().collect();
        let mut record = CompoundValue::new(self.name.clone());

        for (name, element) in self.nested_elements()? {
            let value = element.parse_xmlelements(&mut children, schema, name.as_deref())?;
            match name {
                Some(name) => record.set(name.clone(), value),
                None => match value.access() {
                    Some(access) => record.fields.extend(access.as_mapping()),
                    None => record.fields.extend(default_values(element.elements()?)),
                },
            }
        }

        if !children.is_empty() {
            trace!(
                element = %node.qname,
                unconsumed = children.len(),
                "trailing child elements ignored"
            );
        }
        Ok(record)
    }

    /// Bind positional and keyword arguments into a record.
    ///
    /// Unknown keyword arguments and surplus positional arguments are
    /// errors; missing fields get their empty placeholder.
    pub fn bind(&self, args: &[Value], mut kwargs: Kwargs) -> Result<CompoundValue> {
        let elements = self.elements()?;

        let (positional, rest) = parse_args(elements, args)?;
        if !rest.is_empty() {
            return Err(Error::Type(format!(
                "takes {} positional arguments but {} were given",
                elements.len(),
                args.len()
            )));
        }
        for (name, value) in positional {
            if kwargs.contains_key(&name) {
                return Err(Error::Type(format!(
                    "got multiple values for argument '{}'",
                    name
                )));
            }
            kwargs.insert(name, value);
        }

        let mut bound = self.parse_kwargs(&mut kwargs)?;
        if !kwargs.is_empty() {
            let unexpected: Vec<&str> = kwargs.keys().map(String::as_str).collect();
            return Err(Error::Type(format!(
                "got unexpected keyword argument(s): {}",
                unexpected.join(", ")
            )));
        }

        let mut record = CompoundValue::new(self.name.clone());
        for (name, element) in elements {
            let value = bound
                .shift_remove(name)
                .unwrap_or_else(|| slot_default(element));
            record.set(name.clone(), value);
        }
        Ok(record)
    }

    /// Consume the keyword arguments belonging to this type's fields
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs) -> Result<ValueMap> {
        let mut result = ValueMap::new();
        for (name, element) in self.nested_elements()? {
            if let Some(value) = element.parse_kwargs(kwargs, name.as_deref())? {
                result.extend(value);
            }
        }
        Ok(result)
    }

    /// Render a record's fields as children of `node`
    pub fn render(&self, node: &mut Element, value: &Value) -> Result<()> {
        if value.access().is_none() {
            return Err(Error::Type(format!(
                "expected a mapping for {}, got {}",
                self.describe(),
                value
            )));
        }

        let null = Value::Null;
        for (name, element) in self.nested_elements()? {
            let element_value = match name {
                Some(name) => value.get(name).unwrap_or(&null),
                None => value,
            };
            if !element_value.is_null() || !element.is_optional() {
                element.render(node, element_value)?;
            }
        }
        Ok(())
    }

    /// Type name, or the content signature for anonymous types
    pub fn signature(&self, depth: usize) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.local_name.clone());
        }
        if depth > MAX_SIGNATURE_DEPTH {
            return Ok("{...}".to_string());
        }

        let mut parts = Vec::new();
        for (name, element) in self.nested_elements()? {
            match name {
                Some(name) => parts.push(format!("{}: {}", name, element.signature(depth + 1)?)),
                None => parts.push(element.signature(depth + 1)?),
            }
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    pub(crate) fn resolve_with(
        &self,
        registry: &dyn Registry,
        state: &mut ResolveState,
    ) -> Result<()> {
        match &self.content {
            Some(content) => content.resolve_with(registry, state),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("type '{}'", name),
            None => "anonymous type".to_string(),
        }
    }
}
