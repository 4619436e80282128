//! XSD Element declarations
//!
//! Leaf particles of the content model. An element either carries simple
//! text content converted through a builtin type, or complex content
//! described by a [`ComplexType`].

use std::collections::VecDeque;
use std::sync::Arc;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::values::{Kwargs, Value, ValueMap};

use super::builtins::BuiltinType;
use super::complex_types::ComplexType;
use super::particles::Occurs;
use super::refs::ResolveState;
use super::schemas::{Registry, Schema};

/// Type of an element's content
#[derive(Debug, Clone)]
pub enum ElementType {
    /// Simple text content
    Simple(BuiltinType),
    /// Child elements described by a complex type
    Complex(Arc<ComplexType>),
}

/// XSD Element declaration
#[derive(Debug, Clone)]
pub struct XsdElement {
    /// Element qualified name
    pub qname: QName,
    /// Occurrence constraints
    pub occurs: Occurs,
    /// Element type
    pub element_type: ElementType,
}

impl XsdElement {
    /// Create an element with simple content
    pub fn simple(qname: QName, builtin: BuiltinType) -> Self {
        Self {
            qname,
            occurs: Occurs::once(),
            element_type: ElementType::Simple(builtin),
        }
    }

    /// Create an element with complex content
    pub fn complex(qname: QName, complex_type: impl Into<Arc<ComplexType>>) -> Self {
        Self {
            qname,
            occurs: Occurs::once(),
            element_type: ElementType::Complex(complex_type.into()),
        }
    }

    /// Set the occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Local name of the element
    pub fn name(&self) -> &str {
        &self.qname.local_name
    }

    /// Complex type, if the element has one
    pub fn complex_type(&self) -> Option<&Arc<ComplexType>> {
        match &self.element_type {
            ElementType::Complex(ct) => Some(ct),
            ElementType::Simple(_) => None,
        }
    }

    /// Parse leading elements with this element's tag, up to maxOccurs
    pub fn parse_xmlelements(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
    ) -> Result<Value> {
        let mut result = Vec::new();
        for _ in self.occurs.iter() {
            match xmlelements.front() {
                Some(node) if node.qname == self.qname => {}
                _ => break,
            }
            if let Some(node) = xmlelements.pop_front() {
                result.push(self.parse_xmlelement(&node, schema)?);
            }
        }

        if self.occurs.is_multiple() {
            Ok(Value::List(result))
        } else {
            Ok(result.into_iter().next().unwrap_or(Value::Null))
        }
    }

    /// Parse a single element node
    pub fn parse_xmlelement(&self, node: &Element, schema: &Schema) -> Result<Value> {
        match &self.element_type {
            ElementType::Simple(builtin) => match node.text() {
                Some(text) => builtin.decode(text),
                None if *builtin == BuiltinType::String => Ok(Value::String(String::new())),
                None => Ok(Value::Null),
            },
            ElementType::Complex(ct) => {
                let record = ct.parse_xmlelement(node, schema)?;
                Ok(Value::Compound(record.with_element(self.qname.clone())))
            }
        }
    }

    /// Bind the value stored under `name` (or the element's own name)
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs, name: Option<&str>) -> Option<ValueMap> {
        let name = name.unwrap_or_else(|| self.name());
        let value = kwargs.shift_remove(name)?;
        Some(ValueMap::from([(name.to_string(), value)]))
    }

    /// Append one child per occurrence of `value` to `parent`
    pub fn render(&self, parent: &mut Element, value: &Value) -> Result<()> {
        let items = if self.occurs.is_multiple() {
            value.occurrences()
        } else {
            vec![value]
        };

        for item in items {
            if item.is_null() {
                if self.occurs.is_emptiable() {
                    continue;
                }
                return Err(Error::Value(format!(
                    "missing value for required element '{}'",
                    self.qname
                )));
            }

            let node = parent.append_child(self.qname.clone());
            match &self.element_type {
                ElementType::Simple(builtin) => node.set_text(builtin.encode(item)?),
                ElementType::Complex(ct) => ct.render(node, item)?,
            }
        }
        Ok(())
    }

    /// Type signature, with `[]` when repeatable
    pub fn signature(&self, depth: usize) -> Result<String> {
        let type_signature = match &self.element_type {
            ElementType::Simple(builtin) => builtin.name(),
            ElementType::Complex(ct) => ct.signature(depth)?,
        };

        if self.occurs.is_multiple() {
            Ok(format!("{}[]", type_signature))
        } else {
            Ok(type_signature)
        }
    }

    pub(crate) fn resolve_with(
        &self,
        registry: &dyn Registry,
        state: &mut ResolveState,
    ) -> Result<()> {
        match &self.element_type {
            ElementType::Complex(ct) => ct.resolve_with(registry, state),
            ElementType::Simple(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::groups::XsdGroup;

    fn schema() -> Schema {
        Schema::new(None)
    }

    #[test]
    fn test_parse_takes_matching_prefix() {
        let element = XsdElement::simple(QName::local("n"), BuiltinType::Integer)
            .with_occurs(Occurs::new(0, Some(2)));
        let mut xml: VecDeque<Element> = vec![
            Element::with_text(QName::local("n"), "1"),
            Element::with_text(QName::local("n"), "2"),
            Element::with_text(QName::local("n"), "3"),
        ]
        .into();

        let value = element.parse_xmlelements(&mut xml, &schema()).unwrap();
        assert_eq!(value, Value::List(vec![Value::from(1), Value::from(2)]));
        assert_eq!(xml.len(), 1);
    }

    #[test]
    fn test_parse_mismatch_consumes_nothing() {
        let element = XsdElement::simple(QName::local("a"), BuiltinType::String);
        let mut xml: VecDeque<Element> = vec![Element::with_text(QName::local("b"), "x")].into();

        let value = element.parse_xmlelements(&mut xml, &schema()).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(xml.len(), 1);
    }

    #[test]
    fn test_parse_complex_is_tagged() {
        let ct = ComplexType::new(Some(QName::local("PointType")))
            .with_content(XsdGroup::sequence(vec![
                XsdElement::simple(QName::local("x"), BuiltinType::Integer).into(),
            ]));
        let element = XsdElement::complex(QName::local("point"), ct);

        let mut node = Element::new(QName::local("point"));
        node.add_child(Element::with_text(QName::local("x"), "3"));

        match element.parse_xmlelement(&node, &schema()).unwrap() {
            Value::Compound(record) => {
                assert_eq!(record.xsd_elm, Some(QName::local("point")));
                assert_eq!(record.fields.get("x"), Some(&Value::from(3)));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_parse_kwargs() {
        let element = XsdElement::simple(QName::local("a"), BuiltinType::String);
        let mut kwargs = Kwargs::from([("a".to_string(), Value::from("1"))]);

        assert!(element.parse_kwargs(&mut kwargs, Some("other")).is_none());
        let bound = element.parse_kwargs(&mut kwargs, None).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::from("1")));
        assert!(kwargs.is_empty());
    }

    #[test]
    fn test_render_required_and_optional() {
        let required = XsdElement::simple(QName::local("a"), BuiltinType::Integer);
        let optional = XsdElement::simple(QName::local("b"), BuiltinType::Integer)
            .with_occurs(Occurs::optional());

        let mut parent = Element::new(QName::local("root"));
        optional.render(&mut parent, &Value::Null).unwrap();
        assert!(parent.children().is_empty());

        assert!(matches!(
            required.render(&mut parent, &Value::Null),
            Err(Error::Value(_))
        ));

        required.render(&mut parent, &Value::from(5)).unwrap();
        assert_eq!(parent.children()[0].text(), Some("5"));
    }

    #[test]
    fn test_signature() {
        let element = XsdElement::simple(QName::local("a"), BuiltinType::String);
        assert_eq!(element.signature(0).unwrap(), "xsd:string");

        let repeated = element.with_occurs(Occurs::zero_or_more());
        assert_eq!(repeated.signature(0).unwrap(), "xsd:string[]");
    }
}
