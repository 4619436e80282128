//! Named model groups (xs:group)
//!
//! A named group wraps a single compositor and is transparent to it,
//! except that it may layer its own occurrence bounds on top. A repeated
//! group exposes its child under the single slot `_value_1`.

use std::collections::VecDeque;

use once_cell::sync::OnceCell;
use tracing::trace;

use crate::documents::Element;
use crate::error::Result;
use crate::namespaces::QName;
use crate::values::{Kwargs, Value, ValueMap};

use super::particles::{
    default_values, into_item_kwargs, Occurs, ParseState, Particle, MAX_SIGNATURE_DEPTH,
};
use super::schemas::Schema;
use super::views::FlatEntry;

/// Slot name used for the child of a repeated group
const GROUP_SLOT: &str = "_value_1";

/// Named model group definition or use
#[derive(Debug, Clone)]
pub struct NamedGroup {
    /// Group name
    pub qname: QName,
    /// Wrapped compositor
    pub child: Particle,
    /// Occurrence constraints of this use
    pub occurs: Occurs,
    elements: OnceCell<Vec<FlatEntry>>,
}

impl NamedGroup {
    /// Create a named group around a compositor
    pub fn new(qname: QName, child: impl Into<Particle>) -> Self {
        Self {
            qname,
            child: child.into(),
            occurs: Occurs::once(),
            elements: OnceCell::new(),
        }
    }

    /// Set the occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Whether more than one occurrence is allowed
    pub fn accepts_multiple(&self) -> bool {
        self.occurs.is_multiple()
    }

    /// Flattened view: the child's own, or one slot when repeated
    pub fn elements(&self) -> Result<&[FlatEntry]> {
        let elements = self.elements.get_or_try_init(|| {
            if self.accepts_multiple() {
                Ok(vec![(GROUP_SLOT.to_string(), self.child.clone())])
            } else {
                self.child.elements().map(<[FlatEntry]>::to_vec)
            }
        })?;
        Ok(elements)
    }

    /// Default value over the flattened view
    pub fn default_value(&self) -> Result<ValueMap> {
        Ok(default_values(self.elements()?))
    }

    /// Bind keyword arguments through the child
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs, name: Option<&str>) -> Result<Option<ValueMap>> {
        if !self.accepts_multiple() {
            return self.child.parse_kwargs(kwargs, name);
        }

        let Some(name) = name else {
            return Ok(None);
        };
        let Some(supplied) = kwargs.shift_remove(name) else {
            return Ok(None);
        };

        let sub_name = self.child.accepts_multiple().then_some(GROUP_SLOT);
        let mut result = Vec::new();
        for (_, mut sub_kwargs) in self.occurs.iter().zip(into_item_kwargs(supplied)?) {
            if let Some(subresult) = self.child.parse_kwargs(&mut sub_kwargs, sub_name)? {
                if !subresult.is_empty() {
                    result.push(Value::Map(subresult));
                }
            }
        }

        if result.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ValueMap::from([(name.to_string(), Value::List(result))])))
        }
    }

    /// Parse each occurrence through the child
    pub fn parse_xmlelements(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        name: Option<&str>,
    ) -> Result<Value> {
        self.parse_xmlelements_with(xmlelements, schema, name, &mut ParseState::new())
    }

    /// Parse with recursion tracking. A group re-entered before any input
    /// was consumed yields an empty result.
    pub(crate) fn parse_xmlelements_with(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        name: Option<&str>,
        state: &mut ParseState,
    ) -> Result<Value> {
        let node = self.child.node_id();
        let remaining = xmlelements.len();
        if !state.enter(node, remaining) {
            trace!(group = %self.qname, remaining, "group re-entered without progress");
            return Ok(if self.accepts_multiple() {
                Value::List(Vec::new())
            } else {
                Value::Null
            });
        }

        let result = self.parse_occurrences(xmlelements, schema, name, state);
        state.leave(node, remaining);
        result
    }

    fn parse_occurrences(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        name: Option<&str>,
        state: &mut ParseState,
    ) -> Result<Value> {
        if !self.accepts_multiple() {
            return self
                .child
                .parse_xmlelements_with(xmlelements, schema, name, state);
        }

        let mut result = Vec::new();
        for occurrence in self.occurs.iter() {
            if xmlelements.is_empty() {
                break;
            }
            let before = xmlelements.len();
            let value = self
                .child
                .parse_xmlelements_with(xmlelements, schema, name, state)?;
            let consumed = before - xmlelements.len();
            trace!(group = %self.qname, occurrence, consumed, "group occurrence");
            if consumed == 0 {
                break;
            }
            result.push(value);
        }
        Ok(Value::List(result))
    }

    /// Render through the child, once per item when repeated
    pub fn render(&self, parent: &mut Element, value: &Value) -> Result<()> {
        if !self.accepts_multiple() {
            return self.child.render(parent, value);
        }
        for (_, item) in self.occurs.iter().zip(value.occurrences()) {
            self.child.render(parent, item)?;
        }
        Ok(())
    }

    /// Child signature, bracketed when repeated. Recursive groups print
    /// `{...}` once nested too deeply.
    pub fn signature(&self, depth: usize) -> Result<String> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Ok("{...}".to_string());
        }
        let part = self.child.signature(depth + 1)?;
        if self.accepts_multiple() {
            Ok(format!("[{}]", part))
        } else {
            Ok(part)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::builtins::BuiltinType;
    use crate::xsd::elements::XsdElement;
    use crate::xsd::groups::XsdGroup;

    fn pair() -> XsdGroup {
        XsdGroup::sequence(vec![
            XsdElement::simple(QName::local("k"), BuiltinType::String).into(),
            XsdElement::simple(QName::local("v"), BuiltinType::Integer).into(),
        ])
    }

    fn input(pairs: &[(&str, &str)]) -> VecDeque<Element> {
        pairs
            .iter()
            .flat_map(|(k, v)| {
                [
                    Element::with_text(QName::local("k"), *k),
                    Element::with_text(QName::local("v"), *v),
                ]
            })
            .collect()
    }

    #[test]
    fn test_single_group_is_transparent() {
        let group = NamedGroup::new(QName::local("Pair"), pair());
        let names: Vec<&str> = group.elements().unwrap().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["k", "v"]);

        let mut xml = input(&[("a", "1")]);
        let value = group
            .parse_xmlelements(&mut xml, &Schema::new(None), None)
            .unwrap();
        assert_eq!(
            value,
            Value::map([("k", Value::from("a")), ("v", Value::from(1))])
        );
        assert_eq!(group.signature(0).unwrap(), "k: xsd:string, v: xsd:integer");
    }

    #[test]
    fn test_repeated_group_uses_single_slot() {
        let group = NamedGroup::new(QName::local("Pair"), pair()).with_occurs(Occurs::zero_or_more());
        let names: Vec<&str> = group.elements().unwrap().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["_value_1"]);
        assert_eq!(
            group.default_value().unwrap().get("_value_1"),
            Some(&Value::Null)
        );
        assert_eq!(group.signature(0).unwrap(), "[k: xsd:string, v: xsd:integer]");
    }

    #[test]
    fn test_repeated_group_parse_terminates() {
        let group = NamedGroup::new(QName::local("Pair"), pair()).with_occurs(Occurs::zero_or_more());
        let mut xml = input(&[("a", "1"), ("b", "2")]);
        xml.push_back(Element::new(QName::local("tail")));

        let value = group
            .parse_xmlelements(&mut xml, &Schema::new(None), Some("_value_1"))
            .unwrap();
        assert_eq!(value.occurrences().len(), 2);
        assert_eq!(xml.len(), 1);
    }

    #[test]
    fn test_repeated_group_kwargs_drop_empty_items() {
        let group = NamedGroup::new(QName::local("Pair"), pair()).with_occurs(Occurs::zero_or_more());
        let mut kwargs = Kwargs::from([(
            "_value_1".to_string(),
            Value::List(vec![
                Value::map([("k", Value::from("a")), ("v", Value::from(1))]),
                Value::Null,
            ]),
        )]);

        let bound = group.parse_kwargs(&mut kwargs, Some("_value_1")).unwrap().unwrap();
        assert_eq!(bound.get("_value_1").unwrap().occurrences().len(), 1);
        assert!(kwargs.is_empty());

        assert!(group.parse_kwargs(&mut kwargs, Some("_value_1")).unwrap().is_none());
    }

    #[test]
    fn test_repeated_group_render() {
        let group = NamedGroup::new(QName::local("Pair"), pair()).with_occurs(Occurs::zero_or_more());
        let value = Value::List(vec![
            Value::map([("k", Value::from("a")), ("v", Value::from(1))]),
            Value::map([("k", Value::from("b")), ("v", Value::from(2))]),
        ]);

        let mut parent = Element::new(QName::local("root"));
        group.render(&mut parent, &value).unwrap();
        let tags: Vec<&str> = parent.children().iter().map(|c| c.local_name()).collect();
        assert_eq!(tags, vec!["k", "v", "k", "v"]);
    }
}
