//! XSD Model Group compositors
//!
//! This module implements model groups for XSD content models:
//! - xs:sequence - ordered content
//! - xs:choice - alternative content (see `choice.rs`)
//! - xs:all - unordered content
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Model_Groups

use std::collections::VecDeque;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use tracing::trace;

use crate::documents::Element;
use crate::error::Result;
use crate::namespaces::QName;
use crate::values::{Kwargs, Value, ValueMap};

use super::particles::{
    default_values, into_item_kwargs, slot_default, Occurs, ParseState, Particle,
};
use super::views::{FlatEntry, NameViews, NestedEntry};

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" | "{http://www.w3.org/2001/XMLSchema}sequence" => Some(Self::Sequence),
            "choice" | "{http://www.w3.org/2001/XMLSchema}choice" => Some(Self::Choice),
            "all" | "{http://www.w3.org/2001/XMLSchema}all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// XSD Model Group (sequence, choice, all)
#[derive(Debug, Clone)]
pub struct XsdGroup {
    /// Model type (sequence, choice, all)
    pub model: ModelType,
    /// Particles in this group, in declaration order
    pub particles: Vec<Particle>,
    /// Occurrence constraints
    pub occurs: Occurs,
    views: OnceCell<NameViews>,
}

impl XsdGroup {
    /// Create a new model group
    pub fn new(model: ModelType) -> Self {
        Self {
            model,
            particles: Vec::new(),
            occurs: Occurs::once(),
            views: OnceCell::new(),
        }
    }

    /// Create an xs:sequence with the given particles
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::new(ModelType::Sequence).with_particles(particles)
    }

    /// Create an xs:choice with the given particles
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::new(ModelType::Choice).with_particles(particles)
    }

    /// Create an xs:all with the given particles
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::new(ModelType::All).with_particles(particles)
    }

    /// Set the occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    fn with_particles(mut self, particles: Vec<Particle>) -> Self {
        self.particles = particles;
        self
    }

    /// Add a particle to the group
    pub fn add_particle(&mut self, particle: impl Into<Particle>) {
        self.particles.push(particle.into());
    }

    /// Check if group is empty
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Get number of particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the group may be absent. A choice is always optional.
    pub fn is_optional(&self) -> bool {
        self.model == ModelType::Choice || self.occurs.is_emptiable()
    }

    /// Whether more than one occurrence is allowed
    pub fn accepts_multiple(&self) -> bool {
        self.occurs.is_multiple()
    }

    fn views(&self) -> Result<&NameViews> {
        self.views.get_or_try_init(|| NameViews::build(&self.particles))
    }

    /// One (name, child) entry per direct child
    pub fn nested_elements(&self) -> Result<&[NestedEntry]> {
        Ok(&self.views()?.nested)
    }

    /// Fully flattened (name, child) entries
    pub fn elements(&self) -> Result<&[FlatEntry]> {
        Ok(&self.views()?.flattened)
    }

    /// Default value over the flattened view; empty for a choice
    pub fn default_value(&self) -> Result<ValueMap> {
        match self.model {
            ModelType::Choice => Ok(ValueMap::new()),
            _ => Ok(default_values(self.elements()?)),
        }
    }

    /// Bind keyword arguments.
    ///
    /// With `name` present in `kwargs` the value there holds this group's
    /// items (wrapped mode); otherwise members are taken straight from
    /// `kwargs` (unwrapped mode).
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs, name: Option<&str>) -> Result<Option<ValueMap>> {
        if self.model == ModelType::Choice {
            return self.parse_choice_kwargs(kwargs, name);
        }

        match name {
            Some(name) if kwargs.contains_key(name) => {
                let supplied = kwargs.shift_remove(name).unwrap_or_default();
                let mut items = into_item_kwargs(supplied)?;

                let mut results = Vec::new();
                for (_, item) in self.occurs.iter().zip(items.iter_mut()) {
                    let mut subresult = ValueMap::new();
                    for (item_name, element) in self.elements()? {
                        if let Some(value) = element.parse_kwargs(item, Some(item_name))? {
                            subresult.extend(value);
                        }
                    }
                    results.push(Value::Map(subresult));
                }

                // Keep whatever the members did not consume
                if items.iter().any(|item| !item.is_empty()) {
                    let leftover: Vec<Value> = items.into_iter().map(Value::Map).collect();
                    kwargs.insert(name.to_string(), Value::List(leftover));
                }

                if self.accepts_multiple() {
                    Ok(Some(ValueMap::from([(
                        name.to_string(),
                        Value::List(results),
                    )])))
                } else {
                    Ok(results.into_iter().next().and_then(|value| match value {
                        Value::Map(map) => Some(map),
                        _ => None,
                    }))
                }
            }
            _ => {
                let mut result = ValueMap::new();
                for (elm_name, element) in self.elements()? {
                    if let Some(value) = element.parse_kwargs(kwargs, Some(elm_name))? {
                        result.extend(value);
                    }
                }

                match name {
                    Some(name) => {
                        let value = if result.is_empty() && self.accepts_multiple() {
                            Value::List(Vec::new())
                        } else {
                            Value::Map(result)
                        };
                        Ok(Some(ValueMap::from([(name.to_string(), value)])))
                    }
                    None => Ok(Some(result)),
                }
            }
        }
    }

    /// Parse leading elements, consuming what matched
    pub fn parse_xmlelements(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &super::schemas::Schema,
    ) -> Result<Value> {
        self.parse_xmlelements_with(xmlelements, schema, &mut ParseState::new())
    }

    pub(crate) fn parse_xmlelements_with(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &super::schemas::Schema,
        state: &mut ParseState,
    ) -> Result<Value> {
        match self.model {
            ModelType::Sequence => self.parse_sequence(xmlelements, schema, state),
            ModelType::Choice => self.parse_choice(xmlelements, schema, state),
            ModelType::All => self.parse_all(xmlelements, schema, state),
        }
    }

    fn parse_sequence(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &super::schemas::Schema,
        state: &mut ParseState,
    ) -> Result<Value> {
        let elements = self.elements()?;
        let mut result = Vec::new();

        for occurrence in self.occurs.iter() {
            if xmlelements.is_empty() {
                break;
            }
            let before = xmlelements.len();

            let mut item = ValueMap::new();
            for (elm_name, element) in elements {
                if xmlelements.is_empty() {
                    item.insert(elm_name.clone(), slot_default(element));
                    continue;
                }
                let value =
                    element.parse_xmlelements_with(xmlelements, schema, Some(elm_name), state)?;
                item.insert(elm_name.clone(), value);
            }

            let consumed = before - xmlelements.len();
            trace!(occurrence, consumed, "sequence occurrence");
            if consumed == 0 && self.accepts_multiple() {
                break;
            }
            result.push(Value::Map(item));
        }

        if self.accepts_multiple() {
            Ok(Value::List(result))
        } else {
            Ok(result.into_iter().next().unwrap_or(Value::Null))
        }
    }

    fn parse_all(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &super::schemas::Schema,
        state: &mut ParseState,
    ) -> Result<Value> {
        let elements = self.elements()?;
        let member_tags: Vec<&QName> = elements
            .iter()
            .filter_map(|(_, element)| match element {
                Particle::Element(decl) => Some(&decl.qname),
                _ => None,
            })
            .collect();

        let mut buckets: IndexMap<QName, VecDeque<Element>> = IndexMap::new();
        let mut unmatched = VecDeque::new();
        for node in xmlelements.drain(..) {
            if member_tags.contains(&&node.qname) {
                buckets.entry(node.qname.clone()).or_default().push_back(node);
            } else {
                unmatched.push_back(node);
            }
        }

        let mut result = ValueMap::new();
        for (name, element) in elements {
            let bucket = match element {
                Particle::Element(decl) => buckets.get_mut(&decl.qname),
                _ => None,
            };
            let value = match bucket {
                Some(bucket) if !bucket.is_empty() => {
                    element.parse_xmlelements_with(bucket, schema, Some(name), state)?
                }
                _ => slot_default(element),
            };
            result.insert(name.clone(), value);
        }

        // Elements a member could not take stay behind, as do unknown tags
        unmatched.extend(buckets.into_values().flatten());
        *xmlelements = unmatched;

        Ok(Value::Map(result))
    }

    /// Render a value: one pass over the nested view per occurrence
    pub fn render(&self, parent: &mut Element, value: &Value) -> Result<()> {
        if self.model == ModelType::Choice {
            return self.render_choice(parent, value);
        }

        let null = Value::Null;
        for (_, item) in self.occurs.iter().zip(value.occurrences()) {
            for (name, element) in self.nested_elements()? {
                let element_value = match name {
                    Some(name) => item.get(name).unwrap_or(&null),
                    None => item,
                };

                if !element_value.is_null() || !element.is_optional() {
                    element.render(parent, element_value)?;
                }
            }
        }
        Ok(())
    }

    /// Grammar signature, e.g. `a: xsd:string, b: xsd:int[]`
    pub fn signature(&self, depth: usize) -> Result<String> {
        if self.model == ModelType::Choice {
            return self.choice_signature(depth);
        }

        let depth = depth + 1;
        let mut parts = Vec::new();
        for (name, element) in self.nested_elements()? {
            match name {
                Some(name) => parts.push(format!("{}: {}", name, element.signature(depth)?)),
                None => parts.push(element.signature(depth)?),
            }
        }
        let part = parts.join(", ");

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
    use crate::xsd::schemas::Schema;

    fn leaf(name: &str, occurs: Occurs) -> Particle {
        XsdElement::simple(QName::local(name), BuiltinType::String)
            .with_occurs(occurs)
            .into()
    }

    fn node(name: &str, text: &str) -> Element {
        Element::with_text(QName::local(name), text)
    }

    fn input(nodes: &[(&str, &str)]) -> VecDeque<Element> {
        nodes.iter().map(|(n, t)| node(n, t)).collect()
    }

    #[test]
    fn test_model_type_from_tag() {
        assert_eq!(ModelType::from_tag("sequence"), Some(ModelType::Sequence));
        assert_eq!(ModelType::from_tag("choice"), Some(ModelType::Choice));
        assert_eq!(ModelType::from_tag("all"), Some(ModelType::All));
        assert_eq!(ModelType::from_tag("invalid"), None);
    }

    #[test]
    fn test_group_creation() {
        let mut group = XsdGroup::new(ModelType::Sequence);
        assert!(group.is_empty());
        assert_eq!(group.occurs, Occurs::once());

        group.add_particle(XsdElement::simple(QName::local("a"), BuiltinType::String));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_sequence_default_and_accept() {
        let group = XsdGroup::sequence(vec![
            leaf("a", Occurs::once()),
            leaf("b", Occurs::optional()),
            leaf("c", Occurs::zero_or_more()),
        ]);

        let default = group.default_value().unwrap();
        assert_eq!(default.get("a"), Some(&Value::Null));
        assert_eq!(default.get("b"), Some(&Value::Null));
        assert_eq!(default.get("c"), Some(&Value::List(Vec::new())));

        let particle: Particle = group.into();
        assert!(particle.accept(&Value::map([("a", Value::from(1))])).unwrap());
        assert!(!particle.accept(&Value::map([("b", Value::from(1))])).unwrap());
        assert!(!particle.accept(&Value::from("a")).unwrap());
    }

    #[test]
    fn test_sequence_parse_in_order() {
        let schema = Schema::new(None);
        let group = XsdGroup::sequence(vec![
            leaf("a", Occurs::once()),
            leaf("b", Occurs::optional()),
            leaf("c", Occurs::once()),
        ]);

        let mut xml = input(&[("a", "1"), ("c", "3"), ("z", "9")]);
        let value = group.parse_xmlelements(&mut xml, &schema).unwrap();
        assert_eq!(
            value,
            Value::map([
                ("a", Value::from("1")),
                ("b", Value::Null),
                ("c", Value::from("3")),
            ])
        );
        assert_eq!(xml.len(), 1);
        assert_eq!(xml[0].local_name(), "z");
    }

    #[test]
    fn test_sequence_stops_when_input_runs_out() {
        let schema = Schema::new(None);
        let group = XsdGroup::sequence(vec![
            leaf("a", Occurs::once()),
            leaf("b", Occurs::once()),
        ]);

        let mut xml = input(&[("a", "1")]);
        let value = group.parse_xmlelements(&mut xml, &schema).unwrap();
        assert_eq!(value.get("a"), Some(&Value::from("1")));
        assert_eq!(value.get("b"), Some(&Value::Null));
        assert!(xml.is_empty());

        let mut empty = VecDeque::new();
        assert_eq!(
            group.parse_xmlelements(&mut empty, &schema).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_bounded_sequence_repetition() {
        let schema = Schema::new(None);
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once())])
            .with_occurs(Occurs::new(0, Some(2)));

        let mut xml = input(&[("a", "1"), ("a", "2"), ("a", "3")]);
        let value = group.parse_xmlelements(&mut xml, &schema).unwrap();
        assert_eq!(value.occurrences().len(), 2);
        assert_eq!(xml.len(), 1);
    }

    #[test]
    fn test_all_ignores_unknown_tags() {
        let schema = Schema::new(None);
        let group = XsdGroup::all(vec![leaf("a", Occurs::once()), leaf("b", Occurs::optional())]);

        let mut xml = input(&[("x", "?"), ("a", "1")]);
        let value = group.parse_xmlelements(&mut xml, &schema).unwrap();
        assert_eq!(
            value,
            Value::map([("a", Value::from("1")), ("b", Value::Null)])
        );
        assert_eq!(xml.len(), 1);
        assert_eq!(xml[0].local_name(), "x");
    }

    #[test]
    fn test_parse_kwargs_unwrapped() {
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once()), leaf("b", Occurs::optional())]);
        let mut kwargs = Kwargs::from([
            ("a".to_string(), Value::from("1")),
            ("other".to_string(), Value::from("x")),
        ]);

        let bound = group.parse_kwargs(&mut kwargs, None).unwrap().unwrap();
        assert_eq!(bound.get("a"), Some(&Value::from("1")));
        assert!(!bound.contains_key("b"));
        assert_eq!(kwargs.len(), 1);
        assert!(kwargs.contains_key("other"));
    }

    #[test]
    fn test_parse_kwargs_wrapped_multiple() {
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once()), leaf("b", Occurs::once())])
            .with_occurs(Occurs::zero_or_more());
        let mut kwargs = Kwargs::from([(
            "_value_1".to_string(),
            Value::List(vec![
                Value::map([("a", Value::from("1")), ("b", Value::from("2"))]),
                Value::map([("a", Value::from("3")), ("b", Value::from("4"))]),
            ]),
        )]);

        let bound = group
            .parse_kwargs(&mut kwargs, Some("_value_1"))
            .unwrap()
            .unwrap();
        let items = bound.get("_value_1").unwrap().occurrences();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("b"), Some(&Value::from("4")));
        assert!(kwargs.is_empty());
    }

    #[test]
    fn test_parse_kwargs_wrapped_keeps_leftovers() {
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once())])
            .with_occurs(Occurs::zero_or_more());
        let mut kwargs = Kwargs::from([(
            "_value_1".to_string(),
            Value::map([("a", Value::from("1")), ("zz", Value::from("2"))]),
        )]);

        group.parse_kwargs(&mut kwargs, Some("_value_1")).unwrap();
        let leftover = kwargs.get("_value_1").unwrap().occurrences();
        assert_eq!(leftover[0].get("zz"), Some(&Value::from("2")));
    }

    #[test]
    fn test_render_sequence() {
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once()), leaf("b", Occurs::optional())]);
        let mut parent = Element::new(QName::local("root"));
        group
            .render(&mut parent, &Value::map([("a", Value::from("1"))]))
            .unwrap();

        assert_eq!(parent.children().len(), 1);
        assert_eq!(parent.children()[0].text(), Some("1"));
    }

    #[test]
    fn test_render_missing_required_propagates() {
        let group = XsdGroup::sequence(vec![leaf("a", Occurs::once())]);
        let mut parent = Element::new(QName::local("root"));
        assert!(group.render(&mut parent, &Value::Map(ValueMap::new())).is_err());
    }

    #[test]
    fn test_sequence_signature() {
        let group = XsdGroup::sequence(vec![
            leaf("a", Occurs::once()),
            leaf("b", Occurs::zero_or_more()),
        ]);
        assert_eq!(group.signature(0).unwrap(), "a: xsd:string, b: xsd:string[]");

        let repeated = group.clone().with_occurs(Occurs::one_or_more());
        assert_eq!(
            repeated.signature(0).unwrap(),
            "[a: xsd:string, b: xsd:string[]]"
        );
    }
}
