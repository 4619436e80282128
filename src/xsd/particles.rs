//! XSD Particle Schema Components
//!
//! This module implements the occurrence model shared by every compositor
//! node and the [`Particle`] enum that dispatches the four compositor
//! operations (bind from args/kwargs, parse, render) plus signatures over
//! elements, wildcards, model groups, named groups and references.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#p

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::values::{Kwargs, Value, ValueAccess, ValueMap};

use super::elements::XsdElement;
use super::groups::{ModelType, XsdGroup};
use super::named_groups::NamedGroup;
use super::refs::{ParticleRef, ResolveState};
use super::schemas::{Registry, Schema};
use super::wildcards::XsdAnyElement;

/// Depth past which anonymous content and group signatures print `{...}`
pub(crate) const MAX_SIGNATURE_DEPTH: usize = 4;

/// Groups being parsed over one input list.
///
/// Entries are keyed by group node and remaining input length. Input only
/// shrinks, so re-entering a group at the same length means nothing was
/// consumed since the outer entry.
#[derive(Debug, Default)]
pub struct ParseState {
    active: HashSet<(usize, usize)>,
}

impl ParseState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a group as entered; false when it is already active at this
    /// position
    pub(crate) fn enter(&mut self, node: usize, remaining: usize) -> bool {
        self.active.insert((node, remaining))
    }

    /// Mark a group as left
    pub(crate) fn leave(&mut self, node: usize, remaining: usize) {
        self.active.remove(&(node, remaining));
    }
}

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max_occurs means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is unbounded
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    /// Check if particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        match self.max {
            Some(max) => max > 1,
            None => true,
        }
    }

    /// Iterate occurrence indices up to maxOccurs
    pub fn iter(&self) -> OccursIter {
        max_occurs_iter(self.max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Lazy sequence of occurrence indices.
///
/// Finite when bounded. When unbounded it never ends by itself: the
/// consuming loop decides when to stop.
#[derive(Debug, Clone)]
pub struct OccursIter {
    next: u32,
    max: Option<u32>,
}

impl Iterator for OccursIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if let Some(max) = self.max {
            if self.next >= max {
                return None;
            }
        }
        let index = self.next;
        self.next = self.next.saturating_add(1);
        Some(index)
    }
}

/// Occurrence index iterator for a maxOccurs value
pub fn max_occurs_iter(max_occurs: Option<u32>) -> OccursIter {
    OccursIter {
        next: 0,
        max: max_occurs,
    }
}

/// A node of the content model
#[derive(Debug, Clone)]
pub enum Particle {
    /// Element declaration (leaf)
    Element(Arc<XsdElement>),
    /// Wildcard (xs:any, leaf)
    Any(Arc<XsdAnyElement>),
    /// Model group (xs:sequence, xs:choice, xs:all)
    Model(Arc<XsdGroup>),
    /// Named group wrapper (xs:group)
    Group(Arc<NamedGroup>),
    /// Unresolved reference into the schema registry
    Ref(Arc<ParticleRef>),
}

impl From<XsdElement> for Particle {
    fn from(element: XsdElement) -> Self {
        Particle::Element(Arc::new(element))
    }
}

impl From<XsdAnyElement> for Particle {
    fn from(any: XsdAnyElement) -> Self {
        Particle::Any(Arc::new(any))
    }
}

impl From<XsdGroup> for Particle {
    fn from(group: XsdGroup) -> Self {
        Particle::Model(Arc::new(group))
    }
}

impl From<NamedGroup> for Particle {
    fn from(group: NamedGroup) -> Self {
        Particle::Group(Arc::new(group))
    }
}

impl From<ParticleRef> for Particle {
    fn from(reference: ParticleRef) -> Self {
        Particle::Ref(Arc::new(reference))
    }
}

impl Particle {
    /// Follow references to the resolved target
    pub fn resolved(&self) -> Result<&Particle> {
        match self {
            Particle::Ref(reference) => reference.target()?.resolved(),
            other => Ok(other),
        }
    }

    /// Identity of the shared node, used to memoize traversal
    pub(crate) fn node_id(&self) -> usize {
        match self {
            Particle::Element(e) => Arc::as_ptr(e) as *const () as usize,
            Particle::Any(a) => Arc::as_ptr(a) as *const () as usize,
            Particle::Model(g) => Arc::as_ptr(g) as *const () as usize,
            Particle::Group(g) => Arc::as_ptr(g) as *const () as usize,
            Particle::Ref(r) => Arc::as_ptr(r) as *const () as usize,
        }
    }

    /// Occurrence bounds; an unresolved reference reports its use-site bounds
    pub fn occurs(&self) -> Occurs {
        match self {
            Particle::Element(e) => e.occurs,
            Particle::Any(a) => a.occurs,
            Particle::Model(g) => g.occurs,
            Particle::Group(g) => g.occurs,
            Particle::Ref(r) => match r.target() {
                Ok(target) => target.occurs(),
                Err(_) => r.occurs.unwrap_or_default(),
            },
        }
    }

    /// Whether more than one occurrence is allowed
    pub fn accepts_multiple(&self) -> bool {
        self.occurs().is_multiple()
    }

    /// Whether the particle may be absent. Choices always are.
    pub fn is_optional(&self) -> bool {
        match self {
            Particle::Model(g) => g.is_optional(),
            Particle::Ref(r) => r.target().map(|t| t.is_optional()).unwrap_or(false),
            other => other.occurs().is_emptiable(),
        }
    }

    /// Whether this is a compositor (model group or named group)
    pub fn is_container(&self) -> bool {
        matches!(
            self.resolved(),
            Ok(Particle::Model(_)) | Ok(Particle::Group(_))
        )
    }

    /// Model type, for model groups
    pub fn model(&self) -> Option<ModelType> {
        match self.resolved() {
            Ok(Particle::Model(g)) => Some(g.model),
            _ => None,
        }
    }

    /// Declared local name of a leaf element
    pub fn name(&self) -> Option<&str> {
        match self.resolved() {
            Ok(Particle::Element(e)) => Some(e.name()),
            _ => None,
        }
    }

    /// Flattened (name, particle) view of a compositor
    pub fn elements(&self) -> Result<&[(String, Particle)]> {
        match self.resolved()? {
            Particle::Model(g) => g.elements(),
            Particle::Group(g) => g.elements(),
            other => Err(Error::Type(format!(
                "{} has no compositor members",
                other.describe()
            ))),
        }
    }

    /// Resolve references below this node against a registry
    pub fn resolve(&self, registry: &dyn Registry) -> Result<()> {
        self.resolve_with(registry, &mut ResolveState::new())
    }

    pub(crate) fn resolve_with(
        &self,
        registry: &dyn Registry,
        state: &mut ResolveState,
    ) -> Result<()> {
        if !state.enter(self) {
            return Ok(());
        }
        match self {
            Particle::Element(e) => e.resolve_with(registry, state),
            Particle::Any(_) => Ok(()),
            Particle::Model(g) => g
                .particles
                .iter()
                .try_for_each(|p| p.resolve_with(registry, state)),
            Particle::Group(g) => g.child.resolve_with(registry, state),
            Particle::Ref(r) => r.resolve(registry)?.resolve_with(registry, state),
        }
    }

    /// Check whether a mapping-like value matches this particle's shape
    pub fn accept(&self, value: &Value) -> Result<bool> {
        match self.resolved()? {
            Particle::Element(_) => Ok(!value.is_null()),
            Particle::Any(a) => Ok(a.accept(value)),
            container => match value.access() {
                Some(access) => accept_values(container.elements()?, access),
                None => Ok(false),
            },
        }
    }

    /// Default value mapping over the flattened view
    pub fn default_value(&self) -> Result<ValueMap> {
        match self.resolved()? {
            Particle::Model(g) => g.default_value(),
            Particle::Group(g) => g.default_value(),
            other => Err(Error::Type(format!(
                "{} has no default value mapping",
                other.describe()
            ))),
        }
    }

    /// Bind positional arguments onto the flattened view
    pub fn parse_args(&self, args: &[Value]) -> Result<(ValueMap, Vec<Value>)> {
        match self.resolved()? {
            Particle::Group(g) => g.child.parse_args(args),
            container => parse_args(container.elements()?, args),
        }
    }

    /// Bind keyword arguments, consuming what was used from `kwargs`
    pub fn parse_kwargs(&self, kwargs: &mut Kwargs, name: Option<&str>) -> Result<Option<ValueMap>> {
        match self.resolved()? {
            Particle::Element(e) => Ok(e.parse_kwargs(kwargs, name)),
            Particle::Any(a) => Ok(a.parse_kwargs(kwargs, name)),
            Particle::Model(g) => g.parse_kwargs(kwargs, name),
            Particle::Group(g) => g.parse_kwargs(kwargs, name),
            Particle::Ref(_) => unreachable!("resolved() never returns a reference"),
        }
    }

    /// Parse leading elements of `xmlelements`, consuming what matched
    pub fn parse_xmlelements(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        name: Option<&str>,
    ) -> Result<Value> {
        self.parse_xmlelements_with(xmlelements, schema, name, &mut ParseState::new())
    }

    pub(crate) fn parse_xmlelements_with(
        &self,
        xmlelements: &mut VecDeque<Element>,
        schema: &Schema,
        name: Option<&str>,
        state: &mut ParseState,
    ) -> Result<Value> {
        match self.resolved()? {
            Particle::Element(e) => e.parse_xmlelements(xmlelements, schema),
            Particle::Any(a) => a.parse_xmlelements(xmlelements, schema),
            Particle::Model(g) => g.parse_xmlelements_with(xmlelements, schema, state),
            Particle::Group(g) => g.parse_xmlelements_with(xmlelements, schema, name, state),
            Particle::Ref(_) => unreachable!("resolved() never returns a reference"),
        }
    }

    /// Render a value into children of `parent`
    pub fn render(&self, parent: &mut Element, value: &Value) -> Result<()> {
        match self.resolved()? {
            Particle::Element(e) => e.render(parent, value),
            Particle::Any(a) => a.render(parent, value),
            Particle::Model(g) => g.render(parent, value),
            Particle::Group(g) => g.render(parent, value),
            Particle::Ref(_) => unreachable!("resolved() never returns a reference"),
        }
    }

    /// Human-readable grammar signature
    pub fn signature(&self, depth: usize) -> Result<String> {
        match self.resolved()? {
            Particle::Element(e) => e.signature(depth),
            Particle::Any(a) => Ok(a.signature()),
            Particle::Model(g) => g.signature(depth),
            Particle::Group(g) => g.signature(depth),
            Particle::Ref(_) => unreachable!("resolved() never returns a reference"),
        }
    }

    fn describe(&self) -> String {
        match self {
            Particle::Element(e) => format!("element '{}'", e.qname),
            Particle::Any(_) => "wildcard".to_string(),
            Particle::Model(g) => g.model.to_string(),
            Particle::Group(g) => format!("group '{}'", g.qname),
            Particle::Ref(r) => format!("reference '{}'", r.qname),
        }
    }
}

/// Empty placeholder for a slot: a list when repeatable, else null
pub(crate) fn slot_default(particle: &Particle) -> Value {
    if particle.accepts_multiple() {
        Value::List(Vec::new())
    } else {
        Value::Null
    }
}

pub(crate) fn default_values(elements: &[(String, Particle)]) -> ValueMap {
    elements
        .iter()
        .map(|(name, element)| (name.clone(), slot_default(element)))
        .collect()
}

pub(crate) fn accept_values(
    elements: &[(String, Particle)],
    values: &dyn ValueAccess,
) -> Result<bool> {
    let mut required = Vec::new();
    let mut known = Vec::new();
    for (name, element) in elements {
        if !element.is_optional() {
            required.push(name.as_str());
        }
        known.push(name.as_str());
    }

    let keys: Vec<&str> = values
        .keys()
        .into_iter()
        .filter(|key| *key != crate::values::XSD_ELM_KEY)
        .collect();

    Ok(keys.iter().all(|key| known.contains(key))
        && required.iter().all(|name| keys.contains(name)))
}

pub(crate) fn parse_args(
    elements: &[(String, Particle)],
    args: &[Value],
) -> Result<(ValueMap, Vec<Value>)> {
    let mut remaining: VecDeque<Value> = args.iter().cloned().collect();
    let mut result = ValueMap::new();

    for (name, _) in elements {
        let Some(arg) = remaining.pop_front() else {
            break;
        };
        result.insert(name.clone(), arg);
    }

    Ok((result, remaining.into()))
}

/// Coerce a bound slot value into per-occurrence keyword mappings
pub(crate) fn into_item_kwargs(value: Value) -> Result<Vec<Kwargs>> {
    value
        .into_occurrences()
        .into_iter()
        .map(|item| match item {
            Value::Null => Ok(Kwargs::new()),
            other => other.access().map(|a| a.as_mapping()).ok_or_else(|| {
                Error::Type(format!("expected a mapping of keyword arguments, got {}", other))
            }),
        })
        .collect()
}
