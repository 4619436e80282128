//! References to global schema components
//!
//! Schemas are built in two phases: every node is constructed with
//! [`ParticleRef`] placeholders for `ref="..."` uses, then [`Particle::resolve`]
//! binds each placeholder to its registry target. Targets are published
//! once, so concurrent or repeated resolution is harmless.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::elements::XsdElement;
use super::groups::XsdGroup;
use super::named_groups::NamedGroup;
use super::particles::{Occurs, Particle};
use super::schemas::Registry;

/// Kind of global component a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Global element declaration (`<xs:element ref="..."/>`)
    Element,
    /// Named model group definition (`<xs:group ref="..."/>`)
    Group,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RefKind {
    /// Name of the component kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Group => "group",
        }
    }
}

/// Lazy reference to a global component
#[derive(Debug, Clone)]
pub struct ParticleRef {
    /// Kind of referenced component
    pub kind: RefKind,
    /// Qualified name of the referenced component
    pub qname: QName,
    /// Occurrence bounds of this use, overriding the target's
    pub occurs: Option<Occurs>,
    target: OnceCell<Particle>,
}

impl ParticleRef {
    /// Create an unresolved reference
    pub fn new(kind: RefKind, qname: QName) -> Self {
        Self {
            kind,
            qname,
            occurs: None,
            target: OnceCell::new(),
        }
    }

    /// Reference to a global element
    pub fn element(qname: QName) -> Self {
        Self::new(RefKind::Element, qname)
    }

    /// Reference to a named group
    pub fn group(qname: QName) -> Self {
        Self::new(RefKind::Group, qname)
    }

    /// Set use-site occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = Some(occurs);
        self
    }

    /// Check if the reference has been resolved
    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// Resolved target, or `UnresolvedReference`
    pub fn target(&self) -> Result<&Particle> {
        self.target.get().ok_or_else(|| self.unresolved())
    }

    /// Bind the reference to its registry target.
    ///
    /// Lookups are pure, so when two callers race the value published
    /// first is identical to the one discarded.
    pub fn resolve(&self, registry: &dyn Registry) -> Result<&Particle> {
        self.target.get_or_try_init(|| {
            let target = registry
                .lookup(self.kind, &self.qname)
                .ok_or_else(|| self.unresolved())?;
            debug!(kind = %self.kind, name = %self.qname, "resolved reference");
            Ok(match self.occurs {
                Some(occurs) => with_use_occurs(target, occurs),
                None => target,
            })
        })
    }

    fn unresolved(&self) -> Error {
        Error::UnresolvedReference {
            kind: self.kind.as_str(),
            name: self.qname.to_string(),
        }
    }
}

/// Copy of a global component carrying the bounds of one use.
///
/// Children stay shared with the global definition.
fn with_use_occurs(target: Particle, occurs: Occurs) -> Particle {
    match target {
        Particle::Element(e) => XsdElement {
            occurs,
            ..(*e).clone()
        }
        .into(),
        Particle::Any(a) => (*a).clone().with_occurs(occurs).into(),
        Particle::Model(g) => {
            let mut group = XsdGroup::new(g.model).with_occurs(occurs);
            group.particles = g.particles.clone();
            group.into()
        }
        Particle::Group(g) => NamedGroup::new(g.qname.clone(), g.child.clone())
            .with_occurs(occurs)
            .into(),
        Particle::Ref(r) => Particle::Ref(r),
    }
}

/// Nodes already visited during one resolution pass.
///
/// Keyed by node identity so self-referential graphs terminate.
#[derive(Debug, Default)]
pub struct ResolveState {
    visited: HashSet<usize>,
}

impl ResolveState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node as visited; false if it already was
    pub fn enter(&mut self, particle: &Particle) -> bool {
        self.visited.insert(particle.node_id())
    }

    /// Number of distinct nodes visited
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Check if nothing has been visited
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
