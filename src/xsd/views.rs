//! Externally visible (name, member) views of a compositor.
//!
//! The nested view names each direct child; single-occurrence
//! sequence/all/group children get no name so their members flatten into
//! the parent. The flattened view recursively inlines those unnamed
//! children. Both are computed once, after reference resolution.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;

use super::groups::ModelType;
use super::particles::Particle;

/// One entry of a nested view
pub type NestedEntry = (Option<String>, Particle);

/// One entry of a flattened view
pub type FlatEntry = (String, Particle);

/// Generator for synthetic slot names (`_value_1`, `_value_2`, ...).
///
/// Scoped to a single view computation.
#[derive(Debug, Default)]
pub struct UniqueNameGenerator {
    counter: usize,
}

impl UniqueNameGenerator {
    /// Create a generator starting at `_value_1`
    pub fn new() -> Self {
        Self::default()
    }

    /// Next synthetic name
    pub fn get_name(&mut self) -> String {
        self.counter += 1;
        format!("_value_{}", self.counter)
    }
}

/// Memoized views of one compositor node.
///
/// Synthetic names are numbered per compositor, so an inlined child may
/// contribute a `_value_N` its parent already uses. Such duplicates share
/// one slot in default values and bound records.
#[derive(Debug, Clone)]
pub struct NameViews {
    /// One entry per direct child
    pub nested: Vec<NestedEntry>,
    /// Nested view with unnamed entries recursively inlined
    pub flattened: Vec<FlatEntry>,
}

impl NameViews {
    /// Compute both views for the given direct children
    pub fn build(children: &[Particle]) -> Result<Self> {
        let nested = nested_view(children)?;
        let flattened = flatten(&nested)?;
        Ok(Self { nested, flattened })
    }
}

/// Name each direct child. References are replaced by their targets.
pub fn nested_view(children: &[Particle]) -> Result<Vec<NestedEntry>> {
    let mut generator = UniqueNameGenerator::new();
    let mut result = Vec::with_capacity(children.len());

    for child in children {
        let child = child.resolved()?;
        let name = match child {
            Particle::Model(group) if group.model == ModelType::Choice => {
                Some(generator.get_name())
            }
            Particle::Model(_) | Particle::Group(_) => {
                if child.accepts_multiple() {
                    Some(generator.get_name())
                } else {
                    None
                }
            }
            Particle::Any(_) => Some(generator.get_name()),
            Particle::Element(element) => Some(element.name().to_string()),
            Particle::Ref(_) => unreachable!("resolved() never returns a reference"),
        };
        result.push((name, child.clone()));
    }

    Ok(result)
}

/// Inline unnamed entries using each child's own flattened view
pub fn flatten(nested: &[NestedEntry]) -> Result<Vec<FlatEntry>> {
    let mut result = Vec::new();
    for (name, child) in nested {
        match name {
            Some(name) => result.push((name.clone(), child.clone())),
            None => result.extend(child.elements()?.iter().cloned()),
        }
    }

    let mut seen = HashSet::new();
    for (name, _) in &result {
        if !seen.insert(name.as_str()) {
            debug!(name = %name, "duplicate name in flattened view");
        }
    }
    Ok(result)
}
