//! XSD content model components
//!
//! This module contains the compositor tree (sequence, choice, all and
//! named groups), its leaf particles, and the schema registry that
//! references resolve against.

// Occurrence model and dispatch
pub mod particles;
pub mod refs;
pub mod views;

// Compositors
mod choice;
pub mod groups;
pub mod named_groups;

// Leaves and types
pub mod builtins;
pub mod complex_types;
pub mod elements;
pub mod wildcards;

// Registry
pub mod schemas;

// Re-exports
pub use builtins::{BuiltinType, XSD_NAMESPACE};
pub use complex_types::ComplexType;
pub use elements::{ElementType, XsdElement};
pub use groups::{ModelType, XsdGroup};
pub use named_groups::NamedGroup;
pub use particles::{max_occurs_iter, Occurs, OccursIter, Particle};
pub use refs::{ParticleRef, RefKind, ResolveState};
pub use schemas::{Registry, Schema};
pub use views::{NameViews, UniqueNameGenerator};
pub use wildcards::{NamespaceConstraint, ProcessContents, XsdAnyElement};
