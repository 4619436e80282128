//! Error types for xmlschema-bind
//!
//! This module defines all error types used throughout the library.
//! Lenient parsing means malformed or missing optional input is never an
//! error; only the conditions below are.

use std::fmt;
use thiserror::Error;

/// Result type alias using xmlschema-bind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlschema-bind operations
#[derive(Error, Debug)]
pub enum Error {
    /// A reference could not be resolved against the schema registry
    #[error("unresolved {kind} reference: {name}")]
    UnresolvedReference {
        /// Kind of component referenced ("element" or "group")
        kind: &'static str,
        /// Qualified name of the referenced component
        name: String,
    },

    /// Keyword binding for a choice found no member accepting the value
    #[error("no matching choice: {0}")]
    NoMatchingChoice(#[from] ChoiceError),

    /// Value of the wrong shape for the component
    #[error("type error: {0}")]
    Type(String),

    /// Value error (invalid or missing value for a leaf)
    #[error("value error: {0}")]
    Value(String),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic raised when no member of an xsd:choice accepts a bound value
#[derive(Debug, Clone)]
pub struct ChoiceError {
    /// Slot name the choice was bound under (e.g. `_value_1`)
    pub name: Option<String>,
    /// Printed signature of the choice
    pub signature: String,
    /// Offending value, rendered for display
    pub instance: Option<String>,
}

impl ChoiceError {
    /// Create a new choice error
    pub fn new(name: Option<&str>, signature: impl Into<String>) -> Self {
        Self {
            name: name.map(String::from),
            signature: signature.into(),
            instance: None,
        }
    }

    /// Set the offending value
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl fmt::Display for ChoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(
                f,
                "no complete xsd:sequence found for the xsd:choice '{}'",
                name
            )?,
            None => write!(f, "no complete xsd:sequence found for the xsd:choice")?,
        }

        write!(f, "\n\nSignature: {}", self.signature)?;

        if let Some(ref instance) = self.instance {
            write!(f, "\n\nInstance:\n{}", instance)?;
        }

        Ok(())
    }
}

impl std::error::Error for ChoiceError {}
