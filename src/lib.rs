//! # xmlschema-bind
//!
//! Content-model compositors for schema-driven XML data binding.
//!
//! The crate interprets XSD grouping constructs (sequence, choice, all,
//! named groups, element and wildcard leaves) to:
//!
//! - parse ordered XML element lists into structured values
//! - bind positional and keyword arguments into the same shape
//! - render structured values back into XML element trees
//! - print grammar signatures for diagnostics
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_bind::namespaces::QName;
//! use xmlschema_bind::values::{Kwargs, Value};
//! use xmlschema_bind::xsd::{BuiltinType, ComplexType, Schema, XsdElement, XsdGroup};
//!
//! let mut schema = Schema::new(None);
//! let person = ComplexType::new(None).with_content(XsdGroup::sequence(vec![
//!     XsdElement::simple(QName::local("name"), BuiltinType::String).into(),
//! ]));
//! schema.add_element(XsdElement::complex(QName::local("person"), person));
//! schema.resolve()?;
//!
//! let kwargs = Kwargs::from([("name".to_string(), Value::from("Ann"))]);
//! let value = schema.bind(&QName::local("person"), &[], kwargs)?;
//! let root = schema.render_document(&QName::local("person"), &value)?;
//! assert_eq!(root.to_xml_string()?, "<person><name>Ann</name></person>");
//!
//! let parsed = schema.parse_document(&root)?;
//! assert_eq!(parsed.get("name"), Some(&Value::from("Ann")));
//! # Ok::<(), xmlschema_bind::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod namespaces;

// XML trees and values
pub mod documents;
pub mod values;

// Content model
pub mod xsd;

// Re-exports for convenience
pub use documents::{Document, Element};
pub use error::{ChoiceError, Error, Result};
pub use limits::Limits;
pub use namespaces::QName;
pub use values::{AnyObject, CompoundValue, Kwargs, Value, ValueAccess, ValueMap};
pub use xsd::{Particle, Schema};

/// Version of the xmlschema-bind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
