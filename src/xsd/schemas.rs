//! Schema registry
//!
//! Holds the global element declarations and named groups that references
//! resolve against, and offers document-level parse, bind and render
//! entry points on top of the compositor tree.

use indexmap::IndexMap;
use tracing::debug;

use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::values::{CompoundValue, Kwargs, Value};

use super::elements::{ElementType, XsdElement};
use super::named_groups::NamedGroup;
use super::particles::Particle;
use super::refs::{RefKind, ResolveState};

/// Lookup of global components by kind and name
pub trait Registry {
    /// Find the target of a reference
    fn lookup(&self, kind: RefKind, qname: &QName) -> Option<Particle>;
}

/// In-memory schema holding global components
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Target namespace
    pub target_namespace: Option<String>,
    /// Global element declarations
    elements: IndexMap<QName, Particle>,
    /// Named model group definitions
    groups: IndexMap<QName, Particle>,
    /// Limits applied when reading documents
    limits: Limits,
}

impl Schema {
    /// Create an empty schema
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.map(String::from),
            ..Self::default()
        }
    }

    /// Set document reading limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Document reading limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Qualified name in the target namespace
    pub fn qname(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.as_deref(), local_name)
    }

    /// Register a global element declaration
    pub fn add_element(&mut self, element: XsdElement) -> Particle {
        let qname = element.qname.clone();
        let particle = Particle::from(element);
        self.elements.insert(qname, particle.clone());
        particle
    }

    /// Register a named model group
    pub fn add_group(&mut self, group: NamedGroup) -> Particle {
        let qname = group.qname.clone();
        let particle = Particle::from(group);
        self.groups.insert(qname, particle.clone());
        particle
    }

    /// Look up a global element declaration
    pub fn get_element(&self, qname: &QName) -> Option<&Particle> {
        self.elements.get(qname)
    }

    /// Look up a named model group
    pub fn get_group(&self, qname: &QName) -> Option<&Particle> {
        self.groups.get(qname)
    }

    /// Global element names, in registration order
    pub fn element_names(&self) -> impl Iterator<Item = &QName> {
        self.elements.keys()
    }

    /// Resolve every reference reachable from the global components.
    ///
    /// Safe to call more than once.
    pub fn resolve(&self) -> Result<()> {
        let mut state = ResolveState::new();
        for particle in self.elements.values().chain(self.groups.values()) {
            particle.resolve_with(self, &mut state)?;
        }
        debug!(nodes = state.len(), "schema resolved");
        Ok(())
    }

    fn element_decl(&self, qname: &QName) -> Result<&XsdElement> {
        match self.get_element(qname) {
            Some(Particle::Element(decl)) => Ok(decl.as_ref()),
            _ => Err(Error::Value(format!("no global element '{}' in schema", qname))),
        }
    }

    /// Parse a document root through its global element declaration
    pub fn parse_document(&self, root: &Element) -> Result<Value> {
        self.element_decl(&root.qname)?.parse_xmlelement(root, self)
    }

    /// Read an XML string and parse its root element
    pub fn parse_xml(&self, xml: &str) -> Result<Value> {
        let document = Document::parse(xml.as_bytes(), &self.limits)?;
        let root = document
            .root()
            .ok_or_else(|| Error::Xml("document has no root element".to_string()))?;
        self.parse_document(root)
    }

    /// Bind arguments for a global element into a value.
    ///
    /// Complex elements produce a record tagged with the element name;
    /// simple elements take a single positional argument.
    pub fn bind(&self, qname: &QName, args: &[Value], kwargs: Kwargs) -> Result<Value> {
        let decl = self.element_decl(qname)?;
        match &decl.element_type {
            ElementType::Complex(ct) => {
                let record: CompoundValue = ct.bind(args, kwargs)?;
                Ok(Value::Compound(record.with_element(decl.qname.clone())))
            }
            ElementType::Simple(_) => match (args, kwargs.is_empty()) {
                ([value], true) => Ok(value.clone()),
                _ => Err(Error::Type(format!(
                    "element '{}' takes exactly one positional argument",
                    qname
                ))),
            },
        }
    }

    /// Render a value as a document root for a global element
    pub fn render_document(&self, qname: &QName, value: &Value) -> Result<Element> {
        let decl = self.element_decl(qname)?;
        let mut holder = Element::new(qname.clone());
        decl.render(&mut holder, value)?;
        holder
            .children
            .pop()
            .ok_or_else(|| Error::Value(format!("nothing rendered for '{}'", qname)))
    }
}

impl Registry for Schema {
    fn lookup(&self, kind: RefKind, qname: &QName) -> Option<Particle> {
        match kind {
            RefKind::Element => self.elements.get(qname).cloned(),
            RefKind::Group => self.groups.get(qname).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::builtins::BuiltinType;
    use crate::xsd::complex_types::ComplexType;
    use crate::xsd::groups::XsdGroup;
    use crate::xsd::refs::ParticleRef;

    const NS: &str = "http://example.com/orders";

    fn order_schema() -> Schema {
        let mut schema = Schema::new(Some(NS));
        schema.add_element(XsdElement::simple(schema.qname("id"), BuiltinType::Integer));

        let order = ComplexType::new(None).with_content(XsdGroup::sequence(vec![
            ParticleRef::element(schema.qname("id")).into(),
            XsdElement::simple(schema.qname("note"), BuiltinType::String)
                .with_occurs(crate::xsd::particles::Occurs::optional())
                .into(),
        ]));
        schema.add_element(XsdElement::complex(schema.qname("order"), order));
        schema.resolve().unwrap();
        schema
    }

    #[test]
    fn test_registry_lookup() {
        let schema = order_schema();
        assert!(schema.lookup(RefKind::Element, &schema.qname("id")).is_some());
        assert!(schema.lookup(RefKind::Group, &schema.qname("id")).is_none());
        assert_eq!(schema.element_names().count(), 2);
    }

    #[test]
    fn test_parse_xml() {
        let schema = order_schema();
        let xml = format!(r#"<o:order xmlns:o="{NS}"><o:id>42</o:id></o:order>"#);

        match schema.parse_xml(&xml).unwrap() {
            Value::Compound(record) => {
                assert_eq!(record.xsd_elm, Some(schema.qname("order")));
                assert_eq!(record.fields.get("id"), Some(&Value::from(42)));
                assert_eq!(record.fields.get("note"), Some(&Value::Null));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_bind_and_render_document() {
        let schema = order_schema();
        let value = schema
            .bind(
                &schema.qname("order"),
                &[],
                Kwargs::from([("id".to_string(), Value::from(7))]),
            )
            .unwrap();

        let root = schema.render_document(&schema.qname("order"), &value).unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(
            root.to_xml_string().unwrap(),
            format!(r#"<ns0:order xmlns:ns0="{NS}"><ns0:id>7</ns0:id></ns0:order>"#)
        );
    }

    #[test]
    fn test_unknown_root() {
        let schema = order_schema();
        let root = Element::new(QName::local("unknown"));
        assert!(matches!(schema.parse_document(&root), Err(Error::Value(_))));
    }

    #[test]
    fn test_unresolved_reference_fails_resolution() {
        let mut schema = Schema::new(None);
        let content = XsdGroup::sequence(vec![ParticleRef::element(QName::local("ghost")).into()]);
        schema.add_element(XsdElement::complex(
            QName::local("root"),
            ComplexType::new(None).with_content(content),
        ));

        assert!(matches!(
            schema.resolve(),
            Err(Error::UnresolvedReference { kind: "element", .. })
        ));
    }
}
