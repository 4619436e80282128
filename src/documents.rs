//! XML document handling
//!
//! This module provides the element tree that compositors read from and
//! render into, together with reading and writing through quick-xml.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes
    pub attributes: IndexMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace context in scope for this element
    pub namespaces: NamespaceContext,
}

// In-scope declarations are a reading artefact, not element content.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.qname == other.qname
            && self.attributes == other.attributes
            && self.text == other.text
            && self.children == other.children
    }
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a new element with text content
    pub fn with_text(qname: QName, text: impl Into<String>) -> Self {
        let mut element = Self::new(qname);
        element.text = Some(text.into());
        element
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get the text content
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Get the ordered child elements
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Get an attribute value by local name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute value
    pub fn set_attribute(&mut self, qname: QName, value: impl Into<String>) {
        self.attributes.insert(qname, value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Append a new child element and return it for further building
    pub fn append_child(&mut self, qname: QName) -> &mut Element {
        let index = self.children.len();
        self.children.push(Element::new(qname));
        &mut self.children[index]
    }

    /// Set text content
    pub fn set_text(&mut self, text: String) {
        self.text = Some(text);
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Serialize this element and its descendants to an XML string.
    ///
    /// Namespaces are bound to generated `nsN` prefixes declared on this
    /// element.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut prefixes: IndexMap<String, String> = IndexMap::new();
        collect_namespaces(self, &mut prefixes);

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_element(&mut writer, self, &prefixes, true)?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| Error::Xml(format!("Invalid UTF-8 in output: {}", e)))
    }
}

fn collect_namespaces(element: &Element, prefixes: &mut IndexMap<String, String>) {
    let names = std::iter::once(&element.qname).chain(element.attributes.keys());
    for qname in names {
        if let Some(ns) = &qname.namespace {
            if !prefixes.contains_key(ns) {
                let prefix = format!("ns{}", prefixes.len());
                prefixes.insert(ns.clone(), prefix);
            }
        }
    }
    for child in &element.children {
        collect_namespaces(child, prefixes);
    }
}

fn prefixed_name(qname: &QName, prefixes: &IndexMap<String, String>) -> String {
    match qname.namespace.as_ref().and_then(|ns| prefixes.get(ns)) {
        Some(prefix) => format!("{}:{}", prefix, qname.local_name),
        None => qname.local_name.clone(),
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &Element,
    prefixes: &IndexMap<String, String>,
    is_root: bool,
) -> Result<()> {
    let name = prefixed_name(&element.qname, prefixes);
    let mut start = BytesStart::new(name.as_str());

    if is_root {
        for (ns, prefix) in prefixes {
            let key = format!("xmlns:{}", prefix);
            start.push_attribute((key.as_str(), ns.as_str()));
        }
    }
    for (qname, value) in &element.attributes {
        let key = prefixed_name(qname, prefixes);
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let map_err = |e: quick_xml::Error| Error::Xml(format!("Failed to write XML: {}", e));

    if element.children.is_empty() && element.text.is_none() {
        writer.write_event(Event::Empty(start)).map_err(map_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(map_err)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(map_err)?;
    }
    for child in &element.children {
        write_element(writer, child, prefixes, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(map_err)?;
    Ok(())
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes(), &Limits::default())
    }

    /// Parse an XML document from bytes, enforcing the given limits
    pub fn parse(xml: &[u8], limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;

        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e, element_stack.last())?;
                    element_stack.push(element);
                    limits.check_xml_depth(element_stack.len())?;
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            // This is the root element
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e, element_stack.last())?;
                    limits.check_xml_depth(element_stack.len() + 1)?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        // Empty root element
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?
                            .to_string();
                        if !text.trim().is_empty() {
                            current.set_text(text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = String::from_utf8(e.into_inner().into_owned())
                            .map_err(|e| Error::Xml(format!("Invalid CDATA: {}", e)))?;
                        current.set_text(text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Ignore other events (comments, processing instructions, etc.)
            }
            buf.clear();
        }

        Ok(doc)
    }

    /// Parse element from BytesStart event, resolving prefixes against the
    /// declarations in scope at the parent
    fn parse_element(start: &BytesStart, parent: Option<&Element>) -> Result<Element> {
        let name_bytes = start.name();
        let name = std::str::from_utf8(name_bytes.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut namespaces = parent
            .map(|p| p.namespaces.clone())
            .unwrap_or_default();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            // Handle namespace declarations
            if attr_name == "xmlns" {
                namespaces.set_default_namespace(&attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                namespaces.add_prefix(prefix, &attr_value);
            } else {
                raw_attributes.push((attr_name, attr_value));
            }
        }

        let mut element = Element::new(namespaces.resolve(&name)?);
        for (attr_name, attr_value) in raw_attributes {
            let attr_qname = namespaces.resolve_attribute(&attr_name)?;
            element.attributes.insert(attr_qname, attr_value);
        }
        element.namespaces = namespaces;

        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Take the root element, failing on an empty document
    pub fn into_root(self) -> Result<Element> {
        self.root
            .ok_or_else(|| Error::Xml("Document has no root element".to_string()))
    }
}
