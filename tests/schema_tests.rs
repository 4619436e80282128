//! End-to-end tests through the schema registry
//!
//! A small purchase-order schema is built by hand, resolved, and then used
//! to parse, bind and render namespaced documents.

use pretty_assertions::assert_eq;
use serde_json::json;

use xmlschema_bind::values::{Kwargs, Value};
use xmlschema_bind::xsd::{
    BuiltinType, ComplexType, NamedGroup, Occurs, ParticleRef, ProcessContents, Schema,
    XsdAnyElement, XsdElement, XsdGroup,
};
use xmlschema_bind::{Error, Limits, QName};

const NS: &str = "http://example.com/po";

fn po_schema() -> Schema {
    let mut schema = Schema::new(Some(NS));
    let q = |name: &str| QName::namespaced(NS, name);

    schema.add_element(XsdElement::simple(q("comment"), BuiltinType::String));

    // <xs:group name="Line"> sku, qty </xs:group>
    schema.add_group(NamedGroup::new(
        q("Line"),
        XsdGroup::sequence(vec![
            XsdElement::simple(q("sku"), BuiltinType::String).into(),
            XsdElement::simple(q("qty"), BuiltinType::Integer).into(),
        ]),
    ));

    let invoice = XsdGroup::sequence(vec![
        XsdElement::simple(q("account"), BuiltinType::String).into(),
        XsdElement::simple(q("due"), BuiltinType::Date).into(),
    ]);
    let payment = XsdGroup::choice(vec![
        XsdElement::simple(q("card"), BuiltinType::String).into(),
        invoice.into(),
    ]);

    let order = ComplexType::new(Some(q("PurchaseOrderType"))).with_content(XsdGroup::sequence(
        vec![
            XsdElement::simple(q("id"), BuiltinType::Integer).into(),
            ParticleRef::group(q("Line"))
                .with_occurs(Occurs::one_or_more())
                .into(),
            payment.into(),
            ParticleRef::element(q("comment"))
                .with_occurs(Occurs::optional())
                .into(),
            XsdAnyElement::new()
                .with_process_contents(ProcessContents::Lax)
                .with_occurs(Occurs::zero_or_more())
                .into(),
        ],
    ));
    schema.add_element(XsdElement::complex(q("order"), order));

    schema.resolve().unwrap();
    schema
}

const ORDER_XML: &str = r#"<po:order xmlns:po="http://example.com/po">
    <po:id>1001</po:id>
    <po:sku>A-1</po:sku><po:qty>2</po:qty>
    <po:sku>B-7</po:sku><po:qty>1</po:qty>
    <po:account>ACME</po:account><po:due>2024-03-31</po:due>
    <po:comment>leave at door</po:comment>
    <po:comment>ring twice</po:comment>
    <other xmlns="urn:other">free form</other>
</po:order>"#;

#[test]
fn test_parse_purchase_order() {
    let schema = po_schema();
    let value = schema.parse_xml(ORDER_XML).unwrap();

    assert_eq!(
        value.to_json(),
        json!({
            "id": 1001,
            "_value_1": [
                {"sku": "A-1", "qty": 2},
                {"sku": "B-7", "qty": 1}
            ],
            "_value_2": {"account": "ACME", "due": "2024-03-31"},
            "comment": "leave at door",
            "_value_3": [
                "ring twice",
                "<ns0:other xmlns:ns0=\"urn:other\">free form</ns0:other>"
            ]
        })
    );
}

#[test]
fn test_lax_wildcard_uses_global_declaration() {
    let schema = po_schema();
    let value = schema.parse_xml(ORDER_XML).unwrap();

    let captured = value.get("_value_3").unwrap().occurrences();
    // The second comment is declared globally, so it is decoded
    match captured[0] {
        Value::Any(object) => {
            assert_eq!(object.qname(), &QName::namespaced(NS, "comment"));
            assert_eq!(*object.value, Value::from("ring twice"));
        }
        other => panic!("unexpected value: {other:?}"),
    }
    assert!(matches!(captured[1], Value::Xml(node) if node.local_name() == "other"));

    let skipping = XsdAnyElement::new().with_process_contents(ProcessContents::Skip);
    let mut input: std::collections::VecDeque<_> = xmlschema_bind::Document::from_string(ORDER_XML)
        .unwrap()
        .into_root()
        .unwrap()
        .children
        .into_iter()
        .filter(|node| node.local_name() == "comment")
        .collect();
    let raw = skipping.parse_xmlelements(&mut input, &schema).unwrap();
    assert!(matches!(raw, Value::Xml(_)));
}

#[test]
fn test_parsed_order_renders_back() {
    let schema = po_schema();
    let order = QName::namespaced(NS, "order");
    let parsed = schema.parse_xml(ORDER_XML).unwrap();

    let root = schema.render_document(&order, &parsed).unwrap();
    let tags: Vec<&str> = root.children().iter().map(|c| c.local_name()).collect();
    assert_eq!(
        tags,
        vec![
            "id", "sku", "qty", "sku", "qty", "account", "due", "comment", "comment", "other"
        ]
    );
    assert_eq!(root.children()[8].text(), Some("ring twice"));

    let reparsed = schema.parse_document(&root).unwrap();
    assert_eq!(reparsed, parsed);
}

#[test]
fn test_bind_and_render_purchase_order() {
    let schema = po_schema();
    let order = QName::namespaced(NS, "order");

    let kwargs = Kwargs::from([
        ("id".to_string(), Value::from(7)),
        (
            "_value_1".to_string(),
            Value::List(vec![Value::map([
                ("sku", Value::from("Z-9")),
                ("qty", Value::from(3)),
            ])]),
        ),
        ("card".to_string(), Value::from("4111")),
    ]);
    let value = schema.bind(&order, &[], kwargs).unwrap();

    assert_eq!(
        value.get("_value_2"),
        Some(&Value::map([("card", Value::from("4111"))]))
    );

    let root = schema.render_document(&order, &value).unwrap();
    assert_eq!(
        root.to_xml_string().unwrap(),
        concat!(
            r#"<ns0:order xmlns:ns0="http://example.com/po">"#,
            "<ns0:id>7</ns0:id>",
            "<ns0:sku>Z-9</ns0:sku><ns0:qty>3</ns0:qty>",
            "<ns0:card>4111</ns0:card>",
            "</ns0:order>"
        )
    );

    let reparsed = schema.parse_document(&root).unwrap();
    assert_eq!(reparsed.get("id"), Some(&Value::from(7)));
    assert_eq!(reparsed.get("_value_2"), value.get("_value_2"));
}

#[test]
fn test_bind_rejects_unknown_keyword() {
    let schema = po_schema();
    let kwargs = Kwargs::from([
        ("id".to_string(), Value::from(7)),
        ("colour".to_string(), Value::from("red")),
    ]);

    let err = schema
        .bind(&QName::namespaced(NS, "order"), &[], kwargs)
        .unwrap_err();
    assert!(matches!(err, Error::Type(ref message) if message.contains("colour")));
}

#[test]
fn test_bind_choice_without_match() {
    let schema = po_schema();
    let kwargs = Kwargs::from([
        ("id".to_string(), Value::from(7)),
        (
            "_value_2".to_string(),
            Value::map([("cash", Value::from(true))]),
        ),
    ]);

    let err = schema
        .bind(&QName::namespaced(NS, "order"), &[], kwargs)
        .unwrap_err();
    assert!(matches!(err, Error::NoMatchingChoice(_)));
}

#[test]
fn test_document_limits() {
    let schema = po_schema().with_limits(Limits::default().with_max_xml_depth(1));
    assert!(matches!(
        schema.parse_xml(ORDER_XML),
        Err(Error::LimitExceeded(_))
    ));
}

#[test]
fn test_signature_of_order_type() {
    let schema = po_schema();
    let order = schema.get_element(&QName::namespaced(NS, "order")).unwrap();
    assert_eq!(order.signature(0).unwrap(), "PurchaseOrderType");

    let content = match order {
        xmlschema_bind::Particle::Element(decl) => decl
            .complex_type()
            .and_then(|ct| ct.content.clone())
            .unwrap(),
        _ => unreachable!(),
    };
    assert_eq!(
        content.signature(0).unwrap(),
        "id: xsd:integer, _value_1: [sku: xsd:string, qty: xsd:integer], \
         _value_2: ({card: xsd:string} | {account: xsd:string, due: xsd:date}), \
         comment: xsd:string, _value_3: ANY"
    );
}
