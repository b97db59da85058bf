//! Custom type integration tests.
//!
//! Covers type definitions on demand, generic decoding of types the
//! receiver never registered, native values through decompose and
//! reassemble hooks, flexible-mode defaults, and field shape checks.

use msgstream_decoder::{DecodeError, Decoder, decode_message};
use msgstream_encoder::{EncodeError, MessageWriter, encode_message};
use msgstream_tests::{Person, Point, person, point, point_instances, schema};
use msgstream_types::{
    FieldDef, FieldSpec, Graph, HookError, Instance, Object, ProtocolError, Schema, Shape,
    StructMode, TypeDefinition, TypeSpec,
};

/// `TYPE_DEF` payload of `Point { x, y }` derived from an instance.
const UNTYPED_POINT_DEF: [u8; 15] = [
    0x01, 0x05, b'P', b'o', b'i', b'n', b't', 0x00, 0x02, 0x01, b'x', 0x00, 0x01, b'y', 0x00,
];

// ── Types on demand ───────────────────────────────────────────────────────────

#[test]
fn one_type_def_for_many_instances() {
    let message = point_instances(100);
    let bytes = encode_message(&Schema::new(), &message.graph, message.root).unwrap();

    let mut expected = vec![0x1B, 0x64];
    expected.extend(UNTYPED_POINT_DEF);
    for i in 0..100_i8 {
        expected.extend([0x1D, 0x00, 0x0D, i.to_be_bytes()[0], 0x0D, (-i).to_be_bytes()[0]]);
    }
    expected.push(0x00);

    assert_eq!(bytes, expected);
}

#[test]
fn unregistered_types_decode_generically() {
    let message = point_instances(100);
    let bytes = encode_message(&Schema::new(), &message.graph, message.root).unwrap();
    let decoded = decode_message(&Schema::new(), &bytes).unwrap();

    let items = decoded.root_object().as_sequence().unwrap();
    assert_eq!(items.len(), 100);
    for (i, &id) in items.iter().enumerate() {
        let instance = decoded.get(id).as_instance().unwrap();
        assert_eq!(&*instance.type_name, "Point");
        let names: Vec<&str> = instance.fields.iter().map(|(name, _)| &**name).collect();
        assert_eq!(names, ["x", "y"]);
        let x = decoded.get(instance.field("x").unwrap()).as_integer();
        assert_eq!(x, Some(i128::try_from(i).unwrap()));
    }
}

#[test]
fn definitions_do_not_carry_across_messages() {
    let mut graph = Graph::new();
    let root = point(&mut graph, 1, 2);
    let schema = schema();
    let first = encode_message(&schema, &graph, root).unwrap();
    let second = encode_message(&schema, &graph, root).unwrap();

    // Each message opens with its own TYPE_DEF.
    assert_eq!(first, second);
    assert_eq!(first[0], 0x01);

    let mut stream = first.clone();
    stream.extend(&second);
    let decoded: Vec<_> = Decoder::new(&schema)
        .messages(&stream)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn instance_without_definition_rejected() {
    // INSTANCE 0 in a fresh message, even though a previous message
    // defined ordinal 0.
    let mut graph = Graph::new();
    let root = point(&mut graph, 1, 2);
    let mut bytes = encode_message(&schema(), &graph, root).unwrap();
    bytes.extend([0x1D, 0x00, 0x0D, 0x01, 0x0D, 0x02, 0x00]);

    let empty = Schema::new();
    let mut messages = Decoder::new(&empty).messages(&bytes);
    assert!(messages.next().unwrap().is_ok());
    assert!(matches!(
        messages.next().unwrap(),
        Err(DecodeError::Protocol(ProtocolError::UnknownType { ordinal: 0 }))
    ));
    assert!(messages.next().is_none());
}

// ── Native values ─────────────────────────────────────────────────────────────

#[test]
fn natives_reassembled() {
    let mut graph = Graph::new();
    let p = point(&mut graph, -3, 4);
    let ada = person(&mut graph, "Ada", Some("ada@example.org"));
    let bob = person(&mut graph, "Bob", None);
    let root = graph.list([p, ada, bob]);

    let schema = schema();
    let bytes = encode_message(&schema, &graph, root).unwrap();
    let decoded = decode_message(&schema, &bytes).unwrap();
    let items = decoded.root_object().as_sequence().unwrap();

    let native = |i: usize| decoded.get(items[i]).as_native().unwrap();
    assert_eq!(native(0).downcast_ref::<Point>(), Some(&Point { x: -3, y: 4 }));
    assert_eq!(
        native(1).downcast_ref::<Person>(),
        Some(&Person {
            name: "Ada".to_owned(),
            email: Some("ada@example.org".to_owned()),
        })
    );
    assert_eq!(
        native(2).downcast_ref::<Person>(),
        Some(&Person {
            name: "Bob".to_owned(),
            email: None,
        })
    );
}

#[test]
fn shared_native_reassembled_once() {
    let mut graph = Graph::new();
    let p = point(&mut graph, 1, 1);
    let root = graph.list([p, p, p]);

    let schema = schema();
    let bytes = encode_message(&schema, &graph, root).unwrap();
    let decoded = decode_message(&schema, &bytes).unwrap();

    let items = decoded.root_object().as_sequence().unwrap();
    assert!(items.iter().all(|&id| id == items[0]));
    assert!(decoded.get(items[0]).as_native().is_some());
}

#[test]
fn natives_decode_generically_without_hooks() {
    let mut graph = Graph::new();
    let root = point(&mut graph, 5, 6);
    let bytes = encode_message(&schema(), &graph, root).unwrap();

    let decoded = decode_message(&Schema::new(), &bytes).unwrap();
    let instance = decoded.root_object().as_instance().unwrap();
    assert_eq!(decoded.get(instance.field("y").unwrap()).as_integer(), Some(6));
}

#[test]
fn unregistered_native_rejected_by_encoder() {
    let mut graph = Graph::new();
    let root = point(&mut graph, 0, 0);
    assert!(matches!(
        encode_message(&Schema::new(), &graph, root),
        Err(EncodeError::UnregisteredType { .. })
    ));
}

#[test]
fn reassemble_failure_reported() {
    let mut graph = Graph::new();
    let x = graph.integer(i128::MAX);
    let y = graph.integer(0);
    let root = graph.instance(Instance::new("Point").with_field("x", x).with_field("y", y));

    let schema = schema();
    let bytes = encode_message(&schema, &graph, root).unwrap();
    match decode_message(&schema, &bytes) {
        Err(DecodeError::Reassemble { type_name, source }) => {
            assert_eq!(type_name, "Point");
            assert!(matches!(source, HookError::BadField { field } if field == "x"));
        }
        other => panic!("expected a reassemble error, got {other:?}"),
    }
}

// ── Flexible mode ─────────────────────────────────────────────────────────────

#[test]
fn skipped_field_takes_registered_default() {
    let mut graph = Graph::new();
    let root = person(&mut graph, "Cy", None);
    let bytes = encode_message(&schema(), &graph, root).unwrap();
    assert_eq!(bytes[bytes.len() - 2], 0x08, "email should be written as SKIP");

    // Registered without hooks: the default lands in the generic instance.
    let plain = Schema::new().with_type(
        TypeSpec::flexible("Person")
            .field(FieldSpec::new("name", Shape::String))
            .field(
                FieldSpec::new("email", Shape::String)
                    .with_default_value(Object::String("unknown".to_owned())),
            ),
    );
    let decoded = decode_message(&plain, &bytes).unwrap();
    let instance = decoded.root_object().as_instance().unwrap();
    assert_eq!(decoded.get(instance.field("email").unwrap()).as_str(), Some("unknown"));
}

#[test]
fn skipped_field_without_default_fails() {
    let mut graph = Graph::new();
    let root = person(&mut graph, "Cy", None);
    let bytes = encode_message(&schema(), &graph, root).unwrap();

    assert!(matches!(
        decode_message(&Schema::new(), &bytes),
        Err(DecodeError::Protocol(ProtocolError::MissingDefault { type_name, field }))
            if type_name == "Person" && field == "email"
    ));
}

#[test]
fn skip_in_strict_type_fails() {
    let def = TypeDefinition {
        name: "Pair".into(),
        mode: StructMode::Strict,
        fields: vec![
            FieldDef {
                name: "a".into(),
                shape: Shape::Any,
            },
            FieldDef {
                name: "b".into(),
                shape: Shape::Any,
            },
        ],
    };
    let mut writer = MessageWriter::new(Vec::new());
    writer.type_def(&def).unwrap();
    writer.instance(0).unwrap();
    writer.null().unwrap();
    writer.skip().unwrap();
    writer.end().unwrap();

    assert!(matches!(
        decode_message(&Schema::new(), &writer.into_inner()),
        Err(DecodeError::Protocol(ProtocolError::SkipInStrictMode { field, .. })) if field == "b"
    ));
}

// ── Shapes ────────────────────────────────────────────────────────────────────

#[test]
fn decoder_checks_field_shapes() {
    // The encoder writes whatever the instance holds; the receiver
    // checks it against the declared shape.
    let mut graph = Graph::new();
    let x = graph.string("not a number");
    let y = graph.integer(0);
    let root = graph.instance(Instance::new("Point").with_field("x", x).with_field("y", y));

    let schema = schema();
    let bytes = encode_message(&schema, &graph, root).unwrap();
    match decode_message(&schema, &bytes) {
        Err(DecodeError::Protocol(ProtocolError::ShapeMismatch { field, found, .. })) => {
            assert_eq!(field, "x");
            assert_eq!(found, "string");
        }
        other => panic!("expected a shape mismatch, got {other:?}"),
    }
}

#[test]
fn schema_document() {
    let mut text = String::new();
    schema().document(&mut text).unwrap();
    insta::assert_snapshot!(text, @r"
## Person (flexible)

| Field | Shape | Default |
|---|---|---|
| name | string | no |
| email | string | yes |

## Point (strict)

| Field | Shape | Default |
|---|---|---|
| x | integer | no |
| y | integer | no |
");
}
