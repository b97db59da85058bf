//! Wire conformance tests.
//!
//! Each test encodes a small graph and pins the exact bytes with an
//! inline snapshot, so any change to the wire format shows up as a
//! snapshot diff. Every snapshot is then decoded again to check that the
//! pinned bytes are themselves a legal message.

use msgstream_decoder::decode_message;
use msgstream_encoder::{Encoder, EncoderConfig, encode_message};
use msgstream_tests::{dump, nested_list, person, point, schema};
use msgstream_types::{Graph, Instance, Object, ObjectId, Schema, ZonedDateTime};
use msgstream_wire::Decimal;
use msgstream_wire::varint::{VARINT_MAX, decode_varint, decode_varint_strict, encode_varint};
use time::macros::datetime;

fn encode_with(schema: &Schema, graph: &Graph, root: ObjectId) -> String {
    let bytes = encode_message(schema, graph, root).expect("encode failed");
    decode_message(schema, &bytes).expect("pinned bytes must decode");
    dump(&bytes)
}

fn encode(graph: &Graph, root: ObjectId) -> String {
    encode_with(&Schema::new(), graph, root)
}

fn encode_single(object: Object) -> String {
    let mut graph = Graph::new();
    let root = graph.insert(object);
    encode(&graph, root)
}

// ── Inbuilt kinds ─────────────────────────────────────────────────────────────

#[test]
fn nested_list_bytes() {
    let message = nested_list();
    insta::assert_snapshot!(
        encode(&message.graph, message.root),
        @"1b 02 1b 03 0d 01 0d 02 0d 03 14 78 00"
    );
}

#[test]
fn smallest_integer_widths() {
    let mut graph = Graph::new();
    let items = [
        graph.null(),
        graph.bool(true),
        graph.bool(false),
        graph.integer(300),
        graph.integer(-1),
        graph.integer(70_000),
        graph.integer(1_i64 << 40),
        graph.string(""),
    ];
    let root = graph.tuple(items);
    insta::assert_snapshot!(
        encode(&graph, root),
        @"1a 08 0a 0c 0b 0e 01 2c 0d ff 0f 00 01 11 70 10 00 00 01 00 00 00 00 00 13 00"
    );
}

#[test]
fn variable_width_integers() {
    insta::assert_snapshot!(
        encode_single(Object::Integer(1 << 64)),
        @"11 09 01 00 00 00 00 00 00 00 00 00"
    );
    insta::assert_snapshot!(
        encode_single(Object::Integer(-(1 << 64))),
        @"11 09 ff 00 00 00 00 00 00 00 00 00"
    );
}

#[test]
fn packed_decimals() {
    let negative: Decimal = "-12.5".parse().unwrap();
    insta::assert_snapshot!(encode_single(Object::Decimal(negative)), @"17 04 12 a5 00");

    let odd: Decimal = "0.5".parse().unwrap();
    insta::assert_snapshot!(encode_single(Object::Decimal(odd)), @"16 03 0a 5f 00");
}

#[test]
fn float_is_big_endian_binary64() {
    insta::assert_snapshot!(
        encode_single(Object::Float(1.5)),
        @"18 3f f8 00 00 00 00 00 00 00"
    );
}

#[test]
fn datetime_is_rfc3339_text() {
    insta::assert_snapshot!(
        encode_single(Object::DateTime(datetime!(2024-01-02 03:04:05 UTC))),
        @"19 14 32 30 32 34 2d 30 31 2d 30 32 54 30 33 3a 30 34 3a 30 35 5a 00"
    );
}

#[test]
fn zoned_datetime_is_utc_text_then_zone() {
    let paris = ZonedDateTime::new(datetime!(2024-01-02 04:04:05 +01:00), "Europe/Paris").unwrap();
    insta::assert_snapshot!(
        encode_single(Object::ZonedDateTime(paris)),
        @"1f 14 32 30 32 34 2d 30 31 2d 30 32 54 30 33 3a 30 34 3a 30 35 5a 0c 45 75 72 6f 70 65 2f 50 61 72 69 73 00"
    );
}

#[test]
fn string_forms() {
    insta::assert_snapshot!(encode_single(Object::String("é".to_owned())), @"14 c3 a9 00");
    insta::assert_snapshot!(encode_single(Object::String("hi".to_owned())), @"15 02 68 69 00");
}

#[test]
fn map_entries() {
    let mut graph = Graph::new();
    let key = graph.string("a");
    let value = graph.bytes([0xDE, 0xAD]);
    let root = graph.map([(key, value)]);
    insta::assert_snapshot!(encode(&graph, root), @"1c 01 14 61 12 02 de ad 00");
}

#[test]
fn set_items() {
    let mut graph = Graph::new();
    let one = graph.integer(1);
    let a = graph.string("a");
    let root = graph.set([one, a]);
    insta::assert_snapshot!(encode(&graph, root), @"1e 02 0d 01 14 61 00");
}

#[test]
fn two_byte_count() {
    let mut graph = Graph::new();
    let root = graph.bytes(vec![0; 200]);
    let bytes = encode_message(&Schema::new(), &graph, root).unwrap();
    insta::assert_snapshot!(dump(&bytes[..3]), @"12 80 c8");
}

// ── Identity ──────────────────────────────────────────────────────────────────

#[test]
fn shared_object_anchor_and_back_ref() {
    let mut graph = Graph::new();
    let shared = graph.list([]);
    let root = graph.list([shared, shared]);
    insta::assert_snapshot!(encode(&graph, root), @"1b 02 02 00 1b 00 05 00 00");
}

#[test]
fn self_containing_list() {
    let mut graph = Graph::new();
    let root = graph.list([]);
    assert!(graph.push(root, root));
    insta::assert_snapshot!(encode(&graph, root), @"02 00 1b 01 05 00 00");
}

#[test]
fn anchorless_mode_numbers_every_object() {
    let mut graph = Graph::new();
    let shared = graph.list([]);
    let root = graph.list([shared, shared]);

    let schema = Schema::new();
    let bytes = Encoder::new(&schema)
        .with_config(EncoderConfig {
            anchorless: true,
            ..EncoderConfig::default()
        })
        .encode(&graph, root)
        .unwrap();
    decode_message(&schema, &bytes).unwrap();
    insta::assert_snapshot!(dump(&bytes), @"03 1b 02 1b 00 05 01 00");
}

// ── Custom types ──────────────────────────────────────────────────────────────

#[test]
fn derived_type_definition() {
    let mut graph = Graph::new();
    let x = graph.integer(1);
    let y = graph.integer(2);
    let root = graph.instance(Instance::new("Point").with_field("x", x).with_field("y", y));
    insta::assert_snapshot!(
        encode(&graph, root),
        @"01 05 50 6f 69 6e 74 00 02 01 78 00 01 79 00 1d 00 0d 01 0d 02 00"
    );
}

#[test]
fn registered_strict_type() {
    let mut graph = Graph::new();
    let root = point(&mut graph, 1, 2);
    insta::assert_snapshot!(
        encode_with(&schema(), &graph, root),
        @"01 05 50 6f 69 6e 74 00 02 01 78 03 01 79 03 1d 00 0d 01 0d 02 00"
    );
}

#[test]
fn registered_flexible_type_with_skip() {
    let mut graph = Graph::new();
    let root = person(&mut graph, "Al", None);
    insta::assert_snapshot!(
        encode_with(&schema(), &graph, root),
        @"01 06 50 65 72 73 6f 6e 01 02 04 6e 61 6d 65 06 05 65 6d 61 69 6c 06 1d 00 15 02 41 6c 08 00"
    );
}

// ── Varints ───────────────────────────────────────────────────────────────────

#[test]
fn varint_class_boundaries() {
    let cases = [
        (0, 1),
        (127, 1),
        (128, 2),
        (16_383, 2),
        (16_384, 4),
        (536_870_911, 4),
        (536_870_912, 8),
        (VARINT_MAX, 8),
    ];
    for (value, len) in cases {
        let mut buf = [0u8; 8];
        assert_eq!(encode_varint(value, &mut buf).unwrap(), len, "length of {value}");
        assert_eq!(decode_varint_strict(&buf[..len]).unwrap(), (value, len));
    }
    assert!(encode_varint(VARINT_MAX + 1, &mut [0u8; 8]).is_err());
}

#[test]
fn varint_lead_bytes() {
    let leads: Vec<String> = [127, 128, 16_384, 536_870_912]
        .into_iter()
        .map(|value| {
            let mut buf = [0u8; 8];
            let len = encode_varint(value, &mut buf).unwrap();
            dump(&buf[..len])
        })
        .collect();
    insta::assert_snapshot!(leads.join(" | "), @"7f | 80 80 | c0 00 40 00 | e0 00 00 00 20 00 00 00");
}

#[test]
fn padded_varint_accepted_leniently() {
    // 5 in the 4-byte class.
    assert_eq!(decode_varint(&[0xC0, 0x00, 0x00, 0x05]).unwrap(), (5, 4));
    assert!(decode_varint_strict(&[0xC0, 0x00, 0x00, 0x05]).is_err());
}

// ── Decimals ──────────────────────────────────────────────────────────────────

#[test]
fn decimal_text_survives_packing() {
    for text in [
        "0", "7", "10", "-1", "0.1", "-0.01", "3.14159", "100.000", "99999999999999999999.99",
    ] {
        let decimal: Decimal = text.parse().unwrap();
        let mut bytes = Vec::new();
        decimal.write_body(&mut bytes).unwrap();
        let mut source = msgstream_wire::SliceSource::new(&bytes);
        let back = Decimal::read_body(&mut source, decimal.is_negative(), true).unwrap();
        assert_eq!(back.to_string(), text);
        assert!(source.rest().is_empty());
    }
}
