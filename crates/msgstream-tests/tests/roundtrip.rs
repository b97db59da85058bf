//! Encode-then-decode integration tests.
//!
//! Each test builds an object graph, encodes it with the encoder, decodes
//! the bytes with the decoder, and checks the decoded graph against the
//! original. Values travel through every inbuilt kind, including the
//! integer and decimal forms that have no fixed width.

use std::io::Cursor;

use msgstream_decoder::{Decoder, StreamingDecoder, decode_message};
use msgstream_encoder::{Encoder, EncoderConfig, encode_message};
use msgstream_tests::{NESTED_LIST_BYTES, nested_list, records};
use msgstream_types::{Graph, Message, Object, Schema, Shape, ZonedDateTime};
use msgstream_wire::{Decimal, IoSource};
use time::macros::datetime;

fn roundtrip(message: &Message) -> Message {
    let schema = Schema::new();
    let bytes = encode_message(&schema, &message.graph, message.root).expect("encode failed");
    decode_message(&schema, &bytes).expect("decode failed")
}

fn single(object: Object) -> Object {
    roundtrip(&Message::single(object)).root_object().clone()
}

// ── Scalars ───────────────────────────────────────────────────────────────────

#[test]
fn scalars_survive() {
    let cases = [
        Object::Null,
        Object::Bool(true),
        Object::Bool(false),
        Object::Integer(0),
        Object::Integer(-129),
        Object::Integer(i128::from(i64::MIN)),
        Object::Float(-0.0),
        Object::Float(f64::INFINITY),
        Object::String(String::new()),
        Object::String("é".to_owned()),
        Object::String("hello, wörld".to_owned()),
        Object::Bytes(vec![0x00, 0xFF, 0x10]),
        Object::Bytes(Vec::new()),
        Object::DateTime(datetime!(2024-02-29 23:59:59.5 +05:30)),
    ];
    for case in cases {
        assert_eq!(single(case.clone()), case);
    }
}

#[test]
fn zoned_datetimes_keep_their_zone() {
    for (instant, zone) in [
        (datetime!(2024-07-01 12:00 UTC), "Europe/Paris"),
        (datetime!(2024-01-01 12:00 UTC), "Europe/Paris"),
        (datetime!(2023-11-05 06:30 UTC), "America/New_York"),
        (datetime!(1999-12-31 23:59:59.25 UTC), "Australia/Lord_Howe"),
    ] {
        let zoned = ZonedDateTime::new(instant, zone).unwrap();
        let Object::ZonedDateTime(decoded) = single(Object::ZonedDateTime(zoned.clone())) else {
            panic!("expected a zoned datetime");
        };
        assert_eq!(decoded, zoned);
        assert_eq!(decoded.zone(), zone);
        assert_eq!(decoded.utc(), instant);
        assert_eq!(decoded.local().offset(), zoned.local().offset());
    }
}

#[test]
fn float_bits_are_exact() {
    let nan = f64::from_bits(0x7FF8_0000_DEAD_BEEF);
    let Object::Float(decoded) = single(Object::Float(nan)) else {
        panic!("expected a float");
    };
    assert_eq!(decoded.to_bits(), nan.to_bits());
}

#[test]
fn integers_beyond_64_bits() {
    for value in [
        i128::from(i64::MAX) + 1,
        i128::from(i64::MIN) - 1,
        1 << 100,
        i128::MAX,
        i128::MIN,
    ] {
        assert_eq!(single(Object::Integer(value)), Object::Integer(value));
    }
}

#[test]
fn decimals_keep_digits_and_scale() {
    for text in ["0", "-0.5", "12.340", "0.005", "123456789012345678901234567890.1"] {
        let decimal: Decimal = text.parse().unwrap();
        let Object::Decimal(decoded) = single(Object::Decimal(decimal.clone())) else {
            panic!("expected a decimal");
        };
        assert_eq!(decoded, decimal);
        assert_eq!(decoded.to_string(), text);
    }
}

// ── Containers ────────────────────────────────────────────────────────────────

#[test]
fn nested_containers() {
    let mut graph = Graph::new();
    let k1 = graph.string("a");
    let v1 = graph.integer(1);
    let k2 = graph.integer(2);
    let n = graph.null();
    let inner = graph.tuple([n]);
    let map = graph.map([(k1, v1), (k2, inner)]);
    let s = graph.string("tail");
    let empty = graph.list([]);
    let root = graph.list([map, s, empty]);

    let decoded = roundtrip(&Message::new(graph, root));
    let items = decoded.root_object().as_sequence().unwrap();
    assert_eq!(items.len(), 3);

    let entries = decoded.get(items[0]).as_map().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(decoded.get(entries[0].0).as_str(), Some("a"));
    assert_eq!(decoded.get(entries[1].0).as_integer(), Some(2));
    assert!(matches!(decoded.get(entries[1].1), Object::Tuple(t) if t.len() == 1));

    assert_eq!(decoded.get(items[1]).as_str(), Some("tail"));
    assert!(matches!(decoded.get(items[2]), Object::List(l) if l.is_empty()));
}

#[test]
fn tuple_and_list_stay_distinct() {
    let mut graph = Graph::new();
    let one = graph.integer(1);
    let tuple = graph.tuple([one]);
    let list = graph.list([one]);
    let root = graph.list([tuple, list]);

    let decoded = roundtrip(&Message::new(graph, root));
    let items = decoded.root_object().as_sequence().unwrap();
    assert_eq!(decoded.get(items[0]).kind_name(), "tuple");
    assert_eq!(decoded.get(items[1]).kind_name(), "list");
}

#[test]
fn set_keeps_items_and_kind() {
    let mut graph = Graph::new();
    let one = graph.integer(1);
    let word = graph.string("x");
    let inner = graph.tuple([one]);
    let root = graph.set([one, word, inner]);

    let decoded = roundtrip(&Message::new(graph, root));
    assert_eq!(decoded.root_object().kind_name(), "set");
    assert!(Shape::Set.admits(decoded.root_object()));
    let items = decoded.root_object().as_sequence().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(decoded.get(items[1]).as_str(), Some("x"));
    // The shared integer is written once and referenced from the tuple.
    let inner = decoded.get(items[2]).as_sequence().unwrap();
    assert_eq!(inner[0], items[0]);
}

#[test]
fn long_list_uses_wide_count() {
    let mut graph = Graph::new();
    let items: Vec<_> = (0..20_000).map(|i| graph.integer(i)).collect();
    let root = graph.list(items);

    let bytes = encode_message(&Schema::new(), &graph, root).unwrap();
    // 20 000 needs the 4-byte varint class.
    assert_eq!(bytes[1] & 0xE0, 0xC0);

    let decoded = decode_message(&Schema::new(), &bytes).unwrap();
    let items = decoded.root_object().as_sequence().unwrap();
    assert_eq!(items.len(), 20_000);
    assert_eq!(decoded.get(items[19_999]).as_integer(), Some(19_999));
}

// ── Sources and modes ─────────────────────────────────────────────────────────

#[test]
fn decode_from_reader() {
    let schema = Schema::new();
    let mut source = IoSource::new(Cursor::new(NESTED_LIST_BYTES.to_vec()));
    let decoded = Decoder::new(&schema).decode_from(&mut source).unwrap();
    assert_eq!(decoded, decode_message(&schema, &NESTED_LIST_BYTES).unwrap());
}

#[test]
fn anchorless_encoding_decodes_identically() {
    let message = nested_list();
    let schema = Schema::new();
    let anchored = encode_message(&schema, &message.graph, message.root).unwrap();
    let anchorless = Encoder::new(&schema)
        .with_config(EncoderConfig {
            anchorless: true,
            ..EncoderConfig::default()
        })
        .encode(&message.graph, message.root)
        .unwrap();

    assert_ne!(anchored, anchorless);
    assert_eq!(
        decode_message(&schema, &anchored).unwrap(),
        decode_message(&schema, &anchorless).unwrap()
    );
}

#[test]
fn concatenated_messages() {
    let schema = Schema::new();
    let mut graph = Graph::new();
    let root = graph.string("second");

    let mut bytes = NESTED_LIST_BYTES.to_vec();
    bytes.extend(encode_message(&schema, &graph, root).unwrap());

    let decoded: Vec<_> = Decoder::new(&schema)
        .messages(&bytes)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0], roundtrip(&nested_list()));
    assert_eq!(decoded[1].root_object().as_str(), Some("second"));
}

#[tokio::test]
async fn streaming_decoder_matches_slice_decoder() {
    let schema = Schema::new();
    let mut bytes = Vec::new();
    for n in [1, 10, 200] {
        let message = records(n);
        bytes.extend(encode_message(&schema, &message.graph, message.root).unwrap());
    }

    let expected: Vec<_> = Decoder::new(&schema)
        .messages(&bytes)
        .collect::<Result<_, _>>()
        .unwrap();

    let mut stream = StreamingDecoder::new(&schema, bytes.as_slice());
    let mut streamed = Vec::new();
    while let Some(message) = stream.next().await {
        streamed.push(message.unwrap());
    }
    assert_eq!(streamed, expected);
}
