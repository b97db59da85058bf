#![no_main]

use libfuzzer_sys::fuzz_target;
use msgstream_decoder::{DecodeError, Decoder, DecoderConfig};
use msgstream_types::Schema;

// Fuzz target: full decoder entry point.
//
// Decodes every message in the input with tight limits, so hostile
// counts and nesting fail fast instead of exhausting memory.
// Catches bugs in:
// - Control code and varint parsing
// - Anchor, back reference, and forward reference bookkeeping
// - TYPE_DEF parsing and SKIP/default handling
// - END and trailing data detection
fuzz_target!(|data: &[u8]| {
    let schema = Schema::new();
    let decoder = Decoder::new(&schema).with_config(DecoderConfig {
        max_depth: 64,
        max_container_len: 1 << 16,
        ..DecoderConfig::default()
    });
    for message in decoder.messages(data) {
        match message {
            Ok(message) => assert!(message.graph.get(message.root).is_some()),
            Err(DecodeError::Protocol(_)) => break,
            Err(other) => panic!("unexpected error kind: {other:?}"),
        }
    }
});
