#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: raw varint decoding.
//
// Any accepted varint must report a length that matches its lead byte
// and a value no larger than VARINT_MAX.
fuzz_target!(|data: &[u8]| {
    if let Ok((value, len)) = msgstream_wire::varint::decode_varint(data) {
        assert!(value <= msgstream_wire::varint::VARINT_MAX);
        assert!(matches!(len, 1 | 2 | 4 | 8));
        assert!(len <= data.len());
    }
});
