#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: varint encode->decode roundtrip.
//
// Takes 8 bytes of fuzz input, masks them into the 60-bit varint range,
// encodes the value, then decodes it strictly and asserts it matches.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let value = u64::from_le_bytes(data[..8].try_into().unwrap()) & msgstream_wire::varint::VARINT_MAX;

    let mut buf = [0u8; 8];
    let encoded_len = msgstream_wire::varint::encode_varint(value, &mut buf).unwrap();
    assert_eq!(encoded_len, msgstream_wire::varint::varint_len(value));

    let (decoded, decoded_len) =
        msgstream_wire::varint::decode_varint_strict(&buf[..encoded_len]).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded_len, encoded_len);
});
