#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use msgstream_wire::{Decimal, SliceSource};

#[derive(Debug, Arbitrary)]
struct FuzzDecimal {
    negative: bool,
    digits: Vec<u8>,
    scale: u8,
}

// Fuzz target: packed decimal write->read roundtrip.
//
// Builds a decimal from arbitrary digits and scale, writes its packed
// body, and checks that reading it back yields the same digits and
// scale.
fuzz_target!(|input: FuzzDecimal| {
    let digits: String = input
        .digits
        .iter()
        .take(64)
        .map(|d| char::from(b'0' + d % 10))
        .collect();
    let Ok(decimal) = Decimal::from_parts(input.negative, &digits, u32::from(input.scale)) else {
        return;
    };

    let mut bytes = Vec::new();
    decimal.write_body(&mut bytes).unwrap();

    let mut source = SliceSource::new(&bytes);
    let back = Decimal::read_body(&mut source, decimal.is_negative(), true).unwrap();
    assert_eq!(back.digits(), decimal.digits());
    assert_eq!(back.scale(), decimal.scale());
    assert!(source.rest().is_empty());
});
