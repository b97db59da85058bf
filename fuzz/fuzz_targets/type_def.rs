#![no_main]

use libfuzzer_sys::fuzz_target;
use msgstream_types::TypeDefinition;
use msgstream_wire::SliceSource;

// Fuzz target: TYPE_DEF payload parsing.
//
// A parsed definition must write back to exactly the bytes it was read
// from when the input used minimal varints.
fuzz_target!(|data: &[u8]| {
    let mut source = SliceSource::new(data);
    let Ok(def) = TypeDefinition::read(&mut source, true) else {
        return;
    };
    let consumed = data.len() - source.rest().len();

    let mut out = Vec::new();
    def.write(&mut out).unwrap();
    assert_eq!(out, &data[..consumed]);
});
