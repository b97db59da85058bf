/// Implementation of `msgstream validate`.
///
/// Decodes every message in the file and reports either a series of
/// success checkmarks (`✓`) or a diagnostic failure line (`✗`). The
/// command exits with code 0 on a valid file and code 1 on any error (the
/// main dispatcher in `main.rs` converts `Err` to exit code 1).
///
/// # Success output
///
/// ```text
/// ✓ Messages: 3 decoded
/// ✓ Objects: 41 total, 2 custom types
/// ✓ References: every anchor and forward reference resolved
/// ```
///
/// # Failure output
///
/// ```text
/// ✗ Error: message 1 (byte 13): back reference to unknown anchor id 4
/// ```
use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result, anyhow};
use msgstream_decoder::{DecodeError, Decoder};
use msgstream_types::{Object, Schema};

use crate::ValidateArgs;

/// Run the `msgstream validate` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or if any message fails
/// to decode.
pub fn run(args: &ValidateArgs) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    let schema = Schema::new();
    let decoder = Decoder::new(&schema).with_config(args.limits.config());

    let mut rest = bytes.as_slice();
    let mut messages = 0usize;
    let mut objects = 0usize;
    let mut types = HashSet::new();

    while !rest.is_empty() {
        let offset = bytes.len() - rest.len();
        match decoder.decode_prefix(rest) {
            Ok((message, consumed)) => {
                messages += 1;
                objects += message.graph.len();
                for (_, object) in message.graph.iter() {
                    if let Object::Instance(instance) = object {
                        types.insert(instance.type_name.clone());
                    }
                }
                rest = &rest[consumed..];
            }
            Err(e) => {
                println!(
                    "✗ Error: message {messages} (byte {offset}): {}",
                    diagnostic(&e)
                );
                return Err(anyhow!("validation failed"));
            }
        }
    }

    if messages == 0 {
        println!("✗ Error: file is empty");
        return Err(anyhow!("validation failed"));
    }

    println!("✓ Messages: {messages} decoded");
    println!(
        "✓ Objects: {objects} total, {} custom type{}",
        types.len(),
        if types.len() == 1 { "" } else { "s" }
    );
    println!("✓ References: every anchor and forward reference resolved");
    Ok(())
}

// ── Error formatting ──────────────────────────────────────────────────────────

/// Converts a `DecodeError` into a one-line diagnostic, with a hint when
/// the file simply ends too early.
fn diagnostic(e: &DecodeError) -> String {
    if e.is_truncation() {
        format!("{e} (file ends mid-message)")
    } else {
        e.to_string()
    }
}
