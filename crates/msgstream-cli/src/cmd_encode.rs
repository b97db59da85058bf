/// Implementation of `msgstream encode`.
///
/// Parses a JSON document (see [`crate::json`] for the tagged forms) and
/// serialises it into one message with the schema-less encoder. Objects
/// named with `$anchor` and referenced with `$ref` are encoded once and
/// shared on the wire. Instances (`{"$type": .., "fields": ..}`) get a
/// `TYPE_DEF` derived from their field names.
///
/// # Example
///
/// ```text
/// $ echo '[[1,2,3],"x"]' | msgstream encode - -o out.msg
/// wrote 13 bytes to out.msg
/// ```
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use msgstream_encoder::{Encoder, EncoderConfig};
use msgstream_types::Schema;

use crate::EncodeArgs;
use crate::json::from_json;

/// Run the `msgstream encode` command.
///
/// # Errors
///
/// Returns an error if the input is not valid JSON in the expected shape,
/// encoding fails, or the output cannot be written.
pub fn run(args: &EncodeArgs) -> Result<()> {
    let text = if args.input == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("cannot read stdin")?;
        text
    } else {
        fs::read_to_string(&args.input)
            .with_context(|| format!("cannot read {}", args.input.display()))?
    };

    let document: serde_json::Value = serde_json::from_str(&text).context("invalid JSON")?;
    let message = from_json(&document).context("cannot build a message from the document")?;

    let schema = Schema::new();
    let encoder = Encoder::new(&schema).with_config(EncoderConfig {
        anchorless: args.anchorless,
        ..EncoderConfig::default()
    });
    let bytes = encoder
        .encode(&message.graph, message.root)
        .context("failed to encode")?;

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(args.append)
        .truncate(!args.append)
        .open(&args.output)
        .with_context(|| format!("cannot open {}", args.output.display()))?;
    file.write_all(&bytes)
        .with_context(|| format!("cannot write {}", args.output.display()))?;

    eprintln!("wrote {} bytes to {}", bytes.len(), args.output.display());
    Ok(())
}
