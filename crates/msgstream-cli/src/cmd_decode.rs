/// Implementation of `msgstream decode`.
///
/// Decodes each message and writes it as JSON (see [`crate::json`]), one
/// document per line, or pretty-printed with `--pretty`. A file argument
/// of `-` reads messages incrementally from stdin with the streaming
/// decoder, so a producer can keep appending messages to the pipe.
///
/// # Output format
///
/// ```text
/// [[1,2,3],"x"]
/// {"$anchor":0,"value":[{"$ref":0}]}
/// ```
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use msgstream_decoder::{Decoder, StreamingDecoder};
use msgstream_types::{Message, Schema};

use crate::DecodeArgs;
use crate::json::to_json;

/// Run the `msgstream decode` command.
///
/// # Errors
///
/// Returns an error if the input cannot be read, a message fails to
/// decode, or the output cannot be written.
pub fn run(args: &DecodeArgs) -> Result<()> {
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(io::BufWriter::new(
            fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let schema = Schema::new();
    let config = args.limits.config();

    if args.file == Path::new("-") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .context("cannot start the async runtime")?;
        runtime.block_on(async {
            let mut stream = StreamingDecoder::with_config(&schema, config, tokio::io::stdin());
            let mut index = 0usize;
            while let Some(message) = stream.next().await {
                let message =
                    message.with_context(|| format!("failed to decode message {index} from stdin"))?;
                write_message(&mut out, &message, args.pretty)?;
                index += 1;
            }
            Ok::<_, anyhow::Error>(())
        })?;
    } else {
        let bytes =
            fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;
        let decoder = Decoder::new(&schema).with_config(config);
        for (index, message) in decoder.messages(&bytes).enumerate() {
            let message = message.with_context(|| {
                format!("failed to decode message {index} of {}", args.file.display())
            })?;
            write_message(&mut out, &message, args.pretty)?;
        }
    }

    out.flush().context("cannot flush output")?;
    Ok(())
}

fn write_message(out: &mut dyn Write, message: &Message, pretty: bool) -> Result<()> {
    let value = to_json(message)?;
    if pretty {
        serde_json::to_writer_pretty(&mut *out, &value)?;
    } else {
        serde_json::to_writer(&mut *out, &value)?;
    }
    writeln!(out).context("cannot write output")?;
    Ok(())
}
