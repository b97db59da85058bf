/// Implementation of `msgstream inspect`.
///
/// Decodes each message in the file and prints a structured summary to
/// stdout: its byte range, the custom types it instantiates, and the
/// object tree rooted at its root. When `--message N` is given, only that
/// message is shown.
///
/// # Output format
///
/// ```text
/// Message 0: bytes 0..31 (31 bytes), 6 objects
///   Type Point { x, y }
///   #0 list[2]
///     #1 Point
///       .x = #2 integer 1
///       .y = #3 integer 2
///     → #1
/// ---
/// 1 message, 31 bytes
/// ```
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result};
use msgstream_decoder::Decoder;
use msgstream_types::{Message, Object, ObjectId, Schema};

use crate::InspectArgs;

/// Run the `msgstream inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a message fails to
/// decode.
pub fn run(args: &InspectArgs) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    let schema = Schema::new();
    let decoder = Decoder::new(&schema).with_config(args.limits.config());

    let mut rest = bytes.as_slice();
    let mut index = 0usize;
    while !rest.is_empty() {
        let start = bytes.len() - rest.len();
        let (message, consumed) = decoder
            .decode_prefix(rest)
            .with_context(|| format!("failed to decode message {index} at byte {start}"))?;
        rest = &rest[consumed..];

        if args.message.is_none_or(|target| target == index) {
            print!("{}", describe(index, start, consumed, &message));
            if args.show_hex {
                print!("{}", hex_dump(&bytes[start..start + consumed]));
            }
        }
        index += 1;
    }

    println!("---");
    println!(
        "{index} message{}, {} bytes",
        if index == 1 { "" } else { "s" },
        bytes.len()
    );
    Ok(())
}

/// Header line, type summary, and object tree for one message.
fn describe(index: usize, start: usize, len: usize, message: &Message) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Message {index}: bytes {start}..{} ({len} bytes), {} objects",
        start + len,
        message.graph.len()
    );

    let mut types: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (_, object) in message.graph.iter() {
        if let Object::Instance(instance) = object {
            types.entry(&*instance.type_name).or_insert_with(|| {
                instance.fields.iter().map(|(name, _)| &**name).collect()
            });
        }
    }
    for (name, fields) in &types {
        let _ = writeln!(out, "  Type {name} {{ {} }}", fields.join(", "));
    }

    let mut tree = Tree {
        message,
        out,
        seen: HashSet::new(),
    };
    tree.node(message.root, 1, "");
    tree.out
}

// ── Object tree ───────────────────────────────────────────────────────────────

struct Tree<'m> {
    message: &'m Message,
    out: String,
    seen: HashSet<ObjectId>,
}

impl Tree<'_> {
    fn node(&mut self, id: ObjectId, depth: usize, label: &str) {
        let indent = "  ".repeat(depth);
        if !self.seen.insert(id) {
            let _ = writeln!(self.out, "{indent}{label}→ {id}");
            return;
        }
        let message = self.message;
        let Some(object) = message.graph.get(id) else {
            let _ = writeln!(self.out, "{indent}{label}{id} <dangling>");
            return;
        };
        let _ = writeln!(self.out, "{indent}{label}{id} {}", summary(object));

        match object {
            Object::List(items) | Object::Tuple(items) | Object::Set(items) => {
                for &item in items {
                    self.node(item, depth + 1, "");
                }
            }
            Object::Map(entries) => {
                for &(key, value) in entries {
                    self.node(key, depth + 1, "key: ");
                    self.node(value, depth + 1, "value: ");
                }
            }
            Object::Instance(instance) => {
                for (name, value) in &instance.fields {
                    self.node(*value, depth + 1, &format!(".{name} = "));
                }
            }
            _ => {}
        }
    }
}

/// One-line rendering of a node without its children.
fn summary(object: &Object) -> String {
    match object {
        Object::Null => "null".to_string(),
        Object::Bool(b) => format!("bool {b}"),
        Object::Integer(i) => format!("integer {i}"),
        Object::Float(f) => format!("float {f}"),
        Object::Decimal(d) => format!("decimal {d}"),
        Object::String(s) => {
            let truncated: String = s.chars().take(60).collect();
            let ellipsis = if s.chars().count() > 60 { "…" } else { "" };
            format!("string {truncated:?}{ellipsis}")
        }
        Object::Bytes(b) => format!("bytes ({} bytes)", b.len()),
        Object::DateTime(dt) => format!("datetime {dt}"),
        Object::ZonedDateTime(dt) => format!("datetime {} [{}]", dt.local(), dt.zone()),
        Object::List(items) => format!("list[{}]", items.len()),
        Object::Tuple(items) => format!("tuple[{}]", items.len()),
        Object::Set(items) => format!("set[{}]", items.len()),
        Object::Map(entries) => format!("map[{}]", entries.len()),
        Object::Instance(instance) => instance.type_name.to_string(),
        Object::Native(native) => format!("native {}", native.type_name()),
    }
}

/// Sixteen bytes per line: offset, hex, and printable ASCII.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::from("  Hex dump:\n");
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offset = i * 16;
        let hex: String = chunk
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, "    {offset:04x}  {hex:<47}  {ascii}");
    }
    out
}

#[cfg(test)]
mod tests {
    use msgstream_types::{Graph, Instance};

    use super::*;

    #[test]
    fn shared_nodes_print_once() {
        let mut graph = Graph::new();
        let x = graph.integer(1);
        let y = graph.integer(2);
        let point = graph.instance(Instance::new("Point").with_field("x", x).with_field("y", y));
        let root = graph.list([point, point]);
        let text = describe(0, 0, 20, &Message::new(graph, root));

        assert!(text.contains("Type Point { x, y }"));
        assert!(text.contains(".x = #0 integer 1"));
        assert_eq!(text.matches("#2 Point").count(), 1);
        assert!(text.contains("→ #2"));
    }

    #[test]
    fn hex_dump_shows_ascii() {
        let dump = hex_dump(&[0x14, b'x', 0x00]);
        assert!(dump.contains("14 78 00"));
        assert!(dump.contains(".x."));
    }
}
