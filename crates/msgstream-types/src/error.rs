use msgstream_wire::{ControlCode, WireError};

use crate::shape::Shape;

/// Errors raised while interpreting a message's grammar.
///
/// These sit one level above [`WireError`]: the bytes decoded into valid
/// codes and varints, but the sequence of instructions is not a legal
/// message. A `ProtocolError` wraps the underlying `WireError` when the
/// failure started in a byte-level codec.
///
/// # Error hierarchy
///
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │ ProtocolError (this crate)                               │
/// │   ├── Wire                 ← varint, EOF, UTF-8, decimal │
/// │   ├── framing              ← terminator placement        │
/// │   ├── references           ← anchors, forward refs       │
/// │   ├── types                ← TYPE_DEF, INSTANCE, SKIP    │
/// │   └── limits               ← depth, container length     │
/// └──────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  /// A byte-level codec failed.
  #[error(transparent)]
  Wire(#[from] WireError),

  // ── Framing ─────────────────────────────────────────────────────

  /// `END` appeared where an object was required.
  #[error("unexpected END at offset {offset}")]
  UnexpectedTerminator { offset: usize },

  /// The root object was followed by something other than `END`.
  #[error("expected END at offset {offset}, found {found}")]
  ExpectedTerminator { offset: usize, found: ControlCode },

  /// A code was read as a scalar but carries none.
  #[error("{code} is not a scalar code")]
  NotAScalar { code: ControlCode },

  /// Bytes remained after the terminator of a single-message decode.
  #[error("{extra_bytes} bytes of trailing data after END")]
  TrailingData { extra_bytes: usize },

  // ── References ──────────────────────────────────────────────────

  /// An anchor id was bound twice in one message.
  #[error("anchor id {id} is already bound")]
  AnchorReuse { id: u64 },

  /// `BACK_REF` named an id that is not bound.
  #[error("back reference to unknown anchor id {id}")]
  UnknownAnchor { id: u64 },

  /// A forward reference was never completed before `END`.
  #[error("forward reference {id} was never completed ({count} pending)")]
  DanglingForwardReference { id: u64, count: usize },

  /// `ANCHOR` was followed by a reference, `SKIP`, or `END` instead of
  /// the structural object it is meant to label.
  #[error("ANCHOR {id} at offset {offset} is not followed by a structural object")]
  MisplacedAnchor { id: u64, offset: usize },

  /// `FORWARD_COMPLETE` supplied another unresolved forward reference.
  #[error("FORWARD_COMPLETE {id} resolved to another pending reference")]
  UnresolvedCompletion { id: u64 },

  // ── Types ───────────────────────────────────────────────────────

  /// `TYPE_DEF` reused a name already defined in this message.
  #[error("type {name} is already defined in this message")]
  TypeRedefinition { name: String },

  /// `INSTANCE` named an ordinal with no preceding `TYPE_DEF`.
  #[error("instance of undefined type ordinal {ordinal}")]
  UnknownType { ordinal: u64 },

  /// A `TYPE_DEF` mode byte was neither strict nor flexible.
  #[error("invalid struct mode {value}")]
  InvalidStructMode { value: u64 },

  /// A `TYPE_DEF` field shape was outside the shape table.
  #[error("invalid field shape {value}")]
  InvalidShape { value: u64 },

  /// `SKIP` in a field of a strict type.
  #[error("field {type_name}.{field} skipped but the type is strict")]
  SkipInStrictMode { type_name: String, field: String },

  /// `SKIP` in a flexible field that has no registered default.
  #[error("field {type_name}.{field} skipped but has no default")]
  MissingDefault { type_name: String, field: String },

  /// `SKIP` outside an instance field position.
  #[error("SKIP at offset {offset} outside an instance field")]
  SkipOutsideInstance { offset: usize },

  /// A field value does not match the declared shape.
  #[error("field {type_name}.{field} expects {expected}, found {found}")]
  ShapeMismatch {
    type_name: String,
    field: String,
    expected: Shape,
    found: &'static str,
  },

  // ── Scalars ─────────────────────────────────────────────────────

  /// An `INT_VAR` width is zero or wider than 128 bits.
  #[error("integer width {width} is not in 1..=16")]
  InvalidIntegerWidth { width: u64 },

  /// A `STR_CHAR` lead byte does not start a UTF-8 scalar.
  #[error("invalid STR_CHAR lead byte {byte:#04X} at offset {offset}")]
  InvalidChar { byte: u8, offset: usize },

  /// A `DATETIME` payload is not RFC 3339.
  #[error("invalid datetime {text:?}")]
  InvalidDateTime { text: String },

  /// A `DATETIME_ZONED` payload names a zone missing from the IANA
  /// database.
  #[error("unknown time zone {name:?}")]
  UnknownTimeZone { name: String },

  // ── Limits ──────────────────────────────────────────────────────

  /// Nesting exceeded the configured maximum depth.
  #[error("nesting depth exceeds limit of {limit}")]
  DepthLimitExceeded { limit: usize },

  /// A declared count exceeds the configured container limit.
  #[error("container length {len} exceeds limit of {limit}")]
  LengthLimitExceeded { len: u64, limit: usize },

  /// A declared count is larger than the bytes left in the input.
  #[error("declared length {len} exceeds the {remaining} remaining bytes")]
  LengthOverflow { len: u64, remaining: usize },
}

impl ProtocolError {
  /// `true` when the input ended before the message did.
  ///
  /// A buffered reader can retry once more bytes arrive. A declared
  /// length that overruns the buffer counts, since the missing bytes may
  /// simply not have arrived yet.
  #[must_use]
  pub fn is_truncation(&self) -> bool {
    match self {
      Self::Wire(wire) => wire.is_truncation(),
      Self::LengthOverflow { .. } => true,
      _ => false,
    }
  }
}

/// Errors returned by application decompose and reassemble hooks.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
  /// The native value handed to a decompose hook had the wrong type.
  #[error("native value is not a {expected}")]
  WrongType { expected: &'static str },

  /// A field needed by a reassemble hook is absent or of the wrong kind.
  #[error("field {field} is missing or has the wrong kind")]
  BadField { field: String },

  /// Anything else the hook wants to report.
  #[error("{0}")]
  Other(String),
}
