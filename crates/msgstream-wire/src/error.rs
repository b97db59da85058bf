/// Errors raised by the byte-level codecs.
///
/// Everything in this enum is detected without any knowledge of message
/// structure: a bad varint prefix, a truncated read, a decimal whose
/// nibbles do not spell a number, and so on. Higher layers wrap it
/// transparently inside their own protocol error.
///
/// ```text
///   WireError
///   ├── UnexpectedEof         ← input ended mid-value
///   ├── InvalidVarintPrefix   ← leading byte 0b1111_xxxx
///   ├── VarintOverflow        ← value ≥ 2^60
///   ├── NonMinimalVarint      ← wider length class than needed
///   ├── VarintClassTooSmall   ← explicit class cannot hold value
///   ├── UnknownControlCode    ← code not in the table
///   ├── MalformedDecimal      ← bad digit packing
///   ├── InvalidUtf8           ← string payload not UTF-8
///   ├── EmbeddedNul           ← string payload contains 0x00
///   └── Io(std::io::Error)    ← from a std::io adapter
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before a complete value could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// The leading byte of a varint selects no length class.
    #[error("invalid varint prefix {byte:#04X} at offset {offset}")]
    InvalidVarintPrefix { byte: u8, offset: usize },

    /// The value does not fit in 60 bits.
    #[error("varint overflow: {value} exceeds 2^60 - 1")]
    VarintOverflow { value: u128 },

    /// A value was written (or, in strict mode, read) using a wider
    /// length class than its minimal one.
    #[error("non-minimal varint: {value} encoded in {len} bytes, minimal is {minimal}")]
    NonMinimalVarint { value: u64, len: usize, minimal: usize },

    /// An explicit length class is too narrow for the value.
    #[error("varint {value} does not fit in {len} bytes")]
    VarintClassTooSmall { value: u64, len: usize },

    /// A control code outside the assigned table.
    #[error("unknown control code {code} at offset {offset}")]
    UnknownControlCode { code: u64, offset: usize },

    /// The packed digit run of a decimal is malformed.
    #[error("malformed decimal: {reason}")]
    MalformedDecimal { reason: &'static str },

    /// A string payload is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A string payload contains a NUL byte.
    #[error("embedded NUL in string at offset {offset}")]
    EmbeddedNul { offset: usize },

    /// I/O error from a `std::io` backed source or sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// `true` when the error only means "more bytes are needed".
    ///
    /// Streaming readers use this to tell an incomplete message apart
    /// from a corrupt one.
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}
