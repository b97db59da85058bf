use msgstream_types::{HookError, ProtocolError};
use msgstream_wire::WireError;

/// Errors that can occur while decoding a message.
///
/// Any error aborts the whole message: the session that produced it is
/// dropped, and no partially built graph escapes.
///
/// Error hierarchy:
///
/// ```text
///   DecodeError
///   ├── Protocol(ProtocolError)  ← malformed or illegal instruction stream
///   │     └── Wire(WireError)    ← varint, EOF, UTF-8, decimal packing
///   ├── Reassemble               ← an application reassemble hook failed
///   ├── MessageTooLarge          ← streaming buffer passed max_message_len
///   └── Io(std::io::Error)       ← from the underlying reader
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
  /// The byte stream is not a legal message.
  #[error(transparent)]
  Protocol(#[from] ProtocolError),

  /// A reassemble hook rejected a fully decoded instance.
  #[error("reassemble hook for {type_name} failed")]
  Reassemble {
    type_name: String,
    #[source]
    source: HookError,
  },

  /// A message grew past [`DecoderConfig::max_message_len`](crate::DecoderConfig)
  /// without reaching `END`.
  #[error("message exceeds {limit} bytes without END")]
  MessageTooLarge { limit: usize },

  /// An I/O error from the underlying reader.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl From<WireError> for DecodeError {
  fn from(err: WireError) -> Self {
    Self::Protocol(ProtocolError::Wire(err))
  }
}

impl DecodeError {
  /// `true` when the input ended before the message did.
  #[must_use]
  pub fn is_truncation(&self) -> bool {
    matches!(self, Self::Protocol(err) if err.is_truncation())
  }
}
