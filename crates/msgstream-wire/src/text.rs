use crate::error::WireError;
use crate::io::{ByteSink, ByteSource};
use crate::varint::{read_varint, write_varint};

/// Check that `bytes` is a legal string payload (UTF-8, no NUL).
///
/// `offset` is the source position of `bytes[0]`, used for diagnostics.
///
/// # Errors
///
/// [`WireError::InvalidUtf8`] or [`WireError::EmbeddedNul`].
pub fn validate_text(bytes: &[u8], offset: usize) -> Result<&str, WireError> {
    if let Some(at) = bytes.iter().position(|&b| b == 0) {
        return Err(WireError::EmbeddedNul { offset: offset + at });
    }
    std::str::from_utf8(bytes).map_err(|e| WireError::InvalidUtf8 {
        offset: offset + e.valid_up_to(),
    })
}

/// Write a length-prefixed string payload.
///
/// Wire layout:
/// ```text
///   byte_len (varint) │ UTF-8 bytes [byte_len]
/// ```
///
/// # Errors
///
/// [`WireError::EmbeddedNul`] if `text` contains `\0`; sink errors.
pub fn write_text<W: ByteSink + ?Sized>(sink: &mut W, text: &str) -> Result<(), WireError> {
    if let Some(at) = text.bytes().position(|b| b == 0) {
        return Err(WireError::EmbeddedNul { offset: at });
    }
    write_varint(sink, text.len() as u64)?;
    sink.write_all(text.as_bytes())
}

/// Read a length-prefixed string payload.
///
/// # Errors
///
/// Varint and EOF errors, [`WireError::InvalidUtf8`],
/// [`WireError::EmbeddedNul`].
pub fn read_text<S: ByteSource + ?Sized>(source: &mut S, strict: bool) -> Result<String, WireError> {
    let len = read_varint(source, strict)?;
    let len = usize::try_from(len).map_err(|_| WireError::UnexpectedEof {
        offset: source.position(),
    })?;
    let offset = source.position();
    let bytes = source.read_vec(len)?;
    validate_text(&bytes, offset)?;
    // Validated above.
    String::from_utf8(bytes).map_err(|e| WireError::InvalidUtf8 {
        offset: offset + e.utf8_error().valid_up_to(),
    })
}

/// Width in bytes of the UTF-8 scalar introduced by `lead`.
///
/// Returns `None` for continuation bytes and invalid leads.
#[must_use]
pub fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}
