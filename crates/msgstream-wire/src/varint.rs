use crate::error::WireError;
use crate::io::{ByteSink, ByteSource};

/// Maximum number of bytes a varint can occupy.
pub const MAX_VARINT_BYTES: usize = 8;

/// Largest value representable by a varint (2^60 - 1).
pub const VARINT_MAX: u64 = (1 << 60) - 1;

/// The four varint length classes.
///
/// The class is selected by the leading bits of the first byte; the
/// remaining bits of that byte and every following byte hold the value,
/// most significant bit first.
///
/// ```text
/// ┌──────────────┬───────┬──────────────────────────────────┐
/// │ Leading bits │ Bytes │ Range                            │
/// ├──────────────┼───────┼──────────────────────────────────┤
/// │ 0xxxxxxx     │ 1     │ 0 – 127                          │
/// │ 10xxxxxx     │ 2     │ 128 – 16,383                     │
/// │ 110xxxxx     │ 4     │ 16,384 – 536,870,911             │
/// │ 1110xxxx     │ 8     │ 536,870,912 – 2^60 - 1           │
/// └──────────────┴───────┴──────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarintClass {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl VarintClass {
    /// Total encoded length in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        self as usize
    }

    /// The minimal class able to hold `value`.
    ///
    /// # Errors
    ///
    /// [`WireError::VarintOverflow`] if `value` exceeds [`VARINT_MAX`].
    pub fn for_value(value: u64) -> Result<Self, WireError> {
        match value {
            0..=0x7F => Ok(Self::One),
            0x80..=0x3FFF => Ok(Self::Two),
            0x4000..=0x1FFF_FFFF => Ok(Self::Four),
            0x2000_0000..=VARINT_MAX => Ok(Self::Eight),
            _ => Err(WireError::VarintOverflow {
                value: u128::from(value),
            }),
        }
    }

    /// Decode the class from the leading byte, or `None` for `1111xxxx`.
    #[must_use]
    pub fn from_lead(byte: u8) -> Option<Self> {
        match byte.leading_ones() {
            0 => Some(Self::One),
            1 => Some(Self::Two),
            2 => Some(Self::Four),
            3 => Some(Self::Eight),
            _ => None,
        }
    }

    fn prefix(self) -> u8 {
        match self {
            Self::One => 0x00,
            Self::Two => 0x80,
            Self::Four => 0xC0,
            Self::Eight => 0xE0,
        }
    }

    fn payload_mask(self) -> u8 {
        match self {
            Self::One => 0x7F,
            Self::Two => 0x3F,
            Self::Four => 0x1F,
            Self::Eight => 0x0F,
        }
    }
}

/// Encoded length of `value` in bytes.
///
/// Values above [`VARINT_MAX`] report [`MAX_VARINT_BYTES`]; encoding them
/// fails.
#[must_use]
pub fn varint_len(value: u64) -> usize {
    VarintClass::for_value(value).map_or(MAX_VARINT_BYTES, VarintClass::len)
}

/// Encode `value` using its minimal length class.
///
/// # Returns
///
/// The number of bytes written (1, 2, 4 or 8).
///
/// # Errors
///
/// [`WireError::VarintOverflow`] if `value` exceeds [`VARINT_MAX`].
///
/// # Panics
///
/// Panics if `buf` is shorter than the required encoding length.
/// An 8-byte buffer is always sufficient.
///
/// # Wire format examples
///
/// | Value       | Encoded bytes                 | Length |
/// |-------------|-------------------------------|--------|
/// | 0           | `[0x00]`                      | 1      |
/// | 127         | `[0x7F]`                      | 1      |
/// | 128         | `[0x80, 0x80]`                | 2      |
/// | 300         | `[0x81, 0x2C]`                | 2      |
/// | 16383       | `[0xBF, 0xFF]`                | 2      |
/// | 16384       | `[0xC0, 0x00, 0x40, 0x00]`    | 4      |
pub fn encode_varint(value: u64, buf: &mut [u8]) -> Result<usize, WireError> {
    let class = VarintClass::for_value(value)?;
    Ok(write_class(value, class, buf))
}

/// Encode `value` in an explicitly chosen length class.
///
/// Encoders must always emit the minimal class, so any other choice is
/// rejected rather than written.
///
/// # Errors
///
/// - [`WireError::VarintOverflow`] if `value` exceeds [`VARINT_MAX`].
/// - [`WireError::VarintClassTooSmall`] if `class` cannot hold `value`.
/// - [`WireError::NonMinimalVarint`] if a narrower class would do.
pub fn encode_varint_in(
    value: u64,
    class: VarintClass,
    buf: &mut [u8],
) -> Result<usize, WireError> {
    let minimal = VarintClass::for_value(value)?;
    if class < minimal {
        return Err(WireError::VarintClassTooSmall {
            value,
            len: class.len(),
        });
    }
    if class > minimal {
        return Err(WireError::NonMinimalVarint {
            value,
            len: class.len(),
            minimal: minimal.len(),
        });
    }
    Ok(write_class(value, class, buf))
}

fn write_class(value: u64, class: VarintClass, buf: &mut [u8]) -> usize {
    let len = class.len();
    let bytes = value.to_be_bytes();
    buf[..len].copy_from_slice(&bytes[MAX_VARINT_BYTES - len..]);
    buf[0] |= class.prefix();
    len
}

/// Write `value` to a [`ByteSink`] using its minimal length class.
///
/// # Errors
///
/// [`WireError::VarintOverflow`] if `value` exceeds [`VARINT_MAX`], or any
/// error from the sink.
pub fn write_varint<W: ByteSink + ?Sized>(sink: &mut W, value: u64) -> Result<usize, WireError> {
    let mut scratch = [0u8; MAX_VARINT_BYTES];
    let len = encode_varint(value, &mut scratch)?;
    sink.write_all(&scratch[..len])?;
    Ok(len)
}

/// Decode a varint from the front of `buf`.
///
/// Any length class covering the value is accepted.
///
/// # Returns
///
/// `(decoded_value, bytes_consumed)` on success.
///
/// # Errors
///
/// - [`WireError::UnexpectedEof`] if the slice ends mid-varint.
/// - [`WireError::InvalidVarintPrefix`] if the leading byte is `1111xxxx`.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let &lead = buf.first().ok_or(WireError::UnexpectedEof { offset: 0 })?;
    let class = VarintClass::from_lead(lead)
        .ok_or(WireError::InvalidVarintPrefix { byte: lead, offset: 0 })?;
    let len = class.len();
    let bytes = buf
        .get(..len)
        .ok_or(WireError::UnexpectedEof { offset: buf.len() })?;

    let mut value = u64::from(lead & class.payload_mask());
    for &byte in &bytes[1..] {
        value = (value << 8) | u64::from(byte);
    }
    Ok((value, len))
}

/// Like [`decode_varint`], but rejects non-minimal encodings.
///
/// # Errors
///
/// All errors from [`decode_varint`], plus [`WireError::NonMinimalVarint`].
pub fn decode_varint_strict(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let (value, len) = decode_varint(buf)?;
    check_minimal(value, len)?;
    Ok((value, len))
}

/// Read one varint from a [`ByteSource`].
///
/// Offsets in returned errors are absolute source positions.
///
/// # Errors
///
/// Same as [`decode_varint`], and [`WireError::NonMinimalVarint`] when
/// `strict` is set.
pub fn read_varint<S: ByteSource + ?Sized>(source: &mut S, strict: bool) -> Result<u64, WireError> {
    let offset = source.position();
    let lead = source.read_byte()?;
    let class = VarintClass::from_lead(lead)
        .ok_or(WireError::InvalidVarintPrefix { byte: lead, offset })?;

    let mut rest = [0u8; MAX_VARINT_BYTES - 1];
    let tail = &mut rest[..class.len() - 1];
    source.read_exact(tail)?;

    let mut value = u64::from(lead & class.payload_mask());
    for &byte in tail.iter() {
        value = (value << 8) | u64::from(byte);
    }
    if strict {
        check_minimal(value, class.len())?;
    }
    Ok(value)
}

fn check_minimal(value: u64, len: usize) -> Result<(), WireError> {
    let minimal = varint_len(value);
    if len == minimal {
        Ok(())
    } else {
        Err(WireError::NonMinimalVarint { value, len, minimal })
    }
}
