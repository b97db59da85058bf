use log::trace;
use msgstream_types::{TypeDefinition, ZonedDateTime};
use msgstream_wire::text::write_text;
use msgstream_wire::varint::write_varint;
use msgstream_wire::{ByteSink, ControlCode, Decimal, WireError};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::EncodeError;

/// Low-level control-code emitter.
///
/// `MessageWriter` writes one wire element per call and keeps no
/// knowledge of message structure: it will happily write a list header
/// with no items after it. [`Encoder`](crate::Encoder) drives it from an
/// object graph; producers that need forward references or a hand-built
/// stream call it directly.
///
/// ```text
///   writer.anchor(0)            ANCHOR 0
///   writer.list(2)              LIST 2
///   writer.back_ref(0)            BACK_REF 0
///   writer.forward_ref(1)         FORWARD_REF 1
///   writer.complete_forward(1)  FORWARD_COMPLETE 1
///   writer.string("late")         STR "late"
///   writer.end()                END
/// ```
pub struct MessageWriter<W> {
    sink: Counted<W>,
}

/// Sink adapter that counts bytes written.
struct Counted<W> {
    inner: W,
    count: usize,
}

impl<W: ByteSink> ByteSink for Counted<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.inner.write_all(bytes)?;
        self.count += bytes.len();
        Ok(())
    }
}

impl<W: ByteSink> MessageWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Counted { inner: sink, count: 0 },
        }
    }

    /// Total bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.sink.count
    }

    /// Consume the writer and return the sink.
    pub fn into_inner(self) -> W {
        self.sink.inner
    }

    fn code(&mut self, code: ControlCode) -> Result<(), EncodeError> {
        trace!("emit {code} at byte {}", self.sink.count);
        code.write(&mut self.sink)?;
        Ok(())
    }

    fn varint(&mut self, value: u64) -> Result<(), EncodeError> {
        write_varint(&mut self.sink, value)?;
        Ok(())
    }

    // ── Out-of-band ─────────────────────────────────────────────────

    /// `END`.
    ///
    /// # Errors
    ///
    /// Sink errors.
    pub fn end(&mut self) -> Result<(), EncodeError> {
        self.code(ControlCode::End)
    }

    /// `TYPE_DEF` with its full payload.
    ///
    /// # Errors
    ///
    /// Sink errors, or a NUL in a type or field name.
    pub fn type_def(&mut self, def: &TypeDefinition) -> Result<(), EncodeError> {
        self.code(ControlCode::TypeDef)?;
        def.write(&mut self.sink)?;
        Ok(())
    }

    /// `ANCHOR id`; the next structural object is bound to `id`.
    ///
    /// # Errors
    ///
    /// Sink errors, or `id` beyond the varint range.
    pub fn anchor(&mut self, id: u64) -> Result<(), EncodeError> {
        self.code(ControlCode::Anchor)?;
        self.varint(id)
    }

    /// `ANCHORLESS_ON` or `ANCHORLESS_OFF`.
    ///
    /// # Errors
    ///
    /// Sink errors.
    pub fn anchorless(&mut self, on: bool) -> Result<(), EncodeError> {
        self.code(if on {
            ControlCode::AnchorlessOn
        } else {
            ControlCode::AnchorlessOff
        })
    }

    /// `BACK_REF id`.
    ///
    /// # Errors
    ///
    /// Sink errors, or `id` beyond the varint range.
    pub fn back_ref(&mut self, id: u64) -> Result<(), EncodeError> {
        self.code(ControlCode::BackRef)?;
        self.varint(id)
    }

    /// `FORWARD_REF id`; `id` must be completed or anchored before `END`.
    ///
    /// # Errors
    ///
    /// Sink errors, or `id` beyond the varint range.
    pub fn forward_ref(&mut self, id: u64) -> Result<(), EncodeError> {
        self.code(ControlCode::ForwardRef)?;
        self.varint(id)
    }

    /// `FORWARD_COMPLETE id`; the caller writes the completing object
    /// next.
    ///
    /// # Errors
    ///
    /// Sink errors, or `id` beyond the varint range.
    pub fn complete_forward(&mut self, id: u64) -> Result<(), EncodeError> {
        self.code(ControlCode::ForwardComplete)?;
        self.varint(id)
    }

    /// `SKIP`, valid only in a field of a flexible instance.
    ///
    /// # Errors
    ///
    /// Sink errors.
    pub fn skip(&mut self) -> Result<(), EncodeError> {
        self.code(ControlCode::Skip)
    }

    // ── Scalars ─────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Sink errors.
    pub fn null(&mut self) -> Result<(), EncodeError> {
        self.code(ControlCode::Null)
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.code(if value {
            ControlCode::True
        } else {
            ControlCode::False
        })
    }

    /// Integer in the smallest fixed width that holds it, or `INT_VAR`
    /// with the minimal two's complement byte count.
    ///
    /// # Errors
    ///
    /// Sink errors.
    pub fn integer(&mut self, value: i128) -> Result<(), EncodeError> {
        if let Ok(v) = i8::try_from(value) {
            self.code(ControlCode::Int8)?;
            self.sink.write_all(&v.to_be_bytes())?;
        } else if let Ok(v) = i16::try_from(value) {
            self.code(ControlCode::Int16)?;
            self.sink.write_all(&v.to_be_bytes())?;
        } else if let Ok(v) = i32::try_from(value) {
            self.code(ControlCode::Int32)?;
            self.sink.write_all(&v.to_be_bytes())?;
        } else if let Ok(v) = i64::try_from(value) {
            self.code(ControlCode::Int64)?;
            self.sink.write_all(&v.to_be_bytes())?;
        } else {
            let bytes = minimal_twos_complement(value);
            self.code(ControlCode::IntVar)?;
            self.varint(bytes.len() as u64)?;
            self.sink.write_all(&bytes)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn float(&mut self, value: f64) -> Result<(), EncodeError> {
        self.code(ControlCode::Float)?;
        self.sink.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn decimal(&mut self, value: &Decimal) -> Result<(), EncodeError> {
        self.code(if value.is_negative() {
            ControlCode::DecNeg
        } else {
            ControlCode::DecPos
        })?;
        value.write_body(&mut self.sink)?;
        Ok(())
    }

    /// String in the shortest of `STR_EMPTY`, `STR_CHAR`, or `STR`.
    ///
    /// # Errors
    ///
    /// [`WireError::EmbeddedNul`] if `value` contains `\0`; sink errors.
    pub fn string(&mut self, value: &str) -> Result<(), EncodeError> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (None, _) => self.code(ControlCode::StrEmpty),
            (Some('\0'), None) => Err(WireError::EmbeddedNul { offset: 0 }.into()),
            (Some(_), None) => {
                self.code(ControlCode::StrChar)?;
                self.sink.write_all(value.as_bytes())?;
                Ok(())
            }
            (Some(_), Some(_)) => {
                if let Some(at) = value.bytes().position(|b| b == 0) {
                    return Err(WireError::EmbeddedNul { offset: at }.into());
                }
                self.code(ControlCode::Str)?;
                write_text(&mut self.sink, value)?;
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn bytes(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        self.code(ControlCode::Bytes)?;
        self.varint(value.len() as u64)?;
        self.sink.write_all(value)?;
        Ok(())
    }

    /// `DATETIME` as RFC 3339 text.
    ///
    /// # Errors
    ///
    /// [`EncodeError::DateTime`] for values RFC 3339 cannot express
    /// (years outside 0000–9999, sub-minute offsets); sink errors.
    pub fn datetime(&mut self, value: &OffsetDateTime) -> Result<(), EncodeError> {
        let text = value.format(&Rfc3339)?;
        self.code(ControlCode::DateTime)?;
        write_text(&mut self.sink, &text)?;
        Ok(())
    }

    /// `DATETIME_ZONED`: the instant as UTC RFC 3339 text, then the zone
    /// name.
    ///
    /// # Errors
    ///
    /// As [`datetime`](Self::datetime).
    pub fn zoned_datetime(&mut self, value: &ZonedDateTime) -> Result<(), EncodeError> {
        let text = value.utc().format(&Rfc3339)?;
        self.code(ControlCode::DateTimeZoned)?;
        write_text(&mut self.sink, &text)?;
        write_text(&mut self.sink, value.zone())?;
        Ok(())
    }

    // ── Containers ──────────────────────────────────────────────────
    //
    // Each header is followed by exactly `count` objects (two per entry
    // for maps, one per declared field for instances).

    /// # Errors
    ///
    /// Sink errors.
    pub fn list(&mut self, count: usize) -> Result<(), EncodeError> {
        self.code(ControlCode::List)?;
        self.varint(count as u64)
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn tuple(&mut self, count: usize) -> Result<(), EncodeError> {
        self.code(ControlCode::Tuple)?;
        self.varint(count as u64)
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn set(&mut self, count: usize) -> Result<(), EncodeError> {
        self.code(ControlCode::Set)?;
        self.varint(count as u64)
    }

    /// # Errors
    ///
    /// Sink errors.
    pub fn map(&mut self, count: usize) -> Result<(), EncodeError> {
        self.code(ControlCode::Map)?;
        self.varint(count as u64)
    }

    /// `INSTANCE ordinal`; the caller writes one object or `SKIP` per
    /// declared field.
    ///
    /// # Errors
    ///
    /// Sink errors.
    pub fn instance(&mut self, ordinal: u64) -> Result<(), EncodeError> {
        self.code(ControlCode::Instance)?;
        self.varint(ordinal)
    }
}

/// Shortest big-endian two's complement form of `value`.
pub(crate) fn minimal_twos_complement(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // A leading 0x00 (or 0xFF) byte is redundant when the next byte
    // already carries the same sign bit.
    while start < bytes.len() - 1 {
        let (lead, next) = (bytes[start], bytes[start + 1]);
        let redundant = (lead == 0x00 && next & 0x80 == 0) || (lead == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgstream_types::{FieldDef, Shape, StructMode};

    fn written(f: impl FnOnce(&mut MessageWriter<Vec<u8>>) -> Result<(), EncodeError>) -> Vec<u8> {
        let mut writer = MessageWriter::new(Vec::new());
        f(&mut writer).unwrap();
        writer.into_inner()
    }

    // ── Integers ────────────────────────────────────────────────────

    #[test]
    fn integer_picks_smallest_width() {
        assert_eq!(written(|w| w.integer(1)), [0x0D, 0x01]);
        assert_eq!(written(|w| w.integer(-1)), [0x0D, 0xFF]);
        assert_eq!(written(|w| w.integer(127)), [0x0D, 0x7F]);
        assert_eq!(written(|w| w.integer(128)), [0x0E, 0x00, 0x80]);
        assert_eq!(written(|w| w.integer(-32768)), [0x0E, 0x80, 0x00]);
        assert_eq!(written(|w| w.integer(70_000)), [0x0F, 0x00, 0x01, 0x11, 0x70]);
        assert_eq!(
            written(|w| w.integer(i128::from(i64::MIN))),
            [0x10, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn wide_integer_uses_int_var() {
        let value = i128::from(i64::MAX) + 1;
        assert_eq!(
            written(|w| w.integer(value)),
            [0x11, 0x09, 0x00, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
        let bytes = written(|w| w.integer(i128::MIN));
        assert_eq!(bytes[..2], [0x11, 0x10]);
        assert_eq!(bytes.len(), 18);
    }

    #[test]
    fn twos_complement_is_minimal() {
        assert_eq!(minimal_twos_complement(0), [0x00]);
        assert_eq!(minimal_twos_complement(-1), [0xFF]);
        assert_eq!(minimal_twos_complement(255), [0x00, 0xFF]);
        assert_eq!(minimal_twos_complement(-129), [0xFF, 0x7F]);
    }

    // ── Strings ─────────────────────────────────────────────────────

    #[test]
    fn string_code_family() {
        assert_eq!(written(|w| w.string("")), [0x13]);
        assert_eq!(written(|w| w.string("x")), [0x14, b'x']);
        assert_eq!(written(|w| w.string("é")), [0x14, 0xC3, 0xA9]);
        assert_eq!(written(|w| w.string("hi")), [0x15, 0x02, b'h', b'i']);
    }

    #[test]
    fn string_with_nul_rejected() {
        let mut writer = MessageWriter::new(Vec::new());
        assert!(matches!(
            writer.string("\0"),
            Err(EncodeError::Wire(WireError::EmbeddedNul { .. }))
        ));
        assert!(matches!(
            writer.string("a\0"),
            Err(EncodeError::Wire(WireError::EmbeddedNul { offset: 1 }))
        ));
        assert_eq!(writer.bytes_written(), 0);
    }

    // ── Other scalars ───────────────────────────────────────────────

    #[test]
    fn float_is_big_endian_binary64() {
        assert_eq!(
            written(|w| w.float(1.5)),
            [0x18, 0x3F, 0xF8, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn decimal_sign_selects_code() {
        let neg: Decimal = "-1.5".parse().unwrap();
        assert_eq!(written(|w| w.decimal(&neg)), [0x17, 0x03, 0x1A, 0x5F]);
        let pos: Decimal = "12".parse().unwrap();
        assert_eq!(written(|w| w.decimal(&pos)), [0x16, 0x02, 0x12]);
    }

    #[test]
    fn datetime_as_rfc3339() {
        let dt = time::macros::datetime!(2024-01-02 03:04:05 UTC);
        let bytes = written(|w| w.datetime(&dt));
        assert_eq!(bytes[0], 0x19);
        assert_eq!(&bytes[2..], b"2024-01-02T03:04:05Z");
        assert_eq!(usize::from(bytes[1]), bytes.len() - 2);
    }

    #[test]
    fn zoned_datetime_writes_utc_then_zone() {
        let dt = time::macros::datetime!(2024-07-01 14:00 +02:00);
        let zoned = ZonedDateTime::new(dt, "Europe/Paris").unwrap();
        let bytes = written(|w| w.zoned_datetime(&zoned));
        let mut expected = vec![0x1F, 20];
        expected.extend_from_slice(b"2024-07-01T12:00:00Z");
        expected.push(12);
        expected.extend_from_slice(b"Europe/Paris");
        assert_eq!(bytes, expected);
    }

    // ── Out-of-band ─────────────────────────────────────────────────

    #[test]
    fn reference_instructions() {
        let bytes = written(|w| {
            w.anchor(0)?;
            w.list(2)?;
            w.back_ref(0)?;
            w.forward_ref(1)?;
            w.complete_forward(1)?;
            w.null()?;
            w.end()
        });
        assert_eq!(bytes, [0x02, 0x00, 0x1B, 0x02, 0x05, 0x00, 0x06, 0x01, 0x07, 0x01, 0x0A, 0x00]);
    }

    #[test]
    fn type_def_then_instance() {
        let def = TypeDefinition {
            name: "P".into(),
            mode: StructMode::Flexible,
            fields: vec![FieldDef {
                name: "x".into(),
                shape: Shape::Integer,
            }],
        };
        let bytes = written(|w| {
            w.type_def(&def)?;
            w.instance(0)?;
            w.skip()
        });
        assert_eq!(
            bytes,
            [0x01, 0x01, b'P', 0x01, 0x01, 0x01, b'x', 0x03, 0x1D, 0x00, 0x08]
        );
    }

    #[test]
    fn bytes_written_counts_everything() {
        let mut writer = MessageWriter::new(Vec::new());
        writer.string("hello").unwrap();
        writer.end().unwrap();
        assert_eq!(writer.bytes_written(), 8);
    }
}
