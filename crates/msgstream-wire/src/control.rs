use std::fmt;

use crate::error::WireError;
use crate::io::{ByteSink, ByteSource};
use crate::varint::read_varint;

/// Control codes: the leading tag of every wire element.
///
/// Codes are written as varints, but every assigned code fits in one
/// byte. Out-of-band codes (1–8) and structural codes (10–31) share the
/// same number space; the decoder tells them apart by class, not by
/// position.
///
/// ```text
/// ┌──────┬──────────────────┬─────────────┬──────────────────────────────────┐
/// │ Code │ Name             │ Class       │ Payload                          │
/// ├──────┼──────────────────┼─────────────┼──────────────────────────────────┤
/// │ 0    │ END              │ terminator  │ —                                │
/// │ 1    │ TYPE_DEF         │ out-of-band │ name, mode, fields               │
/// │ 2    │ ANCHOR           │ out-of-band │ id, then the anchored object     │
/// │ 3    │ ANCHORLESS_ON    │ out-of-band │ —                                │
/// │ 4    │ ANCHORLESS_OFF   │ out-of-band │ —                                │
/// │ 5    │ BACK_REF         │ out-of-band │ id                               │
/// │ 6    │ FORWARD_REF      │ out-of-band │ id                               │
/// │ 7    │ FORWARD_COMPLETE │ out-of-band │ id, then the completing object   │
/// │ 8    │ SKIP             │ out-of-band │ —                                │
/// │ 10   │ NULL             │ structural  │ —                                │
/// │ 11   │ FALSE            │ structural  │ —                                │
/// │ 12   │ TRUE             │ structural  │ —                                │
/// │ 13   │ INT8             │ structural  │ 1 byte two's complement          │
/// │ 14   │ INT16            │ structural  │ 2 bytes, big-endian              │
/// │ 15   │ INT32            │ structural  │ 4 bytes, big-endian              │
/// │ 16   │ INT64            │ structural  │ 8 bytes, big-endian              │
/// │ 17   │ INT_VAR          │ structural  │ width (varint), width bytes      │
/// │ 18   │ BYTES            │ structural  │ length (varint), raw bytes       │
/// │ 19   │ STR_EMPTY        │ structural  │ —                                │
/// │ 20   │ STR_CHAR         │ structural  │ one UTF-8 scalar                 │
/// │ 21   │ STR              │ structural  │ length (varint), UTF-8 bytes     │
/// │ 22   │ DEC_POS          │ structural  │ packed digit run                 │
/// │ 23   │ DEC_NEG          │ structural  │ packed digit run                 │
/// │ 24   │ FLOAT            │ structural  │ 8 bytes binary64, big-endian     │
/// │ 25   │ DATETIME         │ structural  │ length (varint), RFC 3339 text   │
/// │ 26   │ TUPLE            │ structural  │ count (varint), objects          │
/// │ 27   │ LIST             │ structural  │ count (varint), objects          │
/// │ 28   │ MAP              │ structural  │ count (varint), key/value pairs  │
/// │ 29   │ INSTANCE         │ structural  │ type ordinal (varint), fields    │
/// │ 30   │ SET              │ structural  │ count (varint), objects          │
/// │ 31   │ DATETIME_ZONED   │ structural  │ UTC RFC 3339 text, IANA zone     │
/// └──────┴──────────────────┴─────────────┴──────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    End = 0,
    TypeDef = 1,
    Anchor = 2,
    AnchorlessOn = 3,
    AnchorlessOff = 4,
    BackRef = 5,
    ForwardRef = 6,
    ForwardComplete = 7,
    Skip = 8,
    Null = 10,
    False = 11,
    True = 12,
    Int8 = 13,
    Int16 = 14,
    Int32 = 15,
    Int64 = 16,
    IntVar = 17,
    Bytes = 18,
    StrEmpty = 19,
    StrChar = 20,
    Str = 21,
    DecPos = 22,
    DecNeg = 23,
    Float = 24,
    DateTime = 25,
    Tuple = 26,
    List = 27,
    Map = 28,
    Instance = 29,
    Set = 30,
    DateTimeZoned = 31,
}

/// What a control code means to the dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeClass {
    /// End of message.
    Terminator,
    /// Introduces exactly one grammar-visible object.
    Structural(StructuralKind),
    /// Metadata interleaved with the structural grammar.
    OutOfBand(Instruction),
}

/// Out-of-band instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    TypeDef,
    Anchor,
    AnchorlessOn,
    AnchorlessOff,
    BackRef,
    ForwardRef,
    ForwardComplete,
    Skip,
}

impl Instruction {
    /// `true` for instructions that only have side effects and are
    /// followed by another code at the same grammar position.
    ///
    /// References and `SKIP` stand in for the object at their position.
    #[must_use]
    pub fn is_prefix(self) -> bool {
        matches!(
            self,
            Self::TypeDef
                | Self::Anchor
                | Self::AnchorlessOn
                | Self::AnchorlessOff
                | Self::ForwardComplete
        )
    }
}

/// The object kind a structural code produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructuralKind {
    Null,
    Bool,
    Integer,
    Bytes,
    String,
    Decimal,
    Float,
    DateTime,
    ZonedDateTime,
    Tuple,
    List,
    Set,
    Map,
    Instance,
}

impl ControlCode {
    /// Every assigned code, in wire order.
    pub const ALL: [Self; 31] = [
        Self::End,
        Self::TypeDef,
        Self::Anchor,
        Self::AnchorlessOn,
        Self::AnchorlessOff,
        Self::BackRef,
        Self::ForwardRef,
        Self::ForwardComplete,
        Self::Skip,
        Self::Null,
        Self::False,
        Self::True,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::IntVar,
        Self::Bytes,
        Self::StrEmpty,
        Self::StrChar,
        Self::Str,
        Self::DecPos,
        Self::DecNeg,
        Self::Float,
        Self::DateTime,
        Self::Tuple,
        Self::List,
        Self::Map,
        Self::Instance,
        Self::Set,
        Self::DateTimeZoned,
    ];

    /// Look up a raw code read at `offset`.
    ///
    /// # Errors
    ///
    /// [`WireError::UnknownControlCode`] for 9 and anything above 31.
    pub fn from_wire(code: u64, offset: usize) -> Result<Self, WireError> {
        u8::try_from(code)
            .ok()
            .and_then(|byte| Self::ALL.iter().copied().find(|c| *c as u8 == byte))
            .ok_or(WireError::UnknownControlCode { code, offset })
    }

    #[must_use]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Read and classify the next code from `source`.
    ///
    /// # Errors
    ///
    /// Varint errors, or [`WireError::UnknownControlCode`].
    pub fn read<S: ByteSource + ?Sized>(source: &mut S, strict: bool) -> Result<Self, WireError> {
        let offset = source.position();
        let raw = read_varint(source, strict)?;
        Self::from_wire(raw, offset)
    }

    /// Write this code to `sink`.
    ///
    /// # Errors
    ///
    /// Any error from the sink.
    pub fn write<W: ByteSink + ?Sized>(self, sink: &mut W) -> Result<(), WireError> {
        // Every assigned code is below 0x80, so the varint is the byte itself.
        sink.write_byte(self.to_wire())
    }

    #[must_use]
    pub fn class(self) -> CodeClass {
        use StructuralKind as K;
        match self {
            Self::End => CodeClass::Terminator,
            Self::TypeDef => CodeClass::OutOfBand(Instruction::TypeDef),
            Self::Anchor => CodeClass::OutOfBand(Instruction::Anchor),
            Self::AnchorlessOn => CodeClass::OutOfBand(Instruction::AnchorlessOn),
            Self::AnchorlessOff => CodeClass::OutOfBand(Instruction::AnchorlessOff),
            Self::BackRef => CodeClass::OutOfBand(Instruction::BackRef),
            Self::ForwardRef => CodeClass::OutOfBand(Instruction::ForwardRef),
            Self::ForwardComplete => CodeClass::OutOfBand(Instruction::ForwardComplete),
            Self::Skip => CodeClass::OutOfBand(Instruction::Skip),
            Self::Null => CodeClass::Structural(K::Null),
            Self::False | Self::True => CodeClass::Structural(K::Bool),
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::IntVar => {
                CodeClass::Structural(K::Integer)
            }
            Self::Bytes => CodeClass::Structural(K::Bytes),
            Self::StrEmpty | Self::StrChar | Self::Str => CodeClass::Structural(K::String),
            Self::DecPos | Self::DecNeg => CodeClass::Structural(K::Decimal),
            Self::Float => CodeClass::Structural(K::Float),
            Self::DateTime => CodeClass::Structural(K::DateTime),
            Self::Tuple => CodeClass::Structural(K::Tuple),
            Self::List => CodeClass::Structural(K::List),
            Self::Map => CodeClass::Structural(K::Map),
            Self::Instance => CodeClass::Structural(K::Instance),
            Self::Set => CodeClass::Structural(K::Set),
            Self::DateTimeZoned => CodeClass::Structural(K::ZonedDateTime),
        }
    }

    /// Upper-case mnemonic used in docs and diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::End => "END",
            Self::TypeDef => "TYPE_DEF",
            Self::Anchor => "ANCHOR",
            Self::AnchorlessOn => "ANCHORLESS_ON",
            Self::AnchorlessOff => "ANCHORLESS_OFF",
            Self::BackRef => "BACK_REF",
            Self::ForwardRef => "FORWARD_REF",
            Self::ForwardComplete => "FORWARD_COMPLETE",
            Self::Skip => "SKIP",
            Self::Null => "NULL",
            Self::False => "FALSE",
            Self::True => "TRUE",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::IntVar => "INT_VAR",
            Self::Bytes => "BYTES",
            Self::StrEmpty => "STR_EMPTY",
            Self::StrChar => "STR_CHAR",
            Self::Str => "STR",
            Self::DecPos => "DEC_POS",
            Self::DecNeg => "DEC_NEG",
            Self::Float => "FLOAT",
            Self::DateTime => "DATETIME",
            Self::Tuple => "TUPLE",
            Self::List => "LIST",
            Self::Map => "MAP",
            Self::Instance => "INSTANCE",
            Self::Set => "SET",
            Self::DateTimeZoned => "DATETIME_ZONED",
        }
    }

    /// Render the code table as a GitHub markdown table.
    ///
    /// # Errors
    ///
    /// Any error from the writer.
    pub fn document(out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "| Code | Name | Class |")?;
        writeln!(out, "|-----:|------|-------|")?;
        for code in Self::ALL {
            let class = match code.class() {
                CodeClass::Terminator => "terminator".to_owned(),
                CodeClass::Structural(kind) => format!("structural ({kind:?})"),
                CodeClass::OutOfBand(_) => "out-of-band".to_owned(),
            };
            writeln!(out, "| {} | {} | {class} |", code.to_wire(), code.name())?;
        }
        Ok(())
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
