use std::fmt;
use std::str::FromStr;

use crate::error::WireError;
use crate::io::{ByteSink, ByteSource};
use crate::varint::{read_varint, write_varint};

/// Nibble value of the decimal point inside a packed digit run.
const POINT: u8 = 0x0A;

/// Nibble value padding an odd-length run.
const PAD: u8 = 0x0F;

/// Upper bound on zeros an exponent may expand to when parsing text.
const MAX_EXPONENT_ZEROS: usize = 4096;

/// An exact base-10 number.
///
/// The value is `digits × 10^-scale`, with the sign kept separately so
/// negative zero survives a round trip. Digits are stored without leading
/// zeros (a lone `0` is kept), and trailing zeros are significant: `1.5`
/// and `1.50` are different decimals with equal numeric value.
///
/// ```text
///   "-12.340"  →  negative: true, digits: "12340", scale: 3
///   "0.005"    →  negative: false, digits: "5",    scale: 3
///   "1.2e3"    →  negative: false, digits: "1200", scale: 0
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    negative: bool,
    digits: String,
    scale: u32,
}

impl Decimal {
    /// Build a decimal from its parts.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedDecimal`] if `digits` is empty or contains a
    /// non-digit character.
    pub fn from_parts(negative: bool, digits: &str, scale: u32) -> Result<Self, WireError> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WireError::MalformedDecimal {
                reason: "digits must be a non-empty run of 0-9",
            });
        }
        Ok(Self {
            negative,
            digits: strip_leading_zeros(digits).to_owned(),
            scale,
        })
    }

    /// Zero with no fractional digits.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            negative: false,
            digits: "0".to_owned(),
            scale: 0,
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.digits == "0"
    }

    /// Significant digits, most significant first.
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Number of digits after the decimal point.
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// The magnitude as text: `int[.frac]`, no sign, no exponent.
    #[must_use]
    pub fn unsigned_text(&self) -> String {
        let scale = self.scale as usize;
        let len = self.digits.len();
        if scale == 0 {
            self.digits.clone()
        } else if scale < len {
            format!("{}.{}", &self.digits[..len - scale], &self.digits[len - scale..])
        } else {
            format!("0.{}{}", "0".repeat(scale - len), self.digits)
        }
    }

    /// Write the packed digit run (everything after the control code).
    ///
    /// Wire layout:
    /// ```text
    ///   char_count (varint) │ ceil(char_count / 2) bytes of nibble pairs
    /// ```
    /// Nibbles `0x0`–`0x9` are digits, `0xA` is the point, and an odd
    /// count pads the final low nibble with `0xF`.
    ///
    /// # Errors
    ///
    /// Any error from the sink.
    pub fn write_body<W: ByteSink + ?Sized>(&self, sink: &mut W) -> Result<(), WireError> {
        let text = self.unsigned_text();
        write_varint(sink, text.len() as u64)?;

        let symbols: Vec<u8> = text
            .bytes()
            .map(|b| if b == b'.' { POINT } else { b - b'0' })
            .collect();
        let packed: Vec<u8> = symbols
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(PAD))
            .collect();
        sink.write_all(&packed)
    }

    /// Read a packed digit run written by [`write_body`](Self::write_body).
    ///
    /// # Errors
    ///
    /// - [`WireError::MalformedDecimal`] for an empty run, a symbol outside
    ///   `0x0`–`0xA`, bad padding, or a misplaced point.
    /// - [`WireError::UnexpectedEof`] if the run is truncated.
    pub fn read_body<S: ByteSource + ?Sized>(
        source: &mut S,
        negative: bool,
        strict_varints: bool,
    ) -> Result<Self, WireError> {
        let count = read_varint(source, strict_varints)?;
        if count == 0 {
            return Err(WireError::MalformedDecimal {
                reason: "empty digit run",
            });
        }
        let count = usize::try_from(count).map_err(|_| WireError::MalformedDecimal {
            reason: "digit run too long",
        })?;
        let packed = source.read_vec(count.div_ceil(2))?;

        let mut text = String::with_capacity(count);
        for i in 0..count {
            let byte = packed[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            match nibble {
                0..=9 => text.push(char::from(b'0' + nibble)),
                POINT => text.push('.'),
                _ => {
                    return Err(WireError::MalformedDecimal {
                        reason: "invalid digit symbol",
                    });
                }
            }
        }
        if count % 2 == 1 && packed[count / 2] & 0x0F != PAD {
            return Err(WireError::MalformedDecimal {
                reason: "odd digit run not padded with 0xF",
            });
        }

        parse_unsigned(negative, &text)
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str(&self.unsigned_text())
    }
}

impl FromStr for Decimal {
    type Err = WireError;

    /// Parse `[-+]int[.frac][(e|E)[-+]exp]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(at) => {
                let exp = body[at + 1..].parse::<i64>().map_err(|_| {
                    WireError::MalformedDecimal {
                        reason: "invalid exponent",
                    }
                })?;
                (&body[..at], exp)
            }
            None => (body, 0),
        };

        let parsed = parse_unsigned(negative, mantissa)?;
        if exponent == 0 {
            return Ok(parsed);
        }

        let scale = i64::from(parsed.scale) - exponent;
        if scale >= 0 {
            let scale = u32::try_from(scale).map_err(|_| WireError::MalformedDecimal {
                reason: "exponent out of range",
            })?;
            Ok(Self { scale, ..parsed })
        } else {
            let zeros = usize::try_from(-scale)
                .ok()
                .filter(|&z| z <= MAX_EXPONENT_ZEROS)
                .ok_or(WireError::MalformedDecimal {
                    reason: "exponent out of range",
                })?;
            let mut digits = parsed.digits;
            if digits != "0" {
                digits.push_str(&"0".repeat(zeros));
            }
            Ok(Self {
                negative,
                digits,
                scale: 0,
            })
        }
    }
}

/// Parse `int[.frac]` where both parts are non-empty digit runs.
fn parse_unsigned(negative: bool, text: &str) -> Result<Decimal, WireError> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (text, ""),
    };
    let has_point = text.contains('.');
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if int_part.is_empty()
        || (has_point && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return Err(WireError::MalformedDecimal {
            reason: "expected digits with at most one interior point",
        });
    }

    let scale = u32::try_from(frac_part.len()).map_err(|_| WireError::MalformedDecimal {
        reason: "too many fractional digits",
    })?;
    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    Ok(Decimal {
        negative,
        digits: strip_leading_zeros(&digits).to_owned(),
        scale,
    })
}

fn strip_leading_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}
