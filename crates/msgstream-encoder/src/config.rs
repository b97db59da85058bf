/// Default nesting limit, matching the decoder.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration for an [`Encoder`](crate::Encoder).
///
/// ```text
/// ┌────────────┬───────────────────────────────────────────────────┐
/// │ Field      │ Purpose                                           │
/// ├────────────┼───────────────────────────────────────────────────┤
/// │ anchorless │ Emit ANCHORLESS_ON and rely on automatic ids      │
/// │ max_depth  │ Refuse graphs nested deeper than this             │
/// └────────────┴───────────────────────────────────────────────────┘
/// ```
///
/// With `anchorless` off, only shared objects pay for an `ANCHOR`
/// prefix. With it on, no anchors are written at all; the decoder
/// numbers every object and the encoder mirrors that numbering when it
/// writes back references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub anchorless: bool,
    pub max_depth: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            anchorless: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
