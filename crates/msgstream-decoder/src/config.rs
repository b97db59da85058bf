/// Configuration for a [`Decoder`](crate::Decoder).
///
/// ```text
/// ┌───────────────────┬──────────────────────────────────────────────┐
/// │ Field             │ Purpose                                      │
/// ├───────────────────┼──────────────────────────────────────────────┤
/// │ max_depth         │ Deepest container nesting accepted           │
/// │ max_container_len │ Largest declared list/tuple/map/bytes length │
/// │ max_message_len   │ Streaming buffer cap for one message         │
/// │ strict_varints    │ Reject varints wider than their minimal form │
/// └───────────────────┴──────────────────────────────────────────────┘
/// ```
///
/// The limits protect against hostile input: every declared count is
/// checked against `max_container_len` and against the bytes actually
/// left before anything is allocated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
  pub max_depth: usize,
  pub max_container_len: usize,
  pub max_message_len: usize,
  pub strict_varints: bool,
}

impl Default for DecoderConfig {
  /// Depth 256, 16 Mi elements per container, 64 MiB per message,
  /// lenient varints.
  fn default() -> Self {
    Self {
      max_depth: 256,
      max_container_len: 16 * 1024 * 1024,
      max_message_len: 64 * 1024 * 1024,
      strict_varints: false,
    }
  }
}
