use log::{debug, trace};
use msgstream_types::{Message, ProtocolError, Schema};
use msgstream_wire::{ByteSource, SliceSource};

use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::session::Session;

/// Synchronous message decoder.
///
/// Reads one message (or a run of messages) from an in-memory buffer or
/// any [`ByteSource`] and rebuilds its object graph. It is the inverse of
/// `Encoder::encode` from the `msgstream-encoder` crate.
///
/// Each message is decoded by a fresh session:
///
///   1. **Instructions**: read the root object, consuming prefix
///      instructions (`TYPE_DEF`, `ANCHOR`, `ANCHORLESS_*`,
///      `FORWARD_COMPLETE`) wherever a value may start.
///   2. **Terminator**: after the root, accept only prefix instructions
///      until `END`.
///   3. **References**: every `FORWARD_REF` must have been completed.
///   4. **Shapes**: each instance field must match the shape its
///      `TYPE_DEF` declared.
///   5. **Reassembly**: instances of registered types with a reassemble
///      hook are replaced by the native values the hook returns.
///
/// Type definitions and anchors never outlive a message. Any error
/// discards everything built for that message.
///
/// # Example
///
/// ```rust
/// use msgstream_decoder::Decoder;
/// use msgstream_types::Schema;
///
/// let schema = Schema::new();
/// let bytes = [0x1B, 0x02, 0x0D, 0x01, 0x14, b'x', 0x00];
/// let message = Decoder::new(&schema).decode(&bytes).unwrap();
/// assert_eq!(message.root_object().as_sequence().unwrap().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Decoder<'s> {
    schema: &'s Schema,
    config: DecoderConfig,
}

impl<'s> Decoder<'s> {
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            config: DecoderConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode exactly one message occupying all of `bytes`.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`]; [`ProtocolError::TrailingData`] if bytes
    /// remain after `END`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, DecodeError> {
        let (message, consumed) = self.decode_prefix(bytes)?;
        if consumed < bytes.len() {
            return Err(ProtocolError::TrailingData {
                extra_bytes: bytes.len() - consumed,
            }
            .into());
        }
        Ok(message)
    }

    /// Decode the message at the start of `bytes`, returning it with the
    /// number of bytes it occupied. Anything after its `END` is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`]. Truncated input reports
    /// [`DecodeError::is_truncation`].
    pub fn decode_prefix(&self, bytes: &[u8]) -> Result<(Message, usize), DecodeError> {
        let mut source = SliceSource::new(bytes);
        let message = self.decode_from(&mut source)?;
        let consumed = source.position();
        trace!("message occupied {consumed} of {} buffered bytes", bytes.len());
        Ok((message, consumed))
    }

    /// Decode one message from an arbitrary byte source, reading up to
    /// and including its `END`.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`].
    pub fn decode_from<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<Message, DecodeError> {
        Session::new(source, self.schema, &self.config).read_message()
    }

    /// Iterate the consecutive messages in `bytes`.
    ///
    /// The iterator stops after the first error.
    #[must_use]
    pub fn messages<'b>(&self, bytes: &'b [u8]) -> Messages<'s, 'b> {
        Messages {
            decoder: self.clone(),
            rest: bytes,
            failed: false,
        }
    }
}

/// Decode one message with the default configuration.
///
/// # Errors
///
/// See [`Decoder::decode`].
pub fn decode_message(schema: &Schema, bytes: &[u8]) -> Result<Message, DecodeError> {
    Decoder::new(schema).decode(bytes)
}

/// Iterator over the messages in a buffer, from [`Decoder::messages`].
pub struct Messages<'s, 'b> {
    decoder: Decoder<'s>,
    rest: &'b [u8],
    failed: bool,
}

impl Iterator for Messages<'_, '_> {
    type Item = Result<Message, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match self.decoder.decode_prefix(self.rest) {
            Ok((message, consumed)) => {
                self.rest = &self.rest[consumed..];
                Some(Ok(message))
            }
            Err(err) => {
                debug!("message iteration stopped: {err}");
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Messages<'_, '_> {}
