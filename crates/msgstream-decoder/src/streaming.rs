use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;

use log::{debug, trace};
use msgstream_types::{Message, Schema};
use tokio::io::{AsyncRead, ReadBuf};

use crate::config::DecoderConfig;
use crate::decoder::Decoder;
use crate::error::DecodeError;

/// Smallest read issued against the underlying reader.
const READ_CHUNK: usize = 4096;

/// Asynchronous streaming decoder that yields messages one at a time
/// from a stream of back-to-back messages.
///
/// Messages carry no length prefix, so the decoder buffers bytes until
/// a complete message parses. A parse that fails only because input ran
/// out is retried once more bytes arrive; any other failure is returned
/// and ends the stream. Backpressure is natural: nothing is read until
/// the caller awaits the next item.
///
/// Between retries the buffer is refilled until it has doubled or the
/// reader has nothing more ready, so a large message arriving in small
/// reads is parsed a logarithmic number of times.
///
/// # Example
///
/// ```rust,no_run
/// use msgstream_decoder::StreamingDecoder;
/// use msgstream_types::Schema;
/// use tokio::io::AsyncRead;
///
/// async fn drain(schema: &Schema, reader: impl AsyncRead + Unpin) {
///   let mut stream = StreamingDecoder::new(schema, reader);
///   while let Some(message) = stream.next().await.transpose().unwrap() {
///     // Process each Message...
///   }
/// }
/// ```
pub struct StreamingDecoder<'s, R> {
  reader: R,
  decoder: Decoder<'s>,
  state: StreamState,
  /// Bytes read but not yet consumed by a complete message.
  buf: Vec<u8>,
  /// Parses tried on the message at the front of `buf`.
  attempts: usize,
}

/// Internal state machine for the streaming decoder.
///
/// ```text
///   Reading ──(reader EOF)──► Draining ──(buffer empty or error)──► Done
///      │                                                             ▲
///      └──────────────────────────(error)────────────────────────────┘
/// ```
///
/// `Draining` means the reader is exhausted but buffered bytes may still
/// hold complete messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
  Reading,
  Draining,
  Done,
}

impl<'s, R: AsyncRead + Unpin> StreamingDecoder<'s, R> {
  #[must_use]
  pub fn new(schema: &'s Schema, reader: R) -> Self {
    Self::with_config(schema, DecoderConfig::default(), reader)
  }

  #[must_use]
  pub fn with_config(schema: &'s Schema, config: DecoderConfig, reader: R) -> Self {
    Self {
      reader,
      decoder: Decoder::new(schema).with_config(config),
      state: StreamState::Reading,
      buf: Vec::with_capacity(READ_CHUNK),
      attempts: 0,
    }
  }

  /// Read the next message from the stream.
  ///
  /// Returns `Some(Ok(message))` for each decoded message, `None` once
  /// the reader is exhausted at a message boundary, or `Some(Err)` on
  /// the first error, after which the stream yields `None`.
  ///
  /// A reader that ends mid-message produces a truncation error
  /// ([`DecodeError::is_truncation`]).
  pub async fn next(&mut self) -> Option<Result<Message, DecodeError>> {
    loop {
      match self.state {
        StreamState::Done => return None,
        StreamState::Draining if self.buf.is_empty() => {
          self.state = StreamState::Done;
          return None;
        }
        _ => {}
      }

      if !self.buf.is_empty() {
        self.attempts += 1;
        match self.decoder.decode_prefix(&self.buf) {
          Ok((message, consumed)) => {
            self.buf.drain(..consumed);
            trace!("stream yielded a {consumed} byte message after {} parses", self.attempts);
            self.attempts = 0;
            return Some(Ok(message));
          }
          Err(err) if err.is_truncation() && self.state == StreamState::Reading => {}
          Err(err) => return Some(Err(self.fail(err))),
        }
      }

      let limit = self.decoder.config().max_message_len;
      if self.buf.len() >= limit {
        return Some(Err(self.fail(DecodeError::MessageTooLarge { limit })));
      }
      if let Err(err) = self.fill().await {
        return Some(Err(self.fail(err)));
      }
    }
  }

  /// Wait for more bytes, then keep reading until the buffer has
  /// doubled, the reader has nothing ready, or it reports EOF. The
  /// buffer never grows past `max_message_len`.
  async fn fill(&mut self) -> Result<(), DecodeError> {
    let start = self.buf.len();
    let limit = self.decoder.config().max_message_len;
    let target = (start + start.max(READ_CHUNK)).min(limit);
    let mut wait = true;
    while self.buf.len() < target {
      match self.read_chunk(target, wait).await? {
        Some(0) => {
          debug!("reader exhausted with {} buffered bytes", self.buf.len());
          self.state = StreamState::Draining;
          break;
        }
        Some(_) => wait = false,
        None => break,
      }
    }
    Ok(())
  }

  /// One read into `buf[len..target]`. `None` means the reader had
  /// nothing ready and `wait` was off.
  async fn read_chunk(&mut self, target: usize, wait: bool) -> Result<Option<usize>, DecodeError> {
    let start = self.buf.len();
    self.buf.resize(target, 0);
    let Self { reader, buf, .. } = self;
    let outcome = poll_fn(|cx| {
      let mut window = ReadBuf::new(&mut buf[start..]);
      match Pin::new(&mut *reader).poll_read(cx, &mut window) {
        Poll::Ready(result) => Poll::Ready(Some(result.map(|()| window.filled().len()))),
        Poll::Pending if wait => Poll::Pending,
        Poll::Pending => Poll::Ready(None),
      }
    })
    .await;

    let n = match &outcome {
      Some(Ok(n)) => *n,
      _ => 0,
    };
    self.buf.truncate(start + n);
    match outcome {
      None => Ok(None),
      Some(Ok(n)) => Ok(Some(n)),
      Some(Err(err)) => Err(err.into()),
    }
  }

  fn fail(&mut self, err: DecodeError) -> DecodeError {
    debug!("stream stopped: {err}");
    self.state = StreamState::Done;
    self.buf.clear();
    err
  }
}
