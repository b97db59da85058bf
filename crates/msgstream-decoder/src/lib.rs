#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod session;
pub mod decoder;
pub mod streaming;

pub use config::DecoderConfig;
pub use decoder::{Decoder, Messages, decode_message};
pub use error::DecodeError;
pub use streaming::StreamingDecoder;
