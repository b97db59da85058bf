#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod writer;
pub mod encoder;

pub use config::EncoderConfig;
pub use encoder::{Encoder, encode_message};
pub use error::EncodeError;
pub use writer::MessageWriter;
