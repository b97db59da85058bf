#![warn(clippy::pedantic)]

pub mod control;
pub mod decimal;
pub mod error;
pub mod io;
pub mod text;
pub mod varint;

pub use control::{CodeClass, ControlCode, Instruction, StructuralKind};
pub use decimal::Decimal;
pub use error::WireError;
pub use io::{ByteSink, ByteSource, IoSink, IoSource, SliceSource};
