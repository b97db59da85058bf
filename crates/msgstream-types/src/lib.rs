#![warn(clippy::pedantic)]

pub mod error;
pub mod shape;
pub mod object;
pub mod schema;
pub mod registry;
pub mod anchor;
pub mod zone;

pub use anchor::{AnchorTable, Slot};
pub use error::{HookError, ProtocolError};
pub use object::{Graph, Instance, Message, Native, NativeValue, Object, ObjectId};
pub use registry::{FieldDef, TypeDefinition, TypeRegistry};
pub use schema::{DecomposeFn, DefaultFn, FieldSpec, ReassembleFn, Schema, TypeSpec};
pub use shape::{Shape, StructMode};
pub use zone::ZonedDateTime;
