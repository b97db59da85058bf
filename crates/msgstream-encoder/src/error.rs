use msgstream_types::{HookError, ObjectId, ProtocolError};
use msgstream_wire::WireError;

/// Errors that can occur while encoding an object graph.
///
/// Most variants describe a graph that cannot be expressed on the wire
/// under the current schema. Lower-level failures from the byte codecs
/// and the sink are wrapped transparently.
///
/// Error hierarchy:
///
/// ```text
///   EncodeError
///   ├── UnregisteredType     ← native value with no TypeSpec
///   ├── NoDecomposeHook      ← TypeSpec cannot split a native value
///   ├── Decompose            ← the decompose hook itself failed
///   ├── FieldCountMismatch   ← hook returned the wrong number of fields
///   ├── MissingField         ← strict type with an absent field
///   ├── UnknownField         ← instance field not declared by its type
///   ├── DanglingObject       ← ObjectId not present in the graph
///   ├── DepthLimitExceeded   ← nesting deeper than EncoderConfig allows
///   ├── DateTime             ← datetime not representable as RFC 3339
///   ├── Protocol             ← from msgstream-types (e.g. registry)
///   ├── Wire(WireError)      ← from msgstream-wire serialization
///   └── Io(std::io::Error)   ← from the underlying writer
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("native value of type {type_name} has no registered type")]
    UnregisteredType { type_name: String },

    #[error("type {type_name} has no decompose hook")]
    NoDecomposeHook { type_name: String },

    #[error("decompose hook for {type_name} failed")]
    Decompose {
        type_name: String,
        #[source]
        source: HookError,
    },

    #[error("decompose hook for {type_name} returned {found} fields, expected {expected}")]
    FieldCountMismatch {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("strict type {type_name} is missing field {field}")]
    MissingField { type_name: String, field: String },

    #[error("type {type_name} declares no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("object {id} is not in the graph")]
    DanglingObject { id: ObjectId },

    #[error("nesting depth exceeds limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("datetime cannot be written as RFC 3339")]
    DateTime(#[from] time::error::Format),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
