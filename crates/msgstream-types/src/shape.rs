use std::fmt;

use crate::error::ProtocolError;
use crate::object::Object;

// ── Macro for wire-varint enum boilerplate ───────────────────────────
//
// Shapes and struct modes are written as small varints inside TYPE_DEF.
// Each enum gets a to_wire / from_wire pair; the error constructor is
// supplied at the call site so each enum reports its own variant.

macro_rules! wire_enum {
  (
    $(#[$meta:meta])*
    pub enum $name:ident => $err:ident {
      $( $(#[$vmeta:meta])* $variant:ident = $wire:expr ),+ $(,)?
    }
  ) => {
    $(#[$meta])*
    pub enum $name {
      $( $(#[$vmeta])* $variant ),+
    }

    impl $name {
      /// Encode this variant as its wire value.
      #[must_use]
      pub fn to_wire(self) -> u64 {
        match self {
          $( Self::$variant => $wire ),+
        }
      }

      /// Decode a wire value into this enum.
      ///
      /// # Errors
      ///
      #[doc = concat!("[`ProtocolError::", stringify!($err), "`] for an unassigned value.")]
      pub fn from_wire(value: u64) -> Result<Self, ProtocolError> {
        match value {
          $( $wire => Ok(Self::$variant), )+
          other => Err(ProtocolError::$err { value: other }),
        }
      }
    }
  };
}

// ── StructMode ───────────────────────────────────────────────────────

wire_enum! {
  /// Whether an instance may omit fields with `SKIP`.
  ///
  /// ```text
  /// ┌──────┬──────────┬────────────────────────────────────┐
  /// │ Wire │ Mode     │ SKIP in a field position           │
  /// ├──────┼──────────┼────────────────────────────────────┤
  /// │ 0    │ Strict   │ error                              │
  /// │ 1    │ Flexible │ field takes its registered default │
  /// └──────┴──────────┴────────────────────────────────────┘
  /// ```
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub enum StructMode => InvalidStructMode {
    #[default]
    Strict = 0,
    Flexible = 1,
  }
}

impl fmt::Display for StructMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Strict => "strict",
      Self::Flexible => "flexible",
    })
  }
}

// ── Shape ────────────────────────────────────────────────────────────

wire_enum! {
  /// The declared kind of a field.
  ///
  /// Shapes are checked once the whole message has been read, so a
  /// field filled by a forward reference is validated against the
  /// object the reference finally resolved to.
  ///
  /// ```text
  /// ┌──────┬──────────┬─────────────────────────────────┐
  /// │ Wire │ Shape    │ Admits                          │
  /// ├──────┼──────────┼─────────────────────────────────┤
  /// │ 0    │ Any      │ every object                    │
  /// │ 1    │ Null     │ null                            │
  /// │ 2    │ Bool     │ true / false                    │
  /// │ 3    │ Integer  │ any integer width               │
  /// │ 4    │ Decimal  │ decimal                         │
  /// │ 5    │ Float    │ binary64                        │
  /// │ 6    │ String   │ string                          │
  /// │ 7    │ Bytes    │ byte string                     │
  /// │ 8    │ DateTime │ datetime, with or without zone  │
  /// │ 9    │ List     │ list                            │
  /// │ 10   │ Tuple    │ tuple                           │
  /// │ 11   │ Map      │ map                             │
  /// │ 12   │ Instance │ instance or reassembled native  │
  /// │ 13   │ Set      │ set                             │
  /// └──────┴──────────┴─────────────────────────────────┘
  /// ```
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub enum Shape => InvalidShape {
    #[default]
    Any = 0,
    Null = 1,
    Bool = 2,
    Integer = 3,
    Decimal = 4,
    Float = 5,
    String = 6,
    Bytes = 7,
    DateTime = 8,
    List = 9,
    Tuple = 10,
    Map = 11,
    Instance = 12,
    Set = 13,
  }
}

impl Shape {
  /// Does `object` satisfy this shape?
  #[must_use]
  pub fn admits(self, object: &Object) -> bool {
    match (self, object) {
      (Self::Any, _)
      | (Self::Null, Object::Null)
      | (Self::Bool, Object::Bool(_))
      | (Self::Integer, Object::Integer(_))
      | (Self::Decimal, Object::Decimal(_))
      | (Self::Float, Object::Float(_))
      | (Self::String, Object::String(_))
      | (Self::Bytes, Object::Bytes(_))
      | (Self::DateTime, Object::DateTime(_) | Object::ZonedDateTime(_))
      | (Self::List, Object::List(_))
      | (Self::Tuple, Object::Tuple(_))
      | (Self::Set, Object::Set(_))
      | (Self::Map, Object::Map(_))
      | (Self::Instance, Object::Instance(_) | Object::Native(_)) => true,
      _ => false,
    }
  }

  /// Lower-case name used in diagnostics and schema documents.
  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      Self::Any => "any",
      Self::Null => "null",
      Self::Bool => "bool",
      Self::Integer => "integer",
      Self::Decimal => "decimal",
      Self::Float => "float",
      Self::String => "string",
      Self::Bytes => "bytes",
      Self::DateTime => "datetime",
      Self::List => "list",
      Self::Tuple => "tuple",
      Self::Map => "map",
      Self::Instance => "instance",
      Self::Set => "set",
    }
  }
}

impl fmt::Display for Shape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
