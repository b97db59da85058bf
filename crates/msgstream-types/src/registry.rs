use std::collections::HashMap;
use std::sync::Arc;

use msgstream_wire::text::{read_text, write_text};
use msgstream_wire::varint::{read_varint, write_varint};
use msgstream_wire::{ByteSink, ByteSource};

use crate::error::ProtocolError;
use crate::shape::{Shape, StructMode};

/// One field of a [`TypeDefinition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
  pub name: Arc<str>,
  pub shape: Shape,
}

/// A type as declared on the wire by `TYPE_DEF`.
///
/// Wire layout (after the `TYPE_DEF` code):
///
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬─────────────────────────┐
/// │ name         │ mode         │ field_count  │ per field:              │
/// │ (len + UTF-8)│ (varint 0/1) │ (varint)     │   name, shape (varint)  │
/// └──────────────┴──────────────┴──────────────┴─────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDefinition {
  pub name: Arc<str>,
  pub mode: StructMode,
  pub fields: Vec<FieldDef>,
}

impl TypeDefinition {
  /// Definition with every field of shape [`Shape::Any`], used for
  /// instances whose type the application never registered.
  pub fn untyped<'a>(name: impl Into<Arc<str>>, fields: impl IntoIterator<Item = &'a Arc<str>>) -> Self {
    Self {
      name: name.into(),
      mode: StructMode::Strict,
      fields: fields
        .into_iter()
        .map(|name| FieldDef {
          name: Arc::clone(name),
          shape: Shape::Any,
        })
        .collect(),
    }
  }

  /// Index of the field called `name`.
  #[must_use]
  pub fn position(&self, name: &str) -> Option<usize> {
    self.fields.iter().position(|f| &*f.name == name)
  }

  /// Write the payload that follows a `TYPE_DEF` code.
  ///
  /// # Errors
  ///
  /// Wire errors from the sink, or a NUL inside a name.
  pub fn write<W: ByteSink + ?Sized>(&self, sink: &mut W) -> Result<(), ProtocolError> {
    write_text(sink, &self.name)?;
    write_varint(sink, self.mode.to_wire())?;
    write_varint(sink, self.fields.len() as u64)?;
    for field in &self.fields {
      write_text(sink, &field.name)?;
      write_varint(sink, field.shape.to_wire())?;
    }
    Ok(())
  }

  /// Read the payload that follows a `TYPE_DEF` code.
  ///
  /// # Errors
  ///
  /// Wire errors, [`ProtocolError::InvalidStructMode`],
  /// [`ProtocolError::InvalidShape`], or
  /// [`ProtocolError::LengthOverflow`] when the field count cannot fit
  /// in the remaining input.
  pub fn read<S: ByteSource + ?Sized>(source: &mut S, strict: bool) -> Result<Self, ProtocolError> {
    let name: Arc<str> = read_text(source, strict)?.into();
    let mode = StructMode::from_wire(read_varint(source, strict)?)?;
    let count = read_varint(source, strict)?;
    // Each field needs at least two bytes.
    if let Some(remaining) = source.remaining() {
      if count > (remaining / 2) as u64 {
        return Err(ProtocolError::LengthOverflow { len: count, remaining });
      }
    }
    let count = usize::try_from(count).map_err(|_| ProtocolError::LengthOverflow {
      len: count,
      remaining: 0,
    })?;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
      let field_name: Arc<str> = read_text(source, strict)?.into();
      let shape = Shape::from_wire(read_varint(source, strict)?)?;
      fields.push(FieldDef {
        name: field_name,
        shape,
      });
    }
    Ok(Self { name, mode, fields })
  }
}

/// Types defined so far in one message.
///
/// Ordinals are assigned in definition order starting at zero and are
/// what `INSTANCE` refers to. A registry lives for exactly one message.
#[derive(Debug, Default)]
pub struct TypeRegistry {
  defs: Vec<Arc<TypeDefinition>>,
  by_name: HashMap<Arc<str>, u64>,
}

impl TypeRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a definition and return its ordinal.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::TypeRedefinition`] if the name is already taken.
  pub fn define(&mut self, def: TypeDefinition) -> Result<u64, ProtocolError> {
    if self.by_name.contains_key(&def.name) {
      return Err(ProtocolError::TypeRedefinition {
        name: def.name.to_string(),
      });
    }
    let ordinal = self.defs.len() as u64;
    self.by_name.insert(Arc::clone(&def.name), ordinal);
    self.defs.push(Arc::new(def));
    Ok(ordinal)
  }

  /// Definition for `ordinal`.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::UnknownType`] if no such ordinal was defined.
  pub fn get(&self, ordinal: u64) -> Result<&Arc<TypeDefinition>, ProtocolError> {
    usize::try_from(ordinal)
      .ok()
      .and_then(|i| self.defs.get(i))
      .ok_or(ProtocolError::UnknownType { ordinal })
  }

  #[must_use]
  pub fn ordinal_of(&self, name: &str) -> Option<u64> {
    self.by_name.get(name).copied()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.defs.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.defs.is_empty()
  }

  /// Definitions in ordinal order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
    self.defs.iter()
  }
}
