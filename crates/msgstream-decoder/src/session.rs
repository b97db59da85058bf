use std::sync::Arc;

use log::{debug, trace};
use msgstream_types::{
  AnchorTable, Graph, Instance, Message, Native, Object, ObjectId, ProtocolError, Schema, Slot,
  StructMode, TypeDefinition, TypeRegistry, ZonedDateTime,
};
use msgstream_wire::text::{read_text, utf8_width, validate_text};
use msgstream_wire::varint::read_varint;
use msgstream_wire::{
  ByteSource, CodeClass, ControlCode, Decimal, Instruction, StructuralKind,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::DecoderConfig;
use crate::error::DecodeError;

/// What one grammar position produced.
enum Value {
  /// An object, or [`ObjectId::PLACEHOLDER`] for a pending forward
  /// reference.
  Object(ObjectId),
  /// `SKIP`, which only instance fields accept.
  Skip { offset: usize },
}

/// An id waiting to be bound to the next structural object.
#[derive(Clone, Copy)]
enum Label {
  /// From an `ANCHOR` prefix.
  Anchor { id: u64, offset: usize },
  /// From `FORWARD_COMPLETE`.
  Completion { id: u64 },
}

/// State for decoding exactly one message.
///
/// A session owns the graph under construction, the anchor table, and
/// the per-message type registry. It is consumed by
/// [`read_message`](Self::read_message); on any error it is dropped
/// with everything it built.
///
/// Reading proceeds in two phases:
///
/// ```text
///   1. grammar   root object, then prefixes until END
///                (anchors bound pre-order, forward slots patched on bind)
///   2. finalize  no pending forward refs
///                → field shapes checked (completion order)
///                → reassemble hooks run (completion order, in place)
/// ```
pub struct Session<'a, S: ?Sized> {
  source: &'a mut S,
  schema: &'a Schema,
  config: &'a DecoderConfig,
  graph: Graph,
  root: ObjectId,
  anchors: AnchorTable,
  registry: TypeRegistry,
  /// Instances in the order their last field was read.
  completed: Vec<(ObjectId, Arc<TypeDefinition>)>,
}

impl<'a, S: ByteSource + ?Sized> Session<'a, S> {
  pub fn new(source: &'a mut S, schema: &'a Schema, config: &'a DecoderConfig) -> Self {
    Self {
      source,
      schema,
      config,
      graph: Graph::new(),
      root: ObjectId::PLACEHOLDER,
      anchors: AnchorTable::new(),
      registry: TypeRegistry::new(),
      completed: Vec::new(),
    }
  }

  /// Read one message, up to and including its `END`.
  ///
  /// # Errors
  ///
  /// Any [`DecodeError`]; the session is consumed either way.
  pub fn read_message(mut self) -> Result<Message, DecodeError> {
    let start = self.source.position();
    debug!("decoding message at offset {start}");

    match self.read_value(Slot::Root, 0, None)? {
      Value::Object(id) => self.root = id,
      Value::Skip { offset } => return Err(ProtocolError::SkipOutsideInstance { offset }.into()),
    }
    self.read_terminator()?;

    self.anchors.check_complete()?;
    self.validate_shapes()?;
    self.reassemble()?;

    debug!(
      "decoded message: {} bytes, {} objects, {} types",
      self.source.position() - start,
      self.graph.len(),
      self.registry.len()
    );
    Ok(Message::new(self.graph, self.root))
  }

  fn strict(&self) -> bool {
    self.config.strict_varints
  }

  fn varint(&mut self) -> Result<u64, DecodeError> {
    let strict = self.strict();
    Ok(read_varint(self.source, strict)?)
  }

  fn code(&mut self) -> Result<(usize, ControlCode), DecodeError> {
    let offset = self.source.position();
    let strict = self.strict();
    let code = ControlCode::read(self.source, strict)?;
    trace!("{offset}: {code}");
    Ok((offset, code))
  }

  // ── Grammar ─────────────────────────────────────────────────────

  /// Consume prefix instructions, then one object, reference, or `SKIP`.
  fn read_value(&mut self, slot: Slot, depth: usize, mut label: Option<Label>) -> Result<Value, DecodeError> {
    loop {
      let (offset, code) = self.code()?;
      let instruction = match code.class() {
        CodeClass::Structural(kind) => {
          return self.read_structural(code, kind, depth, label).map(Value::Object);
        }
        CodeClass::Terminator => {
          return Err(match label {
            Some(Label::Anchor { id, offset }) => ProtocolError::MisplacedAnchor { id, offset },
            _ => ProtocolError::UnexpectedTerminator { offset },
          }
          .into());
        }
        CodeClass::OutOfBand(instruction) => instruction,
      };

      match instruction {
        Instruction::TypeDef => self.read_type_def()?,
        Instruction::AnchorlessOn => self.anchors.set_anchorless(true),
        Instruction::AnchorlessOff => self.anchors.set_anchorless(false),
        Instruction::ForwardComplete => self.read_completion(depth)?,
        Instruction::Anchor => {
          let id = self.varint()?;
          match label {
            None => label = Some(Label::Anchor { id, offset }),
            Some(Label::Anchor { id, offset }) => {
              return Err(ProtocolError::MisplacedAnchor { id, offset }.into());
            }
            Some(Label::Completion { .. }) => {
              return Err(ProtocolError::MisplacedAnchor { id, offset }.into());
            }
          }
        }
        Instruction::BackRef => {
          let id = self.varint()?;
          let target = self.anchors.resolve_back(id)?;
          return self.reference(target, label).map(Value::Object);
        }
        Instruction::ForwardRef => {
          let id = self.varint()?;
          let target = match label {
            // A completion must resolve now; do not queue a slot for it.
            Some(Label::Completion { id: completing }) => self
              .anchors
              .get(id)
              .ok_or(ProtocolError::UnresolvedCompletion { id: completing })?,
            _ => self.anchors.resolve_forward(id, slot),
          };
          return self.reference(target, label).map(Value::Object);
        }
        Instruction::Skip => {
          return match label {
            Some(Label::Anchor { id, offset }) => Err(ProtocolError::MisplacedAnchor { id, offset }.into()),
            _ if label.is_some() || slot == Slot::Root => {
              Err(ProtocolError::SkipOutsideInstance { offset }.into())
            }
            _ => Ok(Value::Skip { offset }),
          };
        }
      }
    }
  }

  /// A reference stands in for an object. An `ANCHOR` cannot label it;
  /// a completion binds its id to the same target.
  fn reference(&mut self, target: ObjectId, label: Option<Label>) -> Result<ObjectId, DecodeError> {
    match label {
      None => Ok(target),
      Some(Label::Anchor { id, offset }) => Err(ProtocolError::MisplacedAnchor { id, offset }.into()),
      Some(Label::Completion { id }) => {
        self.bind(id, target)?;
        Ok(target)
      }
    }
  }

  /// After the root: accept prefix instructions until `END`.
  fn read_terminator(&mut self) -> Result<(), DecodeError> {
    loop {
      let (offset, code) = self.code()?;
      match code.class() {
        CodeClass::Terminator => return Ok(()),
        CodeClass::OutOfBand(Instruction::TypeDef) => self.read_type_def()?,
        CodeClass::OutOfBand(Instruction::AnchorlessOn) => self.anchors.set_anchorless(true),
        CodeClass::OutOfBand(Instruction::AnchorlessOff) => self.anchors.set_anchorless(false),
        CodeClass::OutOfBand(Instruction::ForwardComplete) => self.read_completion(0)?,
        _ => return Err(ProtocolError::ExpectedTerminator { offset, found: code }.into()),
      }
    }
  }

  fn read_type_def(&mut self) -> Result<(), DecodeError> {
    let strict = self.strict();
    let def = TypeDefinition::read(self.source, strict)?;
    let name = Arc::clone(&def.name);
    let ordinal = self.registry.define(def)?;
    debug!("type {name} defined as ordinal {ordinal}");
    Ok(())
  }

  /// `FORWARD_COMPLETE id` followed by the object bound to `id`.
  ///
  /// Completions may prefix one another, so each one counts as a level
  /// of nesting.
  fn read_completion(&mut self, depth: usize) -> Result<(), DecodeError> {
    self.enter(depth)?;
    let id = self.varint()?;
    if self.anchors.is_bound(id) {
      return Err(ProtocolError::AnchorReuse { id }.into());
    }
    match self.read_value(Slot::Detached, depth + 1, Some(Label::Completion { id }))? {
      Value::Object(_) => Ok(()),
      Value::Skip { offset } => Err(ProtocolError::SkipOutsideInstance { offset }.into()),
    }
  }

  /// Bind `id` to `target` and patch every slot that was waiting on it.
  fn bind(&mut self, id: u64, target: ObjectId) -> Result<(), DecodeError> {
    for slot in self.anchors.bind(id, target)? {
      let filled = slot.fill(&mut self.graph, &mut self.root, target);
      debug_assert!(filled, "forward slot {slot:?} has no home");
    }
    Ok(())
  }

  /// Label a freshly inserted node: an explicit label wins, otherwise
  /// anchorless mode hands out the next automatic id.
  fn label_node(&mut self, id: ObjectId, label: Option<Label>) -> Result<(), DecodeError> {
    let anchor = match label {
      Some(Label::Anchor { id, .. } | Label::Completion { id }) => Some(id),
      None => self.anchors.next_auto_id(),
    };
    if let Some(anchor) = anchor {
      self.bind(anchor, id)?;
    }
    Ok(())
  }

  // ── Structural objects ──────────────────────────────────────────

  fn read_structural(
    &mut self,
    code: ControlCode,
    kind: StructuralKind,
    depth: usize,
    label: Option<Label>,
  ) -> Result<ObjectId, DecodeError> {
    match kind {
      StructuralKind::List | StructuralKind::Tuple | StructuralKind::Set => {
        self.read_sequence(kind, depth, label)
      }
      StructuralKind::Map => self.read_map(depth, label),
      StructuralKind::Instance => self.read_instance(depth, label),
      _ => {
        let object = self.read_scalar(code)?;
        let id = self.graph.insert(object);
        self.label_node(id, label)?;
        Ok(id)
      }
    }
  }

  fn read_scalar(&mut self, code: ControlCode) -> Result<Object, DecodeError> {
    let object = match code {
      ControlCode::Null => Object::Null,
      ControlCode::False => Object::Bool(false),
      ControlCode::True => Object::Bool(true),
      ControlCode::Int8 => Object::Integer(i8::from_be_bytes(self.array()?).into()),
      ControlCode::Int16 => Object::Integer(i16::from_be_bytes(self.array()?).into()),
      ControlCode::Int32 => Object::Integer(i32::from_be_bytes(self.array()?).into()),
      ControlCode::Int64 => Object::Integer(i64::from_be_bytes(self.array()?).into()),
      ControlCode::IntVar => Object::Integer(self.read_int_var()?),
      ControlCode::Float => Object::Float(f64::from_be_bytes(self.array()?)),
      ControlCode::Bytes => {
        let len = self.read_len(1)?;
        Object::Bytes(self.source.read_vec(len)?)
      }
      ControlCode::StrEmpty => Object::String(String::new()),
      ControlCode::StrChar => Object::String(self.read_char()?),
      ControlCode::Str => {
        let strict = self.strict();
        Object::String(read_text(self.source, strict)?)
      }
      ControlCode::DecPos | ControlCode::DecNeg => {
        let strict = self.strict();
        let negative = code == ControlCode::DecNeg;
        Object::Decimal(Decimal::read_body(self.source, negative, strict)?)
      }
      ControlCode::DateTime => Object::DateTime(self.read_datetime()?),
      ControlCode::DateTimeZoned => {
        let instant = self.read_datetime()?;
        let strict = self.strict();
        let zone = read_text(self.source, strict)?;
        Object::ZonedDateTime(ZonedDateTime::new(instant, &zone)?)
      }
      _ => return Err(ProtocolError::NotAScalar { code }.into()),
    };
    Ok(object)
  }

  fn read_datetime(&mut self) -> Result<OffsetDateTime, DecodeError> {
    let strict = self.strict();
    let text = read_text(self.source, strict)?;
    OffsetDateTime::parse(&text, &Rfc3339)
      .map_err(|_| ProtocolError::InvalidDateTime { text }.into())
  }

  fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    self.source.read_exact(&mut buf)?;
    Ok(buf)
  }

  /// `INT_VAR`: width, then that many bytes of big-endian two's
  /// complement.
  fn read_int_var(&mut self) -> Result<i128, DecodeError> {
    let width = self.varint()?;
    if !(1..=16).contains(&width) {
      return Err(ProtocolError::InvalidIntegerWidth { width }.into());
    }
    let mut buf = [0u8; 16];
    #[allow(clippy::cast_possible_truncation)]
    let bytes = &mut buf[..width as usize];
    self.source.read_exact(bytes)?;
    let seed: i128 = if bytes[0] & 0x80 == 0 { 0 } else { -1 };
    Ok(bytes.iter().fold(seed, |acc, &b| (acc << 8) | i128::from(b)))
  }

  /// `STR_CHAR`: exactly one UTF-8 scalar, its width taken from the
  /// lead byte.
  fn read_char(&mut self) -> Result<String, DecodeError> {
    let offset = self.source.position();
    let lead = self.source.read_byte()?;
    let width = utf8_width(lead).ok_or(ProtocolError::InvalidChar { byte: lead, offset })?;
    let mut buf = [lead, 0, 0, 0];
    self.source.read_exact(&mut buf[1..width])?;
    Ok(validate_text(&buf[..width], offset)?.to_owned())
  }

  /// Read a declared count and check it against the limits before
  /// anything is allocated. `min_bytes` is the smallest encoding of one
  /// element.
  fn read_len(&mut self, min_bytes: usize) -> Result<usize, DecodeError> {
    let len = self.varint()?;
    let limit = self.config.max_container_len;
    if len > limit as u64 {
      return Err(ProtocolError::LengthLimitExceeded { len, limit }.into());
    }
    if let Some(remaining) = self.source.remaining() {
      if len > (remaining / min_bytes) as u64 {
        return Err(ProtocolError::LengthOverflow { len, remaining }.into());
      }
    }
    // Bounded by max_container_len above.
    #[allow(clippy::cast_possible_truncation)]
    Ok(len as usize)
  }

  fn enter(&self, depth: usize) -> Result<(), DecodeError> {
    if depth >= self.config.max_depth {
      return Err(
        ProtocolError::DepthLimitExceeded {
          limit: self.config.max_depth,
        }
        .into(),
      );
    }
    Ok(())
  }

  fn read_sequence(
    &mut self,
    kind: StructuralKind,
    depth: usize,
    label: Option<Label>,
  ) -> Result<ObjectId, DecodeError> {
    self.enter(depth)?;
    let len = self.read_len(1)?;
    let items = Vec::with_capacity(len);
    let object = match kind {
      StructuralKind::Tuple => Object::Tuple(items),
      StructuralKind::Set => Object::Set(items),
      _ => Object::List(items),
    };
    let id = self.graph.insert(object);
    self.label_node(id, label)?;

    for index in 0..len {
      let item = self.read_item(Slot::Element { parent: id, index }, depth)?;
      self.graph.push(id, item);
    }
    Ok(id)
  }

  fn read_map(&mut self, depth: usize, label: Option<Label>) -> Result<ObjectId, DecodeError> {
    self.enter(depth)?;
    let len = self.read_len(2)?;
    let id = self.graph.insert(Object::Map(Vec::with_capacity(len)));
    self.label_node(id, label)?;

    for index in 0..len {
      let key = self.read_item(Slot::Key { parent: id, index }, depth)?;
      // The entry exists before its value is read so a completion inside
      // the value can patch a pending key.
      if let Some(Object::Map(entries)) = self.graph.get_mut(id) {
        entries.push((key, ObjectId::PLACEHOLDER));
      }
      let value = self.read_item(Slot::Value { parent: id, index }, depth)?;
      if let Some(Object::Map(entries)) = self.graph.get_mut(id) {
        entries[index].1 = value;
      }
    }
    Ok(id)
  }

  /// One element of a list, tuple, or map, where `SKIP` is not allowed.
  fn read_item(&mut self, slot: Slot, depth: usize) -> Result<ObjectId, DecodeError> {
    match self.read_value(slot, depth + 1, None)? {
      Value::Object(id) => Ok(id),
      Value::Skip { offset } => Err(ProtocolError::SkipOutsideInstance { offset }.into()),
    }
  }

  fn read_instance(&mut self, depth: usize, label: Option<Label>) -> Result<ObjectId, DecodeError> {
    self.enter(depth)?;
    let ordinal = self.varint()?;
    let def = Arc::clone(self.registry.get(ordinal)?);
    let id = self.graph.instance(Instance {
      type_name: Arc::clone(&def.name),
      fields: Vec::with_capacity(def.fields.len()),
    });
    self.label_node(id, label)?;

    for (index, field) in def.fields.iter().enumerate() {
      let value = match self.read_value(Slot::Field { parent: id, index }, depth + 1, None)? {
        Value::Object(value) => value,
        Value::Skip { .. } => self.default_for(&def, &field.name)?,
      };
      if let Some(Object::Instance(instance)) = self.graph.get_mut(id) {
        instance.fields.push((Arc::clone(&field.name), value));
      }
    }

    self.completed.push((id, def));
    Ok(id)
  }

  /// Value for a skipped field: the registered default, matched by name.
  fn default_for(&mut self, def: &TypeDefinition, field: &str) -> Result<ObjectId, DecodeError> {
    if def.mode == StructMode::Strict {
      return Err(
        ProtocolError::SkipInStrictMode {
          type_name: def.name.to_string(),
          field: field.to_owned(),
        }
        .into(),
      );
    }
    let schema = self.schema;
    let spec = schema
      .get(&def.name)
      .and_then(|spec| spec.fields().iter().find(|f| f.name() == field));
    spec
      .and_then(|spec| spec.make_default(&mut self.graph))
      .ok_or_else(|| {
        ProtocolError::MissingDefault {
          type_name: def.name.to_string(),
          field: field.to_owned(),
        }
        .into()
      })
  }

  // ── Finalize ────────────────────────────────────────────────────

  fn validate_shapes(&self) -> Result<(), DecodeError> {
    for (id, def) in &self.completed {
      let Some(Object::Instance(instance)) = self.graph.get(*id) else {
        continue;
      };
      for (field, (_, value)) in def.fields.iter().zip(&instance.fields) {
        let object = &self.graph[*value];
        if !field.shape.admits(object) {
          return Err(
            ProtocolError::ShapeMismatch {
              type_name: def.name.to_string(),
              field: field.name.to_string(),
              expected: field.shape,
              found: object.kind_name(),
            }
            .into(),
          );
        }
      }
    }
    Ok(())
  }

  /// Replace each instance whose type has a reassemble hook with the
  /// native value it builds. The node keeps its id, so every reference
  /// to it now sees the native value.
  fn reassemble(&mut self) -> Result<(), DecodeError> {
    let schema = self.schema;
    for (id, def) in &self.completed {
      let Some(hook) = schema
        .get(&def.name)
        .and_then(|spec| spec.reassemble_hook())
      else {
        continue;
      };
      let Some(Object::Instance(instance)) = self.graph.get(*id) else {
        continue;
      };
      let value = hook(&self.graph, instance).map_err(|source| DecodeError::Reassemble {
        type_name: def.name.to_string(),
        source,
      })?;
      trace!("reassembled {} at {id}", def.name);
      self
        .graph
        .replace(*id, Object::Native(Native::from_arc(Arc::clone(&def.name), value)));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use msgstream_wire::SliceSource;

  use super::*;

  #[test]
  fn container_code_is_not_a_scalar() {
    let schema = Schema::new();
    let config = DecoderConfig::default();
    let mut source = SliceSource::new(&[0x00]);
    let mut session = Session::new(&mut source, &schema, &config);
    for code in [ControlCode::List, ControlCode::Set, ControlCode::Map, ControlCode::Instance] {
      assert!(matches!(
        session.read_scalar(code),
        Err(DecodeError::Protocol(ProtocolError::NotAScalar { code: found })) if found == code
      ));
    }
  }

  #[test]
  fn zone_missing_from_database_rejected() {
    let schema = Schema::new();
    let config = DecoderConfig::default();
    let mut bytes = vec![0x1F, 20];
    bytes.extend_from_slice(b"2024-07-01T12:00:00Z");
    bytes.push(15);
    bytes.extend_from_slice(b"Nowhere/Special");
    bytes.push(0x00);

    let mut source = SliceSource::new(&bytes);
    let result = Session::new(&mut source, &schema, &config).read_message();
    assert!(matches!(
      result,
      Err(DecodeError::Protocol(ProtocolError::UnknownTimeZone { name })) if name == "Nowhere/Special"
    ));
  }

  #[test]
  fn nested_completions_count_against_depth() {
    let schema = Schema::new();
    let config = DecoderConfig {
      max_depth: 4,
      ..DecoderConfig::default()
    };
    // FORWARD_COMPLETE 0..=4, each prefixing the next, then NULL.
    let mut bytes = vec![0x0A];
    for id in 0..5 {
      bytes.extend([0x07, id]);
    }
    bytes.extend([0x0A, 0x00]);

    let mut source = SliceSource::new(&bytes);
    let result = Session::new(&mut source, &schema, &config).read_message();
    assert!(matches!(
      result,
      Err(DecodeError::Protocol(ProtocolError::DepthLimitExceeded { limit: 4 }))
    ));
  }
}
