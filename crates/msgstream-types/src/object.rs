use std::any::Any;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use msgstream_wire::Decimal;
use time::OffsetDateTime;

use crate::zone::ZonedDateTime;

/// Handle to a node in a [`Graph`].
///
/// Object identity is handle identity: two fields that hold the same
/// `ObjectId` refer to one shared object, and a container that holds
/// its own id (directly or through other nodes) is a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
  /// Placeholder written into a slot whose forward reference is still
  /// pending. Never present in a finished [`Message`].
  pub const PLACEHOLDER: Self = Self(u32::MAX);

  /// Position of this node in its graph.
  #[must_use]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for ObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Shared, type-erased application value.
pub type NativeValue = Arc<dyn Any + Send + Sync>;

/// An application value standing in for an instance.
///
/// Produced by a reassemble hook during decoding, or inserted by the
/// application before encoding (where a decompose hook turns it back
/// into fields). Clones share the same value.
#[derive(Clone)]
pub struct Native {
  type_name: Arc<str>,
  value: NativeValue,
}

impl Native {
  pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: T) -> Self {
    Self::from_arc(type_name, Arc::new(value))
  }

  pub fn from_arc(type_name: impl Into<Arc<str>>, value: NativeValue) -> Self {
    Self {
      type_name: type_name.into(),
      value,
    }
  }

  /// Registered type name this value is encoded under.
  #[must_use]
  pub fn type_name(&self) -> &str {
    &self.type_name
  }

  #[must_use]
  pub fn value(&self) -> &NativeValue {
    &self.value
  }

  #[must_use]
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.value.downcast_ref::<T>()
  }
}

impl fmt::Debug for Native {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Native")
      .field("type_name", &self.type_name)
      .finish_non_exhaustive()
  }
}

impl PartialEq for Native {
  fn eq(&self, other: &Self) -> bool {
    self.type_name == other.type_name && Arc::ptr_eq(&self.value, &other.value)
  }
}

/// A generic instance: a type name plus its fields in definition order.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
  pub type_name: Arc<str>,
  pub fields: Vec<(Arc<str>, ObjectId)>,
}

impl Instance {
  pub fn new(type_name: impl Into<Arc<str>>) -> Self {
    Self {
      type_name: type_name.into(),
      fields: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_field(mut self, name: impl Into<Arc<str>>, value: ObjectId) -> Self {
    self.fields.push((name.into(), value));
    self
  }

  /// Value of the field called `name`, if present.
  #[must_use]
  pub fn field(&self, name: &str) -> Option<ObjectId> {
    self
      .fields
      .iter()
      .find(|(field, _)| &**field == name)
      .map(|(_, id)| *id)
  }
}

/// One node of an object graph.
///
/// Containers hold [`ObjectId`]s, never nested objects, so sharing and
/// cycles need no special representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
  Null,
  Bool(bool),
  Integer(i128),
  Decimal(Decimal),
  Float(f64),
  String(String),
  Bytes(Vec<u8>),
  DateTime(OffsetDateTime),
  ZonedDateTime(ZonedDateTime),
  List(Vec<ObjectId>),
  Tuple(Vec<ObjectId>),
  /// Unordered collection. Duplicates are kept as written.
  Set(Vec<ObjectId>),
  Map(Vec<(ObjectId, ObjectId)>),
  Instance(Instance),
  Native(Native),
}

impl Object {
  /// Lower-case kind name used in diagnostics.
  #[must_use]
  pub fn kind_name(&self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Bool(_) => "bool",
      Self::Integer(_) => "integer",
      Self::Decimal(_) => "decimal",
      Self::Float(_) => "float",
      Self::String(_) => "string",
      Self::Bytes(_) => "bytes",
      Self::DateTime(_) | Self::ZonedDateTime(_) => "datetime",
      Self::List(_) => "list",
      Self::Tuple(_) => "tuple",
      Self::Set(_) => "set",
      Self::Map(_) => "map",
      Self::Instance(_) => "instance",
      Self::Native(_) => "native",
    }
  }

  /// `true` for kinds that may be reached more than once and therefore
  /// carry identity on the wire.
  #[must_use]
  pub fn is_container(&self) -> bool {
    matches!(
      self,
      Self::List(_)
        | Self::Tuple(_)
        | Self::Set(_)
        | Self::Map(_)
        | Self::Instance(_)
        | Self::Native(_)
    )
  }

  /// Direct children, in wire order.
  #[must_use]
  pub fn children(&self) -> Vec<ObjectId> {
    match self {
      Self::List(items) | Self::Tuple(items) | Self::Set(items) => items.clone(),
      Self::Map(entries) => entries.iter().flat_map(|&(k, v)| [k, v]).collect(),
      Self::Instance(instance) => instance.fields.iter().map(|(_, id)| *id).collect(),
      _ => Vec::new(),
    }
  }

  #[must_use]
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_integer(&self) -> Option<i128> {
    match self {
      Self::Integer(i) => Some(*i),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  /// Items of a list, tuple or set.
  #[must_use]
  pub fn as_sequence(&self) -> Option<&[ObjectId]> {
    match self {
      Self::List(items) | Self::Tuple(items) | Self::Set(items) => Some(items),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_map(&self) -> Option<&[(ObjectId, ObjectId)]> {
    match self {
      Self::Map(entries) => Some(entries),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_instance(&self) -> Option<&Instance> {
    match self {
      Self::Instance(instance) => Some(instance),
      _ => None,
    }
  }

  #[must_use]
  pub fn as_native(&self) -> Option<&Native> {
    match self {
      Self::Native(native) => Some(native),
      _ => None,
    }
  }
}

/// Arena of objects addressed by [`ObjectId`].
///
/// Nodes are never removed; a node may be replaced in place, which keeps
/// every reference to it valid. Decoding uses this to swap a generic
/// instance for its reassembled native value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
  nodes: Vec<Object>,
}

impl Graph {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      nodes: Vec::with_capacity(capacity),
    }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Add a node and return its handle.
  ///
  /// # Panics
  ///
  /// If the graph already holds `u32::MAX` nodes.
  pub fn insert(&mut self, object: Object) -> ObjectId {
    let index = u32::try_from(self.nodes.len())
      .ok()
      .filter(|&i| i != u32::MAX)
      .unwrap_or_else(|| panic!("object graph is full"));
    self.nodes.push(object);
    ObjectId(index)
  }

  #[must_use]
  pub fn get(&self, id: ObjectId) -> Option<&Object> {
    self.nodes.get(id.index())
  }

  pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
    self.nodes.get_mut(id.index())
  }

  /// Swap the node at `id` for `object`, returning the old node.
  pub fn replace(&mut self, id: ObjectId, object: Object) -> Option<Object> {
    self
      .nodes
      .get_mut(id.index())
      .map(|slot| std::mem::replace(slot, object))
  }

  pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(i, object)| u32::try_from(i).ok().map(|i| (ObjectId(i), object)))
  }

  // ── Builders ────────────────────────────────────────────────────

  pub fn null(&mut self) -> ObjectId {
    self.insert(Object::Null)
  }

  pub fn bool(&mut self, value: bool) -> ObjectId {
    self.insert(Object::Bool(value))
  }

  pub fn integer(&mut self, value: impl Into<i128>) -> ObjectId {
    self.insert(Object::Integer(value.into()))
  }

  pub fn float(&mut self, value: f64) -> ObjectId {
    self.insert(Object::Float(value))
  }

  pub fn decimal(&mut self, value: Decimal) -> ObjectId {
    self.insert(Object::Decimal(value))
  }

  pub fn string(&mut self, value: impl Into<String>) -> ObjectId {
    self.insert(Object::String(value.into()))
  }

  pub fn bytes(&mut self, value: impl Into<Vec<u8>>) -> ObjectId {
    self.insert(Object::Bytes(value.into()))
  }

  pub fn datetime(&mut self, value: OffsetDateTime) -> ObjectId {
    self.insert(Object::DateTime(value))
  }

  pub fn zoned_datetime(&mut self, value: ZonedDateTime) -> ObjectId {
    self.insert(Object::ZonedDateTime(value))
  }

  pub fn list(&mut self, items: impl IntoIterator<Item = ObjectId>) -> ObjectId {
    self.insert(Object::List(items.into_iter().collect()))
  }

  pub fn tuple(&mut self, items: impl IntoIterator<Item = ObjectId>) -> ObjectId {
    self.insert(Object::Tuple(items.into_iter().collect()))
  }

  pub fn set(&mut self, items: impl IntoIterator<Item = ObjectId>) -> ObjectId {
    self.insert(Object::Set(items.into_iter().collect()))
  }

  pub fn map(&mut self, entries: impl IntoIterator<Item = (ObjectId, ObjectId)>) -> ObjectId {
    self.insert(Object::Map(entries.into_iter().collect()))
  }

  pub fn instance(&mut self, instance: Instance) -> ObjectId {
    self.insert(Object::Instance(instance))
  }

  pub fn native(&mut self, native: Native) -> ObjectId {
    self.insert(Object::Native(native))
  }

  /// Append `item` to the list, tuple or set at `id`.
  ///
  /// Returns `false` if `id` is not a sequence. Used to build cycles.
  pub fn push(&mut self, id: ObjectId, item: ObjectId) -> bool {
    match self.get_mut(id) {
      Some(Object::List(items) | Object::Tuple(items) | Object::Set(items)) => {
        items.push(item);
        true
      }
      _ => false,
    }
  }
}

impl Index<ObjectId> for Graph {
  type Output = Object;

  fn index(&self, id: ObjectId) -> &Object {
    &self.nodes[id.index()]
  }
}

impl IndexMut<ObjectId> for Graph {
  fn index_mut(&mut self, id: ObjectId) -> &mut Object {
    &mut self.nodes[id.index()]
  }
}

/// A decoded message, or one ready to be encoded: a graph and its root.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
  pub graph: Graph,
  pub root: ObjectId,
}

impl Message {
  #[must_use]
  pub fn new(graph: Graph, root: ObjectId) -> Self {
    Self { graph, root }
  }

  /// Message holding a single scalar or leaf object.
  #[must_use]
  pub fn single(object: Object) -> Self {
    let mut graph = Graph::new();
    let root = graph.insert(object);
    Self { graph, root }
  }

  #[must_use]
  pub fn root_object(&self) -> &Object {
    &self.graph[self.root]
  }

  /// Follow `id` into the graph.
  #[must_use]
  pub fn get(&self, id: ObjectId) -> &Object {
    &self.graph[id]
  }
}
