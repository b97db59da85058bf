use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::HookError;
use crate::object::{Graph, Instance, Native, NativeValue, Object, ObjectId};
use crate::registry::{FieldDef, TypeDefinition};
use crate::shape::{Shape, StructMode};

/// Builds the default value for a skipped flexible field.
pub type DefaultFn = Arc<dyn Fn(&mut Graph) -> ObjectId + Send + Sync>;

/// Splits a native value into field values, one per declared field in
/// declaration order. `None` marks a field to omit with `SKIP`.
pub type DecomposeFn =
  Arc<dyn Fn(&Native, &mut Graph) -> Result<Vec<Option<ObjectId>>, HookError> + Send + Sync>;

/// Builds a native value from a fully resolved generic instance.
pub type ReassembleFn = Arc<dyn Fn(&Graph, &Instance) -> Result<NativeValue, HookError> + Send + Sync>;

/// One declared field of a [`TypeSpec`].
#[derive(Clone)]
pub struct FieldSpec {
  name: Arc<str>,
  shape: Shape,
  default: Option<DefaultFn>,
}

impl FieldSpec {
  pub fn new(name: impl Into<Arc<str>>, shape: Shape) -> Self {
    Self {
      name: name.into(),
      shape,
      default: None,
    }
  }

  /// Default built by a closure, called once per skipped occurrence.
  #[must_use]
  pub fn with_default(mut self, make: impl Fn(&mut Graph) -> ObjectId + Send + Sync + 'static) -> Self {
    self.default = Some(Arc::new(make));
    self
  }

  /// Default that inserts a fresh copy of `value` each time.
  ///
  /// Only leaf objects make sense here; container ids would point into
  /// another graph.
  #[must_use]
  pub fn with_default_value(self, value: Object) -> Self {
    self.with_default(move |graph| graph.insert(value.clone()))
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn shape(&self) -> Shape {
    self.shape
  }

  #[must_use]
  pub fn has_default(&self) -> bool {
    self.default.is_some()
  }

  /// Insert this field's default into `graph`, if it has one.
  pub fn make_default(&self, graph: &mut Graph) -> Option<ObjectId> {
    self.default.as_ref().map(|make| make(graph))
  }
}

impl fmt::Debug for FieldSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FieldSpec")
      .field("name", &self.name)
      .field("shape", &self.shape)
      .field("default", &self.default.is_some())
      .finish()
  }
}

/// Application-side description of a named type.
///
/// Built with chained calls:
///
/// ```
/// use msgstream_types::{FieldSpec, Object, Shape, TypeSpec};
///
/// let point = TypeSpec::flexible("Point")
///   .field(FieldSpec::new("x", Shape::Integer))
///   .field(FieldSpec::new("y", Shape::Integer).with_default_value(Object::Integer(0)));
/// assert_eq!(point.fields().len(), 2);
/// ```
#[derive(Clone)]
pub struct TypeSpec {
  name: Arc<str>,
  mode: StructMode,
  fields: Vec<FieldSpec>,
  decompose: Option<DecomposeFn>,
  reassemble: Option<ReassembleFn>,
}

impl TypeSpec {
  pub fn new(name: impl Into<Arc<str>>, mode: StructMode) -> Self {
    Self {
      name: name.into(),
      mode,
      fields: Vec::new(),
      decompose: None,
      reassemble: None,
    }
  }

  pub fn strict(name: impl Into<Arc<str>>) -> Self {
    Self::new(name, StructMode::Strict)
  }

  pub fn flexible(name: impl Into<Arc<str>>) -> Self {
    Self::new(name, StructMode::Flexible)
  }

  #[must_use]
  pub fn field(mut self, field: FieldSpec) -> Self {
    self.fields.push(field);
    self
  }

  /// Install a decompose hook over a concrete Rust type.
  ///
  /// The hook fails with [`HookError::WrongType`] if the native value
  /// is not a `T`.
  #[must_use]
  pub fn decompose<T, F>(mut self, hook: F) -> Self
  where
    T: Any,
    F: Fn(&T, &mut Graph) -> Result<Vec<Option<ObjectId>>, HookError> + Send + Sync + 'static,
  {
    let erased: DecomposeFn = Arc::new(move |native: &Native, graph: &mut Graph| {
      let value = native.downcast_ref::<T>().ok_or(HookError::WrongType {
        expected: std::any::type_name::<T>(),
      })?;
      hook(value, graph)
    });
    self.decompose = Some(erased);
    self
  }

  /// Install a reassemble hook producing a concrete Rust type.
  #[must_use]
  pub fn reassemble<T, F>(mut self, hook: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&Graph, &Instance) -> Result<T, HookError> + Send + Sync + 'static,
  {
    let erased: ReassembleFn = Arc::new(move |graph: &Graph, instance: &Instance| {
      hook(graph, instance).map(|value| Arc::new(value) as NativeValue)
    });
    self.reassemble = Some(erased);
    self
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn mode(&self) -> StructMode {
    self.mode
  }

  #[must_use]
  pub fn fields(&self) -> &[FieldSpec] {
    &self.fields
  }

  #[must_use]
  pub fn decompose_hook(&self) -> Option<&DecomposeFn> {
    self.decompose.as_ref()
  }

  #[must_use]
  pub fn reassemble_hook(&self) -> Option<&ReassembleFn> {
    self.reassemble.as_ref()
  }

  /// The wire-level `TYPE_DEF` for this type.
  #[must_use]
  pub fn definition(&self) -> TypeDefinition {
    TypeDefinition {
      name: Arc::clone(&self.name),
      mode: self.mode,
      fields: self
        .fields
        .iter()
        .map(|f| FieldDef {
          name: Arc::clone(&f.name),
          shape: f.shape,
        })
        .collect(),
    }
  }
}

impl fmt::Debug for TypeSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeSpec")
      .field("name", &self.name)
      .field("mode", &self.mode)
      .field("fields", &self.fields)
      .field("decompose", &self.decompose.is_some())
      .field("reassemble", &self.reassemble.is_some())
      .finish()
  }
}

/// The application's set of known types.
///
/// A `Schema` is configured once and then shared read-only by any number
/// of encoders and decoders. Per-message type tables are separate (see
/// [`TypeRegistry`](crate::TypeRegistry)), so concurrent sessions never
/// observe each other's definitions.
#[derive(Clone, Debug, Default)]
pub struct Schema {
  types: BTreeMap<Arc<str>, TypeSpec>,
}

impl Schema {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Add or replace a type.
  pub fn register(&mut self, spec: TypeSpec) -> &mut Self {
    self.types.insert(Arc::clone(&spec.name), spec);
    self
  }

  /// Builder form of [`register`](Self::register).
  #[must_use]
  pub fn with_type(mut self, spec: TypeSpec) -> Self {
    self.register(spec);
    self
  }

  #[must_use]
  pub fn get(&self, name: &str) -> Option<&TypeSpec> {
    self.types.get(name)
  }

  #[must_use]
  pub fn contains(&self, name: &str) -> bool {
    self.types.contains_key(name)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.types.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }

  /// Registered types in name order.
  pub fn iter(&self) -> impl Iterator<Item = &TypeSpec> {
    self.types.values()
  }

  /// Render every registered type as a Markdown section.
  ///
  /// # Errors
  ///
  /// Only errors from `out`.
  pub fn document(&self, out: &mut impl fmt::Write) -> fmt::Result {
    for (i, spec) in self.types.values().enumerate() {
      if i > 0 {
        writeln!(out)?;
      }
      writeln!(out, "## {} ({})", spec.name, spec.mode)?;
      writeln!(out)?;
      writeln!(out, "| Field | Shape | Default |")?;
      writeln!(out, "|---|---|---|")?;
      for field in &spec.fields {
        let default = if field.has_default() { "yes" } else { "no" };
        writeln!(out, "| {} | {} | {default} |", field.name, field.shape)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, PartialEq)]
  struct Point {
    x: i128,
    y: i128,
  }

  fn point_spec() -> TypeSpec {
    TypeSpec::strict("Point")
      .field(FieldSpec::new("x", Shape::Integer))
      .field(FieldSpec::new("y", Shape::Integer))
      .decompose(|p: &Point, graph| Ok(vec![Some(graph.integer(p.x)), Some(graph.integer(p.y))]))
      .reassemble(|graph, inst| {
        let get = |name: &str| {
          inst
            .field(name)
            .and_then(|id| graph[id].as_integer())
            .ok_or_else(|| HookError::BadField { field: name.into() })
        };
        Ok(Point {
          x: get("x")?,
          y: get("y")?,
        })
      })
  }

  #[test]
  fn definition_mirrors_spec() {
    let def = point_spec().definition();
    assert_eq!(&*def.name, "Point");
    assert_eq!(def.mode, StructMode::Strict);
    assert_eq!(def.fields.len(), 2);
    assert_eq!(&*def.fields[1].name, "y");
    assert_eq!(def.fields[1].shape, Shape::Integer);
  }

  #[test]
  fn decompose_hook_downcasts() {
    let spec = point_spec();
    let hook = spec.decompose_hook().unwrap();
    let mut graph = Graph::new();
    let native = Native::new("Point", Point { x: 1, y: 2 });
    let fields = hook(&native, &mut graph).unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(graph[fields[0].unwrap()], Object::Integer(1));
  }

  #[test]
  fn decompose_hook_rejects_wrong_type() {
    let spec = point_spec();
    let hook = spec.decompose_hook().unwrap();
    let mut graph = Graph::new();
    let native = Native::new("Point", "not a point");
    assert!(matches!(hook(&native, &mut graph), Err(HookError::WrongType { .. })));
  }

  #[test]
  fn reassemble_hook_builds_value() {
    let spec = point_spec();
    let mut graph = Graph::new();
    let x = graph.integer(3);
    let y = graph.integer(4);
    let inst = Instance::new("Point").with_field("x", x).with_field("y", y);
    let value = spec.reassemble_hook().unwrap()(&graph, &inst).unwrap();
    assert_eq!(value.downcast_ref::<Point>(), Some(&Point { x: 3, y: 4 }));
  }

  #[test]
  fn default_value_is_fresh_each_time() {
    let field = FieldSpec::new("n", Shape::Integer).with_default_value(Object::Integer(9));
    let mut graph = Graph::new();
    let a = field.make_default(&mut graph).unwrap();
    let b = field.make_default(&mut graph).unwrap();
    assert_ne!(a, b);
    assert_eq!(graph[a], Object::Integer(9));
  }

  #[test]
  fn register_replaces_by_name() {
    let mut schema = Schema::new();
    schema.register(point_spec());
    schema.register(TypeSpec::flexible("Point"));
    assert_eq!(schema.len(), 1);
    assert_eq!(schema.get("Point").unwrap().mode(), StructMode::Flexible);
  }

  #[test]
  fn document_lists_fields() {
    let schema = Schema::new().with_type(
      TypeSpec::flexible("Item")
        .field(FieldSpec::new("name", Shape::String))
        .field(FieldSpec::new("count", Shape::Integer).with_default_value(Object::Integer(0))),
    );
    let mut out = String::new();
    schema.document(&mut out).unwrap();
    assert!(out.starts_with("## Item (flexible)\n"));
    assert!(out.contains("| name | string | no |"));
    assert!(out.contains("| count | integer | yes |"));
  }
}
