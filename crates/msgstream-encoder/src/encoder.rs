use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use msgstream_types::{
    Graph, Instance, Native, Object, ObjectId, Schema, StructMode, TypeDefinition, TypeRegistry,
};
use msgstream_wire::ByteSink;

use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::writer::MessageWriter;

/// Object graph encoder.
///
/// Encodes one message per call: the object graph reachable from a
/// root, followed by `END`. The encoder itself is stateless between
/// calls; all per-message bookkeeping (type ordinals, anchor ids) lives
/// in a session created by [`encode`](Self::encode) and dropped after.
///
/// # Identity
///
/// A pre-pass counts how often each node is reached from the root.
/// Nodes reached more than once (shared or cyclic) are anchored where
/// they are first written and referenced with `BACK_REF` afterwards.
/// Anchors are bound before children are written, so a container that
/// contains itself needs no forward reference.
///
/// # Custom types
///
/// `Object::Instance` nodes are written field by field. The first
/// instance of a type name in a message is preceded by its `TYPE_DEF`;
/// the definition comes from the schema when the name is registered, and
/// is otherwise derived from the instance itself (strict, all fields
/// shape `Any`). `Object::Native` nodes are split into fields by the
/// registered decompose hook.
///
/// # Usage
///
/// ```rust
/// use msgstream_encoder::Encoder;
/// use msgstream_types::{Graph, Schema};
///
/// let schema = Schema::new();
/// let mut graph = Graph::new();
/// let one = graph.integer(1);
/// let root = graph.list([one]);
///
/// let bytes = Encoder::new(&schema).encode(&graph, root).unwrap();
/// assert_eq!(bytes, [0x1B, 0x01, 0x0D, 0x01, 0x00]);
/// ```
pub struct Encoder<'s> {
    schema: &'s Schema,
    config: EncoderConfig,
}

impl<'s> Encoder<'s> {
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            config: EncoderConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EncoderConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode the graph reachable from `root` into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`EncodeError`]. Nothing is returned on failure.
    pub fn encode(&self, graph: &Graph, root: ObjectId) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_to(graph, root, &mut out)?;
        Ok(out)
    }

    /// Encode the graph reachable from `root` into `sink`.
    ///
    /// The graph is fully analysed before the first byte is written, so
    /// schema problems with native values never leave a partial message.
    /// Problems found during emission (a strict instance missing a
    /// field, a sink error) may.
    ///
    /// # Errors
    ///
    /// See [`EncodeError`].
    pub fn encode_to<W: ByteSink>(
        &self,
        graph: &Graph,
        root: ObjectId,
        sink: W,
    ) -> Result<(), EncodeError> {
        let plan = Plan::build(self.schema, graph, root)?;
        debug!(
            "encoding message: {} reachable nodes, {} shared",
            plan.counts.len(),
            plan.counts.values().filter(|&&n| n > 1).count()
        );

        let mut emitter = Emitter {
            schema: self.schema,
            config: &self.config,
            writer: MessageWriter::new(sink),
            anchors: HashMap::new(),
            next_id: 0,
            registry: TypeRegistry::new(),
        };
        if self.config.anchorless {
            emitter.writer.anchorless(true)?;
        }
        emitter.emit(&plan, NodeRef::Source(root), 0)?;
        emitter.writer.end()?;

        debug!(
            "encoded message: {} bytes, {} types, {} anchors",
            emitter.writer.bytes_written(),
            emitter.registry.len(),
            emitter.anchors.len()
        );
        Ok(())
    }
}

/// Encode one message with the default configuration.
///
/// # Errors
///
/// See [`EncodeError`].
pub fn encode_message(schema: &Schema, graph: &Graph, root: ObjectId) -> Result<Vec<u8>, EncodeError> {
    Encoder::new(schema).encode(graph, root)
}

// ── Plan ────────────────────────────────────────────────────────────────

/// A node in either the caller's graph or the scratch graph that
/// decompose hooks write into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum NodeRef {
    Source(ObjectId),
    Scratch(ObjectId),
}

impl NodeRef {
    /// A child id living in the same graph as `self`.
    fn child(self, id: ObjectId) -> Self {
        match self {
            Self::Source(_) => Self::Source(id),
            Self::Scratch(_) => Self::Scratch(id),
        }
    }
}

/// A native value split into its fields, in the type's declared order.
struct Decomposed {
    fields: Vec<Option<NodeRef>>,
}

/// Identity of a native value: its type name and the address of the
/// shared value behind it.
type NativeKey = (String, *const ());

/// Everything learnt about the graph before emission.
///
/// Native nodes holding the same `Arc` are one object: the first node
/// seen is canonical and later ones are recorded as aliases of it, so
/// sharing and cycles between natives take the anchor path like any
/// other shared node.
struct Plan<'g> {
    graph: &'g Graph,
    scratch: Graph,
    decomposed: HashMap<NodeRef, Decomposed>,
    counts: HashMap<NodeRef, u32>,
    natives: HashMap<NativeKey, NodeRef>,
    aliases: HashMap<NodeRef, NodeRef>,
}

impl<'g> Plan<'g> {
    fn build(schema: &Schema, graph: &'g Graph, root: ObjectId) -> Result<Self, EncodeError> {
        let mut plan = Self {
            graph,
            scratch: Graph::new(),
            decomposed: HashMap::new(),
            counts: HashMap::new(),
            natives: HashMap::new(),
            aliases: HashMap::new(),
        };

        let root = plan.canonicalize(NodeRef::Source(root))?;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let count = plan.counts.entry(node).or_insert(0);
            *count += 1;
            if *count > 1 {
                continue;
            }
            let children = plan.children(schema, node)?;
            // Reverse so the first child is visited first.
            stack.extend(children.into_iter().rev());
        }
        Ok(plan)
    }

    fn object(&self, node: NodeRef) -> Result<&Object, EncodeError> {
        let (graph, id) = match node {
            NodeRef::Source(id) => (self.graph, id),
            NodeRef::Scratch(id) => (&self.scratch, id),
        };
        graph.get(id).ok_or(EncodeError::DanglingObject { id })
    }

    fn is_shared(&self, node: NodeRef) -> bool {
        self.counts.get(&node).is_some_and(|&n| n > 1)
    }

    /// The node that stands for `node` during emission.
    fn resolve(&self, node: NodeRef) -> NodeRef {
        self.aliases.get(&node).copied().unwrap_or(node)
    }

    /// Register `node` if it is the first native seen for its value,
    /// otherwise record it as an alias of the first one.
    fn canonicalize(&mut self, node: NodeRef) -> Result<NodeRef, EncodeError> {
        if let Some(&known) = self.aliases.get(&node) {
            return Ok(known);
        }
        let Object::Native(native) = self.object(node)? else {
            return Ok(node);
        };
        let key = (
            native.type_name().to_owned(),
            Arc::as_ptr(native.value()).cast::<()>(),
        );
        let canonical = *self.natives.entry(key).or_insert(node);
        if canonical != node {
            self.aliases.insert(node, canonical);
        }
        Ok(canonical)
    }

    fn children(&mut self, schema: &Schema, node: NodeRef) -> Result<Vec<NodeRef>, EncodeError> {
        let object = self.object(node)?;
        let children: Vec<NodeRef> = if let Object::Native(native) = object {
            let native = native.clone();
            let decomposed = self.decompose(schema, &native)?;
            let children = decomposed.fields.iter().flatten().copied().collect();
            self.decomposed.insert(node, decomposed);
            children
        } else {
            object.children().into_iter().map(|id| node.child(id)).collect()
        };
        children
            .into_iter()
            .map(|child| self.canonicalize(child))
            .collect()
    }

    fn decompose(&mut self, schema: &Schema, native: &Native) -> Result<Decomposed, EncodeError> {
        let type_name = native.type_name();
        let spec = schema
            .get(type_name)
            .ok_or_else(|| EncodeError::UnregisteredType {
                type_name: type_name.to_owned(),
            })?;
        let hook = spec
            .decompose_hook()
            .ok_or_else(|| EncodeError::NoDecomposeHook {
                type_name: type_name.to_owned(),
            })?;

        let fields = hook(native, &mut self.scratch).map_err(|source| EncodeError::Decompose {
            type_name: type_name.to_owned(),
            source,
        })?;
        if fields.len() != spec.fields().len() {
            return Err(EncodeError::FieldCountMismatch {
                type_name: type_name.to_owned(),
                expected: spec.fields().len(),
                found: fields.len(),
            });
        }
        if spec.mode() == StructMode::Strict {
            if let Some(missing) = fields.iter().position(Option::is_none) {
                return Err(EncodeError::MissingField {
                    type_name: type_name.to_owned(),
                    field: spec.fields()[missing].name().to_owned(),
                });
            }
        }
        trace!("decomposed {type_name} into {} fields", fields.len());
        Ok(Decomposed {
            fields: fields
                .into_iter()
                .map(|f| f.map(NodeRef::Scratch))
                .collect(),
        })
    }
}

// ── Emission ────────────────────────────────────────────────────────────

/// Per-message emission state.
struct Emitter<'e, W> {
    schema: &'e Schema,
    config: &'e EncoderConfig,
    writer: MessageWriter<W>,
    anchors: HashMap<NodeRef, u64>,
    next_id: u64,
    registry: TypeRegistry,
}

impl<W: ByteSink> Emitter<'_, W> {
    fn emit(&mut self, plan: &Plan<'_>, node: NodeRef, depth: usize) -> Result<(), EncodeError> {
        let node = plan.resolve(node);
        if let Some(&id) = self.anchors.get(&node) {
            return self.writer.back_ref(id);
        }
        if depth >= self.config.max_depth {
            return Err(EncodeError::DepthLimitExceeded {
                limit: self.config.max_depth,
            });
        }

        // TYPE_DEF goes ahead of the anchor so the anchor sits directly
        // in front of the object it labels.
        match plan.object(node)? {
            Object::Instance(instance) => {
                let (ordinal, def) = self.ensure_type(&instance.type_name, Some(instance))?;
                self.assign_id(plan, node)?;
                self.emit_instance(plan, node, instance, ordinal, &def, depth)
            }
            Object::Native(native) => {
                let (ordinal, def) = self.ensure_type(native.type_name(), None)?;
                self.assign_id(plan, node)?;
                self.emit_native(plan, node, ordinal, &def, depth)
            }
            object => {
                self.assign_id(plan, node)?;
                self.emit_inbuilt(plan, node, object, depth)
            }
        }
    }

    fn emit_inbuilt(
        &mut self,
        plan: &Plan<'_>,
        node: NodeRef,
        object: &Object,
        depth: usize,
    ) -> Result<(), EncodeError> {
        match object {
            Object::Null => self.writer.null(),
            Object::Bool(b) => self.writer.bool(*b),
            Object::Integer(i) => self.writer.integer(*i),
            Object::Decimal(d) => self.writer.decimal(d),
            Object::Float(f) => self.writer.float(*f),
            Object::String(s) => self.writer.string(s),
            Object::Bytes(b) => self.writer.bytes(b),
            Object::DateTime(dt) => self.writer.datetime(dt),
            Object::ZonedDateTime(dt) => self.writer.zoned_datetime(dt),
            Object::List(items) => {
                self.writer.list(items.len())?;
                self.emit_all(plan, node, items, depth)
            }
            Object::Tuple(items) => {
                self.writer.tuple(items.len())?;
                self.emit_all(plan, node, items, depth)
            }
            Object::Set(items) => {
                self.writer.set(items.len())?;
                self.emit_all(plan, node, items, depth)
            }
            Object::Map(entries) => {
                self.writer.map(entries.len())?;
                for &(key, value) in entries {
                    self.emit(plan, node.child(key), depth + 1)?;
                    self.emit(plan, node.child(value), depth + 1)?;
                }
                Ok(())
            }
            // Dispatched by `emit`.
            Object::Instance(_) | Object::Native(_) => Ok(()),
        }
    }

    fn emit_all(
        &mut self,
        plan: &Plan<'_>,
        parent: NodeRef,
        items: &[ObjectId],
        depth: usize,
    ) -> Result<(), EncodeError> {
        for &item in items {
            self.emit(plan, parent.child(item), depth + 1)?;
        }
        Ok(())
    }

    /// Fields are matched to the definition by name and written in the
    /// definition's order.
    fn emit_instance(
        &mut self,
        plan: &Plan<'_>,
        node: NodeRef,
        instance: &Instance,
        ordinal: u64,
        def: &TypeDefinition,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if let Some((name, _)) = instance
            .fields
            .iter()
            .find(|(name, _)| def.position(name).is_none())
        {
            return Err(EncodeError::UnknownField {
                type_name: def.name.to_string(),
                field: name.to_string(),
            });
        }

        self.writer.instance(ordinal)?;
        for field in &def.fields {
            match instance.field(&field.name) {
                Some(value) => self.emit(plan, node.child(value), depth + 1)?,
                None => self.skip_field(def, &field.name)?,
            }
        }
        Ok(())
    }

    fn emit_native(
        &mut self,
        plan: &Plan<'_>,
        node: NodeRef,
        ordinal: u64,
        def: &TypeDefinition,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let fields = plan
            .decomposed
            .get(&node)
            .map(|d| d.fields.as_slice())
            .unwrap_or_default();
        self.writer.instance(ordinal)?;
        for (field, value) in def.fields.iter().zip(fields) {
            match value {
                Some(value) => self.emit(plan, *value, depth + 1)?,
                None => self.skip_field(def, &field.name)?,
            }
        }
        Ok(())
    }

    fn skip_field(&mut self, def: &TypeDefinition, field: &str) -> Result<(), EncodeError> {
        match def.mode {
            StructMode::Flexible => self.writer.skip(),
            StructMode::Strict => Err(EncodeError::MissingField {
                type_name: def.name.to_string(),
                field: field.to_owned(),
            }),
        }
    }

    /// Give `node` its anchor id, mirroring what the decoder will do.
    ///
    /// In anchorless mode every object consumes an automatic id whether
    /// or not it is shared; otherwise only shared objects get one, via
    /// an explicit `ANCHOR`.
    fn assign_id(&mut self, plan: &Plan<'_>, node: NodeRef) -> Result<(), EncodeError> {
        let shared = plan.is_shared(node);
        if !self.config.anchorless && !shared {
            return Ok(());
        }
        let id = self.next_id;
        self.next_id += 1;
        if !self.config.anchorless {
            self.writer.anchor(id)?;
        }
        if shared {
            self.anchors.insert(node, id);
        }
        Ok(())
    }

    /// Ordinal and definition for `type_name`, writing its `TYPE_DEF` on
    /// first use in this message.
    fn ensure_type(
        &mut self,
        type_name: &str,
        instance: Option<&Instance>,
    ) -> Result<(u64, Arc<TypeDefinition>), EncodeError> {
        if let Some(ordinal) = self.registry.ordinal_of(type_name) {
            return Ok((ordinal, Arc::clone(self.registry.get(ordinal)?)));
        }

        let def = match (self.schema.get(type_name), instance) {
            (Some(spec), _) => spec.definition(),
            (None, Some(instance)) => TypeDefinition::untyped(
                Arc::clone(&instance.type_name),
                instance.fields.iter().map(|(name, _)| name),
            ),
            (None, None) => {
                return Err(EncodeError::UnregisteredType {
                    type_name: type_name.to_owned(),
                });
            }
        };

        self.writer.type_def(&def)?;
        let ordinal = self.registry.define(def)?;
        debug!("defined type {type_name} as ordinal {ordinal}");
        Ok((ordinal, Arc::clone(self.registry.get(ordinal)?)))
    }
}
