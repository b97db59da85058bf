use std::collections::{BTreeMap, HashMap};

use crate::error::ProtocolError;
use crate::object::{Graph, Object, ObjectId};

/// Where a pending forward reference must be written once its target
/// is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
  /// The message root itself.
  Root,
  /// The object following `FORWARD_COMPLETE`; it has no parent.
  Detached,
  /// Item `index` of a list or tuple.
  Element { parent: ObjectId, index: usize },
  /// Key of map entry `index`.
  Key { parent: ObjectId, index: usize },
  /// Value of map entry `index`.
  Value { parent: ObjectId, index: usize },
  /// Field `index` of an instance.
  Field { parent: ObjectId, index: usize },
}

impl Slot {
  /// Write `target` into this slot.
  ///
  /// Returns `false` if the parent no longer has the expected shape,
  /// which only happens if the graph was edited mid-decode.
  pub fn fill(self, graph: &mut Graph, root: &mut ObjectId, target: ObjectId) -> bool {
    match self {
      Self::Root => {
        *root = target;
        true
      }
      Self::Detached => true,
      Self::Element { parent, index } => match graph.get_mut(parent) {
        Some(Object::List(items) | Object::Tuple(items) | Object::Set(items)) => set(items.get_mut(index), target),
        _ => false,
      },
      Self::Key { parent, index } => match graph.get_mut(parent) {
        Some(Object::Map(entries)) => set(entries.get_mut(index).map(|e| &mut e.0), target),
        _ => false,
      },
      Self::Value { parent, index } => match graph.get_mut(parent) {
        Some(Object::Map(entries)) => set(entries.get_mut(index).map(|e| &mut e.1), target),
        _ => false,
      },
      Self::Field { parent, index } => match graph.get_mut(parent) {
        Some(Object::Instance(instance)) => {
          set(instance.fields.get_mut(index).map(|f| &mut f.1), target)
        }
        _ => false,
      },
    }
  }
}

fn set(slot: Option<&mut ObjectId>, target: ObjectId) -> bool {
  match slot {
    Some(slot) => {
      *slot = target;
      true
    }
    None => false,
  }
}

/// Per-message anchor bookkeeping.
///
/// Tracks bound anchor ids, the automatic id counter used in anchorless
/// mode, and slots waiting on forward references.
///
/// ```text
///   ANCHOR n / auto id ──► bind(n, obj) ──► patches pending slots of n
///   BACK_REF n         ──► resolve_back(n)            (must be bound)
///   FORWARD_REF n      ──► resolve_forward(n, slot)   (bound or queued)
///   END                ──► check_complete()           (queue empty)
/// ```
///
/// Explicit ids and automatic ids share one id space. Automatic ids
/// count up from zero and skip nothing, so an explicit `ANCHOR` that
/// lands on an id the counter later reaches is reported as reuse.
#[derive(Debug, Default)]
pub struct AnchorTable {
  anchors: HashMap<u64, ObjectId>,
  pending: BTreeMap<u64, Vec<Slot>>,
  next_auto_id: u64,
  anchorless: bool,
}

impl AnchorTable {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_anchorless(&mut self, on: bool) {
    self.anchorless = on;
  }

  #[must_use]
  pub fn is_anchorless(&self) -> bool {
    self.anchorless
  }

  /// Take the next automatic id, if anchorless mode is on.
  pub fn next_auto_id(&mut self) -> Option<u64> {
    if !self.anchorless {
      return None;
    }
    let id = self.next_auto_id;
    self.next_auto_id += 1;
    Some(id)
  }

  #[must_use]
  pub fn is_bound(&self, id: u64) -> bool {
    self.anchors.contains_key(&id)
  }

  #[must_use]
  pub fn get(&self, id: u64) -> Option<ObjectId> {
    self.anchors.get(&id).copied()
  }

  /// Bind `id` to `target` and hand back every slot that was waiting
  /// for it. The caller fills them.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::AnchorReuse`] if `id` is already bound.
  pub fn bind(&mut self, id: u64, target: ObjectId) -> Result<Vec<Slot>, ProtocolError> {
    if self.anchors.contains_key(&id) {
      return Err(ProtocolError::AnchorReuse { id });
    }
    self.anchors.insert(id, target);
    Ok(self.pending.remove(&id).unwrap_or_default())
  }

  /// Resolve a `BACK_REF`.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::UnknownAnchor`] if `id` is not bound.
  pub fn resolve_back(&self, id: u64) -> Result<ObjectId, ProtocolError> {
    self.get(id).ok_or(ProtocolError::UnknownAnchor { id })
  }

  /// Resolve a `FORWARD_REF`.
  ///
  /// A bound id resolves immediately. Otherwise `slot` is queued and
  /// [`ObjectId::PLACEHOLDER`] is returned for the caller to store.
  pub fn resolve_forward(&mut self, id: u64, slot: Slot) -> ObjectId {
    if let Some(target) = self.get(id) {
      return target;
    }
    self.pending.entry(id).or_default().push(slot);
    ObjectId::PLACEHOLDER
  }

  /// Number of forward references still waiting.
  #[must_use]
  pub fn pending_count(&self) -> usize {
    self.pending.values().map(Vec::len).sum()
  }

  /// Confirm nothing is left pending at `END`.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::DanglingForwardReference`] naming the lowest
  /// pending id.
  pub fn check_complete(&self) -> Result<(), ProtocolError> {
    match self.pending.keys().next() {
      Some(&id) => Err(ProtocolError::DanglingForwardReference {
        id,
        count: self.pending_count(),
      }),
      None => Ok(()),
    }
  }
}
