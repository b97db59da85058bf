/// JSON rendering of object graphs, used by `msgstream decode` and
/// `msgstream encode`.
///
/// JSON has no identity, so nodes reached more than once are wrapped at
/// their first occurrence and referenced afterwards:
///
/// ```json
/// [{"$anchor": 0, "value": [1, 2]}, {"$ref": 0}]
/// ```
///
/// Kinds without a native JSON form use single-key tagged objects:
///
/// ```text
/// ┌──────────────┬──────────────────────────────────────────────────┐
/// │ Object kind  │ JSON                                             │
/// ├──────────────┼──────────────────────────────────────────────────┤
/// │ Integer      │ number, or {"$int": "<digits>"} beyond 64 bits   │
/// │ Float        │ number, or {"$float": "NaN" | "inf" | "-inf"}    │
/// │ Decimal      │ {"$decimal": "-12.340"}                          │
/// │ Bytes        │ {"$bytes": "<hex>"}                              │
/// │ DateTime     │ {"$datetime": "<RFC 3339>"}                      │
/// │ Zoned        │ {"$datetime": "<RFC 3339>", "$zone": "<IANA>"}   │
/// │ Tuple        │ {"$tuple": [...]}                                │
/// │ Set          │ {"$set": [...]}                                  │
/// │ Map          │ {"$map": [[key, value], ...]}                    │
/// │ Instance     │ {"$type": "Name", "fields": {...}}               │
/// │ Native       │ {"$native": "Name"}  (render only)               │
/// └──────────────┴──────────────────────────────────────────────────┘
/// ```
///
/// A plain JSON object encodes as a map with string keys. Instance fields
/// are rendered as a JSON object, so their order follows key order.
use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, anyhow, bail, ensure};
use msgstream_types::{Graph, Instance, Message, Object, ObjectId, ZonedDateTime};
use msgstream_wire::Decimal;
use serde_json::{Map, Number, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ── Graph → JSON ──────────────────────────────────────────────────────────────

/// Render a message as a JSON value.
///
/// # Errors
///
/// Returns an error if a datetime cannot be formatted as RFC 3339.
pub fn to_json(message: &Message) -> Result<Value> {
    let mut renderer = Renderer {
        graph: &message.graph,
        shared: shared_nodes(&message.graph, message.root),
        labels: HashMap::new(),
    };
    renderer.render(message.root)
}

/// Nodes reachable more than once from `root`.
fn shared_nodes(graph: &Graph, root: ObjectId) -> HashSet<ObjectId> {
    let mut seen = HashSet::new();
    let mut shared = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            shared.insert(id);
            continue;
        }
        if let Some(object) = graph.get(id) {
            stack.extend(object.children());
        }
    }
    shared
}

struct Renderer<'g> {
    graph: &'g Graph,
    shared: HashSet<ObjectId>,
    labels: HashMap<ObjectId, usize>,
}

impl Renderer<'_> {
    fn render(&mut self, id: ObjectId) -> Result<Value> {
        if let Some(label) = self.labels.get(&id) {
            return Ok(json!({ "$ref": label }));
        }
        if !self.shared.contains(&id) {
            return self.render_object(id);
        }
        let label = self.labels.len();
        self.labels.insert(id, label);
        let value = self.render_object(id)?;
        Ok(json!({ "$anchor": label, "value": value }))
    }

    fn render_object(&mut self, id: ObjectId) -> Result<Value> {
        let graph = self.graph;
        let object = graph
            .get(id)
            .ok_or_else(|| anyhow!("dangling object {id}"))?;
        let value = match object {
            Object::Null => Value::Null,
            Object::Bool(b) => Value::Bool(*b),
            Object::Integer(i) => integer_to_json(*i),
            Object::Float(f) => Number::from_f64(*f)
                .map_or_else(|| json!({ "$float": f.to_string() }), Value::Number),
            Object::Decimal(d) => json!({ "$decimal": d.to_string() }),
            Object::String(s) => Value::String(s.clone()),
            Object::Bytes(b) => json!({ "$bytes": hex::encode(b) }),
            Object::DateTime(dt) => json!({ "$datetime": dt.format(&Rfc3339)? }),
            Object::ZonedDateTime(dt) => json!({
                "$datetime": dt.local().format(&Rfc3339)?,
                "$zone": dt.zone(),
            }),
            Object::List(items) => Value::Array(self.render_all(items)?),
            Object::Tuple(items) => json!({ "$tuple": self.render_all(items)? }),
            Object::Set(items) => json!({ "$set": self.render_all(items)? }),
            Object::Map(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for &(key, value) in entries {
                    pairs.push(json!([self.render(key)?, self.render(value)?]));
                }
                json!({ "$map": pairs })
            }
            Object::Instance(instance) => {
                let mut fields = Map::new();
                for (name, value) in &instance.fields {
                    fields.insert(name.to_string(), self.render(*value)?);
                }
                json!({ "$type": &*instance.type_name, "fields": fields })
            }
            Object::Native(native) => json!({ "$native": native.type_name() }),
        };
        Ok(value)
    }

    fn render_all(&mut self, items: &[ObjectId]) -> Result<Vec<Value>> {
        items.iter().map(|&id| self.render(id)).collect()
    }
}

fn integer_to_json(value: i128) -> Value {
    if let Ok(v) = i64::try_from(value) {
        Value::from(v)
    } else if let Ok(v) = u64::try_from(value) {
        Value::from(v)
    } else {
        json!({ "$int": value.to_string() })
    }
}

// ── JSON → Graph ──────────────────────────────────────────────────────────────

/// Build a message from a JSON value in the format [`to_json`] produces.
///
/// # Errors
///
/// Returns an error for malformed tagged objects, duplicate `$anchor`
/// labels, or a `$ref` with no matching `$anchor`.
pub fn from_json(value: &Value) -> Result<Message> {
    let mut builder = Builder::default();
    let root = builder.build(value)?;
    if let Some(label) = builder.reserved.keys().find(|l| !builder.defined.contains(*l)) {
        bail!("$ref {label} has no matching $anchor");
    }
    Ok(Message::new(builder.graph, root))
}

#[derive(Default)]
struct Builder {
    graph: Graph,
    reserved: HashMap<u64, ObjectId>,
    defined: HashSet<u64>,
}

impl Builder {
    fn build(&mut self, value: &Value) -> Result<ObjectId> {
        if let Some(label) = tag(value, "$ref") {
            let label = label.as_u64().context("$ref must be a non-negative integer")?;
            return Ok(self.reserve(label));
        }
        if let Some(label) = tag(value, "$anchor") {
            let label = label.as_u64().context("$anchor must be a non-negative integer")?;
            ensure!(self.defined.insert(label), "$anchor {label} appears twice");
            let id = self.reserve(label);
            let inner = value.get("value").context("$anchor without a value")?;
            let object = self.object(inner)?;
            self.graph.replace(id, object);
            return Ok(id);
        }
        let object = self.object(value)?;
        Ok(self.graph.insert(object))
    }

    /// The node standing for `label`, allocated on first mention so a
    /// `$ref` may precede its `$anchor`.
    fn reserve(&mut self, label: u64) -> ObjectId {
        let graph = &mut self.graph;
        *self.reserved.entry(label).or_insert_with(|| graph.null())
    }

    fn object(&mut self, value: &Value) -> Result<Object> {
        let object = match value {
            Value::Null => Object::Null,
            Value::Bool(b) => Object::Bool(*b),
            Value::Number(n) => number_to_object(n)?,
            Value::String(s) => Object::String(s.clone()),
            Value::Array(items) => Object::List(self.build_all(items)?),
            Value::Object(map) => self.tagged(map)?,
        };
        Ok(object)
    }

    fn tagged(&mut self, map: &Map<String, Value>) -> Result<Object> {
        if map.contains_key("$ref") || map.contains_key("$anchor") {
            bail!("$anchor must wrap a value, not another reference");
        }
        if let Some(name) = map.get("$type") {
            let name = name.as_str().context("$type must be a string")?;
            let fields = map
                .get("fields")
                .and_then(Value::as_object)
                .context("$type without a fields object")?;
            let mut instance = Instance::new(name);
            for (field, value) in fields {
                let id = self.build(value)?;
                instance = instance.with_field(field.as_str(), id);
            }
            return Ok(Object::Instance(instance));
        }
        if let Some(zone) = map.get("$zone") {
            let zone = zone.as_str().context("$zone must be a string")?;
            let text = map
                .get("$datetime")
                .and_then(Value::as_str)
                .context("$zone without a $datetime string")?;
            let instant = OffsetDateTime::parse(text, &Rfc3339).context("bad $datetime")?;
            return Ok(Object::ZonedDateTime(ZonedDateTime::new(instant, zone)?));
        }

        let mut entries = map.iter();
        let object = match (entries.next(), entries.next()) {
            (Some((key, value)), None) if key.starts_with('$') => self.single_tag(key, value)?,
            _ => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let key = self.graph.string(key.as_str());
                    pairs.push((key, self.build(value)?));
                }
                Object::Map(pairs)
            }
        };
        Ok(object)
    }

    fn single_tag(&mut self, key: &str, value: &Value) -> Result<Object> {
        let text = || value.as_str().with_context(|| format!("{key} must be a string"));
        let object = match key {
            "$int" => Object::Integer(text()?.parse().with_context(|| format!("bad {key}"))?),
            "$float" => Object::Float(text()?.parse().with_context(|| format!("bad {key}"))?),
            "$decimal" => Object::Decimal(
                text()?
                    .parse::<Decimal>()
                    .with_context(|| format!("bad {key}"))?,
            ),
            "$bytes" => Object::Bytes(hex::decode(text()?).with_context(|| format!("bad {key}"))?),
            "$datetime" => Object::DateTime(
                OffsetDateTime::parse(text()?, &Rfc3339).with_context(|| format!("bad {key}"))?,
            ),
            "$tuple" => {
                let items = value.as_array().context("$tuple must be an array")?;
                Object::Tuple(self.build_all(items)?)
            }
            "$set" => {
                let items = value.as_array().context("$set must be an array")?;
                Object::Set(self.build_all(items)?)
            }
            "$map" => {
                let pairs = value.as_array().context("$map must be an array")?;
                let mut entries = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    match pair.as_array().map(Vec::as_slice) {
                        Some([key, value]) => entries.push((self.build(key)?, self.build(value)?)),
                        _ => bail!("$map entries must be [key, value] pairs"),
                    }
                }
                Object::Map(entries)
            }
            "$native" => bail!("native values cannot be encoded from JSON"),
            other => bail!("unknown tag {other}"),
        };
        Ok(object)
    }

    fn build_all(&mut self, items: &[Value]) -> Result<Vec<ObjectId>> {
        items.iter().map(|item| self.build(item)).collect()
    }
}

fn tag<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value.as_object().and_then(|map| map.get(key))
}

fn number_to_object(n: &Number) -> Result<Object> {
    if let Some(i) = n.as_i64() {
        Ok(Object::Integer(i.into()))
    } else if let Some(u) = n.as_u64() {
        Ok(Object::Integer(u.into()))
    } else {
        n.as_f64()
            .map(Object::Float)
            .with_context(|| format!("unrepresentable number {n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_nodes_render_once() {
        let mut graph = Graph::new();
        let inner = graph.list([]);
        let root = graph.list([inner, inner]);
        let value = to_json(&Message::new(graph, root)).unwrap();
        assert_eq!(value, json!([{ "$anchor": 0, "value": [] }, { "$ref": 0 }]));
    }

    #[test]
    fn cycle_renders_as_ref_to_itself() {
        let mut graph = Graph::new();
        let root = graph.list([]);
        graph.push(root, root);
        let value = to_json(&Message::new(graph, root)).unwrap();
        assert_eq!(value, json!({ "$anchor": 0, "value": [{ "$ref": 0 }] }));
    }

    #[test]
    fn tagged_kinds_survive_a_round_trip() {
        let value = json!({
            "$tuple": [
                { "$int": "-170141183460469231731687303715884105728" },
                { "$decimal": "-12.340" },
                { "$bytes": "00ff" },
                { "$datetime": "2024-02-29T12:30:00+02:00" },
                { "$map": [[1, "one"]] },
                { "$type": "Point", "fields": { "x": 1, "y": 2.5 } },
                { "$float": "NaN" },
                u64::MAX,
                { "plain": null }
            ]
        });
        let message = from_json(&value).unwrap();
        let items = message.root_object().as_sequence().unwrap();
        assert_eq!(message.get(items[0]), &Object::Integer(i128::MIN));
        let nan = message.get(items[6]);
        assert!(matches!(nan, Object::Float(f) if f.is_nan()));

        let rendered = to_json(&message).unwrap();
        assert_eq!(rendered["$tuple"][1], value["$tuple"][1]);
        assert_eq!(rendered["$tuple"][5], value["$tuple"][5]);
        assert_eq!(rendered["$tuple"][7], value["$tuple"][7]);
        assert_eq!(rendered["$tuple"][8], json!({ "$map": [["plain", null]] }));
    }

    #[test]
    fn zoned_datetime_and_set_round_trip() {
        let value = json!({
            "$set": [
                { "$datetime": "2024-07-01T14:00:00+02:00", "$zone": "Europe/Paris" },
                "x"
            ]
        });
        let message = from_json(&value).unwrap();
        assert_eq!(message.root_object().kind_name(), "set");
        assert_eq!(to_json(&message).unwrap(), value);

        let unknown = json!({ "$datetime": "2024-07-01T12:00:00Z", "$zone": "Nowhere/Special" });
        assert!(from_json(&unknown).is_err());
    }

    #[test]
    fn ref_before_anchor_resolves() {
        let value = json!([{ "$ref": 4 }, { "$anchor": 4, "value": "s" }]);
        let message = from_json(&value).unwrap();
        let items = message.root_object().as_sequence().unwrap();
        assert_eq!(items[0], items[1]);
        assert_eq!(message.get(items[0]).as_str(), Some("s"));
    }

    #[test]
    fn unmatched_ref_is_an_error() {
        assert!(from_json(&json!([{ "$ref": 1 }])).is_err());
        assert!(from_json(&json!([{ "$anchor": 1, "value": 1 }, { "$anchor": 1, "value": 2 }])).is_err());
    }
}
