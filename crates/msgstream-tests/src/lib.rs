//! Shared fixtures for the msgstream integration tests and benches.
//!
//! Two application types are registered here:
//!
//! ```text
//!   Point   strict    { x: Integer, y: Integer }
//!   Person  flexible  { name: String, email: String = "" }
//! ```
//!
//! Both carry decompose and reassemble hooks, so they travel as
//! `Object::Native` values on the application side and as instances on
//! the wire.

#![warn(clippy::pedantic)]

use msgstream_types::{
    FieldSpec, Graph, HookError, Instance, Message, Native, Object, ObjectId, Schema, Shape,
    TypeSpec,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    /// `None` is written as `SKIP` and read back through the default.
    pub email: Option<String>,
}

/// Integer field of a generic instance, as the reassemble hooks see it.
fn integer_field(graph: &Graph, instance: &Instance, name: &str) -> Result<i64, HookError> {
    instance
        .field(name)
        .and_then(|id| graph.get(id))
        .and_then(Object::as_integer)
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| HookError::BadField {
            field: name.to_owned(),
        })
}

fn string_field(graph: &Graph, instance: &Instance, name: &str) -> Result<String, HookError> {
    instance
        .field(name)
        .and_then(|id| graph.get(id))
        .and_then(Object::as_str)
        .map(str::to_owned)
        .ok_or_else(|| HookError::BadField {
            field: name.to_owned(),
        })
}

#[must_use]
pub fn point_type() -> TypeSpec {
    TypeSpec::strict("Point")
        .field(FieldSpec::new("x", Shape::Integer))
        .field(FieldSpec::new("y", Shape::Integer))
        .decompose(|p: &Point, graph: &mut Graph| {
            Ok(vec![Some(graph.integer(p.x)), Some(graph.integer(p.y))])
        })
        .reassemble(|graph: &Graph, instance: &Instance| {
            Ok(Point {
                x: integer_field(graph, instance, "x")?,
                y: integer_field(graph, instance, "y")?,
            })
        })
}

#[must_use]
pub fn person_type() -> TypeSpec {
    TypeSpec::flexible("Person")
        .field(FieldSpec::new("name", Shape::String))
        .field(
            FieldSpec::new("email", Shape::String)
                .with_default_value(Object::String(String::new())),
        )
        .decompose(|p: &Person, graph: &mut Graph| {
            Ok(vec![
                Some(graph.string(p.name.as_str())),
                p.email.as_deref().map(|email| graph.string(email)),
            ])
        })
        .reassemble(|graph: &Graph, instance: &Instance| {
            let email = string_field(graph, instance, "email")?;
            Ok(Person {
                name: string_field(graph, instance, "name")?,
                email: (!email.is_empty()).then_some(email),
            })
        })
}

/// Schema with both fixture types registered.
#[must_use]
pub fn schema() -> Schema {
    Schema::new().with_type(point_type()).with_type(person_type())
}

#[must_use]
pub fn point(graph: &mut Graph, x: i64, y: i64) -> ObjectId {
    graph.native(Native::new("Point", Point { x, y }))
}

#[must_use]
pub fn person(graph: &mut Graph, name: &str, email: Option<&str>) -> ObjectId {
    graph.native(Native::new(
        "Person",
        Person {
            name: name.to_owned(),
            email: email.map(str::to_owned),
        },
    ))
}

/// `[[1, 2, 3], "x"]`, the smallest message with a nested list count.
#[must_use]
pub fn nested_list() -> Message {
    let mut graph = Graph::new();
    let items: Vec<_> = (1..=3).map(|i| graph.integer(i)).collect();
    let inner = graph.list(items);
    let x = graph.string("x");
    let root = graph.list([inner, x]);
    Message::new(graph, root)
}

/// The wire form of [`nested_list`].
pub const NESTED_LIST_BYTES: [u8; 13] = [
    0x1B, 0x02, 0x1B, 0x03, 0x0D, 0x01, 0x0D, 0x02, 0x0D, 0x03, 0x14, b'x', 0x00,
];

/// A list of `n` generic `Point` instances, every one with its own
/// integer fields.
#[must_use]
pub fn point_instances(n: i64) -> Message {
    let mut graph = Graph::new();
    let items: Vec<_> = (0..n)
        .map(|i| {
            let x = graph.integer(i);
            let y = graph.integer(-i);
            graph.instance(Instance::new("Point").with_field("x", x).with_field("y", y))
        })
        .collect();
    let root = graph.list(items);
    Message::new(graph, root)
}

/// A map of `n` string keys to small records with a shared tag list,
/// so every record after the first writes a `BACK_REF`.
#[must_use]
pub fn records(n: usize) -> Message {
    let mut graph = Graph::new();
    let tags = {
        let a = graph.string("alpha");
        let b = graph.string("beta");
        graph.list([a, b])
    };
    let entries: Vec<_> = (0..n)
        .map(|i| {
            let key = graph.string(format!("record-{i}"));
            let id = graph.integer(i64::try_from(i).unwrap_or(i64::MAX));
            let score = graph.float(0.5 * i as f64);
            let active = graph.bool(i % 2 == 0);
            let value = graph.tuple([id, score, active, tags]);
            (key, value)
        })
        .collect();
    let root = graph.map(entries);
    Message::new(graph, root)
}

/// Lowercase hex bytes separated by spaces, for snapshots.
#[must_use]
pub fn dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
