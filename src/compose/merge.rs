//! Layered deep merge
//!
//! Layers are folded left to right over [`serde_json::Value`]:
//! - absent layers are dropped; no layers at all yields `None`
//! - only layers of the same kind as the last layer take part
//! - arrays are concatenated as ordered sets (first occurrence keeps its place)
//! - objects are unioned key by key, shared keys merge recursively
//! - scalars and nulls take the last value

use super::config::{ConfigDefaults, ServiceDeclaration};
use crate::error::{MaverickError, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

fn kind_of(value: &Value) -> Kind {
    match value {
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Bool,
        Value::Number(_) => Kind::Number,
        Value::String(_) => Kind::String,
        Value::Array(_) => Kind::Array,
        Value::Object(_) => Kind::Object,
    }
}

/// Merge any number of layers, later layers taking precedence.
pub fn merge<I>(layers: I) -> Option<Value>
where
    I: IntoIterator<Item = Option<Value>>,
{
    let present: Vec<Value> = layers.into_iter().flatten().collect();
    let trusted = kind_of(present.last()?);

    present
        .into_iter()
        .filter(|layer| kind_of(layer) == trusted)
        .fold(None, |acc, layer| match acc {
            None => Some(seed(layer)),
            Some(acc) => Some(merge_pair(acc, layer)),
        })
}

/// The first layer of a fold still has its own duplicates removed
fn seed(layer: Value) -> Value {
    match layer {
        Value::Array(items) => Value::Array(union_arrays(Vec::new(), items)),
        other => other,
    }
}

fn merge_pair(acc: Value, next: Value) -> Value {
    match (acc, next) {
        (Value::Array(acc), Value::Array(next)) => Value::Array(union_arrays(acc, next)),
        (Value::Object(acc), Value::Object(next)) => Value::Object(union_objects(acc, next)),
        (_, next) => next,
    }
}

fn union_arrays(mut acc: Vec<Value>, next: Vec<Value>) -> Vec<Value> {
    for item in next {
        if !acc.contains(&item) {
            acc.push(item);
        }
    }
    acc
}

fn union_objects(mut acc: Map<String, Value>, next: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in next {
        let merged = match acc.remove(&key) {
            Some(existing) => merge([Some(existing), Some(value)]).unwrap_or(Value::Null),
            None => value,
        };
        acc.insert(key, merged);
    }
    acc
}

/// Merge declaration layers; all-absent layers yield an empty declaration.
pub fn merge_declarations(layers: &[Option<&ServiceDeclaration>]) -> Result<ServiceDeclaration> {
    let values = layers
        .iter()
        .map(|layer| layer.map(ServiceDeclaration::to_value).transpose())
        .collect::<Result<Vec<_>>>()?;

    match merge(values) {
        Some(value) => ServiceDeclaration::from_value(value),
        None => Ok(ServiceDeclaration::default()),
    }
}

/// Combine the internal and project default layers.
pub fn resolve_defaults(
    internal: Option<&ConfigDefaults>,
    project: Option<&ConfigDefaults>,
) -> Result<ConfigDefaults> {
    let empty = serde_json::to_value(ConfigDefaults::default())?;
    let internal = internal.map(serde_json::to_value).transpose()?;
    let project = project.map(serde_json::to_value).transpose()?;

    match merge([Some(empty), internal, project]) {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| MaverickError::InvalidConfig(e.to_string()))
        }
        None => Ok(ConfigDefaults::default()),
    }
}
