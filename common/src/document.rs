//! Dot-path field updates on JSON documents.
//!
//! A path such as `board.1_1.revealed` names a nested field. Updates create
//! missing intermediate objects and refuse to descend through scalars or
//! arrays. A multi-field update is all-or-nothing.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::Precondition;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("documents must be JSON objects")]
    NotAnObject,
    #[error("field path `{0}` is empty or has an empty segment")]
    EmptyPath(String),
    #[error("field path `{0}` crosses a non-object value")]
    NotTraversable(String),
}

fn segments(path: &str) -> Result<Vec<&str>, DocumentError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(DocumentError::EmptyPath(path.to_string()));
    }
    Ok(parts)
}

/// Looks up the value at `path`, if every segment exists.
pub fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

/// Sets a single field in place. On error the document may be partially
/// modified; use [`apply_update`] for atomic multi-field writes.
pub fn set_field(document: &mut Value, path: &str, value: Value) -> Result<(), DocumentError> {
    let parts = segments(path)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| DocumentError::EmptyPath(path.to_string()))?;

    let mut current = document
        .as_object_mut()
        .ok_or(DocumentError::NotAnObject)?;

    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = next
            .as_object_mut()
            .ok_or_else(|| DocumentError::NotTraversable(path.to_string()))?;
    }

    current.insert(last.to_string(), value);
    Ok(())
}

/// Applies every field of an update, or none of them.
pub fn apply_update(
    document: &mut Value,
    fields: &BTreeMap<String, Value>,
) -> Result<(), DocumentError> {
    let mut updated = document.clone();
    for (path, value) in fields {
        set_field(&mut updated, path, value.clone())?;
    }
    *document = updated;
    Ok(())
}

pub fn check_precondition(document: Option<&Value>, precondition: &Precondition) -> bool {
    match (document, precondition) {
        (None, _) => false,
        (Some(_), Precondition::Exists) => true,
        (Some(document), Precondition::FieldEquals { path, value }) => {
            field(document, path) == Some(value)
        }
    }
}
