//! Key paths and the walk over nested JSON values
//!
//! A key path such as `3-inputs-image` addresses field `image` of the object
//! reached by walking `graph["3"]["inputs"]`. Array elements are addressed by
//! their decimal index.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::constants::key_paths::{MASK_SUFFIX, SEPARATOR};
use crate::error::PathError;

/// A parsed `-`-delimited key path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a key path, requiring at least two non-empty segments
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments: Vec<String> = raw.split(SEPARATOR).map(str::to_string).collect();
        if segments.len() < 2 || segments.iter().any(String::is_empty) {
            return Err(PathError::Malformed(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The node id (first segment)
    pub fn node_id(&self) -> &str {
        &self.segments[0]
    }

    /// The final segment, i.e. the field assigned by a binding
    pub fn field(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Every segment except the final field
    pub fn parent_segments(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Whether this path carries the mask suffix
    pub fn is_mask(&self) -> bool {
        self.field() == MASK_SUFFIX
    }

    /// For a mask path, the path of the field the mask applies to
    pub fn unmasked(&self) -> Option<KeyPath> {
        if !self.is_mask() {
            return None;
        }
        let raw = self
            .raw
            .strip_suffix(MASK_SUFFIX)
            .and_then(|rest| rest.strip_suffix(SEPARATOR))?;
        KeyPath::parse(raw).ok()
    }

    /// Resolve the container that owns the final field
    pub fn resolve_parent<'a>(
        &self,
        root: &'a Map<String, Value>,
    ) -> Result<&'a Value, PathError> {
        let (first, rest) = self.split_parent();
        let mut current = root.get(first).ok_or_else(|| self.unresolved(first))?;
        for segment in rest {
            current = child(current, segment).ok_or_else(|| self.unresolved(segment))?;
        }
        if is_container(current) {
            Ok(current)
        } else {
            Err(self.not_a_container())
        }
    }

    /// Mutable variant of [`KeyPath::resolve_parent`]
    pub fn resolve_parent_mut<'a>(
        &self,
        root: &'a mut Map<String, Value>,
    ) -> Result<&'a mut Value, PathError> {
        let (first, rest) = self.split_parent();
        let mut current = match root.get_mut(first) {
            Some(node) => node,
            None => return Err(self.unresolved(first)),
        };
        for segment in rest {
            current = match child_mut(current, segment) {
                Some(next) => next,
                None => return Err(self.unresolved(segment)),
            };
        }
        if is_container(current) {
            Ok(current)
        } else {
            Err(self.not_a_container())
        }
    }

    /// Read the addressed field, if present
    pub fn get<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let parent = self.resolve_parent(root).ok()?;
        child(parent, self.field())
    }

    /// Assign the addressed field, returning the previous value.
    ///
    /// Objects gain the field if absent; arrays only accept existing indices.
    pub fn assign(
        &self,
        root: &mut Map<String, Value>,
        value: Value,
    ) -> Result<Option<Value>, PathError> {
        let field = self.field().to_string();
        let parent = self.resolve_parent_mut(root)?;
        match parent {
            Value::Object(map) => Ok(map.insert(field, value)),
            Value::Array(items) => {
                let slot = field
                    .parse::<usize>()
                    .ok()
                    .and_then(move |index| items.get_mut(index))
                    .ok_or_else(|| self.unresolved(&field))?;
                Ok(Some(std::mem::replace(slot, value)))
            }
            _ => Err(self.not_a_container()),
        }
    }

    fn split_parent(&self) -> (&str, &[String]) {
        let parent = self.parent_segments();
        (&parent[0], &parent[1..])
    }

    fn unresolved(&self, segment: &str) -> PathError {
        PathError::Unresolved {
            path: self.raw.clone(),
            segment: segment.to_string(),
        }
    }

    fn not_a_container(&self) -> PathError {
        let segment = self
            .parent_segments()
            .last()
            .cloned()
            .unwrap_or_default();
        PathError::NotAContainer {
            path: self.raw.clone(),
            segment,
        }
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPath::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}
