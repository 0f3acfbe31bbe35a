// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed field extraction from semi-structured event payloads.
//!
//! An [`ExtractionSchema`] is an ordered list of `(target, selector)` rules.
//! Each [`Selector`] walks a static key path through the payload; a missing
//! hop, a non-object intermediate, a `null` leaf or an empty attribute list
//! all leave the target field unset instead of failing.

mod schemas;

pub use schemas::{
    FARGATE_SCHEMA, FargateFields, INSTANCE_SCHEMA, InstanceFields, JOB_SCHEMA, JobFields,
};

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

/// A key path from the payload root.
pub type FieldPath = &'static [&'static str];

/// How a rule reads its value out of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The value at `path`.
    Value(FieldPath),
    /// The first entry of the list at `list` whose `key_field` equals
    /// `key_value`, projected to its `value_field`.
    FirstMatch {
        /// Path of the attribute list.
        list: FieldPath,
        /// Entry field compared against `key_value`.
        key_field: &'static str,
        /// Expected value of `key_field`.
        key_value: &'static str,
        /// Entry field returned on match.
        value_field: &'static str,
    },
    /// Whether the list at `list` contains the string `literal`.
    Contains {
        /// Path of the string list.
        list: FieldPath,
        /// The literal looked for.
        literal: &'static str,
    },
}

impl Selector {
    /// Evaluate the selector against a payload.
    pub fn select(&self, root: &Value) -> Option<Value> {
        match self {
            Self::Value(path) => walk(root, path).cloned(),
            Self::FirstMatch {
                list,
                key_field,
                key_value,
                value_field,
            } => walk(root, list)?
                .as_array()?
                .iter()
                .find(|entry| entry.get(*key_field).and_then(Value::as_str) == Some(*key_value))
                .and_then(|entry| entry.get(*value_field))
                .filter(|value| !value.is_null())
                .cloned(),
            Self::Contains { list, literal } => {
                let found = walk(root, list)
                    .and_then(Value::as_array)
                    .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(*literal)));
                Some(Value::Bool(found))
            }
        }
    }
}

/// One `(target, selector)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Output field name.
    pub target: &'static str,
    /// Where the value comes from.
    pub selector: Selector,
}

/// A named, ordered set of extraction rules.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionSchema {
    /// Schema name, used in logs.
    pub name: &'static str,
    /// Rules applied in order.
    pub rules: &'static [ExtractionRule],
}

impl ExtractionSchema {
    /// Project a payload into a flat field map.
    pub fn extract(&self, payload: &Value) -> ExtractedFields {
        let mut fields = BTreeMap::new();
        for rule in self.rules {
            if let Some(value) = rule.selector.select(payload) {
                fields.insert(rule.target, value);
            }
        }
        trace!(schema = self.name, found = fields.len(), "Fields extracted");
        ExtractedFields { fields }
    }

    /// Output field names in rule order.
    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.target)
    }
}

/// Walk a key path, returning `None` on any missing hop or a `null` leaf.
pub fn walk<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Flat result of applying an [`ExtractionSchema`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    fields: BTreeMap<&'static str, Value>,
}

impl ExtractedFields {
    /// Raw value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the field was found.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Scalar field rendered as text. Numbers and booleans are stringified;
    /// arrays and objects are not scalars and read as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integral field; numeric strings are accepted.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean field; absent reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Number of fields found.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was found.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }
}
