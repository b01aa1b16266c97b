//! Attribute schema for playbook entities
//!
//! Every entity (task include, block, role, task) declares the typed
//! fields it accepts. Binding a canonical mapping against a schema checks
//! each value's kind, applies coercions and fills in defaults.

use crate::error::{value_kind, PlaybookError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// Kind of value an attribute holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    List(ItemKind),
    Dict,
}

/// Kind of the items in a list attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Any,
    String,
}

impl AttributeKind {
    fn label(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::List(_) => "list",
            AttributeKind::Dict => "dict",
        }
    }
}

/// Default applied when an attribute is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeDefault {
    None,
    EmptyList,
    EmptyDict,
}

/// A single declared field
#[derive(Debug, Clone, Copy)]
pub struct FieldAttribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub default: AttributeDefault,
    /// Internal-only; excluded from the external representation
    pub private: bool,
    pub required: bool,
}

impl FieldAttribute {
    pub const fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            default: AttributeDefault::None,
            private: false,
            required: false,
        }
    }

    pub const fn with_default(mut self, default: AttributeDefault) -> Self {
        self.default = default;
        self
    }

    pub const fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn default_value(&self) -> Option<Value> {
        match self.default {
            AttributeDefault::None => None,
            AttributeDefault::EmptyList => Some(Value::Sequence(Vec::new())),
            AttributeDefault::EmptyDict => Some(Value::Mapping(Mapping::new())),
        }
    }

    /// Validate and coerce a value against this field's declared kind
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self.kind, value) {
            (AttributeKind::String, Value::String(s)) => Ok(Value::String(s)),
            (AttributeKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (AttributeKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (AttributeKind::List(items), Value::Sequence(seq)) => seq
                .into_iter()
                .map(|item| self.coerce_item(items, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            (AttributeKind::List(items), scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                Ok(Value::Sequence(vec![self.coerce_item(items, scalar)?]))
            }
            (AttributeKind::Dict, Value::Mapping(map)) => Ok(Value::Mapping(map)),
            (kind, other) => Err(self.violation(kind.label(), &other)),
        }
    }

    fn coerce_item(&self, items: ItemKind, item: Value) -> Result<Value> {
        match (items, item) {
            (ItemKind::Any, item) => Ok(item),
            (ItemKind::String, Value::String(s)) => Ok(Value::String(s)),
            (ItemKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ItemKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (ItemKind::String, other) => Err(self.violation("list of strings", &other)),
        }
    }

    fn violation(&self, expected: &'static str, found: &Value) -> PlaybookError {
        PlaybookError::SchemaViolation {
            field: self.name.to_string(),
            expected,
            found: value_kind(found),
        }
    }
}

/// The declared fields of one entity kind
#[derive(Debug)]
pub struct AttributeSchema {
    /// Human readable description used in error messages
    pub desc: &'static str,
    pub fields: &'static [FieldAttribute],
}

impl AttributeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldAttribute> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields that appear in the external representation
    pub fn public_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| !f.private).map(|f| f.name)
    }

    /// Bind a canonical mapping to this schema.
    ///
    /// Unknown keys are rejected, missing required fields are rejected,
    /// `null` and absent values take the field default.
    pub fn bind(&self, canonical: &Mapping) -> Result<Mapping> {
        for key in canonical.keys() {
            let name = key.as_str().unwrap_or_default();
            if self.field(name).is_none() {
                return Err(PlaybookError::directive(format!(
                    "'{}' is not a valid attribute for a {}",
                    name, self.desc
                )));
            }
        }

        let mut bound = Mapping::new();
        for field in self.fields {
            let raw = canonical
                .get(field.name)
                .cloned()
                .filter(|v| !v.is_null());
            let value = match raw {
                Some(v) => Some(field.coerce(v)?),
                None if field.required => {
                    return Err(PlaybookError::directive(format!(
                        "{} must specify '{}'",
                        self.desc, field.name
                    )))
                }
                None => field.default_value(),
            };
            if let Some(value) = value {
                bound.insert(Value::String(field.name.to_string()), value);
            }
        }
        Ok(bound)
    }

    /// Bind a canonical mapping and deserialize it into a typed attribute set
    pub fn load<T: DeserializeOwned>(&self, canonical: &Mapping) -> Result<T> {
        let bound = self.bind(canonical)?;
        serde_yaml::from_value(Value::Mapping(bound))
            .map_err(|e| PlaybookError::directive(format!("invalid {}: {}", self.desc, e)))
    }
}

const TAGS: FieldAttribute = FieldAttribute::new("tags", AttributeKind::List(ItemKind::String))
    .with_default(AttributeDefault::EmptyList);
const VARS: FieldAttribute =
    FieldAttribute::new("vars", AttributeKind::Dict).with_default(AttributeDefault::EmptyDict);
const WHEN: FieldAttribute = FieldAttribute::new("when", AttributeKind::List(ItemKind::String))
    .with_default(AttributeDefault::EmptyList);
const NAME: FieldAttribute = FieldAttribute::new("name", AttributeKind::String);
const LOOP: FieldAttribute = FieldAttribute::new("loop", AttributeKind::String).private();
const LOOP_ARGS: FieldAttribute =
    FieldAttribute::new("loop_args", AttributeKind::List(ItemKind::Any)).private();

/// Fields of an `include:` directive
pub static TASK_INCLUDE_SCHEMA: AttributeSchema = AttributeSchema {
    desc: "task include statement",
    fields: &[
        NAME,
        FieldAttribute::new("include", AttributeKind::String).required(),
        LOOP,
        LOOP_ARGS,
        TAGS,
        VARS,
        WHEN,
    ],
};

/// Keyword fields of a block (its task sections are handled separately)
pub static BLOCK_SCHEMA: AttributeSchema = AttributeSchema {
    desc: "block",
    fields: &[NAME, TAGS, VARS, WHEN],
};

/// Fields of a role as seen by this core
pub static ROLE_SCHEMA: AttributeSchema = AttributeSchema {
    desc: "role",
    fields: &[
        FieldAttribute::new("name", AttributeKind::String).required(),
        TAGS,
        VARS,
        WHEN,
    ],
};

/// Keyword fields of a task (the action key is handled separately)
pub static TASK_SCHEMA: AttributeSchema = AttributeSchema {
    desc: "task",
    fields: &[NAME, LOOP, LOOP_ARGS, TAGS, VARS, WHEN],
};
