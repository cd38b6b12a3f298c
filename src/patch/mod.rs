//! Declarative field patches for a spec document.
//!
//! A `PatchSet` is an ordered list of assignments. It is plain data, built
//! fresh from a network profile and applied once.

pub mod apply;

pub use apply::{PatchFailure, apply_patch};

use crate::document::KeyPath;

use serde::Deserialize;
use serde_json::{Map, Value};

/// What to do at the target of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Overwrite (or create) the leaf.
    Set { value: Value },
    /// Shallow-merge keys into an existing object.
    Merge { value: Map<String, Value> },
    /// Append items to an existing array, skipping ones already present.
    Extend { items: Vec<Value> },
}

/// One `(path, op)` pair, with an optional value to create the leaf from when
/// no candidate key exists.
///
/// JSON shape:
/// {"path": [...], "op": "set" | "merge" | "extend", "value": ..., "items": [...], "default": ..., "optional": bool}
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAssignment")]
pub struct Assignment {
    pub path: KeyPath,
    pub op: PatchOp,
    pub default: Option<Value>,
    /// Skip, with a warning, when the path does not exist in this document.
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Set,
    Merge,
    Extend,
}

/// Serialized form of an assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAssignment {
    path: KeyPath,
    op: OpKind,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    optional: bool,
}

impl TryFrom<RawAssignment> for Assignment {
    type Error = String;

    fn try_from(raw: RawAssignment) -> Result<Self, Self::Error> {
        let op = match (raw.op, raw.value, raw.items) {
            (OpKind::Set, Some(value), None) => PatchOp::Set { value },
            (OpKind::Merge, Some(Value::Object(value)), None) => PatchOp::Merge { value },
            (OpKind::Merge, Some(_), None) => {
                return Err(format!("merge at {} needs an object value", raw.path));
            }
            (OpKind::Extend, None, Some(items)) => PatchOp::Extend { items },
            (kind, _, _) => {
                let wanted = match kind {
                    OpKind::Extend => "`items`",
                    _ => "`value`",
                };
                return Err(format!("{:?} at {} takes exactly {}", kind, raw.path, wanted));
            }
        };
        Ok(Assignment {
            path: raw.path,
            op,
            default: raw.default,
            optional: raw.optional,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    assignments: Vec<Assignment>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    pub fn set(mut self, path: KeyPath, value: Value) -> Self {
        self.push(Assignment {
            path,
            op: PatchOp::Set { value },
            default: None,
            optional: false,
        });
        self
    }

    pub fn merge(mut self, path: KeyPath, value: Map<String, Value>) -> Self {
        self.push(Assignment {
            path,
            op: PatchOp::Merge { value },
            default: None,
            optional: false,
        });
        self
    }

    pub fn append(mut self, path: KeyPath, items: Vec<Value>) -> Self {
        self.push(Assignment {
            path,
            op: PatchOp::Extend { items },
            default: None,
            optional: false,
        });
        self
    }

    /// Give the most recently added assignment a fallback leaf value.
    pub fn or_default(mut self, value: Value) -> Self {
        if let Some(last) = self.assignments.last_mut() {
            last.default = Some(value);
        }
        self
    }

    /// Mark the most recently added assignment as optional.
    pub fn optional(mut self) -> Self {
        if let Some(last) = self.assignments.last_mut() {
            last.optional = true;
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl Extend<Assignment> for PatchSet {
    fn extend<T: IntoIterator<Item = Assignment>>(&mut self, iter: T) {
        self.assignments.extend(iter);
    }
}
