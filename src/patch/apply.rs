use crate::LOG_TARGET;
use crate::document::path::{Leaf, object_at_mut};
use crate::document::{Layout, SpecDocument};
use crate::error::{Error, Result};
use crate::patch::{Assignment, PatchOp, PatchSet};

use serde_json::Value;

/// A patch that stopped partway.
#[derive(Debug)]
pub struct PatchFailure {
    pub error: Error,
    /// Index of the assignment that failed.
    pub index: usize,
    /// The document with every assignment before `index` applied.
    pub partial: SpecDocument,
}

/// Apply `patch` to a copy of `doc`, in order.
///
/// `doc` itself is never modified. A failing assignment leaves its own target
/// untouched; the copy with all earlier assignments applied is returned in the
/// failure so it can be written out for inspection.
pub fn apply_patch(doc: &SpecDocument, patch: &PatchSet) -> std::result::Result<SpecDocument, PatchFailure> {
    let mut out = doc.clone();
    for (index, assignment) in patch.iter().enumerate() {
        if let Err(error) = apply_one(out.as_value_mut(), assignment) {
            return Err(PatchFailure {
                error,
                index,
                partial: out,
            });
        }
    }
    Ok(out)
}

fn apply_one(root: &mut Value, assignment: &Assignment) -> Result<()> {
    match apply_required(root, assignment) {
        Err(Error::MissingPath { path, .. }) if assignment.optional => {
            let layout = Layout::detect(root).map_or_else(|| "unrecognised".to_string(), |l| l.root().join("."));
            log::warn!(
                target: LOG_TARGET,
                "ignoring {}: no known key for `{}` in this chain spec (genesis at {})",
                assignment.path,
                path,
                layout
            );
            Ok(())
        }
        other => other,
    }
}

fn apply_required(root: &mut Value, assignment: &Assignment) -> Result<()> {
    let path = &assignment.path;
    let resolved = path.resolve(root)?;
    let parent = object_at_mut(root, &resolved.parents).ok_or_else(|| Error::MissingPath {
        path: path.to_string(),
        dump: None,
    })?;

    match (&assignment.op, resolved.leaf) {
        (PatchOp::Set { value }, leaf) => {
            parent.insert(leaf.name().to_string(), value.clone());
        }
        (op, Leaf::Present(name)) => {
            let target = parent.get_mut(&name).ok_or_else(|| Error::MissingPath {
                path: path.to_string(),
                dump: None,
            })?;
            combine(op, target, &path.to_string())?;
        }
        (op, Leaf::Absent(name)) => {
            let Some(default) = &assignment.default else {
                return Err(Error::MissingPath {
                    path: format!("{} (resolved up to {})", path, resolved.parents.join(".")),
                    dump: None,
                });
            };
            // Build the new leaf off to the side so a type error leaves the
            // document as it was.
            let mut target = default.clone();
            combine(op, &mut target, &path.to_string())?;
            log::warn!(
                target: LOG_TARGET,
                "{} not found, created `{}` from its default",
                path,
                name
            );
            parent.insert(name, target);
        }
    }

    Ok(())
}

fn combine(op: &PatchOp, target: &mut Value, path: &str) -> Result<()> {
    match op {
        PatchOp::Set { value } => *target = value.clone(),
        PatchOp::Merge { value } => {
            let obj = target.as_object_mut().ok_or_else(|| Error::TypeMismatch {
                path: path.to_string(),
                expected: "an object",
            })?;
            for (k, v) in value {
                obj.insert(k.clone(), v.clone());
            }
        }
        PatchOp::Extend { items } => {
            let arr = target.as_array_mut().ok_or_else(|| Error::TypeMismatch {
                path: path.to_string(),
                expected: "a list",
            })?;
            for item in items {
                if !arr.contains(item) {
                    arr.push(item.clone());
                }
            }
        }
    }
    Ok(())
}
