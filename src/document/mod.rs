//! Spec document layer: the JSON tree, key paths and the schema table.
//!
//! No schema is enforced on the document itself. Callers navigate it through
//! `KeyPath`, which knows about renamed pallets and moved genesis roots.

pub mod path;
pub mod schema;

pub use path::KeyPath;
pub use schema::{Layout, Pallet};

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A chain specification as an arbitrary JSON tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecDocument(Value);

impl SpecDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse bytes as JSON. `context` names the source in the error.
    pub fn from_slice(bytes: &[u8], context: &str) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map(Self)
            .map_err(|source| Error::Parse {
                context: context.to_string(),
                source,
            })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        Self::from_slice(&bytes, &path.display().to_string())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub(crate) fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        path.get(&self.0)
    }

    pub fn layout(&self) -> Option<Layout> {
        Layout::detect(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_error_names_context() {
        let err = SpecDocument::from_slice(b"Error: not json", "build-spec stdout").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().starts_with("build-spec stdout is not valid JSON"));
    }

    #[test]
    fn large_balances_survive_parsing() {
        let doc = SpecDocument::from_slice(
            br#"{"genesis":{"runtime":{"balances":{"balances":[["a",10000000000000000000000000000]]}}}}"#,
            "test",
        )
        .unwrap();
        let path = KeyPath::pallet(Pallet::Balances).key("balances");
        assert_eq!(
            serde_json::to_string(doc.get(&path).unwrap()).unwrap(),
            r#"[["a",10000000000000000000000000000]]"#
        );
        assert_eq!(doc.layout(), Some(Layout::Legacy));
    }

    #[test]
    fn serializes_transparently() {
        let doc = SpecDocument::new(json!({"name": "Dev", "bootNodes": []}));
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"name":"Dev","bootNodes":[]}"#
        );
    }
}
