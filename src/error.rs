//! Error taxonomy shared by the document, patch, tool and pipeline layers.
//!
//! The CLI layer in `main.rs` works with `anyhow`; everything below it returns
//! this typed error so tests can match on the failure kind.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The external tool ran but exited unsuccessfully.
    #[error("`{command}` failed with {}: {}", exit_label(*code), first_line(stderr))]
    ToolInvocation {
        command: String,
        /// `None` when the process was terminated by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` did not finish within {}s", timeout.as_secs())]
    ToolTimeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("cannot start `{command}`")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context} is not valid JSON")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// None of the known key names for a mandatory substructure exist.
    #[error("no known key found for `{path}`{}", dump_hint(dump))]
    MissingPath {
        path: String,
        /// Where the partially patched document was written, if it was.
        dump: Option<PathBuf>,
    },

    /// The target exists but cannot take the operation (e.g. merging into a list).
    #[error("`{path}` is not {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach the location of the persisted partial document to a `MissingPath`.
    pub(crate) fn with_dump(self, path: PathBuf) -> Self {
        match self {
            Self::MissingPath { path: key, .. } => Self::MissingPath {
                path: key,
                dump: Some(path),
            },
            other => other,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "a signal".to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("<no stderr>")
}

fn dump_hint(dump: &Option<PathBuf>) -> String {
    match dump {
        Some(p) => format!(" (partial document written to {})", p.display()),
        None => String::new(),
    }
}
