//! Key paths into a spec document, with renamed-key fallbacks.
//!
//! JSON shape of a path (as used in profile `extra` entries):
//!
//! ```text
//! ["@runtime", "@balances", "balances"]
//! ["genesis", ["runtime", "runtimeGenesis"], "code"]
//! ```
//!
//! - `"@runtime"` expands to the runtime genesis root of the detected layout.
//! - `"@<alias>"` is a pallet from the schema table, e.g. `"@balances"`.
//! - a list is an ordered set of candidate key names; the first present wins.
//! - any other string is a plain key.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::document::schema::{Layout, Pallet};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    AnyOf(Vec<String>),
    RuntimeRoot,
    Pallet(Pallet),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<RawSegment>")]
pub struct KeyPath(Vec<Segment>);

/// Serialized form of one segment.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSegment {
    One(String),
    AnyOf(Vec<String>),
}

/// Where a path landed: concrete parent keys plus the leaf key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub parents: Vec<String>,
    pub leaf: Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    /// One of the candidate names exists.
    Present(String),
    /// None exists; carries the highest-priority name.
    Absent(String),
}

impl Leaf {
    pub fn name(&self) -> &str {
        match self {
            Leaf::Present(n) | Leaf::Absent(n) => n,
        }
    }
}

/// Return the first candidate that is a key of `map`.
///
/// Every lookup of a renamed substructure goes through here.
pub fn first_present<'a, S: AsRef<str>>(map: &Map<String, Value>, candidates: &'a [S]) -> Option<&'a str> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|c| map.contains_key(*c))
}

impl KeyPath {
    /// Path starting at the document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path starting at the runtime genesis root.
    pub fn runtime() -> Self {
        Self(vec![Segment::RuntimeRoot])
    }

    /// Path starting at a pallet under the runtime genesis root.
    pub fn pallet(pallet: Pallet) -> Self {
        Self::runtime().then(Segment::Pallet(pallet))
    }

    pub fn key(self, key: impl Into<String>) -> Self {
        self.then(Segment::Key(key.into()))
    }

    pub fn any_of(self, candidates: &[&str]) -> Self {
        self.then(Segment::AnyOf(candidates.iter().map(|c| c.to_string()).collect()))
    }

    pub fn then(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Resolve against `doc`. Every segment except the last must exist under
    /// one of its candidate names; the last one may be absent.
    pub fn resolve(&self, doc: &Value) -> Result<Resolved> {
        let steps = self.expand(doc)?;
        let Some((last, init)) = steps.split_last() else {
            return Err(self.missing("<empty path>".to_string()));
        };

        let mut cur = doc;
        let mut parents: Vec<String> = Vec::new();
        for (idx, candidates) in init.iter().enumerate() {
            let obj = cur
                .as_object()
                .ok_or_else(|| self.missing(render(&parents, &steps[idx..])))?;
            let name = first_present(obj, candidates.as_slice())
                .ok_or_else(|| self.missing(render(&parents, &steps[idx..])))?;
            parents.push(name.to_string());
            cur = &obj[name];
        }

        let obj = cur
            .as_object()
            .ok_or_else(|| self.missing(render(&parents, &steps[init.len()..])))?;
        let leaf = match first_present(obj, last.as_slice()) {
            Some(name) => Leaf::Present(name.to_string()),
            None => Leaf::Absent(
                last.first()
                    .cloned()
                    .ok_or_else(|| self.missing(render(&parents, &steps[init.len()..])))?,
            ),
        };

        Ok(Resolved { parents, leaf })
    }

    /// Look up the value at this path, if every segment resolves.
    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let resolved = self.resolve(doc).ok()?;
        let parent = object_at(doc, &resolved.parents)?;
        match resolved.leaf {
            Leaf::Present(name) => parent.get(&name),
            Leaf::Absent(_) => None,
        }
    }

    /// Turn segments into per-step candidate lists, resolving the layout and
    /// pallet aliases.
    fn expand(&self, doc: &Value) -> Result<Vec<Vec<String>>> {
        let mut steps = Vec::new();
        for segment in &self.0 {
            match segment {
                Segment::Key(k) => steps.push(vec![k.clone()]),
                Segment::AnyOf(c) => steps.push(c.clone()),
                Segment::Pallet(p) => steps.push(p.aliases().iter().map(|a| a.to_string()).collect()),
                Segment::RuntimeRoot => {
                    let layout = Layout::detect(doc)
                        .ok_or_else(|| self.missing(Layout::describe_all()))?;
                    steps.extend(layout.root().iter().map(|k| vec![k.to_string()]));
                }
            }
        }
        Ok(steps)
    }

    fn missing(&self, at: String) -> Error {
        Error::MissingPath {
            path: if at == self.to_string() {
                at
            } else {
                format!("{} (while resolving {})", at, self)
            },
            dump: None,
        }
    }
}

impl TryFrom<Vec<RawSegment>> for KeyPath {
    type Error = String;

    fn try_from(raw: Vec<RawSegment>) -> std::result::Result<Self, Self::Error> {
        if raw.is_empty() {
            return Err("key path cannot be empty".to_string());
        }
        let mut path = KeyPath::root();
        for seg in raw {
            let segment = match seg {
                RawSegment::One(s) if s == "@runtime" => Segment::RuntimeRoot,
                RawSegment::One(s) => match s.strip_prefix('@') {
                    Some(alias) => Pallet::from_alias(alias)
                        .map(Segment::Pallet)
                        .ok_or_else(|| format!("unknown pallet alias '{}'", s))?,
                    None => Segment::Key(s),
                },
                RawSegment::AnyOf(c) if c.is_empty() => {
                    return Err("candidate list cannot be empty".to_string());
                }
                RawSegment::AnyOf(c) => Segment::AnyOf(c),
            };
            path = path.then(segment);
        }
        Ok(path)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Key(k) => k.clone(),
                Segment::AnyOf(c) => alternatives(c.as_slice()),
                Segment::RuntimeRoot => "<runtime>".to_string(),
                Segment::Pallet(p) => alternatives(p.aliases()),
            })
            .collect();
        write!(f, "{}", parts.join("."))
    }
}

pub(crate) fn object_at<'a>(doc: &'a Value, keys: &[String]) -> Option<&'a Map<String, Value>> {
    let mut cur = doc;
    for k in keys {
        cur = cur.get(k)?;
    }
    cur.as_object()
}

pub(crate) fn object_at_mut<'a>(doc: &'a mut Value, keys: &[String]) -> Option<&'a mut Map<String, Value>> {
    let mut cur = doc;
    for k in keys {
        cur = cur.get_mut(k)?;
    }
    cur.as_object_mut()
}

fn alternatives<S: AsRef<str>>(c: &[S]) -> String {
    match c {
        [one] => one.as_ref().to_string(),
        _ => {
            let names: Vec<&str> = c.iter().map(AsRef::as_ref).collect();
            format!("({})", names.join("|"))
        }
    }
}

fn render(resolved: &[String], rest: &[Vec<String>]) -> String {
    resolved
        .iter()
        .cloned()
        .chain(rest.iter().map(|c| alternatives(c.as_slice())))
        .collect::<Vec<_>>()
        .join(".")
}
