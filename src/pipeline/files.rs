//! Writing the intermediate plain spec and the final raw spec.

use crate::document::SpecDocument;
use crate::error::{Error, Result};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Serialize `doc` to `path` as pretty JSON.
///
/// The file handle is closed before returning on every path. If serialization
/// fails partway, the truncated file is removed.
pub fn write_intermediate(doc: &SpecDocument, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(format!("create {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    let written = serde_json::to_writer_pretty(&mut writer, doc)
        .map_err(io::Error::from)
        .and_then(|()| writer.flush());
    drop(writer);

    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(Error::io(format!("write {}", path.display()), e));
    }
    Ok(())
}

/// Write `bytes` to `path` atomically: a temp file in the same directory is
/// persisted over the destination, so readers never see a partial spec.
pub fn write_output(bytes: &[u8], path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(format!("create {}", dir.display()), e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::io(format!("create temp file in {}", dir.display()), e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| Error::io(format!("write {}", tmp.path().display()), e))?;
    tmp.persist(path)
        .map_err(|e| Error::io(format!("replace {}", path.display()), e.error))?;
    Ok(())
}
