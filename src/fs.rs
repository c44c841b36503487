//! Blocking filesystem helpers for the pipeline, which runs synchronously.

use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;

pub(crate) fn file(path: impl AsRef<Path>) -> Result<std::fs::File> {
    let path = path.as_ref();
    std::fs::File::create(path).context(format!("Unable to create file {}", path.display()))
}

pub(crate) fn write_all(path: impl AsRef<Path>, data: impl IntoIterator<Item = u8>) -> Result<()> {
    let path = path.as_ref();
    let mut f = file(path)?;
    let buf: Vec<u8> = data.into_iter().collect();
    f.write_all(&buf)
        .context(format!("Unable to write data to {}", path.display()))?;
    f.sync_all()
        .context(format!("Unable to flush {}", path.display()))
}

pub(crate) fn read_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).context(format!("Unable to read file {}", path.display()))
}

pub(crate) fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    std::fs::rename(from, to).with_context(|| {
        format!(
            "Unable to move '{}' to '{}'",
            from.display(),
            to.display()
        )
    })
}

/// Removing a file that is already gone is not an error.
pub(crate) fn remove_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Ok(()),
            _ => Err(e).context(format!("Unable to remove {}", path.display())),
        },
    }
}
