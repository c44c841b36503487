//! Writes both dashboard files or neither.

use crate::error::Res;
use crate::fs;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Shown with any write failure; the usual cause is the dashboard being open in another program.
pub(crate) const REMEDIATION: &str =
    "close the file if it is open elsewhere, check that the folder is writable, then run again";

/// A file to replace: its path, the content it had when it was read, and the new content.
pub(crate) struct Replacement<'a> {
    pub(crate) path: &'a Path,
    pub(crate) original: &'a str,
    pub(crate) contents: &'a str,
}

/// `.index.html.3f2a….tmp` next to `index.html`, so the final rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = format!(".{name}.{}.tmp", Uuid::new_v4().simple());
    path.with_file_name(temp)
}

/// Writes every replacement to a temporary sibling, then renames them into place in order. If a
/// rename fails, the files already renamed get their original content back.
pub(crate) fn replace_all(replacements: &[Replacement<'_>]) -> Res<()> {
    let mut temps = Vec::with_capacity(replacements.len());
    for r in replacements {
        let temp = temp_path(r.path);
        if let Err(e) = fs::write_all(&temp, r.contents.bytes()) {
            temps.push(temp);
            cleanup(&temps);
            return Err(e).with_context(|| {
                format!("Unable to prepare {}: {REMEDIATION}", r.path.display())
            });
        }
        temps.push(temp);
    }

    for (i, (r, temp)) in replacements.iter().zip(&temps).enumerate() {
        debug!("Renaming {} to {}", temp.display(), r.path.display());
        if let Err(e) = fs::rename(temp, r.path) {
            cleanup(&temps[i..]);
            restore(&replacements[..i]);
            return Err(e).with_context(|| {
                format!(
                    "Unable to write {}, no dashboard file was changed: {REMEDIATION}",
                    r.path.display()
                )
            });
        }
    }
    Ok(())
}

fn cleanup(temps: &[PathBuf]) {
    for temp in temps {
        if let Err(e) = fs::remove_file(temp) {
            warn!("{e:#}");
        }
    }
}

fn restore(done: &[Replacement<'_>]) {
    for r in done {
        match fs::write_all(r.path, r.original.bytes()) {
            Ok(()) => debug!("Restored {}", r.path.display()),
            Err(e) => warn!("Unable to restore {}: {e:#}", r.path.display()),
        }
    }
}
