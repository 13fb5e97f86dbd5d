use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Durable single-value store for the last successfully processed cursor.
///
/// The cursor on disk never refers to a block later than the last one whose
/// notifications were emitted; a crash between emit and persist re-emits at
/// most one block on restart (at-least-once delivery).
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CursorStore { path: path.into() }
    }

    /// Returns the stored cursor, or an empty string when the file does not
    /// exist yet (fresh start). Any other read failure propagates.
    pub fn load(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("unable to read file {:?}", self.path)),
        }
    }

    /// Overwrites the file's entire contents with the cursor, creating parent
    /// directories as needed. Called once per processed block.
    pub fn save(&self, cursor: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("unable to create directory {parent:?} (and its parents)")
                })?;
            }
        }

        fs::write(&self.path, cursor)
            .with_context(|| format!("unable to write file {:?}", self.path))
    }
}
