//! Schema documentation served to external agents.
//!
//! The authoritative copy ships inside the editor installation under the
//! context directory; a bundled copy compiled into this crate covers
//! standalone hosts. The first successful read is cached for the life of
//! the loader, so repeated tool calls never touch the filesystem again.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// File name the schema documentation is published under.
pub const SCHEMA_FILE_NAME: &str = "workflow-schema.md";

const BUNDLED_SCHEMA: &str = include_str!("../assets/workflow-schema.md");

/// Loader for the workflow schema documentation.
#[derive(Debug, Default)]
pub struct SchemaLoader {
    base_dir: Mutex<Option<PathBuf>>,
    cached: OnceCell<String>,
}

impl SchemaLoader {
    /// Create a loader with no context directory; only the bundled copy is
    /// available until [`SchemaLoader::set_base_dir`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the loader at the embedding application's context directory.
    ///
    /// Has no effect on an already-populated cache.
    pub fn set_base_dir(&self, base_dir: impl AsRef<Path>) {
        let mut guard = self.base_dir.lock().expect("schema base dir lock");
        *guard = Some(base_dir.as_ref().to_path_buf());
    }

    /// Return the schema documentation, reading it on first use.
    ///
    /// Resolution order: `<base_dir>/workflow-schema.md` when a context
    /// directory is set, otherwise the bundled copy. A configured directory
    /// without the file is an error rather than a silent fallback, so a
    /// broken installation is visible to the caller.
    pub fn load(&self) -> Result<&str> {
        let content = self.cached.get_or_try_init(|| {
            let base_dir = self.base_dir.lock().expect("schema base dir lock").clone();
            match base_dir {
                Some(directory) => {
                    let path = directory.join(SCHEMA_FILE_NAME);
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read schema documentation at '{}'", path.display()))?;
                    debug!(path = %path.display(), "loaded workflow schema documentation");
                    Ok::<String, anyhow::Error>(content)
                }
                None => Ok(BUNDLED_SCHEMA.to_string()),
            }
        })?;
        Ok(content.as_str())
    }
}
