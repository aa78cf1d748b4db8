//! On-disk store for per-object XML configuration blobs.
//!
//! Layout is `<root>/<Kind>/<name>_config.xml`, one file per object,
//! overwritten on every backup.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::{Error, Result};

/// Kind of object a configuration blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    Job,
    View,
    Node,
    Promotion,
}

impl ConfigKind {
    /// Directory name under the store root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ConfigKind::Job => "Job",
            ConfigKind::View => "View",
            ConfigKind::Node => "Node",
            ConfigKind::Promotion => "promotion",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob for `name`. Folder separators are escaped so every
    /// object maps to exactly one file directly under its kind directory;
    /// `%` is escaped too so `a/b` and a literal `a%2Fb` stay distinct.
    pub fn path_for(&self, kind: ConfigKind, name: &str) -> PathBuf {
        let file_name = format!("{}_config.xml", escape_name(name));
        self.root.join(kind.dir_name()).join(file_name)
    }

    pub fn exists(&self, kind: ConfigKind, name: &str) -> bool {
        self.path_for(kind, name).is_file()
    }

    /// Atomically create or overwrite the blob for `name`.
    pub fn save(&self, kind: ConfigKind, name: &str, xml: &str) -> Result<PathBuf> {
        let path = self.path_for(kind, name);
        write_atomic(&path, xml.as_bytes())?;
        tracing::debug!("Saved {} config: {}", kind, path.display());
        Ok(path)
    }

    pub fn load(&self, kind: ConfigKind, name: &str) -> Result<String> {
        let path = self.path_for(kind, name);
        std::fs::read_to_string(&path).map_err(|source| Error::Store { path, source })
    }
}

/// Write to a sibling temp file, then rename over the destination.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let store_err = |source| Error::Store {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(store_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, data).map_err(store_err)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(store_err(e));
    }

    Ok(())
}

fn escape_name(name: &str) -> String {
    name.replace('%', "%25").replace('/', "%2F")
}
