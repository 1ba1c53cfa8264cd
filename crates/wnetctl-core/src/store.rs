// ── Site persistence ──
//
// The whole `SiteModel` is written on every successful mutation. Writes
// go to a sibling temp file which is then renamed over the target, so a
// crash leaves either the old or the new document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::model::SiteModel;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot encode site document: {0}")]
    Encode(#[source] serde_yaml::Error),

    /// The document parsed but breaks a model invariant.
    #[error("Invalid site document {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Load/save of a complete site document.
pub trait PersistentStore: Send + Sync {
    fn load(&self) -> Result<SiteModel, StoreError>;
    fn save(&self, model: &SiteModel) -> Result<(), StoreError>;
}

impl<T: PersistentStore + ?Sized> PersistentStore for Arc<T> {
    fn load(&self) -> Result<SiteModel, StoreError> {
        (**self).load()
    }

    fn save(&self, model: &SiteModel) -> Result<(), StoreError> {
        (**self).save(model)
    }
}

// ── YAML file store ──────────────────────────────────────────────────

/// A site document on disk.
#[derive(Debug, Clone)]
pub struct YamlStore {
    path: PathBuf,
}

impl YamlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PersistentStore for YamlStore {
    fn load(&self) -> Result<SiteModel, StoreError> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let model = parse_document(&text).map_err(|err| match err {
            DocumentError::Parse(source) => StoreError::Parse {
                path: self.path.clone(),
                source,
            },
            DocumentError::Invalid(message) => StoreError::Invalid {
                path: self.path.clone(),
                message,
            },
        })?;
        debug!(
            path = %self.path.display(),
            access_points = model.access_points.len(),
            ssids = model.ssids.len(),
            "site loaded"
        );
        Ok(model)
    }

    fn save(&self, model: &SiteModel) -> Result<(), StoreError> {
        let text = serde_yaml::to_string(model).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = private_file(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.io_error(e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "site saved");
        Ok(())
    }
}

#[cfg(unix)]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

// ── Documents ────────────────────────────────────────────────────────

enum DocumentError {
    Parse(serde_yaml::Error),
    Invalid(String),
}

fn parse_document(text: &str) -> Result<SiteModel, DocumentError> {
    let model: SiteModel = serde_yaml::from_str(text).map_err(DocumentError::Parse)?;
    model
        .validate()
        .map_err(|err| DocumentError::Invalid(err.to_string()))?;
    Ok(model)
}

/// Parse a site document from a string, as `YamlStore::load` does.
pub fn from_yaml(text: &str) -> Result<SiteModel, StoreError> {
    parse_document(text).map_err(|err| match err {
        DocumentError::Parse(source) => StoreError::Parse {
            path: PathBuf::from("<input>"),
            source,
        },
        DocumentError::Invalid(message) => StoreError::Invalid {
            path: PathBuf::from("<input>"),
            message,
        },
    })
}

/// Serialize a site document.
pub fn to_yaml(model: &SiteModel) -> Result<String, StoreError> {
    serde_yaml::to_string(model).map_err(StoreError::Encode)
}

// ── In-memory store ──────────────────────────────────────────────────

/// Keeps the last saved document in memory. Used when a site is built
/// up before it has a file, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last saved document, if any.
    pub fn snapshot(&self) -> Option<String> {
        self.saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self) -> Result<SiteModel, StoreError> {
        match self.snapshot() {
            Some(text) => from_yaml(&text),
            None => Err(StoreError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    fn save(&self, model: &SiteModel) -> Result<(), StoreError> {
        let text = to_yaml(model)?;
        *self
            .saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text);
        Ok(())
    }
}
