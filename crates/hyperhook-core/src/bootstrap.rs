//! Detector discovery and registration.

use crate::database::Database;
use crate::error::DetectorError;
use crate::lock::FileLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The bootstrap file of a detector directory; never loaded as a detector.
pub const BOOTSTRAP_FILE: &str = "mod.rhai";
/// Advisory lock held while a detector directory is walked.
pub const LOCK_FILE: &str = ".bootstrap.lock";

/// A module that registers hooks on a database.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, db: &mut Database) -> Result<(), DetectorError>;
}

/// Compiled-in detectors addressable by name from `.toml` manifests.
#[derive(Clone, Default)]
pub struct DetectorCatalog {
    detectors: BTreeMap<String, Arc<dyn Detector>>,
}

impl fmt::Debug for DetectorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.detectors.keys()).finish()
    }
}

impl DetectorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, detector: impl Detector + 'static) -> Self {
        self.insert(Arc::new(detector));
        self
    }

    /// Add or replace a detector under its own name.
    pub fn insert(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.insert(detector.name().to_string(), detector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Detector>> {
        self.detectors.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Register one catalog detector on `db`.
    pub fn register(&self, name: &str, db: &mut Database) -> Result<(), DetectorError> {
        let detector = self
            .get(name)
            .ok_or_else(|| DetectorError::UnknownBuiltin(name.to_string()))?;
        detector.register(db)
    }
}

/// What a bootstrap walk loaded and what failed (file name, reason).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Contents of a `.toml` detector manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub builtin: String,
}

/// Load every detector in `dir` onto `db`.
///
/// Top-level regular files are visited in file-name order. `.rhai` files
/// are script detectors, `.toml` files are manifests naming a catalog
/// detector. Hidden files, [`BOOTSTRAP_FILE`] and other extensions are
/// skipped. A failing file is logged and recorded; the walk continues.
///
/// A missing directory loads nothing.
pub fn bootstrap(
    db: &mut Database,
    dir: impl AsRef<Path>,
    catalog: &DetectorCatalog,
) -> Result<BootstrapReport, DetectorError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "no detector directory");
        return Ok(BootstrapReport::default());
    }

    let _lock = FileLock::acquire(dir.join(LOCK_FILE))?;
    let io_err = |e: std::io::Error| DetectorError::Io(format!("{}: {e}", dir.display()));

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    files.sort();

    let mut report = BootstrapReport::default();
    for (name, path) in files {
        if name == BOOTSTRAP_FILE || name.starts_with('.') {
            continue;
        }
        let result = match path.extension().and_then(|ext| ext.to_str()) {
            Some("rhai") => load_script(db, &path),
            Some("toml") => load_manifest(db, &path, catalog),
            _ => {
                tracing::trace!(file = %name, "skipping non-detector file");
                continue;
            }
        };
        match result {
            Ok(()) => {
                tracing::info!(detector = %name, "detector loaded");
                report.loaded.push(name);
            }
            Err(err) => {
                tracing::error!(detector = %name, error = %err, "detector failed to load");
                report.failed.push((name, err.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(feature = "script")]
fn load_script(db: &mut Database, path: &Path) -> Result<(), DetectorError> {
    crate::script::ScriptDetector::load(path)?.register(db)
}

#[cfg(not(feature = "script"))]
fn load_script(_db: &mut Database, path: &Path) -> Result<(), DetectorError> {
    Err(DetectorError::Script {
        name: path.display().to_string(),
        message: "script detectors are not enabled in this build".to_string(),
    })
}

fn load_manifest(
    db: &mut Database,
    path: &Path,
    catalog: &DetectorCatalog,
) -> Result<(), DetectorError> {
    let text = fs::read_to_string(path)
        .map_err(|e| DetectorError::Io(format!("{}: {e}", path.display())))?;
    let manifest: Manifest = toml::from_str(&text).map_err(|e| DetectorError::Manifest {
        name: path.display().to_string(),
        message: e.to_string(),
    })?;
    catalog.register(&manifest.builtin, db)
}
