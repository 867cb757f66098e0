//! Tracker home directories.
//!
//! ```text
//! <tracker>/
//!   config.toml
//!   schema.toml
//!   detectors/
//!   db/nodes.jsonl
//!   db/journal.jsonl
//! ```

use crate::bootstrap::{BootstrapReport, DetectorCatalog, Manifest, bootstrap};
use crate::config::TrackerConfig;
use crate::database::Database;
use crate::error::{DbError, TrackerError};
use crate::lock::FileLock;
use crate::tx::TxSource;
use hyperhook_db::{MemoryStorage, Schema, Storage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_FILE: &str = "config.toml";
pub const SCHEMA_FILE: &str = "schema.toml";
pub const DETECTORS_DIR: &str = "detectors";
pub const DB_DIR: &str = "db";
const DB_LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct Tracker {
    home: PathBuf,
    config: Arc<TrackerConfig>,
    schema: Arc<Schema>,
}

/// Who is acting and through which front-end.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Defaults to the configured admin uid.
    pub uid: Option<String>,
    pub source: Option<TxSource>,
}

impl Tracker {
    /// Create the layout under `home` and write the schema and config.
    pub fn init(
        home: impl AsRef<Path>,
        schema: &Schema,
        config: &TrackerConfig,
    ) -> Result<Self, TrackerError> {
        let home = home.as_ref().to_path_buf();
        let schema_path = home.join(SCHEMA_FILE);
        if schema_path.exists() {
            return Err(TrackerError::AlreadyInitialized(home.display().to_string()));
        }
        schema.validate()?;

        for dir in [home.clone(), home.join(DETECTORS_DIR), home.join(DB_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        }
        fs::write(&schema_path, schema.to_toml_string()?)
            .map_err(|e| io_error(&schema_path, e))?;
        let config_path = home.join(CONFIG_FILE);
        fs::write(&config_path, config.to_toml_string()?)
            .map_err(|e| io_error(&config_path, e))?;

        tracing::info!(home = %home.display(), "tracker initialized");
        Ok(Self {
            home,
            config: Arc::new(config.clone()),
            schema: Arc::new(schema.clone()),
        })
    }

    /// Open an existing tracker home. `config.toml` is optional.
    pub fn open(home: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let home = home.as_ref().to_path_buf();
        let schema = Schema::load(home.join(SCHEMA_FILE))?;
        let config = TrackerConfig::load(home.join(CONFIG_FILE))?;
        Ok(Self {
            home,
            config: Arc::new(config),
            schema: Arc::new(schema),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn detectors_dir(&self) -> PathBuf {
        self.home.join(DETECTORS_DIR)
    }

    pub fn db_dir(&self) -> PathBuf {
        self.home.join(DB_DIR)
    }

    /// Write `detectors/<builtin>.toml` naming a catalog detector.
    pub fn enable_builtin(&self, builtin: &str) -> Result<PathBuf, TrackerError> {
        let path = self.detectors_dir().join(format!("{builtin}.toml"));
        let manifest = Manifest {
            builtin: builtin.to_string(),
        };
        let text = toml::to_string(&manifest).map_err(|e| TrackerError::Io(e.to_string()))?;
        fs::write(&path, text).map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    pub fn load_storage(&self) -> Result<MemoryStorage, TrackerError> {
        Ok(MemoryStorage::load_dir(self.db_dir())?)
    }

    /// Open a database on `storage` and load the detector directory.
    pub fn open_database(
        &self,
        storage: Arc<dyn Storage>,
        catalog: &DetectorCatalog,
        session: &Session,
    ) -> Result<(Database, BootstrapReport), TrackerError> {
        let mut db = Database::open(Arc::clone(&self.schema), storage, Arc::clone(&self.config));
        if let Some(uid) = &session.uid {
            db.set_uid(uid.clone());
        }
        let report = bootstrap(&mut db, self.detectors_dir(), catalog)?;
        db.set_tx_source(session.source)?;
        Ok((db, report))
    }

    /// Run `f` as one transaction against the persisted database.
    ///
    /// The db directory is locked for the duration. Storage is saved only
    /// when `f` succeeds; an error (a reject included) leaves the files
    /// untouched.
    pub fn transact<T, F>(
        &self,
        catalog: &DetectorCatalog,
        session: &Session,
        f: F,
    ) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut Database) -> Result<T, DbError>,
    {
        let db_dir = self.db_dir();
        let _lock = FileLock::acquire(db_dir.join(DB_LOCK_FILE))?;
        let storage = Arc::new(self.load_storage()?);
        let (mut db, report) = self.open_database(
            Arc::clone(&storage) as Arc<dyn Storage>,
            catalog,
            session,
        )?;
        if !report.is_clean() {
            tracing::warn!(failed = report.failed.len(), "some detectors failed to load");
        }

        let value = f(&mut db)?;
        let entries = db.commit()?;
        storage.save_dir(&db_dir)?;
        tracing::debug!(entries, "transaction saved");
        Ok(value)
    }

    /// Read-only access without detectors.
    pub fn inspect<T, F>(&self, f: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&Database) -> Result<T, DbError>,
    {
        let storage: Arc<dyn Storage> = Arc::new(self.load_storage()?);
        let db = Database::open(Arc::clone(&self.schema), storage, Arc::clone(&self.config));
        Ok(f(&db)?)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TrackerError {
    TrackerError::Io(format!("{}: {err}", path.display()))
}
