//! # hyperhook-core
//!
//! Transactional event dispatch for the hyperdatabase.
//!
//! Every `create` / `set` / `retire` / `restore` runs through:
//!
//! ```text
//! front-end -> TxContext (source tag)
//!           -> auditors (may rewrite the proposed values or reject)
//!           -> validation + storage commit
//!           -> reactors (observe old vs new; failures are logged)
//! ```
//!
//! Hooks are registered on a [`Database`] by detectors: compiled-in
//! [`Detector`] implementations named in `.toml` manifests, or Rhai scripts
//! (feature `script`), discovered by [`bootstrap`].

pub mod bootstrap;
pub mod change;
pub mod config;
pub mod database;
mod dispatch;
pub mod error;
mod filter;
pub mod hooks;
mod lock;
pub mod outcome;
pub mod reader;
#[cfg(feature = "script")]
pub mod script;
pub mod tracker;
pub mod tx;
mod validate;

pub use bootstrap::{
    BOOTSTRAP_FILE, BootstrapReport, Detector, DetectorCatalog, LOCK_FILE, Manifest, bootstrap,
};
pub use change::{OldValues, ProposedChange};
pub use config::{
    ConfigError, DispatchSection, IrkerSection, NosySection, StatusAuditorSection, TrackerConfig,
    TrackerSection,
};
pub use database::Database;
pub use error::{DbError, DetectorError, HookError, Reject, TrackerError};
pub use hooks::{AuditFn, Auditor, Event, HookKind, HookRegistry, ReactFn, Reactor, Registration};
pub use outcome::{Commit, DispatchOutcome, Operation};
pub use reader::Reader;
#[cfg(feature = "script")]
pub use script::ScriptDetector;
pub use tracker::{CONFIG_FILE, DB_DIR, DETECTORS_DIR, SCHEMA_FILE, Session, Tracker};
pub use tx::{TxContext, TxSource, TxSourceError};

pub use hyperhook_db::{PropMap, Value, props};
