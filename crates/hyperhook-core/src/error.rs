//! Veto, hook failure, and database errors.

use crate::config::ConfigError;
use crate::hooks::Event;
use crate::lock::LockError;
use hyperhook_db::{SchemaError, StorageError};

/// The sanctioned veto raised by an auditor.
///
/// `raw` marks a message front-ends must pass through without escaping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Reject {
    pub message: String,
    pub raw: bool,
}

impl Reject {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: false,
        }
    }

    pub fn raw(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: true,
        }
    }
}

/// What a hook may return.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Reject(#[from] Reject),

    #[error(transparent)]
    Db(DbError),

    #[error("{0}")]
    Failed(String),
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A veto raised by a cascaded operation stays a veto.
impl From<DbError> for HookError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rejected(reject) => Self::Reject(reject),
            other => Self::Db(other),
        }
    }
}

/// Errors raised by database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("unknown class {0:?}")]
    UnknownClass(String),

    #[error("{class}{nodeid} does not exist")]
    NodeNotFound { class: String, nodeid: String },

    #[error("{class}{nodeid} is retired")]
    Retired { class: String, nodeid: String },

    #[error("{class}{nodeid} is not retired")]
    NotRetired { class: String, nodeid: String },

    #[error("{class} has no property {prop:?}")]
    UnknownProperty { class: String, prop: String },

    #[error("property {prop:?} is maintained by the database and cannot be set")]
    ReservedProperty { prop: String },

    #[error("{class}.{prop} expects {expected}, got {value}")]
    TypeMismatch {
        class: String,
        prop: String,
        expected: String,
        value: String,
    },

    #[error("{class}.{prop}: no {target} matches {value:?}")]
    InvalidLink {
        class: String,
        prop: String,
        target: String,
        value: String,
    },

    #[error("{class} has no key property")]
    NoKey { class: String },

    #[error("no {class} has key {key:?}")]
    KeyNotFound { class: String, key: String },

    #[error("{class} key {key:?} is already used by {class}{nodeid}")]
    DuplicateKey {
        class: String,
        key: String,
        nodeid: String,
    },

    #[error("transaction source cannot change while a dispatch is in progress")]
    TxSourceLocked,

    #[error("cannot {0} while a dispatch is in progress")]
    DispatchInProgress(&'static str),

    #[error("hook nesting exceeded the limit of {limit}")]
    NestingLimit { limit: usize },

    #[error("detector {hook} failed on {class}.{event}: {message}")]
    Detector {
        hook: String,
        class: String,
        event: Event,
        message: String,
    },

    #[error("rejected: {0}")]
    Rejected(Reject),
}

impl DbError {
    pub fn node_not_found(class: &str, nodeid: &str) -> Self {
        Self::NodeNotFound {
            class: class.to_string(),
            nodeid: nodeid.to_string(),
        }
    }

    /// The veto message, when this error is a reject.
    pub fn as_reject(&self) -> Option<&Reject> {
        match self {
            Self::Rejected(reject) => Some(reject),
            _ => None,
        }
    }
}

/// Errors raised while loading detectors.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("detector I/O error: {0}")]
    Io(String),

    #[error("detector lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("script {name}: {message}")]
    Script { name: String, message: String },

    #[error("manifest {name}: {message}")]
    Manifest { name: String, message: String },

    #[error("unknown builtin detector {0:?}")]
    UnknownBuiltin(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Errors raised while opening or mutating a tracker home.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker I/O error: {0}")]
    Io(String),

    #[error("tracker lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("{0} is already a tracker home")]
    AlreadyInitialized(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

impl From<LockError> for DetectorError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { lock_path } => Self::LockBusy { lock_path },
            LockError::Io(message) => Self::Io(message),
        }
    }
}

impl From<LockError> for TrackerError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { lock_path } => Self::LockBusy { lock_path },
            LockError::Io(message) => Self::Io(message),
        }
    }
}
