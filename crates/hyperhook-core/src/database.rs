//! The database handle hooks receive.

use crate::change::{OldValues, ProposedChange};
use crate::config::TrackerConfig;
use crate::error::{DbError, HookError};
use crate::hooks::{Auditor, Event, HookRegistry, Reactor};
use crate::reader::Reader;
use crate::tx::{Savepoint, TxContext, TxSource};
use hyperhook_db::{JournalEntry, Node, Schema, Storage, Value};
use std::fmt;
use std::sync::Arc;

/// One handle onto a hyperdatabase.
///
/// A handle owns its hook registry and transaction context. Several
/// handles may share one storage; each runs its own transactions.
pub struct Database {
    pub(crate) reader: Reader,
    pub(crate) config: Arc<TrackerConfig>,
    pub(crate) hooks: HookRegistry,
    pub(crate) tx: TxContext,
    pub(crate) uid: String,
    pub(crate) depth: usize,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("reader", &self.reader)
            .field("hooks", &self.hooks.len())
            .field("tx", &self.tx.id())
            .field("source", &self.tx.source())
            .field("uid", &self.uid)
            .field("depth", &self.depth)
            .finish()
    }
}

impl Database {
    /// Open a handle with default configuration. The acting user is the
    /// configured admin uid.
    pub fn new(schema: Arc<Schema>, storage: Arc<dyn Storage>) -> Self {
        Self::open(schema, storage, Arc::new(TrackerConfig::default()))
    }

    pub fn open(
        schema: Arc<Schema>,
        storage: Arc<dyn Storage>,
        config: Arc<TrackerConfig>,
    ) -> Self {
        let uid = config.tracker.admin_uid.clone();
        Self {
            reader: Reader::new(schema, storage),
            config,
            hooks: HookRegistry::new(),
            tx: TxContext::default(),
            uid,
            depth: 0,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// A second handle on the same storage with the same hooks, in a fresh
    /// transaction with no source.
    pub fn fork(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            config: Arc::clone(&self.config),
            hooks: self.hooks.clone(),
            tx: TxContext::default(),
            uid: self.uid.clone(),
            depth: 0,
        }
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn schema(&self) -> &Schema {
        self.reader.schema()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    // ---- reads ----

    pub fn get(&self, class: &str, nodeid: &str, prop: &str) -> Result<Value, DbError> {
        self.reader.get(class, nodeid, prop)
    }

    pub fn node(&self, class: &str, nodeid: &str) -> Result<Node, DbError> {
        self.reader.node(class, nodeid)
    }

    pub fn lookup(&self, class: &str, key: &str) -> Result<String, DbError> {
        self.reader.lookup(class, key)
    }

    pub fn list(&self, class: &str) -> Result<Vec<String>, DbError> {
        self.reader.list(class)
    }

    pub fn has_node(&self, class: &str, nodeid: &str) -> Result<bool, DbError> {
        self.reader.has_node(class, nodeid)
    }

    pub fn is_retired(&self, class: &str, nodeid: &str) -> Result<bool, DbError> {
        self.reader.is_retired(class, nodeid)
    }

    /// Committed journal entries for a node followed by those still pending
    /// in the current transaction.
    pub fn history(&self, class: &str, nodeid: &str) -> Result<Vec<JournalEntry>, DbError> {
        self.reader.node(class, nodeid)?;
        let mut entries = self.reader.storage().journal(class, nodeid)?;
        entries.extend(
            self.tx
                .journal()
                .iter()
                .filter(|entry| entry.class == class && entry.nodeid == nodeid)
                .cloned(),
        );
        Ok(entries)
    }

    pub fn getuid(&self) -> &str {
        &self.uid
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = uid.into();
    }

    // ---- transaction ----

    pub fn tx_source(&self) -> Option<TxSource> {
        self.tx.source()
    }

    pub fn tx(&self) -> &TxContext {
        &self.tx
    }

    /// Stamp the source of the current transaction. Front-ends only; hooks
    /// get `TxSourceLocked`.
    pub fn set_tx_source(&mut self, source: Option<TxSource>) -> Result<(), DbError> {
        if self.in_dispatch() {
            return Err(DbError::TxSourceLocked);
        }
        self.tx.set_source(source);
        Ok(())
    }

    /// Start a fresh transaction. Uncommitted changes of the current one are
    /// rolled back first.
    pub fn begin(&mut self, source: Option<TxSource>) -> Result<(), DbError> {
        if self.in_dispatch() {
            return Err(DbError::DispatchInProgress("begin a transaction"));
        }
        if self.tx.uncommitted_writes() > 0 {
            tracing::warn!(
                tx = %self.tx.id(),
                writes = self.tx.uncommitted_writes(),
                "transaction restarted with uncommitted changes; rolling back"
            );
            self.roll_back_to(Savepoint::default());
        }
        self.tx = TxContext::new(source);
        Ok(())
    }

    /// Undo every storage write and journal entry of the current
    /// transaction. The transaction stays open with the same source.
    /// Returns the number of writes taken back.
    pub fn rollback(&mut self) -> Result<usize, DbError> {
        if self.in_dispatch() {
            return Err(DbError::DispatchInProgress("roll back"));
        }
        Ok(self.roll_back_to(Savepoint::default()))
    }

    /// Hand the pending journal to storage and start the next transaction
    /// with the same source. Returns the number of entries written.
    pub fn commit(&mut self) -> Result<usize, DbError> {
        if self.in_dispatch() {
            return Err(DbError::DispatchInProgress("commit"));
        }
        let source = self.tx.source();
        let entries = self.tx.take_journal();
        let count = entries.len();
        if count > 0 {
            self.reader.storage().append_journal(entries)?;
        }
        tracing::debug!(tx = %self.tx.id(), entries = count, "transaction committed");
        self.tx = TxContext::new(source);
        Ok(count)
    }

    pub fn pending_journal(&self) -> &[JournalEntry] {
        self.tx.journal()
    }

    pub fn in_dispatch(&self) -> bool {
        self.depth > 0
    }

    /// Current cascade depth (0 outside dispatch).
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ---- hook registration ----

    /// Append an auditor to `class`/`event`.
    pub fn audit<F>(
        &mut self,
        class: &str,
        event: Event,
        name: impl Into<String>,
        func: F,
    ) -> Result<(), DbError>
    where
        F: Fn(&mut Database, &str, Option<&str>, &mut ProposedChange) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.reader.class(class)?;
        self.hooks.add_auditor(
            class,
            event,
            Auditor {
                name: name.into(),
                func: Arc::new(func),
            },
        );
        Ok(())
    }

    /// Append a reactor to `class`/`event`.
    pub fn react<F>(
        &mut self,
        class: &str,
        event: Event,
        name: impl Into<String>,
        func: F,
    ) -> Result<(), DbError>
    where
        F: Fn(&mut Database, &str, &str, &OldValues) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.reader.class(class)?;
        self.hooks.add_reactor(
            class,
            event,
            Reactor {
                name: name.into(),
                func: Arc::new(func),
            },
        );
        Ok(())
    }
}
