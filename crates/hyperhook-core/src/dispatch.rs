//! The change dispatcher: auditors, commit, reactors.

use crate::change::{OldValues, ProposedChange};
use crate::database::Database;
use crate::error::{DbError, HookError};
use crate::hooks::Event;
use crate::outcome::{Commit, DispatchOutcome, Operation};
use crate::tx::{Savepoint, TxSource, Undo};
use crate::validate::normalize;
use chrono::{DateTime, Utc};
use hyperhook_db::{JournalAction, JournalEntry, Node, PropMap, Value};
use std::sync::Arc;

impl Database {
    /// Create a node; returns its id.
    pub fn create(&mut self, class: &str, props: PropMap) -> Result<String, DbError> {
        self.dispatch(Operation::create(class, props))
            .into_result()
            .map(|commit| commit.nodeid)
    }

    pub fn set(&mut self, class: &str, nodeid: &str, props: PropMap) -> Result<(), DbError> {
        self.dispatch(Operation::set(class, nodeid, props))
            .into_result()
            .map(|_| ())
    }

    pub fn retire(&mut self, class: &str, nodeid: &str) -> Result<(), DbError> {
        self.dispatch(Operation::retire(class, nodeid))
            .into_result()
            .map(|_| ())
    }

    pub fn restore(&mut self, class: &str, nodeid: &str) -> Result<(), DbError> {
        self.dispatch(Operation::restore(class, nodeid))
            .into_result()
            .map(|_| ())
    }

    /// Run one operation through the auditor chain, storage, and the reactor
    /// chain.
    ///
    /// Hooks may dispatch further operations on the same handle; those run
    /// to completion before control returns to the hook.
    pub fn dispatch(&mut self, op: Operation) -> DispatchOutcome {
        if let Some(limit) = self.config.dispatch.max_nesting
            && self.depth > limit
        {
            tracing::warn!(
                class = %op.class(),
                event = %op.event(),
                depth = self.depth,
                limit,
                "cascaded dispatch refused"
            );
            return DispatchOutcome::InternalError(DbError::NestingLimit { limit });
        }

        self.depth += 1;
        let savepoint = self.tx.savepoint();
        let outcome = self.run_dispatch(op);
        if matches!(
            outcome,
            DispatchOutcome::Rejected(_) | DispatchOutcome::InternalError(_)
        ) {
            self.roll_back_to(savepoint);
        }
        self.depth -= 1;
        outcome
    }

    /// Undo the storage writes and journal entries recorded after
    /// `savepoint`. Returns the number of writes taken back.
    pub(crate) fn roll_back_to(&mut self, savepoint: Savepoint) -> usize {
        let storage = Arc::clone(self.reader.storage());
        let mut undone = 0;
        for step in self.tx.rewind(savepoint) {
            let result = match &step {
                Undo::Inserted { class, nodeid } => storage.remove(class, nodeid).map(drop),
                Undo::Replaced(node) => storage.replace(node.clone()),
            };
            match result {
                Ok(()) => undone += 1,
                Err(err) => tracing::error!(
                    tx = %self.tx.id(),
                    undo = ?step,
                    error = %err,
                    "rollback step failed"
                ),
            }
        }
        if undone > 0 {
            tracing::debug!(tx = %self.tx.id(), undone, "storage writes rolled back");
        }
        undone
    }

    fn run_dispatch(&mut self, mut op: Operation) -> DispatchOutcome {
        let event = op.event();
        let class = op.class().to_string();
        let nodeid = op.nodeid().map(str::to_string);
        tracing::debug!(
            class = %class,
            nodeid = nodeid.as_deref().unwrap_or("-"),
            event = %event,
            source = self.tx_source().map_or("internal", TxSource::as_str),
            depth = self.depth,
            "dispatch"
        );

        if let Err(err) = self.check_preconditions(&class, nodeid.as_deref(), event) {
            return DispatchOutcome::InternalError(err);
        }

        let mut change = ProposedChange::new(op.take_props());
        for auditor in self.hooks.auditors(&class, event) {
            match (auditor.func)(self, &class, nodeid.as_deref(), &mut change) {
                Ok(()) => {}
                Err(HookError::Reject(reject)) => {
                    tracing::info!(
                        hook = %auditor.name,
                        class = %class,
                        event = %event,
                        message = %reject.message,
                        "change rejected"
                    );
                    return DispatchOutcome::Rejected(reject);
                }
                Err(err) => {
                    tracing::error!(
                        hook = %auditor.name,
                        class = %class,
                        event = %event,
                        error = %err,
                        "auditor failed"
                    );
                    return DispatchOutcome::InternalError(DbError::Detector {
                        hook: auditor.name,
                        class,
                        event,
                        message: err.to_string(),
                    });
                }
            }
        }

        let values = change.into_values();
        let applied = match &op {
            Operation::Create { .. } => self.apply_create(&class, values),
            Operation::Set { nodeid, .. } => self.apply_set(&class, nodeid, values),
            Operation::Retire { nodeid, .. } => self.apply_retired(&class, nodeid, true, values),
            Operation::Restore { nodeid, .. } => self.apply_retired(&class, nodeid, false, values),
        };
        let commit = match applied {
            Ok(Some(commit)) => commit,
            Ok(None) => {
                let nodeid = nodeid.unwrap_or_default();
                tracing::debug!(class = %class, nodeid = %nodeid, "set changed nothing");
                return DispatchOutcome::Unchanged { class, nodeid };
            }
            Err(err) => return DispatchOutcome::InternalError(err),
        };

        for reactor in self.hooks.reactors(&class, event) {
            if let Err(err) = (reactor.func)(self, &class, &commit.nodeid, &commit.old) {
                tracing::warn!(
                    hook = %reactor.name,
                    class = %class,
                    nodeid = %commit.nodeid,
                    event = %event,
                    error = %err,
                    "reactor failed"
                );
            }
        }

        DispatchOutcome::Committed(commit)
    }

    fn check_preconditions(
        &self,
        class: &str,
        nodeid: Option<&str>,
        event: Event,
    ) -> Result<(), DbError> {
        let def = self.reader.class(class)?;
        let Some(nodeid) = nodeid else {
            return Ok(());
        };
        let node = self.reader.node(class, nodeid)?;
        let retired = || DbError::Retired {
            class: class.to_string(),
            nodeid: nodeid.to_string(),
        };
        match event {
            Event::Create => Ok(()),
            Event::Set | Event::Retire if node.retired => Err(retired()),
            Event::Set | Event::Retire => Ok(()),
            Event::Restore if !node.retired => Err(DbError::NotRetired {
                class: class.to_string(),
                nodeid: nodeid.to_string(),
            }),
            Event::Restore => {
                if let Some(keyprop) = &def.key
                    && let Some(key) = node.props.get(keyprop).and_then(Value::as_str)
                    && let Some(existing) = self.reader.find_key(class, key)?
                {
                    return Err(DbError::DuplicateKey {
                        class: class.to_string(),
                        key: key.to_string(),
                        nodeid: existing,
                    });
                }
                Ok(())
            }
        }
    }

    fn apply_create(&mut self, class: &str, values: PropMap) -> Result<Option<Commit>, DbError> {
        let values = normalize(&self.reader, class, values, None)?;
        let mut stored: PropMap = self
            .reader
            .class(class)?
            .properties
            .iter()
            .map(|(name, kind)| (name.clone(), kind.empty_value()))
            .collect();
        stored.extend(values.clone());

        let now = Utc::now();
        let storage = self.reader.storage();
        let nodeid = storage.allocate_id(class)?;
        storage.insert(Node::new(class, nodeid.clone(), stored, self.uid.clone(), now))?;
        self.tx.push_undo(Undo::Inserted {
            class: class.to_string(),
            nodeid: nodeid.clone(),
        });
        self.record(class, &nodeid, JournalAction::Create, values.clone(), now);

        Ok(Some(Commit {
            class: class.to_string(),
            nodeid,
            event: Event::Create,
            changed: values,
            old: OldValues::Created,
        }))
    }

    fn apply_set(
        &mut self,
        class: &str,
        nodeid: &str,
        values: PropMap,
    ) -> Result<Option<Commit>, DbError> {
        let values = normalize(&self.reader, class, values, Some(nodeid))?;
        let node = self.reader.node(class, nodeid)?;
        let def = self.reader.class(class)?;

        let mut old = PropMap::new();
        let mut changed = PropMap::new();
        for (prop, value) in values {
            let Some(kind) = def.prop(&prop) else {
                continue;
            };
            let current = node
                .props
                .get(&prop)
                .cloned()
                .unwrap_or_else(|| kind.empty_value());
            if kind.same_value(&current, &value) {
                continue;
            }
            old.insert(prop.clone(), current);
            changed.insert(prop, value);
        }
        if changed.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        self.reader
            .storage()
            .update(class, nodeid, &changed, &self.uid, now)?;
        self.tx.push_undo(Undo::Replaced(node));
        self.record(class, nodeid, JournalAction::Set, old.clone(), now);

        Ok(Some(Commit {
            class: class.to_string(),
            nodeid: nodeid.to_string(),
            event: Event::Set,
            changed,
            old: OldValues::Changed(old),
        }))
    }

    fn apply_retired(
        &mut self,
        class: &str,
        nodeid: &str,
        retired: bool,
        values: PropMap,
    ) -> Result<Option<Commit>, DbError> {
        if !values.is_empty() {
            tracing::debug!(
                class = %class,
                nodeid = %nodeid,
                ignored = values.len(),
                "properties proposed for retire/restore are ignored"
            );
        }
        let before = self.reader.node(class, nodeid)?;
        let now = Utc::now();
        self.reader
            .storage()
            .set_retired(class, nodeid, retired, &self.uid, now)?;
        self.tx.push_undo(Undo::Replaced(before));
        let (action, event, old) = if retired {
            (JournalAction::Retire, Event::Retire, OldValues::Retired)
        } else {
            (JournalAction::Restore, Event::Restore, OldValues::Restored)
        };
        self.record(class, nodeid, action, PropMap::new(), now);

        Ok(Some(Commit {
            class: class.to_string(),
            nodeid: nodeid.to_string(),
            event,
            changed: PropMap::new(),
            old,
        }))
    }

    fn record(
        &mut self,
        class: &str,
        nodeid: &str,
        action: JournalAction,
        changes: PropMap,
        at: DateTime<Utc>,
    ) {
        let entry = JournalEntry {
            tx_id: self.tx.id().to_string(),
            class: class.to_string(),
            nodeid: nodeid.to_string(),
            action,
            changes,
            actor: self.uid.clone(),
            source: self.tx.source().map(|source| source.as_str().to_string()),
            at,
        };
        self.tx.record(entry);
    }
}
