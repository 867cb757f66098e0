//! Transaction source stamping.

use hyperhook_core::{
    Database, Detector, DetectorError, Event, HookError, OldValues, ProposedChange, Value,
};

const TX_SOURCE_PROP: &str = "tx_Source";

/// Copies the transaction source into `tx_Source` on issues and messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxSourceDetector;

impl Detector for TxSourceDetector {
    fn name(&self) -> &str {
        "tx_source"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("issue", Event::Create, "tx_source::stamp", stamp)?;
        db.audit("issue", Event::Set, "tx_source::stamp", stamp)?;
        db.audit("msg", Event::Create, "tx_source::stamp", stamp)?;
        db.react("issue", Event::Create, "tx_source::observe", observe)?;
        db.react("issue", Event::Set, "tx_source::observe", observe)?;
        Ok(())
    }
}

fn stamp(
    db: &mut Database,
    class: &str,
    nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let source = db.tx_source().map(|source| source.as_str());
    tracing::debug!(
        class = %class,
        nodeid = nodeid.unwrap_or("new"),
        source = source.unwrap_or("none"),
        "stamping transaction source"
    );
    newvalues.set(TX_SOURCE_PROP, Value::from(source));
    Ok(())
}

fn observe(
    db: &mut Database,
    class: &str,
    nodeid: &str,
    _oldvalues: &OldValues,
) -> Result<(), HookError> {
    let stored = db.get(class, nodeid, TX_SOURCE_PROP)?;
    tracing::debug!(
        class = %class,
        nodeid = %nodeid,
        source = ?db.tx_source(),
        stored = %stored,
        "transaction source observed"
    );
    Ok(())
}
