//! Compiled-in detectors for issue trackers.
//!
//! Each detector registers its hooks under its catalog name; a tracker
//! enables one by dropping `detectors/<name>.toml` with
//! `builtin = "<name>"` into its home.
//!
//! | name            | hooks                                               |
//! |-----------------|-----------------------------------------------------|
//! | `statusauditor` | `issue.set` chatty, `issue.create` presetunread     |
//! | `nosyreaction`  | `issue.create/set` nosy update and message fan-out  |
//! | `no_texthtml`   | `file.create/set` html to plain text                |
//! | `emailauditor`  | `file.create` rfc822 attachments renamed to `.mht`  |
//! | `patches`       | `issue.create/set` patch keyword, `file.create` type|
//! | `tx_source`     | `issue.create/set`, `msg.create` source stamping    |
//! | `irker`         | `issue.create/set` IRC notification through irkerd  |

mod files;
mod irker;
mod nosy;
mod patches;
mod status;
mod tx_source;

pub use files::{EmailAuditor, NoTextHtml};
pub use irker::{Irker, IrkerSettings, format_line};
pub use nosy::{LogNotifier, NosyReaction, Notifier};
pub use patches::Patches;
pub use status::StatusAuditor;
pub use tx_source::TxSourceDetector;

use hyperhook_core::{DetectorCatalog, Value};

/// Every compiled-in detector, the nosy reaction using [`LogNotifier`].
pub fn standard_catalog() -> DetectorCatalog {
    DetectorCatalog::new()
        .with(StatusAuditor)
        .with(NosyReaction::default())
        .with(NoTextHtml)
        .with(EmailAuditor)
        .with(Patches)
        .with(TxSourceDetector)
        .with(Irker)
}

/// Link ids held by a proposed or stored value.
///
/// Proposed values are not yet normalized, so a bare string or integer
/// counts as a one-item list.
pub(crate) fn link_ids(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items.clone(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Integer(n) => vec![n.to_string()],
        _ => Vec::new(),
    }
}
