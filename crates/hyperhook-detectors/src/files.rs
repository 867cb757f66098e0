//! File attachment rules.

use hyperhook_core::{Database, Detector, DetectorError, Event, HookError, ProposedChange, Value};

/// Rewrites `type = text/html` to `text/plain` on file create and set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextHtml;

impl Detector for NoTextHtml {
    fn name(&self) -> &str {
        "no_texthtml"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("file", Event::Set, "no_texthtml::audit_html_files", audit_html_files)?;
        db.audit("file", Event::Create, "no_texthtml::audit_html_files", audit_html_files)?;
        Ok(())
    }
}

fn audit_html_files(
    _db: &mut Database,
    _class: &str,
    _nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    if newvalues.get("type").and_then(Value::as_str) == Some("text/html") {
        newvalues.set("type", "text/plain");
    }
    Ok(())
}

/// Gives forwarded mail attachments (`message/rfc822`) an `.mht` name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailAuditor;

impl Detector for EmailAuditor {
    fn name(&self) -> &str {
        "emailauditor"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("file", Event::Create, "emailauditor::eml_to_mht", eml_to_mht)?;
        Ok(())
    }
}

fn eml_to_mht(
    _db: &mut Database,
    _class: &str,
    _nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let is_mail = newvalues
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.eq_ignore_ascii_case("message/rfc822"));
    if !is_mail {
        return Ok(());
    }

    let name = match newvalues.get("name").and_then(Value::as_str) {
        Some(name) => name.strip_suffix(".eml").unwrap_or(name).to_string(),
        None => {
            newvalues.set("name", "email.mht");
            return Ok(());
        }
    };
    newvalues.set("name", format!("{name}.mht"));
    Ok(())
}
