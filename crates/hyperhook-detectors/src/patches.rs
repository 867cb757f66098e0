//! Patch attachments.

use crate::link_ids;
use hyperhook_core::{Database, Detector, DetectorError, Event, HookError, ProposedChange, Value};
use std::path::Path;

const PATCH_TYPES: [&str; 2] = ["diff", "patch"];
const SOURCE_TYPES: [&str; 3] = ["diff", "patch", "py"];
const PATCH_KEYWORD: &str = "patch";

/// Declares patches and source files as `text/plain` and tags issues that
/// gain a patch with the `patch` keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct Patches;

impl Detector for Patches {
    fn name(&self) -> &str {
        "patches"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("file", Event::Create, "patches::patches_text_plain", patches_text_plain)?;
        db.audit("issue", Event::Create, "patches::patches_keyword", patches_keyword)?;
        db.audit("issue", Event::Set, "patches::patches_keyword", patches_keyword)?;
        Ok(())
    }
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn patches_text_plain(
    _db: &mut Database,
    _class: &str,
    _nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let is_source = newvalues
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| has_extension(name, &SOURCE_TYPES));
    if is_source {
        newvalues.set("type", "text/plain");
    }
    Ok(())
}

fn patches_keyword(
    db: &mut Database,
    class: &str,
    nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let Some(files) = newvalues.get("files") else {
        return Ok(());
    };
    let mut new_files = link_ids(files);
    if let Some(nodeid) = nodeid {
        let stored = link_ids(&db.get(class, nodeid, "files")?);
        new_files.retain(|id| !stored.contains(id));
    }

    let mut new_patch = false;
    for fileid in &new_files {
        // Unknown ids are left for validation to report.
        if !db.has_node("file", fileid)? {
            continue;
        }
        let name = db.get("file", fileid, "name")?;
        if name.as_str().is_some_and(|name| has_extension(name, &PATCH_TYPES)) {
            new_patch = true;
            break;
        }
    }
    if !new_patch {
        return Ok(());
    }

    let Some(patch) = db.reader().find_key("keyword", PATCH_KEYWORD)? else {
        tracing::debug!(class = %class, "no patch keyword to add");
        return Ok(());
    };
    // A proposed keyword list replaces the stored one, so check that.
    let mut keywords = match (newvalues.get("keywords"), nodeid) {
        (Some(proposed), _) => link_ids(proposed),
        (None, Some(nodeid)) => link_ids(&db.get(class, nodeid, "keywords")?),
        (None, None) => Vec::new(),
    };
    if !keywords.contains(&patch) {
        keywords.push(patch);
        newvalues.set("keywords", keywords);
    }
    Ok(())
}
