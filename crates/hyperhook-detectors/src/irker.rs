//! IRC notification through an irker daemon.
//!
//! irkerd takes one JSON object per line on a TCP socket:
//! `{"to": ["irc://host/channel", ...], "privmsg": "<text>"}`.

use crate::link_ids;
use hyperhook_core::{
    Database, DbError, Detector, DetectorError, Event, HookError, OldValues, TrackerConfig,
};
use regex::Regex;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const BOLD: &str = "\x02";
const GREEN: &str = "\x0303";
const BLUISH: &str = "\x0310";
const RESET: &str = "\x0F";

#[derive(Debug, thiserror::Error)]
enum IrkerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("irker {endpoint}: {source}")]
    Send {
        endpoint: String,
        #[source]
        source: io::Error,
    },
}

/// Where and how to send, read from the `[irker]` and `[tracker]` config
/// sections when the detector registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrkerSettings {
    pub host: String,
    pub port: u16,
    pub channels: Vec<String>,
    pub max_content: usize,
    pub timeout: Duration,
    /// Tracker base URL; issue links are `<web><class><id>`.
    pub web: String,
}

impl IrkerSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            host: config.irker.host.clone(),
            port: config.irker.port,
            channels: config.irker.channels.clone(),
            max_content: config.irker.max_content,
            timeout: Duration::from_millis(config.irker.timeout_ms.max(1)),
            web: config.tracker.web.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Announces new messages on issues. Sending never fails the change.
#[derive(Debug, Clone, Copy, Default)]
pub struct Irker;

impl Detector for Irker {
    fn name(&self) -> &str {
        "irker"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        let settings = Arc::new(IrkerSettings::from_config(db.config()));
        for event in [Event::Create, Event::Set] {
            let settings = Arc::clone(&settings);
            db.react(
                "issue",
                event,
                "irker::notify_irker",
                move |db: &mut Database, class: &str, nodeid: &str, oldvalues: &OldValues| {
                    notify_irker(&settings, db, class, nodeid, oldvalues);
                    Ok::<(), HookError>(())
                },
            )?;
        }
        Ok(())
    }
}

fn notify_irker(
    settings: &IrkerSettings,
    db: &Database,
    class: &str,
    nodeid: &str,
    oldvalues: &OldValues,
) {
    let result = announcement(settings, db, class, nodeid, oldvalues).and_then(|line| match line {
        Some(line) => send(settings, &line),
        None => Ok(()),
    });
    if let Err(err) = result {
        tracing::warn!(
            class = %class,
            nodeid = %nodeid,
            error = %err,
            "sending message to irker failed"
        );
    }
}

/// The JSON request for a change, or `None` when no message was added.
fn announcement(
    settings: &IrkerSettings,
    db: &Database,
    class: &str,
    nodeid: &str,
    oldvalues: &OldValues,
) -> Result<Option<String>, IrkerError> {
    let mut messages = link_ids(&db.get(class, nodeid, "messages")?);
    match oldvalues {
        OldValues::Created => {}
        OldValues::Changed(old) => match old.get("messages") {
            Some(old) => {
                let old = link_ids(old);
                messages.retain(|id| !old.contains(id));
            }
            None => messages.clear(),
        },
        OldValues::Retired | OldValues::Restored => messages.clear(),
    }
    if messages.is_empty() {
        return Ok(None);
    }
    if settings.channels.is_empty() {
        tracing::debug!(nodeid = %nodeid, "no irker channels configured");
        return Ok(None);
    }

    let new_status = db.get(class, nodeid, "status")?;
    let status = match (oldvalues, new_status.as_str()) {
        (OldValues::Created, Some(_)) => Some("new".to_string()),
        (OldValues::Changed(old), Some(id)) if old.contains_key("status") => {
            Some(db.get("status", id, "name")?.to_string())
        }
        _ => None,
    };
    let mut contents = Vec::with_capacity(messages.len());
    for msgid in &messages {
        contents.push(db.get("msg", msgid, "content")?.to_string());
    }

    let uid = db.getuid();
    let author = match db.get("user", uid, "username") {
        Ok(name) if !name.is_null() => name.to_string(),
        _ => uid.to_string(),
    };
    let title = db.get(class, nodeid, "title")?.to_string();
    let log = build_log(status.as_deref(), &contents, settings.max_content);
    let url = format!("{}{class}{nodeid}", settings.web);
    let line = format_line(&author, nodeid, &title, &log, &url);

    let request = serde_json::json!({
        "to": settings.channels,
        "privmsg": line,
    });
    Ok(Some(request.to_string()))
}

/// `[status] ` (when it changed) followed by the message contents,
/// truncated to `max_content` characters and collapsed to single spaces.
fn build_log(status: Option<&str>, contents: &[String], max_content: usize) -> String {
    let mut log = status.map(|status| format!("[{status}] ")).unwrap_or_default();
    for content in contents {
        log.push_str(content);
    }
    if log.chars().count() > max_content {
        log = log
            .chars()
            .take(max_content.saturating_sub(3))
            .chain("...".chars())
            .collect();
    }
    whitespace_re().replace_all(&log, " ").into_owned()
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex must compile"))
}

/// The IRC line, with mIRC colour codes.
pub fn format_line(author: &str, nodeid: &str, title: &str, log: &str, url: &str) -> String {
    format!("{GREEN}{author}{RESET} {BLUISH}#{nodeid}{RESET}/{title}{BOLD}:{BOLD} {log} {url}")
}

fn send(settings: &IrkerSettings, request: &str) -> Result<(), IrkerError> {
    let endpoint = settings.endpoint();
    let send_err = |source: io::Error| IrkerError::Send {
        endpoint: endpoint.clone(),
        source,
    };

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no address resolved");
    let addrs = (settings.host.as_str(), settings.port)
        .to_socket_addrs()
        .map_err(send_err)?;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, settings.timeout) {
            Ok(mut stream) => {
                stream
                    .set_write_timeout(Some(settings.timeout))
                    .map_err(send_err)?;
                stream.write_all(request.as_bytes()).map_err(send_err)?;
                stream.write_all(b"\n").map_err(send_err)?;
                stream.flush().map_err(send_err)?;
                tracing::debug!(endpoint = %endpoint, "irker notified");
                return Ok(());
            }
            Err(err) => last_err = err,
        }
    }
    Err(send_err(last_err))
}
