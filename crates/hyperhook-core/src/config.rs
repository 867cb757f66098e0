//! Tracker configuration (`config.toml`).
//!
//! Every section and field is optional; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub tracker: TrackerSection,
    pub dispatch: DispatchSection,
    pub statusauditor: StatusAuditorSection,
    pub nosy: NosySection,
    pub irker: IrkerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    pub name: String,
    /// Base URL; node links are `<web><class><id>`.
    pub web: String,
    /// Uid used when no user is given.
    pub admin_uid: String,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            name: "hyperhook".to_string(),
            web: "http://localhost:8080/tracker/".to_string(),
            admin_uid: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Upper bound on cascaded dispatch depth. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nesting: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusAuditorSection {
    /// Leave `unread` alone when the issue creator adds the message.
    pub chatting_requires_two_users: bool,
    /// State preset on issue creation.
    pub initial_state: String,
}

impl Default for StatusAuditorSection {
    fn default() -> Self {
        Self {
            chatting_requires_two_users: false,
            initial_state: "unread".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NosySection {
    /// User never added to nosy lists.
    pub exclude_uid: String,
}

impl Default for NosySection {
    fn default() -> Self {
        Self {
            exclude_uid: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrkerSection {
    pub host: String,
    pub port: u16,
    /// `irc://` channel URLs. The notifier is idle while this is empty.
    pub channels: Vec<String>,
    pub max_content: usize,
    pub timeout_ms: u64,
}

impl Default for IrkerSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6659,
            channels: Vec::new(),
            max_content: 120,
            timeout_ms: 2000,
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config serialization error: {0}")]
    Serialize(String),
}
