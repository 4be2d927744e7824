//! Validated queue locators

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Longest queue name the service accepts, including any `.fifo` suffix
pub const MAX_QUEUE_NAME_LEN: usize = 80;

const FIFO_SUFFIX: &str = ".fifo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueRefError {
    #[error("Queue URL is not a valid URL: {0}")]
    Malformed(String),
    #[error("Queue URL must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("Queue URL must have the form <scheme>://<host>/<account>/<queue-name>: {0}")]
    BadPath(String),
    #[error("Invalid queue name: {0}")]
    InvalidName(String),
}

/// A queue URL that has been checked before any network call is made.
///
/// The transport receives the URL unchanged; the parsed parts only serve
/// validation and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueRef {
    url: String,
    account_id: String,
    name: String,
}

impl QueueRef {
    pub fn parse(input: &str) -> Result<Self, QueueRefError> {
        let input = input.trim();
        let parsed = Url::parse(input).map_err(|e| QueueRefError::Malformed(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(QueueRefError::UnsupportedScheme(other.to_string())),
        }
        if parsed.host_str().is_none() {
            return Err(QueueRefError::Malformed(input.to_string()));
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let [account_id, name] = segments.as_slice() else {
            return Err(QueueRefError::BadPath(input.to_string()));
        };

        if !account_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(QueueRefError::BadPath(input.to_string()));
        }
        validate_queue_name(name)?;

        Ok(Self {
            url: input.trim_end_matches('/').to_string(),
            account_id: (*account_id).to_string(),
            name: (*name).to_string(),
        })
    }

    /// Full queue URL, as handed to the transport
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn is_fifo(&self) -> bool {
        self.name.ends_with(FIFO_SUFFIX)
    }
}

/// Check a bare queue name against the service's naming rules
pub fn validate_queue_name(name: &str) -> Result<(), QueueRefError> {
    let stem = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);

    if name.is_empty() || name.len() > MAX_QUEUE_NAME_LEN || stem.is_empty() {
        return Err(QueueRefError::InvalidName(name.to_string()));
    }
    if !stem
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(QueueRefError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl TryFrom<String> for QueueRef {
    type Error = QueueRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QueueRef> for String {
    fn from(value: QueueRef) -> Self {
        value.url
    }
}

impl std::str::FromStr for QueueRef {
    type Err = QueueRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
