//! Line-oriented `KEY=VALUE` configuration records.
//!
//! The on-disk format stays byte-compatible with any shell-style consumer:
//! one assignment per line, `#` comments and blank lines ignored on read.
//! Keys are insertion-ordered so a render round-trips in the order the
//! operator set things.

use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::SsoError;
use crate::store::write::{safe_write, DEFAULT_MODE};

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("key pattern")
});

/// Suffixes that mark a key as sensitive for display purposes. Suffix match,
/// not substring: `KEY_A` renders verbatim, `API_KEY` masks.
const SENSITIVE_SUFFIXES: [&str; 4] = ["SECRET", "PASSWORD", "KEY", "TOKEN"];

pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_SUFFIXES.iter().any(|s| key.ends_with(s))
}

pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRecord {
    entries: IndexMap<String, String>,
}

impl ConfigRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut record = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if is_valid_key(key) {
                    record.entries.insert(key.to_string(), value.to_string());
                }
            }
        }
        record
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Parse and apply a single `KEY=VALUE` assignment. A malformed entry is
    /// rejected individually; the caller decides whether to continue with
    /// the remaining entries of the same invocation.
    pub fn set_entry(&mut self, entry: &str) -> Result<(String, String), SsoError> {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| SsoError::InvalidFormat { entry: entry.to_string() })?;
        if !is_valid_key(key) {
            return Err(SsoError::InvalidFormat { entry: entry.to_string() });
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok((key.to_string(), value.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required keys that are absent or empty.
    pub fn missing_keys(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|k| self.get(k).map(str::is_empty).unwrap_or(true))
            .map(|k| k.to_string())
            .collect()
    }

    /// Render to text. With `mask` set, sensitive keys are emitted as
    /// `KEY=***` regardless of the stored value; the store itself always
    /// retains plaintext.
    pub fn render(&self, mask: bool) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if mask && is_sensitive_key(key) {
                out.push_str(&format!("{key}=***\n"));
            } else {
                out.push_str(&format!("{key}={value}\n"));
            }
        }
        out
    }

    pub fn to_env(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn load(path: &Path) -> Result<Self, SsoError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), SsoError> {
        safe_write(path, &self.render(false), DEFAULT_MODE).await?;
        Ok(())
    }
}
