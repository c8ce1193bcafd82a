//! Persisted service registry: one directory per service under a
//! kind-scoped root, holding the `ENV` config record, generated credential
//! material and a `state.json` metadata record.
//!
//! There is no cross-invocation lock; the atomic-replace write discipline is
//! the only on-disk serialization. Callers must not run concurrent mutating
//! commands against the same service name.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SsoError;
use crate::store::record::ConfigRecord;
use crate::store::write::{safe_write, DEFAULT_MODE};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("name pattern"));

/// Service names double as container-name and DNS-label components, so the
/// rule is strict: lowercase, starts with a letter, `[a-z0-9-]*` after.
pub fn validate_name(name: &str) -> Result<(), SsoError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(SsoError::InvalidName { name: name.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Directory,
    Frontend,
}

impl ServiceKind {
    pub fn subdir(&self) -> &'static str {
        match self {
            ServiceKind::Directory => "directory",
            ServiceKind::Frontend => "frontend",
        }
    }

    /// Human label used in messages and errors.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Directory => "Directory service",
            ServiceKind::Frontend => "Frontend service",
        }
    }

    /// The expected container identity is always derivable from the service
    /// name alone; the prefix keeps directory and frontend containers
    /// distinguishable in the runtime's namespace.
    pub fn container_name(&self, name: &str) -> String {
        match self {
            ServiceKind::Directory => format!("sso.directory.{name}"),
            ServiceKind::Frontend => format!("sso.frontend.{name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    root: PathBuf,
}

impl ServiceRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn service_dir(&self, kind: ServiceKind, name: &str) -> PathBuf {
        self.root.join(kind.subdir()).join(name)
    }

    pub fn env_path(&self, kind: ServiceKind, name: &str) -> PathBuf {
        self.service_dir(kind, name).join("ENV")
    }

    pub fn credentials_path(&self, kind: ServiceKind, name: &str) -> PathBuf {
        self.service_dir(kind, name).join("CREDENTIALS")
    }

    pub fn state_path(&self, kind: ServiceKind, name: &str) -> PathBuf {
        self.service_dir(kind, name).join("state.json")
    }

    pub fn exists(&self, kind: ServiceKind, name: &str) -> bool {
        self.state_path(kind, name).is_file()
    }

    /// `NotFound` unless the service has been created.
    pub fn require(&self, kind: ServiceKind, name: &str) -> Result<(), SsoError> {
        if self.exists(kind, name) {
            Ok(())
        } else {
            Err(SsoError::not_found(kind.label(), name))
        }
    }

    pub async fn ensure_dir(&self, kind: ServiceKind, name: &str) -> Result<PathBuf, SsoError> {
        let dir = self.service_dir(kind, name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Sorted names of all services of a kind.
    pub async fn list(&self, kind: ServiceKind) -> Result<Vec<String>, SsoError> {
        let dir = self.root.join(kind.subdir());
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() && path.join("state.json").is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn remove(&self, kind: ServiceKind, name: &str) -> Result<(), SsoError> {
        let dir = self.service_dir(kind, name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_config(&self, kind: ServiceKind, name: &str) -> Result<ConfigRecord, SsoError> {
        ConfigRecord::load(&self.env_path(kind, name)).await
    }

    pub async fn save_config(
        &self,
        kind: ServiceKind,
        name: &str,
        record: &ConfigRecord,
    ) -> Result<(), SsoError> {
        self.ensure_dir(kind, name).await?;
        record.save(&self.env_path(kind, name)).await
    }

    pub async fn load_state<T: DeserializeOwned>(
        &self,
        kind: ServiceKind,
        name: &str,
    ) -> Result<T, SsoError> {
        let text = tokio::fs::read_to_string(self.state_path(kind, name))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SsoError::not_found(kind.label(), name),
                _ => SsoError::Io(e),
            })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn save_state<T: Serialize>(
        &self,
        kind: ServiceKind,
        name: &str,
        state: &T,
    ) -> Result<(), SsoError> {
        self.ensure_dir(kind, name).await?;
        let text = serde_json::to_string_pretty(state)?;
        safe_write(&self.state_path(kind, name), &text, DEFAULT_MODE).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
