use thiserror::Error;

/// Unified error type for every control-plane operation.
///
/// Validation failures (`InvalidName`, `Usage`, `InvalidFormat`) are raised
/// before any state is mutated. Failures discovered after partial mutation
/// (container creation, adopt-then-fail) are surfaced verbatim and require an
/// explicit corrective command such as `destroy -f`.
#[derive(Debug, Error)]
pub enum SsoError {
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("app '{app}' is already protected by frontend '{holder}' (unprotect it first)")]
    AlreadyProtected { app: String, holder: String },

    #[error("invalid service name '{name}': must start with a letter and contain only lowercase letters, digits and dashes")]
    InvalidName { name: String },

    #[error("Invalid format: '{entry}' (expected KEY=VALUE)")]
    InvalidFormat { entry: String },

    #[error("cannot destroy '{}': linked apps remain: {} (use -f to force)", .name, .apps.join(", "))]
    LinkedApps { name: String, apps: Vec<String> },

    #[error("cannot destroy '{}': protected apps remain: {} (use -f to force)", .name, .apps.join(", "))]
    ProtectedApps { name: String, apps: Vec<String> },

    #[error("cannot determine frontend for app '{app}': {reason}")]
    Ambiguous { app: String, reason: String },

    #[error("service '{name}' did not become healthy within {budget_secs}s")]
    HealthTimeout { name: String, budget_secs: u64 },

    #[error("configuration for '{}' is missing required keys: {}", .name, .keys.join(", "))]
    MissingConfig { name: String, keys: Vec<String> },

    #[error("frontend service '{name}' is not running (run 'ssoctl frontend:apply {name}' first)")]
    NotRunning { name: String },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("Usage: {0}")]
    Usage(String),

    #[error("container runtime: {0}")]
    Runtime(String),

    #[error("host registry: {0}")]
    Host(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SsoError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists { kind, name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_subject() {
        let err = SsoError::not_found("Directory service", "ldap-main");
        assert_eq!(err.to_string(), "Directory service 'ldap-main' does not exist");
    }

    #[test]
    fn invalid_name_explains_the_rule() {
        let err = SsoError::InvalidName { name: "123abc".into() };
        assert!(err.to_string().contains("must start with a letter"));
    }

    #[test]
    fn linked_apps_lists_every_blocker() {
        let err = SsoError::LinkedApps {
            name: "dir".into(),
            apps: vec!["gitea".into(), "nextcloud".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("linked apps"));
        assert!(msg.contains("gitea"));
        assert!(msg.contains("nextcloud"));
    }

    #[test]
    fn usage_message_carries_the_prefix() {
        let err = SsoError::Usage("ssoctl create <name>".into());
        assert!(err.to_string().starts_with("Usage: "));
    }
}
