use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide configuration, loaded from the environment with hard-coded
/// defaults. Every path and binary name is injectable so the whole control
/// plane can be pointed at a scratch root in tests.
#[derive(Clone, Debug)]
pub struct SsoConfig {
    /// Root of the persisted service state (one directory per service).
    pub root_dir: PathBuf,
    /// Shared container network joining directory and frontend containers.
    pub network: String,
    /// Container runtime binary.
    pub docker_bin: String,
    /// Host PaaS binary (app registry, config injection, proxy rebuild).
    pub host_bin: String,
    /// Root under which per-app reverse-proxy include directories live.
    pub proxy_root: PathBuf,
    /// Budget for the apply pipeline's health wait.
    pub apply_timeout: Duration,
    /// Interval between health polls.
    pub poll_interval: Duration,
}

impl SsoConfig {
    pub fn load() -> Self {
        let apply_timeout = env::var("SSO_APPLY_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(120);

        let poll_interval = env::var("SSO_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(2);

        Self {
            root_dir: env::var("SSO_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/sso")),

            network: env::var("SSO_NETWORK").unwrap_or_else(|_| "sso.network".to_string()),

            docker_bin: env::var("SSO_DOCKER_BIN").unwrap_or_else(|_| "docker".to_string()),

            host_bin: env::var("SSO_HOST_BIN").unwrap_or_else(|_| "dokku".to_string()),

            proxy_root: env::var("SSO_PROXY_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/home/dokku")),

            apply_timeout: Duration::from_secs(apply_timeout),
            poll_interval: Duration::from_secs(poll_interval),
        }
    }

    /// A config rooted at an arbitrary directory, with short timeouts.
    /// Used by tests; the collaborator binaries are never invoked there.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            network: "sso.network".to_string(),
            docker_bin: "docker".to_string(),
            host_bin: "dokku".to_string(),
            proxy_root: PathBuf::from("/home/dokku"),
            apply_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
        }
    }
}
