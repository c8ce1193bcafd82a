use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SsoError;

// ==============================================================================
// 1. Container Runtime (opaque executor for managed service containers)
// ==============================================================================

/// Everything needed to start one managed container. The control plane never
/// talks to the runtime below this level of detail.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<Mount>,
}

#[derive(Debug, Clone)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// No container with the expected name exists.
    Missing,
    /// A container exists but is not running.
    Stopped,
    Running,
}

impl ContainerState {
    pub fn word(&self) -> &'static str {
        match self {
            ContainerState::Missing => "missing",
            ContainerState::Stopped => "stopped",
            ContainerState::Running => "running",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container. The name must not be in use.
    async fn create(&self, spec: &ContainerSpec) -> Result<(), SsoError>;

    /// Stop and remove a container. Removing an absent container succeeds.
    async fn destroy(&self, name: &str) -> Result<(), SsoError>;

    async fn state(&self, name: &str) -> Result<ContainerState, SsoError>;

    /// IP address of the container on the given network, if running.
    async fn address(&self, name: &str, network: &str) -> Result<Option<String>, SsoError>;

    /// Run a command inside the container (health probes, the directory's
    /// one-time admin API).
    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecOutput, SsoError>;

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SsoError>;

    /// Create the shared network if it is not present yet.
    async fn ensure_network(&self, network: &str) -> Result<(), SsoError>;
}

// ==============================================================================
// 2. Host Registry (app existence, config injection, proxy rule install)
// ==============================================================================

/// One forward-auth binding: where the reverse proxy verifies a request and
/// where it sends an unauthenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRule {
    /// Frontend service that owns the binding.
    pub frontend: String,
    /// Verification endpoint the proxy sub-requests for each request.
    pub verify_url: String,
    /// Login portal an unauthenticated request is redirected to.
    pub portal_url: String,
}

#[async_trait]
pub trait HostRegistry: Send + Sync {
    async fn app_exists(&self, app: &str) -> Result<bool, SsoError>;

    async fn create_app(&self, app: &str) -> Result<(), SsoError>;

    async fn destroy_app(&self, app: &str) -> Result<(), SsoError>;

    /// Primary vhost domain of an app, if one is configured.
    async fn app_domain(&self, app: &str) -> Result<Option<String>, SsoError>;

    /// Inject key/value config into an app's environment.
    async fn set_config(&self, app: &str, entries: &[(String, String)]) -> Result<(), SsoError>;

    async fn unset_config(&self, app: &str, keys: &[String]) -> Result<(), SsoError>;

    /// Install or overwrite the app's forward-auth rule.
    async fn install_auth_rule(&self, app: &str, rule: &AuthRule) -> Result<(), SsoError>;

    /// Remove the app's forward-auth rule. Removing an absent rule succeeds.
    async fn remove_auth_rule(&self, app: &str) -> Result<(), SsoError>;
}
