//! In-memory fakes for the two external collaborators, so the
//! reconciliation logic runs against real persisted state but no real
//! container engine or host PaaS.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ssoctl::config::SsoConfig;
use ssoctl::error::SsoError;
use ssoctl::sys::traits::{
    AuthRule, ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, HostRegistry,
};

#[derive(Clone)]
pub struct FakeContainer {
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<HashMap<String, FakeContainer>>,
    pub networks: Mutex<HashSet<String>>,
    /// Containers whose in-container probe should fail (degraded).
    pub failing_probes: Mutex<HashSet<String>>,
    /// When set, the next create call errors out.
    pub fail_next_create: Mutex<bool>,
    pub creates: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.containers.lock().unwrap().get(name).cloned()
    }

    pub fn stop(&self, name: &str) {
        if let Some(c) = self.containers.lock().unwrap().get_mut(name) {
            c.running = false;
        }
    }

    /// Simulate an out-of-band `docker rm -f`.
    pub fn remove(&self, name: &str) {
        self.containers.lock().unwrap().remove(name);
    }

    pub fn fail_probe(&self, name: &str) {
        self.failing_probes.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), SsoError> {
        if std::mem::take(&mut *self.fail_next_create.lock().unwrap()) {
            return Err(SsoError::Runtime("injected create failure".into()));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.containers.lock().unwrap().insert(
            spec.name.clone(),
            FakeContainer { spec: spec.clone(), running: true },
        );
        Ok(())
    }

    async fn destroy(&self, name: &str) -> Result<(), SsoError> {
        self.containers.lock().unwrap().remove(name);
        Ok(())
    }

    async fn state(&self, name: &str) -> Result<ContainerState, SsoError> {
        Ok(match self.containers.lock().unwrap().get(name) {
            Some(c) if c.running => ContainerState::Running,
            Some(_) => ContainerState::Stopped,
            None => ContainerState::Missing,
        })
    }

    async fn address(&self, name: &str, _network: &str) -> Result<Option<String>, SsoError> {
        Ok(match self.containers.lock().unwrap().get(name) {
            Some(c) if c.running => Some("10.0.0.2".to_string()),
            _ => None,
        })
    }

    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecOutput, SsoError> {
        if self.failing_probes.lock().unwrap().contains(name) {
            return Ok(ExecOutput { status: 1, stdout: String::new(), stderr: String::new() });
        }
        // Scripted responses for the directory admin API flow.
        let stdout = if argv.iter().any(|a| a.contains("/auth/simple/login")) {
            r#"{"token":"fake-admin-token"}"#.to_string()
        } else if argv.iter().any(|a| a.contains("/api/graphql")) {
            r#"{"data":{"createUser":{"id":"user"}}}"#.to_string()
        } else {
            String::new()
        };
        Ok(ExecOutput { status: 0, stdout, stderr: String::new() })
    }

    async fn logs(&self, _name: &str, _tail: usize) -> Result<String, SsoError> {
        Ok("log line\n".to_string())
    }

    async fn ensure_network(&self, network: &str) -> Result<(), SsoError> {
        self.networks.lock().unwrap().insert(network.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub apps: Mutex<HashSet<String>>,
    pub config: Mutex<HashMap<String, HashMap<String, String>>>,
    pub rules: Mutex<HashMap<String, AuthRule>>,
    pub domains: Mutex<HashMap<String, String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: &[&str]) -> Self {
        let host = Self::default();
        for app in apps {
            host.add_app(app);
        }
        host
    }

    pub fn add_app(&self, app: &str) {
        self.apps.lock().unwrap().insert(app.to_string());
    }

    pub fn remove_app(&self, app: &str) {
        self.apps.lock().unwrap().remove(app);
    }

    pub fn app_config(&self, app: &str) -> HashMap<String, String> {
        self.config.lock().unwrap().get(app).cloned().unwrap_or_default()
    }

    pub fn rule_for(&self, app: &str) -> Option<AuthRule> {
        self.rules.lock().unwrap().get(app).cloned()
    }
}

#[async_trait]
impl HostRegistry for FakeHost {
    async fn app_exists(&self, app: &str) -> Result<bool, SsoError> {
        Ok(self.apps.lock().unwrap().contains(app))
    }

    async fn create_app(&self, app: &str) -> Result<(), SsoError> {
        let mut apps = self.apps.lock().unwrap();
        if !apps.insert(app.to_string()) {
            return Err(SsoError::Host(format!("app '{app}' already exists")));
        }
        Ok(())
    }

    async fn destroy_app(&self, app: &str) -> Result<(), SsoError> {
        self.apps.lock().unwrap().remove(app);
        self.config.lock().unwrap().remove(app);
        self.rules.lock().unwrap().remove(app);
        Ok(())
    }

    async fn app_domain(&self, app: &str) -> Result<Option<String>, SsoError> {
        Ok(self.domains.lock().unwrap().get(app).cloned())
    }

    async fn set_config(&self, app: &str, entries: &[(String, String)]) -> Result<(), SsoError> {
        let mut config = self.config.lock().unwrap();
        let app_config = config.entry(app.to_string()).or_default();
        for (key, value) in entries {
            app_config.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn unset_config(&self, app: &str, keys: &[String]) -> Result<(), SsoError> {
        if let Some(app_config) = self.config.lock().unwrap().get_mut(app) {
            for key in keys {
                app_config.remove(key);
            }
        }
        Ok(())
    }

    async fn install_auth_rule(&self, app: &str, rule: &AuthRule) -> Result<(), SsoError> {
        self.rules.lock().unwrap().insert(app.to_string(), rule.clone());
        Ok(())
    }

    async fn remove_auth_rule(&self, app: &str) -> Result<(), SsoError> {
        self.rules.lock().unwrap().remove(app);
        Ok(())
    }
}

pub struct Harness {
    pub cfg: SsoConfig,
    pub runtime: FakeRuntime,
    pub host: FakeHost,
    _root: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        Self {
            cfg: SsoConfig::with_root(root.path()),
            runtime: FakeRuntime::new(),
            host: FakeHost::new(),
            _root: root,
        }
    }
}
