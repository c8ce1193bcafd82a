//! Frontend service lifecycle: the forward-auth/OIDC gateway container, its
//! backing hosted app (generated or adopted) and its link to at most one
//! directory service.

pub mod authelia;
pub mod oidc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::apply::{self, ApplyPlan, Artifact};
use crate::config::SsoConfig;
use crate::directory::{DirectoryCredentials, DirectoryState};
use crate::error::SsoError;
use crate::health::{Health, HealthEvaluator};
use crate::output;
use crate::store::record::is_sensitive_key;
use crate::store::{validate_name, ServiceKind, ServiceRegistry};
use crate::sys::traits::{ContainerRuntime, ContainerSpec, HostRegistry, Mount};

pub use oidc::{OidcClient, OidcState};

const KIND: ServiceKind = ServiceKind::Frontend;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendState {
    /// Hosted app backing this frontend at the host level. Either generated
    /// by this service or adopted; the provenance decides teardown rules.
    pub owned_app: String,
    pub adopted: bool,
    /// At most one directory service provides the authentication backend.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub protected_apps: Vec<String>,
    #[serde(default)]
    pub oidc: OidcState,
    pub created_at: DateTime<Utc>,
}

pub struct FrontendManager<'a> {
    cfg: &'a SsoConfig,
    registry: ServiceRegistry,
    runtime: &'a dyn ContainerRuntime,
    host: &'a dyn HostRegistry,
}

impl<'a> FrontendManager<'a> {
    pub fn new(
        cfg: &'a SsoConfig,
        runtime: &'a dyn ContainerRuntime,
        host: &'a dyn HostRegistry,
    ) -> Self {
        Self {
            cfg,
            registry: ServiceRegistry::new(&cfg.root_dir),
            runtime,
            host,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub(crate) async fn load(&self, name: &str) -> Result<FrontendState, SsoError> {
        self.registry.require(KIND, name)?;
        self.registry.load_state(KIND, name).await
    }

    /// Create a frontend, either provisioning a fresh hosted app or adopting
    /// an existing one. Re-invoking with the same `--app` on an existing
    /// service is a no-op success, not an error. Adopting an app that does
    /// not exist fails after the service directory is written; the partial
    /// state is removable with `frontend:destroy -f`.
    pub async fn create(&self, name: &str, app: Option<&str>) -> Result<(), SsoError> {
        validate_name(name)?;

        if self.registry.exists(KIND, name) {
            if let Some(app) = app {
                let state: FrontendState = self.registry.load_state(KIND, name).await?;
                if state.adopted && state.owned_app == app {
                    output::header(format!("Adopting existing app '{app}'"));
                    output::ok(format!("Frontend service '{name}' already present; nothing to do"));
                    return Ok(());
                }
            }
            return Err(SsoError::already_exists(KIND.label(), name));
        }

        output::header(format!("Creating frontend service '{name}'"));
        self.registry
            .save_config(KIND, name, &authelia::initial_config())
            .await?;

        match app {
            Some(app) => {
                output::step(format!("Adopting existing app '{app}'"));
                let state = FrontendState {
                    owned_app: app.to_string(),
                    adopted: true,
                    directory: None,
                    protected_apps: Vec::new(),
                    oidc: OidcState::default(),
                    created_at: Utc::now(),
                };
                // State lands before the existence check: an adopt of a
                // missing app errors out with the directory already written,
                // and `frontend:destroy -f` is the corrective command.
                self.registry.save_state(KIND, name, &state).await?;
                if !self.host.app_exists(app).await? {
                    return Err(SsoError::not_found("App", app));
                }
            }
            None => {
                let owned = format!("sso-fe-{name}");
                let state = FrontendState {
                    owned_app: owned.clone(),
                    adopted: false,
                    directory: None,
                    protected_apps: Vec::new(),
                    oidc: OidcState::default(),
                    created_at: Utc::now(),
                };
                self.registry.save_state(KIND, name, &state).await?;
                if !self.host.app_exists(&owned).await? {
                    self.host.create_app(&owned).await?;
                    output::step(format!("Provisioned hosted app '{owned}'"));
                }
            }
        }

        self.apply(name).await?;
        output::ok(format!("Frontend service '{name}' created"));
        Ok(())
    }

    /// Recreate the frontend container from the persisted config, the linked
    /// directory's credentials and the OIDC sub-resource. Protected-app
    /// bindings are refreshed by the explicit `frontend:refresh`, not here.
    pub async fn apply(&self, name: &str) -> Result<(), SsoError> {
        let state = self.load(name).await?;
        let config = self.registry.load_config(KIND, name).await?;
        let container = KIND.container_name(name);
        let service_dir = self.registry.service_dir(KIND, name);

        let ldap = match &state.directory {
            Some(dir) if self.registry.exists(ServiceKind::Directory, dir) => {
                let dstate: DirectoryState =
                    self.registry.load_state(ServiceKind::Directory, dir).await?;
                let dconfig = self.registry.load_config(ServiceKind::Directory, dir).await?;
                Some(DirectoryCredentials::derive(
                    dstate.provider,
                    &ServiceKind::Directory.container_name(dir),
                    &dconfig,
                ))
            }
            Some(dir) => {
                output::error(format!(
                    "Directory service '{dir}' no longer exists; applying with the internal user file"
                ));
                None
            }
            None => None,
        };

        let mut artifacts = vec![Artifact {
            path: service_dir.join("configuration.yml"),
            content: authelia::render_config(&config, ldap.as_ref(), &state.oidc),
            mode: 0o600,
        }];
        let mut mounts = vec![Mount {
            host_path: service_dir.join("configuration.yml"),
            container_path: "/config/configuration.yml".to_string(),
            read_only: true,
        }];
        if ldap.is_none() {
            artifacts.push(Artifact {
                path: service_dir.join("users.yml"),
                content: authelia::render_users_file(),
                mode: 0o600,
            });
            mounts.push(Mount {
                host_path: service_dir.join("users.yml"),
                container_path: "/config/users.yml".to_string(),
                read_only: true,
            });
        }

        let plan = ApplyPlan {
            service_name: name.to_string(),
            container: container.clone(),
            required_keys: authelia::REQUIRED_KEYS.to_vec(),
            artifacts,
            spec: ContainerSpec {
                name: container,
                image: authelia::IMAGE.to_string(),
                network: self.cfg.network.clone(),
                env: config.to_env(),
                mounts,
            },
            probe: Some(authelia::probe()),
            config,
        };
        apply::run(self.runtime, self.cfg, &plan).await
    }

    /// Replace the directory link; at most one directory at a time.
    pub async fn use_directory(&self, name: &str, directory: &str) -> Result<(), SsoError> {
        let mut state = self.load(name).await?;
        self.registry.require(ServiceKind::Directory, directory)?;

        state.directory = Some(directory.to_string());
        self.registry.save_state(KIND, name, &state).await?;
        output::ok(format!(
            "Directory configured: '{name}' now authenticates against '{directory}'"
        ));
        output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        Ok(())
    }

    /// Teardown. Blocks on protected apps unless forced; `keep_app` keeps a
    /// generated hosted app, and adopted apps are never deleted here.
    pub async fn destroy(&self, name: &str, force: bool, keep_app: bool) -> Result<(), SsoError> {
        let state = self.load(name).await?;
        if !force && !state.protected_apps.is_empty() {
            return Err(SsoError::ProtectedApps {
                name: name.to_string(),
                apps: state.protected_apps,
            });
        }

        output::header(format!("Destroying frontend service '{name}'"));

        // Leave no dangling bindings pointing at a dead verifier.
        for app in &state.protected_apps {
            match self.host.app_exists(app).await {
                Ok(true) => {
                    if let Err(e) = self.host.remove_auth_rule(app).await {
                        output::error(format!("could not remove rule for '{app}': {e}"));
                    }
                }
                Ok(false) => {}
                Err(e) => output::error(format!("could not check app '{app}': {e}")),
            }
        }

        self.runtime.destroy(&KIND.container_name(name)).await?;

        if state.adopted {
            output::step(format!("Keeping app '{}' (adopted)", state.owned_app));
        } else if keep_app {
            output::step(format!("Keeping app '{}'", state.owned_app));
        } else if self.host.app_exists(&state.owned_app).await? {
            self.host.destroy_app(&state.owned_app).await?;
            output::step(format!("Removed hosted app '{}'", state.owned_app));
        }

        self.registry.remove(KIND, name).await?;
        output::ok(format!("Frontend service '{name}' destroyed"));
        Ok(())
    }

    pub async fn config(&self, name: &str, entries: &[String]) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let mut config = self.registry.load_config(KIND, name).await?;

        if entries.is_empty() {
            output::header(format!("Configuration for '{name}'"));
            if config.is_empty() {
                output::step("(empty)");
            }
            for line in config.render(true).lines() {
                output::step(line);
            }
            return Ok(());
        }

        output::header(format!("Setting configuration for '{name}'"));
        let mut changed = false;
        for entry in entries {
            match config.set_entry(entry) {
                Ok((key, value)) => {
                    if is_sensitive_key(&key) {
                        output::step(format!("{key}=***"));
                    } else {
                        output::step(format!("{key}={value}"));
                    }
                    changed = true;
                }
                Err(e) => output::error(e),
            }
        }
        if changed {
            self.registry.save_config(KIND, name, &config).await?;
            output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        }
        Ok(())
    }

    pub async fn info(&self, name: &str) -> Result<(), SsoError> {
        let state = self.load(name).await?;
        let container = KIND.container_name(name);
        let probe = authelia::probe();
        let health = HealthEvaluator::new(self.runtime)
            .check(&container, Some(probe.as_slice()))
            .await;
        let container_state = self.runtime.state(&container).await?;

        output::header(format!("Frontend service '{name}'"));
        output::step("Engine:          Authelia (forward-auth / OIDC)");
        let provenance = if state.adopted { " (adopted)" } else { "" };
        output::step(format!("App:             {}{provenance}", state.owned_app));
        output::step(format!(
            "Directory:       {}",
            state.directory.as_deref().unwrap_or("(none)")
        ));
        output::step(format!("Status:          {}", health.word()));
        output::step(format!("Container:       {container} ({})", container_state.word()));
        output::step(format!(
            "Created:         {}",
            state.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        let protected = if state.protected_apps.is_empty() {
            "(none)".to_string()
        } else {
            state.protected_apps.join(", ")
        };
        output::step(format!("Protected apps:  {protected}"));
        let oidc = if state.oidc.enabled { "enabled" } else { "disabled" };
        output::step(format!(
            "OIDC:            {oidc}, {} client(s)",
            state.oidc.clients.len()
        ));
        Ok(())
    }

    pub async fn status(&self, name: &str, quiet: bool) -> Health {
        if !self.registry.exists(KIND, name) {
            if !quiet {
                output::error(format!("Frontend service '{name}' does not exist"));
            }
            return Health::Missing;
        }
        let probe = authelia::probe();
        let health = HealthEvaluator::new(self.runtime)
            .check(&KIND.container_name(name), Some(probe.as_slice()))
            .await;
        if !quiet {
            output::raw(format!("Frontend service '{name}': {}", health.word()));
        }
        health
    }

    pub async fn list(&self) -> Result<(), SsoError> {
        let names = self.registry.list(KIND).await?;
        output::header("Frontend services");
        if names.is_empty() {
            output::step("(none)");
            return Ok(());
        }
        for name in names {
            let state: FrontendState = match self.registry.load_state(KIND, &name).await {
                Ok(state) => state,
                Err(_) => continue,
            };
            let container_state = self
                .runtime
                .state(&KIND.container_name(&name))
                .await
                .map(|s| s.word())
                .unwrap_or("unknown");
            output::step(format!(
                "{name}  app={}  container={container_state}  protected: {}",
                state.owned_app,
                state.protected_apps.len()
            ));
        }
        Ok(())
    }

    pub async fn logs(&self, name: &str, tail: usize) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let text = self.runtime.logs(&KIND.container_name(name), tail).await?;
        print!("{text}");
        Ok(())
    }
}
