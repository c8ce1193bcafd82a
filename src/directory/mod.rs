//! Directory service lifecycle: create/destroy/configure/apply, plus the set
//! of applications linked to each service for credential injection.

pub mod provider;
pub mod users;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::apply::{self, ApplyPlan};
use crate::config::SsoConfig;
use crate::error::SsoError;
use crate::health::{Health, HealthEvaluator};
use crate::output;
use crate::secrets;
use crate::store::record::is_sensitive_key;
use crate::store::write::{safe_write, DEFAULT_MODE};
use crate::store::{validate_name, ServiceKind, ServiceRegistry};
use crate::sys::traits::{ContainerRuntime, ContainerSpec, HostRegistry};

pub use provider::{DirectoryCredentials, DirectoryProvider};

const KIND: ServiceKind = ServiceKind::Directory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryState {
    pub provider: DirectoryProvider,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub linked_apps: Vec<String>,
}

pub struct DirectoryManager<'a> {
    cfg: &'a SsoConfig,
    registry: ServiceRegistry,
    runtime: &'a dyn ContainerRuntime,
    host: &'a dyn HostRegistry,
}

impl<'a> DirectoryManager<'a> {
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

    pub(crate) fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime
    }

    pub async fn create(&self, name: &str, provider_arg: Option<&str>) -> Result<(), SsoError> {
        validate_name(name)?;
        if self.registry.exists(KIND, name) {
            return Err(SsoError::already_exists(KIND.label(), name));
        }
        let provider = match provider_arg {
            Some(p) => DirectoryProvider::parse(p)?,
            None => DirectoryProvider::Lldap,
        };

        output::header(format!("Creating directory service '{name}' (provider: {provider})"));

        let admin_password = secrets::generated_password();
        let config = provider.initial_config(&admin_password);
        self.registry.save_config(KIND, name, &config).await?;

        let state = DirectoryState {
            provider,
            created_at: Utc::now(),
            linked_apps: Vec::new(),
        };
        self.registry.save_state(KIND, name, &state).await?;
        self.export_credentials(name, provider, &config).await?;

        self.apply(name).await?;
        output::ok(format!("Directory service '{name}' created"));
        Ok(())
    }

    /// The shared recreate-and-validate cycle, followed by the downstream
    /// credential refresh for every linked app.
    pub async fn apply(&self, name: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let state: DirectoryState = self.registry.load_state(KIND, name).await?;
        let config = self.registry.load_config(KIND, name).await?;
        let provider = state.provider;
        let container = KIND.container_name(name);
        let service_dir = self.registry.service_dir(KIND, name);

        let plan = ApplyPlan {
            service_name: name.to_string(),
            container: container.clone(),
            required_keys: provider.required_keys().to_vec(),
            artifacts: provider.artifacts(&service_dir, &config),
            spec: ContainerSpec {
                name: container.clone(),
                image: provider.image().to_string(),
                network: self.cfg.network.clone(),
                env: provider.env(&config),
                mounts: provider.mounts(&service_dir),
            },
            probe: provider.probe(),
            config,
        };
        apply::run(self.runtime, self.cfg, &plan).await?;

        // Credentials may have changed with the config; refresh the export
        // and every linked app.
        self.export_credentials(name, provider, &plan.config).await?;
        let creds = DirectoryCredentials::derive(provider, &container, &plan.config);
        self.refresh_linked_apps(&state, &creds).await?;
        Ok(())
    }

    async fn refresh_linked_apps(
        &self,
        state: &DirectoryState,
        creds: &DirectoryCredentials,
    ) -> Result<(), SsoError> {
        if state.linked_apps.is_empty() {
            return Ok(());
        }
        output::header("Refreshing linked apps...");
        for app in &state.linked_apps {
            if !self.host.app_exists(app).await? {
                output::step(format!("Skipping {app}: app no longer exists"));
                continue;
            }
            self.host.set_config(app, &creds.injection_entries()).await?;
            output::step(format!("Credentials refreshed for '{app}'"));
        }
        Ok(())
    }

    async fn export_credentials(
        &self,
        name: &str,
        provider: DirectoryProvider,
        config: &crate::store::ConfigRecord,
    ) -> Result<(), SsoError> {
        let container = KIND.container_name(name);
        let creds = DirectoryCredentials::derive(provider, &container, config);
        safe_write(&self.registry.credentials_path(KIND, name), &creds.render(), DEFAULT_MODE)
            .await?;
        Ok(())
    }

    /// Show or mutate the service's config record. Each malformed entry is
    /// reported and skipped without aborting the remaining entries.
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
            output::step(format!("Run 'ssoctl provider:apply {name}' to apply changes"));
        }
        Ok(())
    }

    pub async fn destroy(&self, name: &str, force: bool) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let state: DirectoryState = self.registry.load_state(KIND, name).await?;
        if !force && !state.linked_apps.is_empty() {
            return Err(SsoError::LinkedApps {
                name: name.to_string(),
                apps: state.linked_apps,
            });
        }

        output::header(format!("Destroying directory service '{name}'"));
        self.runtime.destroy(&KIND.container_name(name)).await?;
        self.registry.remove(KIND, name).await?;
        output::ok(format!("Directory service '{name}' destroyed"));
        Ok(())
    }

    /// Generate/store per-app credentials and record the link. Linking an
    /// already-linked app reports success without duplicating.
    pub async fn link(&self, name: &str, app: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        if !self.host.app_exists(app).await? {
            return Err(SsoError::not_found("App", app));
        }
        let mut state: DirectoryState = self.registry.load_state(KIND, name).await?;
        if state.linked_apps.iter().any(|a| a == app) {
            output::ok(format!("App '{app}' is already linked to '{name}'"));
            return Ok(());
        }

        output::header(format!("Linking app '{app}' to directory service '{name}'"));
        let config = self.registry.load_config(KIND, name).await?;
        let creds =
            DirectoryCredentials::derive(state.provider, &KIND.container_name(name), &config);
        self.host.set_config(app, &creds.injection_entries()).await?;

        state.linked_apps.push(app.to_string());
        self.registry.save_state(KIND, name, &state).await?;
        output::ok(format!("App '{app}' linked to directory service '{name}'"));
        Ok(())
    }

    /// Remove a link and the injected credentials. Unlinking an app that was
    /// never linked is a reported no-op, not an error.
    pub async fn unlink(&self, name: &str, app: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let mut state: DirectoryState = self.registry.load_state(KIND, name).await?;
        if !state.linked_apps.iter().any(|a| a == app) {
            output::ok(format!("App '{app}' is not linked to '{name}'"));
            return Ok(());
        }

        output::header(format!("Unlinking app '{app}' from directory service '{name}'"));
        // The app may already be gone at the host level; the link record is
        // still removable.
        if self.host.app_exists(app).await? {
            self.host
                .unset_config(app, &DirectoryCredentials::injection_keys())
                .await?;
        }
        state.linked_apps.retain(|a| a != app);
        self.registry.save_state(KIND, name, &state).await?;
        output::ok(format!("App '{app}' unlinked from directory service '{name}'"));
        Ok(())
    }

    /// Plaintext `KEY=VALUE` credential export on stdout.
    pub async fn credentials(&self, name: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let state: DirectoryState = self.registry.load_state(KIND, name).await?;
        let config = self.registry.load_config(KIND, name).await?;
        let creds =
            DirectoryCredentials::derive(state.provider, &KIND.container_name(name), &config);
        for line in creds.render().lines() {
            output::raw(line);
        }
        Ok(())
    }

    pub async fn info(&self, name: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, name)?;
        let state: DirectoryState = self.registry.load_state(KIND, name).await?;
        let container = KIND.container_name(name);
        let probe = state.provider.probe();
        let health = HealthEvaluator::new(self.runtime)
            .check(&container, probe.as_deref())
            .await;
        let container_state = self.runtime.state(&container).await?;

        output::header(format!("Directory service '{name}'"));
        output::step(format!("Provider:     {}", state.provider));
        output::step(format!("Status:       {}", health.word()));
        output::step(format!("Container:    {container} ({})", container_state.word()));
        output::step(format!("Created:      {}", state.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
        let linked = if state.linked_apps.is_empty() {
            "(none)".to_string()
        } else {
            state.linked_apps.join(", ")
        };
        output::step(format!("Linked apps:  {linked}"));
        Ok(())
    }

    /// Health word on stdout and the 0/1/2 exit-code contract. With `quiet`
    /// every output path is suppressed while the classification stays
    /// unchanged.
    pub async fn status(&self, name: &str, quiet: bool) -> Health {
        if !self.registry.exists(KIND, name) {
            if !quiet {
                output::error(format!("Directory service '{name}' does not exist"));
            }
            return Health::Missing;
        }
        let probe = match self.registry.load_state::<DirectoryState>(KIND, name).await {
            Ok(state) => state.provider.probe(),
            Err(e) => {
                if !quiet {
                    output::error(format!("Directory service '{name}' state unreadable: {e}"));
                }
                return Health::Down;
            }
        };
        let health = HealthEvaluator::new(self.runtime)
            .check(&KIND.container_name(name), probe.as_deref())
            .await;
        if !quiet {
            output::raw(format!("Directory service '{name}': {}", health.word()));
        }
        health
    }

    pub async fn list(&self) -> Result<(), SsoError> {
        let names = self.registry.list(KIND).await?;
        output::header("Directory services");
        if names.is_empty() {
            output::step("(none)");
            return Ok(());
        }
        for name in names {
            let state: DirectoryState = match self.registry.load_state(KIND, &name).await {
                Ok(state) => state,
                Err(_) => continue,
            };
            let probe = state.provider.probe();
            let health = HealthEvaluator::new(self.runtime)
                .check(&KIND.container_name(&name), probe.as_deref())
                .await;
            output::step(format!(
                "{name}  provider={}  status={}  linked: {}",
                state.provider,
                health.word(),
                state.linked_apps.len()
            ));
        }
        Ok(())
    }

    pub async fn providers(&self) -> Result<(), SsoError> {
        output::header("Available directory providers");
        for provider in DirectoryProvider::ALL {
            output::step(format!("{provider}  image={}", provider.image()));
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
