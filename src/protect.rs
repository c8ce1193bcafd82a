//! Protection engine: the binding between a hosted app and a frontend.
//!
//! A binding is membership of the app name in exactly one frontend's
//! `protected_apps` set plus an installed reverse-proxy rule pointing at
//! that frontend's verification endpoint. An app is protected by at most one
//! frontend at a time; an explicit protect onto a second frontend is
//! rejected rather than silently moving the binding.
//!
//! Auto-detection resolves "the" frontend for an app: the one that already
//! protects it, or the sole existing frontend when none does. Zero or
//! several equally-eligible candidates is an ambiguity error.

use crate::config::SsoConfig;
use crate::error::SsoError;
use crate::frontend::{authelia, FrontendState};
use crate::output;
use crate::store::{ServiceKind, ServiceRegistry};
use crate::sys::traits::{AuthRule, ContainerRuntime, HostRegistry};

const KIND: ServiceKind = ServiceKind::Frontend;

pub struct ProtectionEngine<'a> {
    cfg: &'a SsoConfig,
    registry: ServiceRegistry,
    runtime: &'a dyn ContainerRuntime,
    host: &'a dyn HostRegistry,
}

impl<'a> ProtectionEngine<'a> {
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

    /// The frontend currently protecting `app`, if any.
    async fn holder_of(&self, app: &str) -> Result<Option<String>, SsoError> {
        for name in self.registry.list(KIND).await? {
            let state: FrontendState = match self.registry.load_state(KIND, &name).await {
                Ok(state) => state,
                Err(_) => continue,
            };
            if state.protected_apps.iter().any(|a| a == app) {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    async fn resolve_frontend(&self, app: &str) -> Result<String, SsoError> {
        if let Some(holder) = self.holder_of(app).await? {
            return Ok(holder);
        }
        let mut frontends = self.registry.list(KIND).await?;
        match frontends.len() {
            0 => Err(SsoError::Ambiguous {
                app: app.to_string(),
                reason: "no frontend services exist".to_string(),
            }),
            1 => Ok(frontends.remove(0)),
            _ => Err(SsoError::Ambiguous {
                app: app.to_string(),
                reason: format!(
                    "multiple frontend services are eligible ({}); name one explicitly",
                    frontends.join(", ")
                ),
            }),
        }
    }

    /// The forward-auth rule for one frontend. The verification endpoint
    /// must be reachable from the host's proxy, so it uses the container's
    /// address on the shared network; the portal redirect uses the
    /// configured domain.
    async fn build_rule(&self, frontend: &str) -> Result<AuthRule, SsoError> {
        let container = KIND.container_name(frontend);
        let address = self
            .runtime
            .address(&container, &self.cfg.network)
            .await?
            .ok_or_else(|| SsoError::NotRunning { name: frontend.to_string() })?;

        let config = self.registry.load_config(KIND, frontend).await?;
        let domain = config.get("DOMAIN").unwrap_or(authelia::DEFAULT_DOMAIN);

        Ok(AuthRule {
            frontend: frontend.to_string(),
            verify_url: format!("http://{address}:{}/api/verify", authelia::PORT),
            portal_url: format!("https://{domain}"),
        })
    }

    /// Bind an app to a frontend. Re-protecting the same pair is accepted
    /// and re-applies the rule; protecting onto a different frontend than
    /// the current holder is rejected.
    pub async fn protect(&self, app: &str, frontend: Option<&str>) -> Result<(), SsoError> {
        if !self.host.app_exists(app).await? {
            return Err(SsoError::not_found("App", app));
        }

        let target = match frontend {
            Some(name) => {
                self.registry.require(KIND, name)?;
                if let Some(holder) = self.holder_of(app).await? {
                    if holder != name {
                        return Err(SsoError::AlreadyProtected {
                            app: app.to_string(),
                            holder,
                        });
                    }
                }
                name.to_string()
            }
            None => self.resolve_frontend(app).await?,
        };

        output::header(format!("Protecting app '{app}' with frontend '{target}'"));
        let rule = self.build_rule(&target).await?;
        self.host.install_auth_rule(app, &rule).await?;

        let mut state: FrontendState = self.registry.load_state(KIND, &target).await?;
        if !state.protected_apps.iter().any(|a| a == app) {
            state.protected_apps.push(app.to_string());
            self.registry.save_state(KIND, &target, &state).await?;
        }

        output::ok(format!("App '{app}' is now protected by '{target}'"));
        Ok(())
    }

    /// Remove a binding. Unprotecting an app that is not protected reports
    /// the fact and succeeds; this is the diagnostic no-op that protect
    /// deliberately is not.
    pub async fn unprotect(&self, app: &str, frontend: Option<&str>) -> Result<(), SsoError> {
        let holder = match frontend {
            Some(name) => {
                self.registry.require(KIND, name)?;
                let state: FrontendState = self.registry.load_state(KIND, name).await?;
                if !state.protected_apps.iter().any(|a| a == app) {
                    output::ok(format!("App '{app}' is not protected by '{name}'"));
                    return Ok(());
                }
                name.to_string()
            }
            None => match self.holder_of(app).await? {
                Some(holder) => holder,
                None => {
                    output::ok(format!("App '{app}' is not protected"));
                    return Ok(());
                }
            },
        };

        output::header(format!("Removing protection from app '{app}' (frontend '{holder}')"));
        // The app may already be gone at the host level; the binding record
        // is still removable.
        if self.host.app_exists(app).await? {
            self.host.remove_auth_rule(app).await?;
        }

        let mut state: FrontendState = self.registry.load_state(KIND, &holder).await?;
        state.protected_apps.retain(|a| a != app);
        self.registry.save_state(KIND, &holder, &state).await?;

        output::ok(format!("Protection removed from app '{app}'"));
        Ok(())
    }

    /// Re-apply the rule for every protected app of a frontend, after a
    /// container recreation moved the verification endpoint. Vanished apps
    /// are skipped with a diagnostic instead of aborting the sweep; the
    /// membership set itself is only ever edited by unprotect.
    pub async fn refresh(&self, frontend: &str) -> Result<(), SsoError> {
        self.registry.require(KIND, frontend)?;
        let state: FrontendState = self.registry.load_state(KIND, frontend).await?;

        output::header(format!("Refreshing protection for frontend '{frontend}'"));
        if state.protected_apps.is_empty() {
            output::step("No protected apps to refresh.");
            return Ok(());
        }

        let rule = self.build_rule(frontend).await?;
        for app in &state.protected_apps {
            if !self.host.app_exists(app).await? {
                output::step(format!("Skipping {app}: app no longer exists"));
                continue;
            }
            self.host.install_auth_rule(app, &rule).await?;
            output::step(format!("Re-applied protection for '{app}'"));
        }
        output::ok("All apps refreshed");
        Ok(())
    }
}
