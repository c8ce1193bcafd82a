//! The shared recreate-and-validate pipeline.
//!
//! Both service managers funnel config changes through [`run`]:
//!
//! 1. validate required keys against the loaded config — failure aborts
//!    before any container or artifact is touched;
//! 2. render provider artifacts (frontend configuration, static directory
//!    config) into the service directory;
//! 3. stop and remove the existing container, if any;
//! 4. create a fresh container from the merged configuration;
//! 5. poll until healthy or the apply budget elapses.
//!
//! There is no automatic rollback: a failure at step (4) or (5) leaves the
//! service in whatever container state that step produced, and the operator
//! re-runs apply or destroys the service. Re-running against an unchanged
//! config performs the same recreate cycle and converges on the same state.

use std::path::PathBuf;

use crate::config::SsoConfig;
use crate::error::SsoError;
use crate::health::HealthEvaluator;
use crate::output;
use crate::store::record::ConfigRecord;
use crate::store::write::safe_write;
use crate::sys::traits::{ContainerRuntime, ContainerSpec, ContainerState};

/// A file rendered into the service directory before the container starts.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
}

pub struct ApplyPlan {
    pub service_name: String,
    pub container: String,
    pub config: ConfigRecord,
    pub required_keys: Vec<&'static str>,
    pub artifacts: Vec<Artifact>,
    pub spec: ContainerSpec,
    pub probe: Option<Vec<String>>,
}

pub async fn run(
    runtime: &dyn ContainerRuntime,
    cfg: &SsoConfig,
    plan: &ApplyPlan,
) -> Result<(), SsoError> {
    output::header(format!("Applying configuration for '{}'", plan.service_name));

    output::step("Validating configuration...");
    let missing = plan.config.missing_keys(&plan.required_keys);
    if !missing.is_empty() {
        return Err(SsoError::MissingConfig {
            name: plan.service_name.clone(),
            keys: missing,
        });
    }

    for artifact in &plan.artifacts {
        safe_write(&artifact.path, &artifact.content, artifact.mode).await?;
    }

    runtime.ensure_network(&cfg.network).await?;

    if runtime.state(&plan.container).await? != ContainerState::Missing {
        output::step(format!("Removing previous container '{}'...", plan.container));
        runtime.destroy(&plan.container).await?;
    }

    output::step("Creating container...");
    runtime.create(&plan.spec).await?;

    output::step(format!("Waiting for '{}' to report healthy...", plan.container));
    HealthEvaluator::new(runtime)
        .wait_healthy(
            &plan.service_name,
            &plan.container,
            plan.probe.as_deref(),
            cfg.apply_timeout,
            cfg.poll_interval,
        )
        .await?;

    output::ok(format!("Configuration for '{}' applied successfully", plan.service_name));
    Ok(())
}
