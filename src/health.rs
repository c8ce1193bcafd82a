//! Health classification for managed services.
//!
//! A service is in exactly one of four states, each mapped to a process exit
//! code a reverse proxy or orchestration script can rely on:
//!
//! | state    | exit | meaning                                         |
//! |----------|------|-------------------------------------------------|
//! | healthy  | 0    | container running, in-container probe succeeds  |
//! | degraded | 1    | container running, probe failing                |
//! | down     | 2    | service exists but container stopped or gone    |
//! | missing  | 2    | service was never created                       |
//!
//! Polling is a blocking wait-with-sleep loop bounded by the caller's
//! timeout; there is no mid-poll cancellation.

use std::time::{Duration, Instant};

use crate::error::SsoError;
use crate::sys::traits::{ContainerRuntime, ContainerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Degraded,
    Down,
    Missing,
}

impl Health {
    pub fn exit_code(&self) -> i32 {
        match self {
            Health::Healthy => 0,
            Health::Degraded => 1,
            Health::Down | Health::Missing => 2,
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Down => "down",
            Health::Missing => "missing",
        }
    }
}

pub struct HealthEvaluator<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> HealthEvaluator<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Classify an existing service by its container. The "service never
    /// created" case is decided by the caller against the registry; an
    /// absent container here means the service is down, not missing.
    pub async fn check(&self, container: &str, probe: Option<&[String]>) -> Health {
        match self.runtime.state(container).await {
            Ok(ContainerState::Running) => {}
            Ok(_) => return Health::Down,
            Err(e) => {
                tracing::debug!(container, error = %e, "state query failed");
                return Health::Down;
            }
        }

        let Some(argv) = probe else {
            // Scratch-style images expose no probe; running is as good as it
            // gets.
            return Health::Healthy;
        };

        match self.runtime.exec(container, argv).await {
            Ok(out) if out.success() => Health::Healthy,
            Ok(out) => {
                tracing::debug!(container, status = out.status, "probe failed");
                Health::Degraded
            }
            Err(e) => {
                tracing::debug!(container, error = %e, "probe exec failed");
                Health::Degraded
            }
        }
    }

    /// Poll until healthy or the budget elapses.
    pub async fn wait_healthy(
        &self,
        service_name: &str,
        container: &str,
        probe: Option<&[String]>,
        budget: Duration,
        interval: Duration,
    ) -> Result<(), SsoError> {
        let deadline = Instant::now() + budget;
        loop {
            if self.check(container, probe).await == Health::Healthy {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SsoError::HealthTimeout {
                    name: service_name.to_string(),
                    budget_secs: budget.as_secs(),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::traits::{ContainerSpec, ExecOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct ScriptedRuntime {
        state: ContainerState,
        probe_status: AtomicI32,
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn create(&self, _spec: &ContainerSpec) -> Result<(), SsoError> {
            Ok(())
        }
        async fn destroy(&self, _name: &str) -> Result<(), SsoError> {
            Ok(())
        }
        async fn state(&self, _name: &str) -> Result<ContainerState, SsoError> {
            Ok(self.state)
        }
        async fn address(&self, _name: &str, _network: &str) -> Result<Option<String>, SsoError> {
            Ok(Some("10.0.0.2".into()))
        }
        async fn exec(&self, _name: &str, _argv: &[String]) -> Result<ExecOutput, SsoError> {
            Ok(ExecOutput {
                status: self.probe_status.load(Ordering::SeqCst),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
        async fn logs(&self, _name: &str, _tail: usize) -> Result<String, SsoError> {
            Ok(String::new())
        }
        async fn ensure_network(&self, _network: &str) -> Result<(), SsoError> {
            Ok(())
        }
    }

    fn probe() -> Vec<String> {
        vec!["/app/healthcheck".to_string()]
    }

    #[test]
    fn exit_codes_follow_the_contract() {
        assert_eq!(Health::Healthy.exit_code(), 0);
        assert_eq!(Health::Degraded.exit_code(), 1);
        assert_eq!(Health::Down.exit_code(), 2);
        assert_eq!(Health::Missing.exit_code(), 2);
    }

    #[tokio::test]
    async fn running_with_passing_probe_is_healthy() {
        let runtime = ScriptedRuntime {
            state: ContainerState::Running,
            probe_status: AtomicI32::new(0),
        };
        let argv = probe();
        let health = HealthEvaluator::new(&runtime).check("c", Some(argv.as_slice())).await;
        assert_eq!(health, Health::Healthy);
    }

    #[tokio::test]
    async fn running_with_failing_probe_is_degraded() {
        let runtime = ScriptedRuntime {
            state: ContainerState::Running,
            probe_status: AtomicI32::new(1),
        };
        let argv = probe();
        let health = HealthEvaluator::new(&runtime).check("c", Some(argv.as_slice())).await;
        assert_eq!(health, Health::Degraded);
    }

    #[tokio::test]
    async fn running_without_probe_is_healthy() {
        let runtime = ScriptedRuntime {
            state: ContainerState::Running,
            probe_status: AtomicI32::new(1),
        };
        let health = HealthEvaluator::new(&runtime).check("c", None).await;
        assert_eq!(health, Health::Healthy);
    }

    #[tokio::test]
    async fn stopped_or_absent_container_is_down() {
        for state in [ContainerState::Stopped, ContainerState::Missing] {
            let runtime = ScriptedRuntime { state, probe_status: AtomicI32::new(0) };
            let health = HealthEvaluator::new(&runtime).check("c", None).await;
            assert_eq!(health, Health::Down);
        }
    }

    #[tokio::test]
    async fn wait_healthy_times_out_with_the_budget_in_the_error() {
        let runtime = ScriptedRuntime {
            state: ContainerState::Stopped,
            probe_status: AtomicI32::new(0),
        };
        let err = HealthEvaluator::new(&runtime)
            .wait_healthy(
                "svc",
                "c",
                None,
                Duration::from_millis(50),
                Duration::from_millis(10),
            )
            .await
            .expect_err("must time out");
        assert!(matches!(err, SsoError::HealthTimeout { .. }));
    }
}
