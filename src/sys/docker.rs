use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SsoError;
use crate::sys::traits::{ContainerRuntime, ContainerSpec, ContainerState, ExecOutput};

/// Drives the container runtime CLI. Containers are labeled so a stray
/// `sso.managed` container can always be traced back to this plane.
pub struct DockerRuntime {
    bin: String,
}

impl DockerRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<ExecOutput, SsoError> {
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| SsoError::Runtime(format!("failed to spawn {}: {e}", self.bin)))?;

        Ok(ExecOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn run_checked(&self, args: &[&str]) -> Result<ExecOutput, SsoError> {
        let out = self.run(args).await?;
        if !out.success() {
            return Err(SsoError::Runtime(format!(
                "{} {} failed: {}",
                self.bin,
                args.first().unwrap_or(&""),
                out.stderr.trim()
            )));
        }
        Ok(out)
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), SsoError> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
            "--network".into(),
            spec.network.clone(),
            "--restart".into(),
            "unless-stopped".into(),
            "--label".into(),
            "sso.managed=1".into(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        for mount in &spec.mounts {
            let mut volume = format!("{}:{}", mount.host_path.display(), mount.container_path);
            if mount.read_only {
                volume.push_str(":ro");
            }
            args.push("-v".into());
            args.push(volume);
        }
        args.push(spec.image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(&arg_refs).await?;
        tracing::debug!(container = %spec.name, image = %spec.image, "container created");
        Ok(())
    }

    async fn destroy(&self, name: &str) -> Result<(), SsoError> {
        let out = self.run(&["rm", "-f", name]).await?;
        if !out.success() && !out.stderr.contains("No such container") {
            return Err(SsoError::Runtime(format!(
                "failed to remove container '{name}': {}",
                out.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn state(&self, name: &str) -> Result<ContainerState, SsoError> {
        let out = self
            .run(&["inspect", "-f", "{{.State.Running}}", name])
            .await?;
        if !out.success() {
            return Ok(ContainerState::Missing);
        }
        match out.stdout.trim() {
            "true" => Ok(ContainerState::Running),
            _ => Ok(ContainerState::Stopped),
        }
    }

    async fn address(&self, name: &str, network: &str) -> Result<Option<String>, SsoError> {
        let fmt = format!("{{{{(index .NetworkSettings.Networks \"{network}\").IPAddress}}}}");
        let out = self.run(&["inspect", "-f", &fmt, name]).await?;
        if !out.success() {
            return Ok(None);
        }
        let ip = out.stdout.trim().to_string();
        if ip.is_empty() || ip == "<no value>" {
            Ok(None)
        } else {
            Ok(Some(ip))
        }
    }

    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecOutput, SsoError> {
        let mut args = vec!["exec", name];
        args.extend(argv.iter().map(String::as_str));
        self.run(&args).await
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SsoError> {
        let tail = tail.to_string();
        let out = self
            .run_checked(&["logs", "--tail", tail.as_str(), name])
            .await?;
        // The runtime splits container output across both streams; callers
        // want the combined view.
        Ok(format!("{}{}", out.stdout, out.stderr))
    }

    async fn ensure_network(&self, network: &str) -> Result<(), SsoError> {
        let probe = self.run(&["network", "inspect", network]).await?;
        if probe.success() {
            return Ok(());
        }
        let created = self.run(&["network", "create", network]).await?;
        // A concurrent invocation may have won the race; that is fine.
        if !created.success() && !created.stderr.contains("already exists") {
            return Err(SsoError::Runtime(format!(
                "failed to create network '{network}': {}",
                created.stderr.trim()
            )));
        }
        Ok(())
    }
}
