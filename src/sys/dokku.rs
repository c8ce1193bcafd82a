use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use crate::error::SsoError;
use crate::store::safe_write;
use crate::sys::traits::{AuthRule, HostRegistry};

const RULE_FILE: &str = "sso-forward-auth.conf";

/// Strict app-name validation before any path or argv is built from it.
fn validate_app_name(app: &str) -> Result<(), SsoError> {
    if app.is_empty() {
        return Err(SsoError::Host("app name cannot be empty".into()));
    }
    if app.contains("..") || app.contains('/') || app.contains('\\') {
        return Err(SsoError::Host(format!("path traversal detected in app name: '{app}'")));
    }
    if !app.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_') {
        return Err(SsoError::Host(format!("invalid characters in app name: '{app}'")));
    }
    Ok(())
}

/// Drives the host PaaS CLI for the narrow facts the control plane needs:
/// app existence, app config injection, domain lookup, and the per-app
/// reverse-proxy include that carries the forward-auth rule.
pub struct DokkuHost {
    bin: String,
    proxy_root: PathBuf,
}

impl DokkuHost {
    pub fn new(bin: impl Into<String>, proxy_root: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into(), proxy_root: proxy_root.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<(bool, String, String), SsoError> {
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| SsoError::Host(format!("failed to spawn {}: {e}", self.bin)))?;
        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String, SsoError> {
        let (ok, stdout, stderr) = self.run(args).await?;
        if !ok {
            return Err(SsoError::Host(format!(
                "{} {} failed: {}",
                self.bin,
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(stdout)
    }

    fn rule_path(&self, app: &str) -> PathBuf {
        self.proxy_root.join(app).join("nginx.conf.d").join(RULE_FILE)
    }

    /// Rebuild the app's proxy config so an installed or removed include
    /// takes effect.
    async fn rebuild_proxy(&self, app: &str) -> Result<(), SsoError> {
        self.run_checked(&["nginx:build-config", app]).await?;
        Ok(())
    }
}

#[async_trait]
impl HostRegistry for DokkuHost {
    async fn app_exists(&self, app: &str) -> Result<bool, SsoError> {
        validate_app_name(app)?;
        let (ok, _, _) = self.run(&["apps:exists", app]).await?;
        Ok(ok)
    }

    async fn create_app(&self, app: &str) -> Result<(), SsoError> {
        validate_app_name(app)?;
        self.run_checked(&["apps:create", app]).await?;
        Ok(())
    }

    async fn destroy_app(&self, app: &str) -> Result<(), SsoError> {
        validate_app_name(app)?;
        self.run_checked(&["apps:destroy", app, "--force"]).await?;
        Ok(())
    }

    async fn app_domain(&self, app: &str) -> Result<Option<String>, SsoError> {
        validate_app_name(app)?;
        let stdout = self
            .run_checked(&["domains:report", app, "--domains-app-vhosts"])
            .await?;
        Ok(stdout.split_whitespace().next().map(str::to_string))
    }

    async fn set_config(&self, app: &str, entries: &[(String, String)]) -> Result<(), SsoError> {
        validate_app_name(app)?;
        if entries.is_empty() {
            return Ok(());
        }
        let mut args: Vec<String> = vec!["config:set".into(), "--no-restart".into(), app.into()];
        args.extend(entries.iter().map(|(k, v)| format!("{k}={v}")));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(&arg_refs).await?;
        Ok(())
    }

    async fn unset_config(&self, app: &str, keys: &[String]) -> Result<(), SsoError> {
        validate_app_name(app)?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["config:unset", "--no-restart", app];
        args.extend(keys.iter().map(String::as_str));
        self.run_checked(&args).await?;
        Ok(())
    }

    async fn install_auth_rule(&self, app: &str, rule: &AuthRule) -> Result<(), SsoError> {
        validate_app_name(app)?;
        let content = render_rule(rule);
        // The include must be readable by the proxy worker, not just root.
        safe_write(&self.rule_path(app), &content, 0o644).await?;
        self.rebuild_proxy(app).await
    }

    async fn remove_auth_rule(&self, app: &str) -> Result<(), SsoError> {
        validate_app_name(app)?;
        match fs::remove_file(self.rule_path(app)).await {
            Ok(()) => self.rebuild_proxy(app).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The nginx include injected into a protected app's server block. Every
/// request is sub-requested against the frontend's verification endpoint;
/// a 401 bounces the browser to the login portal with a return URL.
fn render_rule(rule: &AuthRule) -> String {
    format!(
        r#"# forward-auth binding managed by ssoctl (frontend: {frontend})
location = /sso/verify {{
    internal;
    proxy_pass {verify_url};
    proxy_pass_request_body off;
    proxy_set_header Content-Length "";
    proxy_set_header X-Original-URL $scheme://$http_host$request_uri;
    proxy_set_header X-Forwarded-Method $request_method;
    proxy_set_header X-Forwarded-Proto $scheme;
    proxy_set_header X-Forwarded-Host $http_host;
    proxy_set_header X-Forwarded-Uri $request_uri;
    proxy_set_header X-Forwarded-For $remote_addr;
}}

auth_request /sso/verify;
auth_request_set $sso_redirect $scheme://$http_host$request_uri;
error_page 401 =302 {portal_url}/?rd=$sso_redirect;
"#,
        frontend = rule.frontend,
        verify_url = rule.verify_url,
        portal_url = rule.portal_url,
    )
}
