//! User bootstrap through the directory's one-time admin API.
//!
//! LLDAP exposes a GraphQL admin endpoint inside the container; the flow is
//! login → createUser → set password, all through `ContainerRuntime::exec`
//! so the control plane never needs network reachability to the container.
//! GLAuth's static-config model has no admin API, so user management is
//! rejected there instead of silently doing nothing.

use serde_json::json;
use zeroize::Zeroizing;

use crate::directory::{DirectoryManager, DirectoryState};
use crate::error::SsoError;
use crate::output;
use crate::store::ServiceKind;

const KIND: ServiceKind = ServiceKind::Directory;
const ADMIN_API: &str = "http://localhost:17170";

impl DirectoryManager<'_> {
    pub async fn create_user(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SsoError> {
        self.registry().require(KIND, name)?;
        let state: DirectoryState = self.registry().load_state(KIND, name).await?;
        if !state.provider.supports_user_management() {
            return Err(SsoError::Unsupported(format!(
                "provider '{}' does not support user management",
                state.provider
            )));
        }
        if username.is_empty() {
            return Err(SsoError::Usage(
                "ssoctl create-user <name> <username> <email> <password>".into(),
            ));
        }

        let config = self.registry().load_config(KIND, name).await?;
        // Held only for the duration of the exec calls, scrubbed on drop.
        let admin_password = Zeroizing::new(
            state
                .provider
                .admin_password(&config)
                .unwrap_or_default()
                .to_string(),
        );
        let container = KIND.container_name(name);

        output::header(format!("Creating user '{username}' in directory service '{name}'"));

        // 1. Admin token.
        let login_payload =
            json!({ "username": "admin", "password": admin_password.as_str() }).to_string();
        let out = self
            .exec_curl(&container, &login_payload, None, "/auth/simple/login")
            .await?;
        let token = serde_json::from_str::<serde_json::Value>(&out)
            .ok()
            .and_then(|v| v.get("token").and_then(|t| t.as_str()).map(str::to_string))
            .ok_or_else(|| {
                SsoError::Runtime(format!("admin API login failed for '{name}': {}", out.trim()))
            })?;

        // 2. Create the user record.
        let create_payload = json!({
            "query": "mutation CreateUser($user: CreateUserInput!) { createUser(user: $user) { id email } }",
            "variables": { "user": { "id": username, "email": email, "displayName": username } }
        })
        .to_string();
        let out = self
            .exec_curl(&container, &create_payload, Some(&token), "/api/graphql")
            .await?;
        if let Ok(body) = serde_json::from_str::<serde_json::Value>(&out) {
            if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
                let already_exists = errors.iter().any(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str())
                        .map(|m| m.contains("already exists"))
                        .unwrap_or(false)
                });
                if !already_exists && !errors.is_empty() {
                    return Err(SsoError::Runtime(format!(
                        "user creation failed: {}",
                        out.trim()
                    )));
                }
            }
        }
        output::step("User record created");

        // 3. Set the password with the bundled tool.
        let argv: Vec<String> = [
            "/app/lldap_set_password",
            "--base-url",
            ADMIN_API,
            "--admin-username",
            "admin",
            "--admin-password",
            admin_password.as_str(),
            "--username",
            username,
            "--password",
            password,
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        let out = self.runtime().exec(&container, &argv).await?;
        if !out.success() {
            return Err(SsoError::Runtime(format!(
                "setting password for '{username}' failed: {}",
                out.stderr.trim()
            )));
        }

        output::ok(format!("User '{username}' created in '{name}'"));
        Ok(())
    }

    async fn exec_curl(
        &self,
        container: &str,
        payload: &str,
        bearer: Option<&str>,
        path: &str,
    ) -> Result<String, SsoError> {
        let mut argv: Vec<String> = vec![
            "curl".into(),
            "-s".into(),
            "-X".into(),
            "POST".into(),
            "-H".into(),
            "Content-Type: application/json".into(),
        ];
        if let Some(token) = bearer {
            argv.push("-H".into());
            argv.push(format!("Authorization: Bearer {token}"));
        }
        argv.push("-d".into());
        argv.push(payload.to_string());
        argv.push(format!("{ADMIN_API}{path}"));

        let out = self.runtime().exec(container, &argv).await?;
        if !out.success() {
            return Err(SsoError::Runtime(format!(
                "could not reach the directory admin API: {}",
                out.stderr.trim()
            )));
        }
        Ok(out.stdout)
    }
}
