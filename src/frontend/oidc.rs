//! Per-frontend OIDC client registry.
//!
//! The enable flag and the client list are independent: disabling keeps the
//! registered clients, and `list` on a disabled frontend still enumerates
//! them while flagging the set as not enabled. Client ids are unique within
//! one frontend only.

use serde::{Deserialize, Serialize};

use crate::error::SsoError;
use crate::frontend::{FrontendManager, FrontendState};
use crate::output;
use crate::secrets;
use crate::store::ServiceKind;

const KIND: ServiceKind = ServiceKind::Frontend;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub clients: Vec<OidcClient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl FrontendManager<'_> {
    pub async fn oidc_enable(&self, name: &str) -> Result<(), SsoError> {
        let mut state: FrontendState = self.load(name).await?;
        state.oidc.enabled = true;
        self.registry().save_state(KIND, name, &state).await?;
        output::ok(format!("OIDC enabled for '{name}'"));
        output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        Ok(())
    }

    /// Disabling does not clear the client list; re-enabling restores the
    /// previous set untouched.
    pub async fn oidc_disable(&self, name: &str) -> Result<(), SsoError> {
        let mut state: FrontendState = self.load(name).await?;
        state.oidc.enabled = false;
        self.registry().save_state(KIND, name, &state).await?;
        output::ok(format!("OIDC disabled for '{name}'"));
        output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        Ok(())
    }

    pub async fn oidc_add_client(
        &self,
        name: &str,
        client_id: &str,
        secret: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<(), SsoError> {
        let mut state: FrontendState = self.load(name).await?;
        if state.oidc.clients.iter().any(|c| c.client_id == client_id) {
            return Err(SsoError::already_exists("OIDC client", client_id));
        }

        output::header(format!("Adding OIDC client to '{name}'"));
        let generated = secret.is_none();
        let client_secret = secret
            .map(str::to_string)
            .unwrap_or_else(|| secrets::random_token(40));

        state.oidc.clients.push(OidcClient {
            client_id: client_id.to_string(),
            client_secret: client_secret.clone(),
            redirect_uri: redirect_uri.unwrap_or_default().to_string(),
        });
        self.registry().save_state(KIND, name, &state).await?;

        output::ok(format!("Client added: {client_id}"));
        if let Some(uri) = redirect_uri {
            output::step(format!("Redirect URI: {uri}"));
        }
        if generated {
            // The stored secret is never re-displayed in full.
            output::step(format!("Client secret: {client_secret}"));
            output::step("Store the secret now; it will not be shown again");
        }
        if !state.oidc.enabled {
            output::step(format!("OIDC is not enabled; run 'ssoctl oidc:enable {name}'"));
        }
        output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        Ok(())
    }

    pub async fn oidc_remove_client(&self, name: &str, client_id: &str) -> Result<(), SsoError> {
        let mut state: FrontendState = self.load(name).await?;
        if !state.oidc.clients.iter().any(|c| c.client_id == client_id) {
            return Err(SsoError::not_found("OIDC client", client_id));
        }
        state.oidc.clients.retain(|c| c.client_id != client_id);
        self.registry().save_state(KIND, name, &state).await?;
        output::ok(format!("Client removed: {client_id}"));
        output::step(format!("Run 'ssoctl frontend:apply {name}' to apply changes"));
        Ok(())
    }

    pub async fn oidc_list(&self, name: &str) -> Result<(), SsoError> {
        let state: FrontendState = self.load(name).await?;
        output::header(format!("OIDC clients for '{name}'"));
        if !state.oidc.enabled {
            output::step("OIDC is not enabled for this frontend");
        }
        if state.oidc.clients.is_empty() {
            output::step("(none)");
            return Ok(());
        }
        for client in &state.oidc.clients {
            output::step(&client.client_id);
            output::step(format!("  Client secret: {}", secrets::masked(&client.client_secret)));
            let uri = if client.redirect_uri.is_empty() {
                "(none)"
            } else {
                client.redirect_uri.as_str()
            };
            output::step(format!("  Redirect URI: {uri}"));
        }
        Ok(())
    }
}
