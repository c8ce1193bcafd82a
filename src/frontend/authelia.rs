//! Rendering of the frontend engine's configuration file.
//!
//! The frontend container (Authelia) is driven by one generated
//! `configuration.yml` mounted read-only from the service directory. The
//! authentication backend section follows the linked directory service when
//! one is configured and falls back to the engine's internal user file
//! otherwise; the OIDC provider section is present only when the
//! sub-resource is enabled and has registered clients.

use crate::directory::DirectoryCredentials;
use crate::frontend::oidc::OidcState;
use crate::secrets;
use crate::store::record::ConfigRecord;
use secrecy::ExposeSecret;

pub const IMAGE: &str = "authelia/authelia:latest";
pub const PORT: u16 = 9091;
pub const DEFAULT_DOMAIN: &str = "auth.local";

pub const REQUIRED_KEYS: [&str; 4] =
    ["DOMAIN", "SESSION_SECRET", "STORAGE_ENCRYPTION_KEY", "JWT_SECRET"];

/// Initial config written at create time; secrets are generated so the first
/// apply validates cleanly, and `DOMAIN` gets a placeholder the operator is
/// expected to overwrite.
pub fn initial_config() -> ConfigRecord {
    let mut record = ConfigRecord::new();
    record.set("DOMAIN", DEFAULT_DOMAIN);
    record.set("SESSION_SECRET", secrets::random_token(secrets::SECRET_LEN));
    record.set("STORAGE_ENCRYPTION_KEY", secrets::random_token(secrets::SECRET_LEN));
    record.set("JWT_SECRET", secrets::random_token(secrets::SECRET_LEN));
    record.set("OIDC_HMAC_SECRET", secrets::random_token(secrets::SECRET_LEN));
    record
}

pub fn probe() -> Vec<String> {
    vec!["/app/healthcheck.sh".to_string()]
}

pub fn render_config(
    config: &ConfigRecord,
    ldap: Option<&DirectoryCredentials>,
    oidc: &OidcState,
) -> String {
    let domain = config.get("DOMAIN").unwrap_or(DEFAULT_DOMAIN);
    let jwt_secret = config.get("JWT_SECRET").unwrap_or_default();
    let session_secret = config.get("SESSION_SECRET").unwrap_or_default();
    let storage_key = config.get("STORAGE_ENCRYPTION_KEY").unwrap_or_default();
    let log_level = config.get("LOG_LEVEL").unwrap_or("info");

    let backend = match ldap {
        Some(creds) => format!(
            r#"authentication_backend:
  ldap:
    address: {url}
    implementation: custom
    base_dn: {base_dn}
    user: {bind_dn}
    password: {password}
    additional_users_dn: ou=people
    users_filter: (&({{username_attribute}}={{input}})(objectClass=person))
    groups_filter: (member={{dn}})"#,
            url = creds.ldap_url,
            base_dn = creds.base_dn,
            bind_dn = creds.bind_dn,
            password = creds.admin_password.expose_secret(),
        ),
        None => r#"authentication_backend:
  file:
    path: /config/users.yml"#
            .to_string(),
    };

    let mut rendered = format!(
        r#"---
theme: light

server:
  address: tcp://0.0.0.0:{port}

log:
  level: {log_level}

identity_validation:
  reset_password:
    jwt_secret: {jwt_secret}

{backend}

session:
  secret: {session_secret}
  cookies:
    - domain: {domain}
      authelia_url: https://{domain}

storage:
  encryption_key: {storage_key}
  local:
    path: /config/db.sqlite3

notifier:
  filesystem:
    filename: /config/notification.txt

access_control:
  default_policy: one_factor
"#,
        port = PORT,
    );

    if oidc.enabled && !oidc.clients.is_empty() {
        let hmac = config.get("OIDC_HMAC_SECRET").unwrap_or_default();
        rendered.push_str(&format!(
            "\nidentity_providers:\n  oidc:\n    hmac_secret: {hmac}\n    clients:\n"
        ));
        for client in &oidc.clients {
            rendered.push_str(&format!(
                "      - client_id: {id}\n        client_secret: '{secret}'\n        authorization_policy: one_factor\n        scopes:\n          - openid\n          - profile\n          - email\n        redirect_uris:\n          - {uri}\n",
                id = client.client_id,
                secret = client.client_secret,
                uri = client.redirect_uri,
            ));
        }
    }

    rendered
}

/// Placeholder user database for the file backend; real users come from a
/// linked directory service.
pub fn render_users_file() -> String {
    "---\nusers: {}\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryProvider;
    use crate::frontend::oidc::OidcClient;
    use secrecy::Secret;

    fn creds() -> DirectoryCredentials {
        DirectoryCredentials {
            ldap_url: "ldap://sso.directory.main:3890".into(),
            base_dn: "dc=example,dc=com".into(),
            bind_dn: DirectoryProvider::Lldap.bind_dn("dc=example,dc=com"),
            admin_password: Secret::new("adminpass".to_string()),
        }
    }

    fn config() -> ConfigRecord {
        let mut record = initial_config();
        record.set("DOMAIN", "auth.test.local");
        record
    }

    #[test]
    fn ldap_backend_follows_directory_credentials() {
        let rendered = render_config(&config(), Some(&creds()), &OidcState::default());
        assert!(rendered.contains("address: ldap://sso.directory.main:3890"));
        assert!(rendered.contains("base_dn: dc=example,dc=com"));
        assert!(rendered.contains("user: uid=admin,ou=people,dc=example,dc=com"));
        assert!(rendered.contains("password: adminpass"));
        assert!(rendered.contains("users_filter: (&({username_attribute}={input})(objectClass=person))"));
        assert!(!rendered.contains("/config/users.yml"));
    }

    #[test]
    fn without_directory_the_file_backend_is_used() {
        let rendered = render_config(&config(), None, &OidcState::default());
        assert!(rendered.contains("file:"));
        assert!(rendered.contains("path: /config/users.yml"));
        assert!(!rendered.contains("ldap:"));
    }

    #[test]
    fn session_cookie_follows_the_domain() {
        let rendered = render_config(&config(), None, &OidcState::default());
        assert!(rendered.contains("domain: auth.test.local"));
        assert!(rendered.contains("authelia_url: https://auth.test.local"));
    }

    #[test]
    fn oidc_section_requires_enabled_and_clients() {
        let mut oidc = OidcState::default();
        oidc.clients.push(OidcClient {
            client_id: "grafana".into(),
            client_secret: "s3cr3t".into(),
            redirect_uri: "https://grafana.local/oauth2/callback".into(),
        });

        // Registered but not enabled: the section stays out.
        let rendered = render_config(&config(), None, &oidc);
        assert!(!rendered.contains("identity_providers:"));

        oidc.enabled = true;
        let rendered = render_config(&config(), None, &oidc);
        assert!(rendered.contains("identity_providers:"));
        assert!(rendered.contains("client_id: grafana"));
        assert!(rendered.contains("https://grafana.local/oauth2/callback"));

        // Enabled with an empty list: nothing to declare.
        oidc.clients.clear();
        let rendered = render_config(&config(), None, &oidc);
        assert!(!rendered.contains("identity_providers:"));
    }
}
