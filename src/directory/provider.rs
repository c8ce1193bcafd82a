//! Directory provider definitions.
//!
//! A provider bundles everything the apply pipeline needs to turn a config
//! record into a running directory container: image, ports, generated
//! initial configuration, required keys, rendered artifacts and the health
//! probe. The container internals stay a black box behind this contract.

use std::fmt;
use std::path::Path;

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::apply::Artifact;
use crate::error::SsoError;
use crate::secrets;
use crate::store::record::ConfigRecord;
use crate::sys::traits::Mount;

pub const DEFAULT_BASE_DN: &str = "dc=example,dc=com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryProvider {
    Lldap,
    Glauth,
}

impl DirectoryProvider {
    pub const ALL: [DirectoryProvider; 2] = [DirectoryProvider::Lldap, DirectoryProvider::Glauth];

    pub fn parse(s: &str) -> Result<Self, SsoError> {
        match s {
            "lldap" => Ok(DirectoryProvider::Lldap),
            "glauth" => Ok(DirectoryProvider::Glauth),
            other => Err(SsoError::UnknownProvider(other.to_string())),
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            DirectoryProvider::Lldap => "lldap/lldap:stable",
            DirectoryProvider::Glauth => "glauth/glauth:latest",
        }
    }

    pub fn ldap_port(&self) -> u16 {
        match self {
            DirectoryProvider::Lldap => 3890,
            DirectoryProvider::Glauth => 3893,
        }
    }

    /// Initial config written at create time. Secrets are generated here so
    /// the first apply validates cleanly.
    pub fn initial_config(&self, admin_password: &Secret<String>) -> ConfigRecord {
        let mut record = ConfigRecord::new();
        match self {
            DirectoryProvider::Lldap => {
                record.set("LLDAP_LDAP_BASE_DN", DEFAULT_BASE_DN);
                record.set("LLDAP_JWT_SECRET", secrets::random_token(secrets::SECRET_LEN));
                record.set("LLDAP_KEY_SEED", secrets::random_token(secrets::SECRET_LEN));
                record.set("LLDAP_LDAP_USER_PASS", admin_password.expose_secret().clone());
            }
            DirectoryProvider::Glauth => {
                record.set("GLAUTH_BASE_DN", DEFAULT_BASE_DN);
                record.set("GLAUTH_ADMIN_PASSWORD", admin_password.expose_secret().clone());
            }
        }
        record
    }

    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            DirectoryProvider::Lldap => &[
                "LLDAP_LDAP_BASE_DN",
                "LLDAP_JWT_SECRET",
                "LLDAP_KEY_SEED",
                "LLDAP_LDAP_USER_PASS",
            ],
            DirectoryProvider::Glauth => &["GLAUTH_BASE_DN", "GLAUTH_ADMIN_PASSWORD"],
        }
    }

    pub fn base_dn<'a>(&self, config: &'a ConfigRecord) -> &'a str {
        let key = match self {
            DirectoryProvider::Lldap => "LLDAP_LDAP_BASE_DN",
            DirectoryProvider::Glauth => "GLAUTH_BASE_DN",
        };
        config.get(key).unwrap_or(DEFAULT_BASE_DN)
    }

    pub fn admin_password<'a>(&self, config: &'a ConfigRecord) -> Option<&'a str> {
        let key = match self {
            DirectoryProvider::Lldap => "LLDAP_LDAP_USER_PASS",
            DirectoryProvider::Glauth => "GLAUTH_ADMIN_PASSWORD",
        };
        config.get(key)
    }

    pub fn bind_dn(&self, base_dn: &str) -> String {
        match self {
            DirectoryProvider::Lldap => format!("uid=admin,ou=people,{base_dn}"),
            DirectoryProvider::Glauth => format!("cn=admin,{base_dn}"),
        }
    }

    /// In-container health probe. GLAuth ships a scratch image with no shell
    /// or tooling, so a running container counts as healthy there.
    pub fn probe(&self) -> Option<Vec<String>> {
        match self {
            DirectoryProvider::Lldap => {
                Some(vec!["/app/lldap".to_string(), "healthcheck".to_string()])
            }
            DirectoryProvider::Glauth => None,
        }
    }

    /// Files rendered into the service directory before container start.
    pub fn artifacts(&self, service_dir: &Path, config: &ConfigRecord) -> Vec<Artifact> {
        match self {
            // LLDAP is configured entirely through its environment.
            DirectoryProvider::Lldap => Vec::new(),
            DirectoryProvider::Glauth => {
                let base_dn = self.base_dn(config);
                let password = config.get("GLAUTH_ADMIN_PASSWORD").unwrap_or_default();
                vec![Artifact {
                    path: service_dir.join("glauth.cfg"),
                    content: render_glauth_config(base_dn, password),
                    mode: 0o600,
                }]
            }
        }
    }

    pub fn mounts(&self, service_dir: &Path) -> Vec<Mount> {
        match self {
            DirectoryProvider::Lldap => Vec::new(),
            DirectoryProvider::Glauth => vec![Mount {
                host_path: service_dir.join("glauth.cfg"),
                container_path: "/app/config/config.cfg".to_string(),
                read_only: true,
            }],
        }
    }

    /// Container environment. GLAuth reads its config file only; the env
    /// record still travels along for operator-set extras like `TZ`.
    pub fn env(&self, config: &ConfigRecord) -> Vec<(String, String)> {
        match self {
            DirectoryProvider::Lldap => config.to_env(),
            DirectoryProvider::Glauth => config
                .to_env()
                .into_iter()
                .filter(|(k, _)| !k.starts_with("GLAUTH_"))
                .collect(),
        }
    }

    pub fn supports_user_management(&self) -> bool {
        matches!(self, DirectoryProvider::Lldap)
    }
}

impl fmt::Display for DirectoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryProvider::Lldap => write!(f, "lldap"),
            DirectoryProvider::Glauth => write!(f, "glauth"),
        }
    }
}

/// The generated credential set exported to operators and injected into
/// linked apps. The LDAP URL uses the container name: every managed
/// container sits on the shared network where names resolve, and names are
/// stable across recreations while addresses are not.
pub struct DirectoryCredentials {
    pub ldap_url: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub admin_password: Secret<String>,
}

impl DirectoryCredentials {
    pub fn derive(provider: DirectoryProvider, container: &str, config: &ConfigRecord) -> Self {
        let base_dn = provider.base_dn(config).to_string();
        Self {
            ldap_url: format!("ldap://{container}:{}", provider.ldap_port()),
            bind_dn: provider.bind_dn(&base_dn),
            base_dn,
            admin_password: Secret::new(
                provider.admin_password(config).unwrap_or_default().to_string(),
            ),
        }
    }

    /// Plaintext `KEY=VALUE` export, one credential per line. This is the
    /// wire contract for line-oriented consumers; masking never applies
    /// here.
    pub fn render(&self) -> String {
        format!(
            "LDAP_URL={}\nLDAP_BASE_DN={}\nLDAP_BIND_DN={}\nADMIN_PASSWORD={}\n",
            self.ldap_url,
            self.base_dn,
            self.bind_dn,
            self.admin_password.expose_secret(),
        )
    }

    /// Keys injected into a linked app's environment, prefixed to avoid
    /// clobbering app-owned variables.
    pub fn injection_entries(&self) -> Vec<(String, String)> {
        vec![
            ("SSO_LDAP_URL".to_string(), self.ldap_url.clone()),
            ("SSO_LDAP_BASE_DN".to_string(), self.base_dn.clone()),
            ("SSO_LDAP_BIND_DN".to_string(), self.bind_dn.clone()),
            (
                "SSO_ADMIN_PASSWORD".to_string(),
                self.admin_password.expose_secret().clone(),
            ),
        ]
    }

    pub fn injection_keys() -> Vec<String> {
        ["SSO_LDAP_URL", "SSO_LDAP_BASE_DN", "SSO_LDAP_BIND_DN", "SSO_ADMIN_PASSWORD"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

fn render_glauth_config(base_dn: &str, admin_password: &str) -> String {
    let pass_sha256 = hex_sha256(admin_password);
    format!(
        r#"[ldap]
  enabled = true
  listen = "0.0.0.0:3893"

[ldaps]
  enabled = false

[backend]
  datastore = "config"
  baseDN = "{base_dn}"

[behaviors]
  IgnoreCapabilities = false

[[users]]
  name = "admin"
  uidnumber = 5001
  primarygroup = 5501
  passsha256 = "{pass_sha256}"
    [[users.capabilities]]
    action = "search"
    object = "*"

[[groups]]
  name = "admins"
  gidnumber = 5501
"#
    )
}

fn hex_sha256(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
