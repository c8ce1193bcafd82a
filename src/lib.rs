//! ssoctl — a control plane for identity infrastructure on a host PaaS.
//!
//! Provisions and reconciles managed containers for an LDAP-compatible
//! directory service (LLDAP or GLAuth) and a forward-auth/OIDC frontend
//! (Authelia), and binds hosted applications to that infrastructure:
//! - declarative per-service `KEY=VALUE` config with atomic persistence and
//!   sensitive-key masking
//! - a shared validate → recreate → verify apply pipeline
//! - health classification with a stable 0/1/2 exit-code contract
//! - protect/unprotect/refresh of reverse-proxy forward-auth bindings
//! - per-frontend OIDC client registry
//!
//! The host PaaS and the container runtime are collaborators behind narrow
//! async traits (`sys::traits`); the reconciliation logic is testable with
//! in-memory fakes.

pub mod apply;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod frontend;
pub mod health;
pub mod output;
pub mod protect;
pub mod secrets;
pub mod store;
pub mod sys;
