mod common;

use common::Harness;
use ssoctl::directory::{DirectoryManager, DirectoryState};
use ssoctl::error::SsoError;
use ssoctl::health::Health;
use ssoctl::store::{ConfigRecord, ServiceKind};

fn manager(h: &Harness) -> DirectoryManager<'_> {
    DirectoryManager::new(&h.cfg, &h.runtime, &h.host)
}

#[tokio::test]
async fn create_starts_a_healthy_lldap_container() {
    let h = Harness::new();
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");

    let container = h.runtime.container("sso.directory.main").expect("container");
    assert!(container.running);
    assert!(container.spec.image.contains("lldap"));
    assert_eq!(container.spec.network, "sso.network");
    assert!(container.spec.env.iter().any(|(k, _)| k == "LLDAP_JWT_SECRET"));

    assert_eq!(dir.status("main", true).await, Health::Healthy);
}

#[tokio::test]
async fn create_is_rejected_for_duplicates_and_invalid_names() {
    let h = Harness::new();
    let dir = manager(&h);

    dir.create("main", None).await.expect("first create");
    let err = dir.create("main", None).await.expect_err("duplicate");
    assert!(matches!(err, SsoError::AlreadyExists { .. }));
    assert!(err.to_string().contains("already exists"));

    for bad in ["UpperCase", "123invalid", "bad_name!"] {
        let err = dir.create(bad, None).await.expect_err(bad);
        assert!(matches!(err, SsoError::InvalidName { .. }));
        assert!(err.to_string().contains("must start with a letter"));
    }
}

#[tokio::test]
async fn glauth_provider_renders_its_config_artifact() {
    let h = Harness::new();
    let dir = manager(&h);

    dir.create("gl", Some("glauth")).await.expect("create");

    let container = h.runtime.container("sso.directory.gl").expect("container");
    assert!(container.spec.image.contains("glauth"));
    assert!(container
        .spec
        .mounts
        .iter()
        .any(|m| m.container_path == "/app/config/config.cfg"));

    let cfg_path = dir.registry().service_dir(ServiceKind::Directory, "gl").join("glauth.cfg");
    let rendered = std::fs::read_to_string(cfg_path).expect("glauth.cfg");
    assert!(rendered.contains("baseDN"));
    assert!(rendered.contains("passsha256"));
}

#[tokio::test]
async fn unknown_provider_is_rejected_before_any_state_lands() {
    let h = Harness::new();
    let dir = manager(&h);

    let err = dir.create("svc", Some("openldap")).await.expect_err("bad provider");
    assert!(matches!(err, SsoError::UnknownProvider(_)));
    assert!(!dir.registry().exists(ServiceKind::Directory, "svc"));
}

#[tokio::test]
async fn apply_twice_converges_on_the_same_healthy_state() {
    let h = Harness::new();
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");
    dir.apply("main").await.expect("first re-apply");
    dir.apply("main").await.expect("second re-apply");

    // Each apply is a full recreate cycle ending in the same running state.
    assert_eq!(h.runtime.creates.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(dir.status("main", true).await, Health::Healthy);
}

#[tokio::test]
async fn status_follows_the_exit_code_contract() {
    let h = Harness::new();
    let dir = manager(&h);

    // Never created.
    let health = dir.status("ghost", true).await;
    assert_eq!(health, Health::Missing);
    assert_eq!(health.exit_code(), 2);

    dir.create("main", None).await.expect("create");
    assert_eq!(dir.status("main", true).await.exit_code(), 0);

    // Probe failing while the container runs: degraded.
    h.runtime.fail_probe("sso.directory.main");
    assert_eq!(dir.status("main", true).await.exit_code(), 1);

    // Container gone out-of-band: down.
    h.runtime.remove("sso.directory.main");
    assert_eq!(dir.status("main", true).await.exit_code(), 2);

    // Destroyed service: missing again.
    let dir2 = manager(&h);
    dir2.destroy("main", true).await.expect("destroy");
    assert_eq!(dir2.status("main", true).await.exit_code(), 2);
}

#[tokio::test]
async fn destroy_blocks_on_linked_apps_unless_forced() {
    let h = Harness::new();
    h.host.add_app("gitea");
    h.host.add_app("nextcloud");
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");
    dir.link("main", "gitea").await.expect("link");
    dir.link("main", "nextcloud").await.expect("link");

    let err = dir.destroy("main", false).await.expect_err("blocked");
    let msg = err.to_string();
    assert!(matches!(err, SsoError::LinkedApps { .. }));
    assert!(msg.contains("gitea") && msg.contains("nextcloud"));

    // Nothing was torn down by the refused destroy.
    assert!(h.runtime.container("sso.directory.main").is_some());

    dir.destroy("main", true).await.expect("forced destroy");
    assert!(h.runtime.container("sso.directory.main").is_none());

    // The name is free again, as if fresh.
    dir.create("main", None).await.expect("re-create");
}

#[tokio::test]
async fn destroy_of_a_missing_service_is_not_found() {
    let h = Harness::new();
    let err = manager(&h).destroy("ghost", true).await.expect_err("missing");
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn link_injects_prefixed_credentials_idempotently() {
    let h = Harness::new();
    h.host.add_app("blog");
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");
    dir.link("main", "blog").await.expect("link");

    let injected = h.host.app_config("blog");
    assert_eq!(
        injected.get("SSO_LDAP_URL").map(String::as_str),
        Some("ldap://sso.directory.main:3890")
    );
    assert!(injected.contains_key("SSO_LDAP_BIND_DN"));
    assert!(injected.contains_key("SSO_ADMIN_PASSWORD"));

    // Already linked: success, no duplicate membership.
    dir.link("main", "blog").await.expect("re-link");
    let state: DirectoryState = dir
        .registry()
        .load_state(ServiceKind::Directory, "main")
        .await
        .expect("state");
    assert_eq!(state.linked_apps, vec!["blog".to_string()]);
}

#[tokio::test]
async fn link_requires_both_sides_to_exist() {
    let h = Harness::new();
    let dir = manager(&h);

    let err = dir.link("ghost", "blog").await.expect_err("missing service");
    assert!(err.to_string().contains("does not exist"));

    dir.create("main", None).await.expect("create");
    let err = dir.link("main", "ghost-app").await.expect_err("missing app");
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn unlink_removes_injected_keys_and_tolerates_non_links() {
    let h = Harness::new();
    h.host.add_app("blog");
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");
    dir.link("main", "blog").await.expect("link");
    dir.unlink("main", "blog").await.expect("unlink");

    assert!(h.host.app_config("blog").is_empty());
    let state: DirectoryState = dir
        .registry()
        .load_state(ServiceKind::Directory, "main")
        .await
        .expect("state");
    assert!(state.linked_apps.is_empty());

    // Unlinking again is a reported no-op, not an error.
    dir.unlink("main", "blog").await.expect("no-op unlink");
}

#[tokio::test]
async fn apply_refreshes_linked_apps_and_skips_vanished_ones() {
    let h = Harness::new();
    h.host.add_app("alive");
    h.host.add_app("doomed");
    let dir = manager(&h);

    dir.create("main", None).await.expect("create");
    dir.link("main", "alive").await.expect("link");
    dir.link("main", "doomed").await.expect("link");

    // One app disappears out-of-band; the refresh must not abort.
    h.host.remove_app("doomed");
    dir.apply("main").await.expect("apply with vanished app");

    assert!(h.host.app_config("alive").contains_key("SSO_LDAP_URL"));
    // Membership is untouched; only unlink edits the set.
    let state: DirectoryState = dir
        .registry()
        .load_state(ServiceKind::Directory, "main")
        .await
        .expect("state");
    assert_eq!(state.linked_apps.len(), 2);
}

#[tokio::test]
async fn config_persists_plaintext_and_masks_only_on_render() {
    let h = Harness::new();
    let dir = manager(&h);
    dir.create("main", None).await.expect("create");

    dir.config(
        "main",
        &["JWT_SECRET=supersecretvalue123".to_string(), "KEY_A=value1".to_string()],
    )
    .await
    .expect("set");

    let stored = std::fs::read_to_string(dir.registry().env_path(ServiceKind::Directory, "main"))
        .expect("ENV");
    assert!(stored.contains("JWT_SECRET=supersecretvalue123"));
    assert!(stored.contains("KEY_A=value1"));

    let record = ConfigRecord::parse(&stored);
    let rendered = record.render(true);
    assert!(rendered.contains("JWT_SECRET=***"));
    assert!(!rendered.contains("supersecretvalue123"));
    assert!(rendered.contains("KEY_A=value1"));
}

#[tokio::test]
async fn malformed_config_entries_do_not_abort_the_valid_ones() {
    let h = Harness::new();
    let dir = manager(&h);
    dir.create("main", None).await.expect("create");

    dir.config("main", &["BADFORMAT".to_string(), "GOOD_KEY=1".to_string()])
        .await
        .expect("mixed entries");

    let stored = std::fs::read_to_string(dir.registry().env_path(ServiceKind::Directory, "main"))
        .expect("ENV");
    assert!(stored.contains("GOOD_KEY=1"));
    assert!(!stored.contains("BADFORMAT"));
}

#[tokio::test]
async fn credentials_are_exported_in_plaintext_key_value_form() {
    let h = Harness::new();
    let dir = manager(&h);
    dir.create("main", None).await.expect("create");

    let exported =
        std::fs::read_to_string(dir.registry().credentials_path(ServiceKind::Directory, "main"))
            .expect("CREDENTIALS");
    assert!(exported.contains("LDAP_URL=ldap://sso.directory.main:3890"));
    assert!(exported.contains("LDAP_BASE_DN=dc=example,dc=com"));
    assert!(exported.contains("LDAP_BIND_DN=uid=admin,ou=people,dc=example,dc=com"));
    // The export contract is plaintext; no masking here.
    let password_line = exported
        .lines()
        .find(|l| l.starts_with("ADMIN_PASSWORD="))
        .expect("password line");
    assert!(password_line.len() > "ADMIN_PASSWORD=".len() + 8);
    assert!(!password_line.contains("***"));
}

#[tokio::test]
async fn failed_container_creation_surfaces_and_leaves_state_for_retry() {
    let h = Harness::new();
    let dir = manager(&h);

    *h.runtime.fail_next_create.lock().unwrap() = true;
    let err = dir.create("main", None).await.expect_err("create fails");
    assert!(matches!(err, SsoError::Runtime(_)));

    // No rollback: the service record stays, and a retry converges.
    assert!(dir.registry().exists(ServiceKind::Directory, "main"));
    dir.apply("main").await.expect("retry apply");
    assert_eq!(dir.status("main", true).await, Health::Healthy);
}

#[tokio::test]
async fn create_user_drives_the_admin_api_on_lldap_only() {
    let h = Harness::new();
    let dir = manager(&h);

    dir.create("main", None).await.expect("create lldap");
    dir.create_user("main", "alice", "alice@test.local", "Passw0rd!")
        .await
        .expect("create user");

    dir.create("gl", Some("glauth")).await.expect("create glauth");
    let err = dir
        .create_user("gl", "bob", "bob@test.local", "pw")
        .await
        .expect_err("glauth has no admin API");
    assert!(matches!(err, SsoError::Unsupported(_)));
}
