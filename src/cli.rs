//! Thin command dispatcher. Argument parsing is deliberately minimal — the
//! command surface is the contract, not any particular parser: positionals,
//! a handful of boolean flags and a handful of value flags.

use std::collections::HashMap;

use crate::config::SsoConfig;
use crate::directory::DirectoryManager;
use crate::error::SsoError;
use crate::frontend::FrontendManager;
use crate::output;
use crate::protect::ProtectionEngine;
use crate::sys::traits::{ContainerRuntime, HostRegistry};

const DEFAULT_LOG_TAIL: usize = 100;

struct Args<'a> {
    positional: Vec<&'a str>,
    flags: Vec<&'a str>,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Args<'a> {
    fn parse(tokens: &'a [String]) -> Self {
        const VALUE_FLAGS: [&str; 4] = ["--provider", "--app", "--tail", "-n"];
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut values = HashMap::new();

        let mut iter = tokens.iter().peekable();
        while let Some(token) = iter.next() {
            if let Some(flag) = VALUE_FLAGS.iter().find(|f| token == *f) {
                if let Some(value) = iter.next() {
                    values.insert(*flag, value.as_str());
                }
            } else if token.starts_with('-') && token.len() > 1 {
                flags.push(token.as_str());
            } else {
                positional.push(token.as_str());
            }
        }
        Self { positional, flags, values }
    }

    fn at(&self, idx: usize) -> Option<&'a str> {
        self.positional.get(idx).copied()
    }

    fn need(&self, idx: usize, usage: &str) -> Result<&'a str, SsoError> {
        self.at(idx).ok_or_else(|| SsoError::Usage(usage.to_string()))
    }

    fn rest(&self, from: usize) -> Vec<String> {
        self.positional.iter().skip(from).map(|s| s.to_string()).collect()
    }

    fn flag(&self, names: &[&str]) -> bool {
        self.flags.iter().any(|f| names.contains(f))
    }

    fn value(&self, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|n| self.values.get(n).copied())
    }

    fn tail(&self) -> usize {
        self.value(&["--tail", "-n"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LOG_TAIL)
    }
}

pub async fn dispatch(
    cfg: &SsoConfig,
    runtime: &dyn ContainerRuntime,
    host: &dyn HostRegistry,
    tokens: &[String],
) -> i32 {
    let Some((cmd, rest)) = tokens.split_first() else {
        print_help();
        return 1;
    };
    let args = Args::parse(rest);

    let directories = DirectoryManager::new(cfg, runtime, host);
    let frontends = FrontendManager::new(cfg, runtime, host);
    let engine = ProtectionEngine::new(cfg, runtime, host);

    // `status` owns the 0/1/2 exit-code contract and bypasses the generic
    // error path.
    match cmd.as_str() {
        "status" => {
            return match args.need(0, "ssoctl status <name> [-q]") {
                Ok(name) => {
                    let quiet = args.flag(&["-q", "--quiet"]);
                    directories.status(name, quiet).await.exit_code()
                }
                Err(e) => fail(e),
            };
        }
        "frontend:status" => {
            return match args.need(0, "ssoctl frontend:status <name> [-q]") {
                Ok(name) => {
                    let quiet = args.flag(&["-q", "--quiet"]);
                    frontends.status(name, quiet).await.exit_code()
                }
                Err(e) => fail(e),
            };
        }
        _ => {}
    }

    let result: Result<(), SsoError> = match cmd.as_str() {
        "create" => match args.need(0, "ssoctl create <name> [--provider <provider>]") {
            Ok(name) => directories.create(name, args.value(&["--provider"])).await,
            Err(e) => Err(e),
        },
        "destroy" => match args.need(0, "ssoctl destroy <name> [-f]") {
            Ok(name) => directories.destroy(name, args.flag(&["-f", "--force"])).await,
            Err(e) => Err(e),
        },
        "info" => match args.need(0, "ssoctl info <name>") {
            Ok(name) => directories.info(name).await,
            Err(e) => Err(e),
        },
        "credentials" => match args.need(0, "ssoctl credentials <name>") {
            Ok(name) => directories.credentials(name).await,
            Err(e) => Err(e),
        },
        "link" => match (
            args.need(0, "ssoctl link <name> <app>"),
            args.need(1, "ssoctl link <name> <app>"),
        ) {
            (Ok(name), Ok(app)) => directories.link(name, app).await,
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        "unlink" => match (
            args.need(0, "ssoctl unlink <name> <app>"),
            args.need(1, "ssoctl unlink <name> <app>"),
        ) {
            (Ok(name), Ok(app)) => directories.unlink(name, app).await,
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        "list" => directories.list().await,
        "providers" => directories.providers().await,
        "logs" => match args.need(0, "ssoctl logs <name> [--tail <n>]") {
            Ok(name) => directories.logs(name, args.tail()).await,
            Err(e) => Err(e),
        },
        "create-user" => {
            let usage = "ssoctl create-user <name> <username> <email> <password>";
            match (args.need(0, usage), args.need(1, usage), args.need(2, usage), args.need(3, usage)) {
                (Ok(name), Ok(user), Ok(email), Ok(password)) => {
                    directories.create_user(name, user, email, password).await
                }
                (Err(e), ..) | (_, Err(e), ..) | (_, _, Err(e), _) | (_, _, _, Err(e)) => Err(e),
            }
        }
        "provider:config" => match args.need(0, "ssoctl provider:config <name> [KEY=VALUE ...]") {
            Ok(name) => directories.config(name, &args.rest(1)).await,
            Err(e) => Err(e),
        },
        "provider:apply" => match args.need(0, "ssoctl provider:apply <name>") {
            Ok(name) => directories.apply(name).await,
            Err(e) => Err(e),
        },

        "frontend:create" => match args.need(0, "ssoctl frontend:create <name> [--app <app>]") {
            Ok(name) => frontends.create(name, args.value(&["--app"])).await,
            Err(e) => Err(e),
        },
        "frontend:destroy" => match args.need(0, "ssoctl frontend:destroy <name> [-f] [--keep-app]") {
            Ok(name) => {
                frontends
                    .destroy(name, args.flag(&["-f", "--force"]), args.flag(&["--keep-app"]))
                    .await
            }
            Err(e) => Err(e),
        },
        "frontend:info" => match args.need(0, "ssoctl frontend:info <name>") {
            Ok(name) => frontends.info(name).await,
            Err(e) => Err(e),
        },
        "frontend:list" => frontends.list().await,
        "frontend:logs" => match args.need(0, "ssoctl frontend:logs <name> [--tail <n>]") {
            Ok(name) => frontends.logs(name, args.tail()).await,
            Err(e) => Err(e),
        },
        "frontend:config" => match args.need(0, "ssoctl frontend:config <name> [KEY=VALUE ...]") {
            Ok(name) => frontends.config(name, &args.rest(1)).await,
            Err(e) => Err(e),
        },
        "frontend:apply" => match args.need(0, "ssoctl frontend:apply <name>") {
            Ok(name) => frontends.apply(name).await,
            Err(e) => Err(e),
        },
        "frontend:use-directory" => {
            let usage = "ssoctl frontend:use-directory <frontend> <directory>";
            match (args.need(0, usage), args.need(1, usage)) {
                (Ok(name), Ok(dir)) => frontends.use_directory(name, dir).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        "frontend:protect" => {
            let usage = "ssoctl frontend:protect <frontend> <app>";
            match (args.need(0, usage), args.need(1, usage)) {
                (Ok(name), Ok(app)) => engine.protect(app, Some(name)).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        "frontend:unprotect" => {
            let usage = "ssoctl frontend:unprotect <frontend> <app>";
            match (args.need(0, usage), args.need(1, usage)) {
                (Ok(name), Ok(app)) => engine.unprotect(app, Some(name)).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        "frontend:refresh" => match args.need(0, "ssoctl frontend:refresh <frontend>") {
            Ok(name) => engine.refresh(name).await,
            Err(e) => Err(e),
        },

        "protect" => match args.need(0, "ssoctl protect <app>") {
            Ok(app) => engine.protect(app, None).await,
            Err(e) => Err(e),
        },
        "unprotect" => match args.need(0, "ssoctl unprotect <app>") {
            Ok(app) => engine.unprotect(app, None).await,
            Err(e) => Err(e),
        },

        "oidc:enable" => match args.need(0, "ssoctl oidc:enable <frontend>") {
            Ok(name) => frontends.oidc_enable(name).await,
            Err(e) => Err(e),
        },
        "oidc:disable" => match args.need(0, "ssoctl oidc:disable <frontend>") {
            Ok(name) => frontends.oidc_disable(name).await,
            Err(e) => Err(e),
        },
        "oidc:list" => match args.need(0, "ssoctl oidc:list <frontend>") {
            Ok(name) => frontends.oidc_list(name).await,
            Err(e) => Err(e),
        },
        "oidc:add-client" => {
            let usage = "ssoctl oidc:add-client <frontend> <client-id> [secret] [redirect-uri]";
            match (args.need(0, usage), args.need(1, usage)) {
                (Ok(name), Ok(client_id)) => {
                    frontends
                        .oidc_add_client(name, client_id, args.at(2), args.at(3))
                        .await
                }
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        "oidc:remove-client" => {
            let usage = "ssoctl oidc:remove-client <frontend> <client-id>";
            match (args.need(0, usage), args.need(1, usage)) {
                (Ok(name), Ok(client_id)) => frontends.oidc_remove_client(name, client_id).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            output::error(format!("Unknown command: {other}"));
            output::error("Run 'ssoctl help' for available commands");
            return 1;
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

fn fail(e: SsoError) -> i32 {
    output::error(e);
    1
}

fn print_help() {
    println!("ssoctl — managed LDAP directory and forward-auth/OIDC frontend services");
    println!();
    println!("Directory services:");
    println!("  create <name> [--provider <p>]   destroy <name> [-f]");
    println!("  info <name>                      status <name> [-q]");
    println!("  credentials <name>               list | providers");
    println!("  link <name> <app>                unlink <name> <app>");
    println!("  logs <name> [--tail <n>]         create-user <name> <user> <email> <pass>");
    println!("  provider:config <name> [KEY=VALUE ...]");
    println!("  provider:apply <name>");
    println!();
    println!("Frontend services:");
    println!("  frontend:create <name> [--app <app>]");
    println!("  frontend:destroy <name> [-f] [--keep-app]");
    println!("  frontend:info|list|status|logs|config|apply ...");
    println!("  frontend:use-directory <frontend> <directory>");
    println!("  frontend:protect|unprotect <frontend> <app>");
    println!("  frontend:refresh <frontend>");
    println!();
    println!("Protection (auto-detected frontend):");
    println!("  protect <app>                    unprotect <app>");
    println!();
    println!("OIDC clients:");
    println!("  oidc:enable|disable|list <frontend>");
    println!("  oidc:add-client <frontend> <client-id> [secret] [redirect-uri]");
    println!("  oidc:remove-client <frontend> <client-id>");
}
