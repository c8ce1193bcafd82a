use tracing_subscriber::EnvFilter;

use ssoctl::cli;
use ssoctl::config::SsoConfig;
use ssoctl::sys::{DockerRuntime, DokkuHost};

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr and stay silent unless RUST_LOG asks for
    // them; stdout belongs to the command output contract.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cfg = SsoConfig::load();
    let runtime = DockerRuntime::new(cfg.docker_bin.clone());
    let host = DokkuHost::new(cfg.host_bin.clone(), cfg.proxy_root.clone());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = cli::dispatch(&cfg, &runtime, &host, &args).await;
    std::process::exit(code);
}
