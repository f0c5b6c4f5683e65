//! dht-proxy - Main entry point
//!
//! Runs a DHT node and exposes it over HTTP until interrupted.

use anyhow::{Context, Result};
use dht_proxy::{CliArgs, Config, DhtProxyServer, DhtRunner, NodeHandle, RunnerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the main loop checks that the server is still up
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        match panic_info.location() {
            Some(location) => error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => error!("PANIC occurred at unknown location"),
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("dht-proxy starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;
    let proxy_config = config.proxy_config().context("Invalid listen address")?;

    let node = DhtRunner::run(RunnerConfig::default()).context("Failed to start DHT node")?;
    info!("DHT node {} running", node.id());

    if let Some((host, port)) = config.bootstrap_node()? {
        info!("Bootstrapping from {}:{}", host, port);
        match node.bootstrap(&host, port).await {
            Ok(count) => info!("Added {} bootstrap node(s)", count),
            Err(e) => warn!("Bootstrap failed, continuing without it: {}", e),
        }
    }

    let node: Arc<dyn NodeHandle> = node;
    let server = DhtProxyServer::new(node, proxy_config).context("Failed to start proxy server")?;
    info!("Proxy listening on http://{}", server.local_addr());

    wait_for_shutdown(&server).await;

    // stop() joins threads, keep it off the async workers.
    tokio::task::spawn_blocking(move || server.stop())
        .await
        .context("Failed to stop proxy server")?;

    info!("dht-proxy finished");
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized with level {:?}", args.log_level());
}

/// Block until Ctrl-C or until the HTTP engine stops on its own
async fn wait_for_shutdown(server: &DhtProxyServer) {
    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Interrupt received, shutting down"),
                    Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
                }
                return;
            }
            _ = health.tick() => {
                if !server.running() {
                    warn!("HTTP engine stopped unexpectedly");
                    return;
                }
                debug!("Proxy alive, {} preflight request(s) served", server.request_count());
            }
        }
    }
}
