//! CLI configuration module
//!
//! Turns parsed arguments into validated settings for the node and the
//! HTTP server.

use crate::cli::args::CliArgs;
use crate::error::ProxyError;
use crate::proxy::{default_threads, ProxyConfig};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Configuration for the proxy binary
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind: String,
    /// HTTP listening port
    pub port: u16,
    /// Bootstrap node, `None` to skip bootstrapping
    pub bootstrap: Option<String>,
    /// HTTP worker threads
    pub threads: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Advertise signed and encrypted operations
    pub identity: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        let bootstrap = if args.no_bootstrap || args.bootstrap.trim().is_empty() {
            None
        } else {
            Some(args.bootstrap.trim().to_string())
        };

        Self {
            bind: args.bind.clone(),
            port: args.port,
            bootstrap,
            threads: args.threads.unwrap_or_else(default_threads),
            timeout: Duration::from_secs(args.timeout),
            identity: args.identity,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.port == 0 {
            return Err(ProxyError::config_error_with_field("Port cannot be 0", "port"));
        }

        if self.threads == 0 {
            return Err(ProxyError::config_error_with_field("threads must be at least 1", "threads"));
        }

        if self.timeout < Duration::from_secs(1) {
            return Err(ProxyError::config_error_with_field("timeout must be at least 1 second", "timeout"));
        }

        self.bind_ip()?;

        if self.bootstrap.is_some() {
            self.bootstrap_node()?;
        }

        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr, ProxyError> {
        self.bind.parse::<IpAddr>().map_err(|_| {
            ProxyError::config_error_with_field(format!("Invalid bind address: {}", self.bind), "bind")
        })
    }

    /// Get the HTTP listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.port))
    }

    /// Split the bootstrap node into host and port
    ///
    /// Accepts `host:port` and `[v6addr]:port`.
    pub fn bootstrap_node(&self) -> Result<Option<(String, u16)>, ProxyError> {
        let Some(node) = self.bootstrap.as_deref() else {
            return Ok(None);
        };

        let invalid = || {
            ProxyError::config_error_with_field(format!("Invalid bootstrap node: {}", node), "bootstrap")
        };
        let (host, port) = node.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() || port == 0 {
            return Err(invalid());
        }
        Ok(Some((host.to_string(), port)))
    }

    /// Settings handed to the HTTP server
    pub fn proxy_config(&self) -> Result<ProxyConfig, ProxyError> {
        Ok(ProxyConfig {
            listen_addr: self.listen_addr()?,
            threads: self.threads,
            request_timeout: self.timeout,
            drain_timeout: self.timeout,
            identity: self.identity,
        })
    }
}
