//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;

/// CLI arguments for the proxy
#[derive(Debug, Parser)]
#[command(name = "dht-proxy")]
#[command(about = "HTTP/JSON proxy in front of a DHT node", long_about = None)]
pub struct CliArgs {
    /// Address the HTTP server binds to
    #[arg(long, value_name = "IP", default_value = "127.0.0.1")]
    pub bind: String,

    /// HTTP listening port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Bootstrap node as host:port
    #[arg(long, value_name = "HOST:PORT", default_value = "bootstrap.jami.net:4222")]
    pub bootstrap: String,

    /// Do not contact the bootstrap node
    #[arg(long)]
    pub no_bootstrap: bool,

    /// HTTP worker threads (defaults to available cores minus one)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout: u64,

    /// Advertise signed and encrypted operations
    #[arg(long)]
    pub identity: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let args = CliArgs::try_parse_from(["dht-proxy"]).unwrap();

        assert_eq!(args.bind, "127.0.0.1");
        assert_eq!(args.port, 8080);
        assert_eq!(args.bootstrap, "bootstrap.jami.net:4222");
        assert!(!args.no_bootstrap);
        assert_eq!(args.threads, None);
        assert_eq!(args.timeout, 10);
        assert!(!args.identity);
        assert_eq!(args.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_explicit_values() {
        let args = CliArgs::try_parse_from([
            "dht-proxy", "--bind", "0.0.0.0", "-p", "9000", "--no-bootstrap",
            "--threads", "3", "--timeout", "30", "--identity", "-v",
        ])
        .unwrap();

        assert_eq!(args.bind, "0.0.0.0");
        assert_eq!(args.port, 9000);
        assert!(args.no_bootstrap);
        assert_eq!(args.threads, Some(3));
        assert_eq!(args.timeout, 30);
        assert!(args.identity);
        assert!(args.is_verbose());
        assert_eq!(args.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(CliArgs::try_parse_from(["dht-proxy", "-v", "-q"]).is_err());
        let args = CliArgs::try_parse_from(["dht-proxy", "-q"]).unwrap();
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
