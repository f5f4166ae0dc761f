#[cfg(feature = "cli")]
use clap::Parser;

/// Runtime configuration, parsed from CLI flags and environment variables.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "nnlb"))]
#[cfg_attr(
    feature = "cli",
    command(about = "A reverse-proxy HTTP load balancer with pluggable selection strategies")
)]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    /// Port to listen on.
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "8080"))]
    pub port: u16,

    /// Host/interface to bind to.
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    /// Comma-separated `host:port` backend addresses to seed the store with.
    #[cfg_attr(feature = "cli", arg(long, env = "BACKENDS", value_delimiter = ','))]
    pub backends: Vec<String>,

    /// Selection strategy: round-robin, random, or least_connections
    /// (underscored spellings are accepted too).
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "STRATEGY", default_value = "round-robin")
    )]
    pub strategy: String,

    /// Interval between health-check passes, in seconds.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "HEALTH_CHECK_INTERVAL_SECS", default_value = "10")
    )]
    pub health_check_interval_secs: u64,

    /// Per-probe timeout, in seconds.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "HEALTH_CHECK_TIMEOUT_SECS", default_value = "1")
    )]
    pub health_check_timeout_secs: u64,

    /// Default token-bucket capacity for newly registered clients.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "DEFAULT_CAPACITY", default_value = "10")
    )]
    pub default_capacity: i64,

    /// Default token refill rate (tokens/sec) for newly registered clients.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "DEFAULT_RATE_PER_SEC", default_value = "1")
    )]
    pub default_rate_per_sec: i64,

    /// Log level (error, warn, info, debug, trace).
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production).
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "ENVIRONMENT", default_value = "development")
    )]
    pub environment: String,

    /// Total time budget for graceful shutdown, in seconds.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value = "30")
    )]
    pub shutdown_timeout_secs: u64,

    /// Time budget to drain in-flight requests before forcing shutdown, in seconds.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "SHUTDOWN_DRAIN_TIMEOUT_SECS", default_value = "10")
    )]
    pub shutdown_drain_timeout_secs: u64,
}

impl Config {
    /// Load `.env`, parse CLI args and environment, set up logging, validate,
    /// and exit the process on a configuration error.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();
        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("configuration error: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// A minimal configuration for tests: one backend, round robin, fast
    /// health checks.
    pub fn for_test() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            backends: vec!["127.0.0.1:9000".to_string()],
            strategy: "round-robin".to_string(),
            health_check_interval_secs: 10,
            health_check_timeout_secs: 1,
            default_capacity: 10,
            default_rate_per_sec: 1,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            shutdown_timeout_secs: 30,
            shutdown_drain_timeout_secs: 10,
        }
    }

    fn setup_logging(&self) {
        #[cfg(feature = "cli")]
        let _ = tracing_subscriber::fmt()
            .with_env_filter(&self.log_level)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Validate configuration, returning a human-readable error on the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port cannot be 0; specify a port in 1-65535".to_string());
        }

        if self.host.is_empty() {
            return Err("host cannot be empty".to_string());
        }

        if self.backends.is_empty() {
            return Err("at least one backend must be configured via --backends/BACKENDS".to_string());
        }

        for backend in &self.backends {
            if backend.trim().is_empty() {
                return Err("backend addresses cannot be empty".to_string());
            }
            // Backends are configured as bare `host:port`; validate by
            // parsing the origin we'll actually dial (`http://<backend>`).
            match url::Url::parse(&format!("http://{backend}")) {
                Ok(parsed) => {
                    if parsed.host_str().is_none() {
                        return Err(format!("backend '{backend}' has no host"));
                    }
                }
                Err(err) => {
                    return Err(format!("backend '{backend}' is not a valid address: {err}"));
                }
            }
        }

        let valid_strategies = ["round_robin", "random", "least_connections"];
        if !valid_strategies.contains(&crate::strategy::normalize_name(&self.strategy).as_str()) {
            return Err(format!(
                "invalid strategy '{}'; valid options are: round-robin, random, least_connections",
                self.strategy,
            ));
        }

        if self.health_check_interval_secs == 0 {
            return Err("health_check_interval_secs must be greater than 0".to_string());
        }

        if self.health_check_timeout_secs == 0 {
            return Err("health_check_timeout_secs must be greater than 0".to_string());
        }

        if self.default_capacity <= 0 {
            return Err("default_capacity must be greater than 0".to_string());
        }

        if self.default_rate_per_sec <= 0 {
            return Err("default_rate_per_sec must be greater than 0".to_string());
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "invalid environment '{}'; valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "invalid log level '{}'; valid options are: {}",
                self.log_level,
                valid_log_levels.join(", ")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_backend_list() {
        let mut config = Config::for_test();
        config.backends.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_backend_address() {
        let mut config = Config::for_test();
        config.backends = vec!["not a url at all".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_strategy() {
        let mut config = Config::for_test();
        config.strategy = "bogus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_hyphenated_strategy_spelling() {
        let mut config = Config::for_test();
        config.strategy = "least-connections".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn for_test_config_validates() {
        assert!(Config::for_test().validate().is_ok());
    }
}
