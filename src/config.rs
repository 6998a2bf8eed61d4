use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "expensedb", about = "ExpenseDB - expense tracking REST API")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "expensedb.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Storage connection URL: postgres://..., sqlite://<path>, sqlite::memory: or memory://
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default = "default_shutdown")]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShutdownConfig {
    /// Upper bound on how long in-flight requests may run after an interrupt.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_shutdown() -> ShutdownConfig {
    ShutdownConfig {
        drain_timeout_secs: default_drain_timeout_secs(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2565
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            database: DatabaseConfig::default(),
            logging: default_logging(),
            shutdown: default_shutdown(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => Config::default(),
        };
        config.with_overrides(cli)
    }

    /// Parses a TOML document, falling back to defaults when it is malformed.
    pub fn parse(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {}", e);
            Config::default()
        })
    }

    fn with_overrides(mut self, cli: &CliArgs) -> Self {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(ref url) = cli.database_url {
            self.database.url = Some(url.clone());
        }
        self
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown.drain_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("expensedb").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 2565);
        assert_eq!(config.drain_timeout(), Duration::from_secs(10));
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:2565");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_parse_file_sections() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            url = "sqlite://expenses.db"

            [logging]
            json = true

            [shutdown]
            drain_timeout_secs = 3
            "#,
        );
        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.database.url.as_deref(), Some("sqlite://expenses.db"));
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.drain_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let config = Config::parse("[server\nport = ");
        assert_eq!(config.server.port, 2565);
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = cli(&["--port", "9000", "--log-level", "debug", "--database-url", "memory://"]);
        let file = "[server]\nport = 8080\n[database]\nurl = \"sqlite::memory:\"";
        let config = Config::parse(file).with_overrides(&args);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.database.url.as_deref(), Some("memory://"));
    }
}
