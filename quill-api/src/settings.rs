//! Service settings, read from the command line and the environment.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "quill-api", about = "ML-serving HTTP API", version)]
pub struct Settings {
    /// Service name reported by the health endpoint
    #[arg(long, env = "API_NAME", default_value = env!("CARGO_PKG_NAME"))]
    pub api_name: String,

    /// Service version reported by the health endpoint
    #[arg(long, env = "API_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub api_version: String,

    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Human-readable logs instead of compact ones
    #[arg(
        long,
        env = "DEBUG",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// `prod` switches logs to JSON
    #[arg(long, env = "ENVIRONMENT", value_enum, ignore_case = true, default_value_t = Environment::Dev)]
    pub environment: Environment,

    /// Size of the blocking worker pool, 0 for one worker per CPU
    #[arg(long, env = "MAX_WORKERS", default_value_t = 0)]
    pub max_workers: usize,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "DATA_PATH", default_value = "data")]
    pub data_path: PathBuf,
}

impl Settings {
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn models_path(&self) -> PathBuf {
        self.data_path.join("models")
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Prod
    }

    /// The number of pool workers.
    pub fn workers(&self) -> usize {
        match self.max_workers {
            0 => thread::available_parallelism().map_or(1, usize::from),
            n => n,
        }
    }

    /// Resolve the address to listen on.
    pub fn addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address {}", self.api_url()))?
            .next()
            .with_context(|| format!("{} did not resolve to an address", self.host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values() {
        let settings = Settings::try_parse_from([
            "quill-api",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--max-workers",
            "3",
            "--data-path",
            "/srv/data",
            "--environment",
            "PROD",
        ])
        .unwrap();

        assert_eq!(settings.api_url(), "http://127.0.0.1:9000");
        assert_eq!(settings.models_path(), PathBuf::from("/srv/data/models"));
        assert_eq!(settings.workers(), 3);
        assert!(settings.is_production());
        assert_eq!(settings.addr().unwrap().port(), 9000);
    }

    #[test]
    fn default_workers() {
        let settings = Settings::try_parse_from(["quill-api", "--max-workers", "0"]).unwrap();
        assert!(settings.workers() >= 1);
    }
}
