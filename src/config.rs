//! Configuration for shgate
//!
//! CLI arguments with environment variable fallbacks, using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// shgate - shell scripts over HTTP for `curl | sh`
#[derive(Parser, Debug, Clone)]
#[command(name = "shgate")]
#[command(about = "Path-addressable shell scripts with per-script password locks")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "./shgate.db")]
    pub db_path: PathBuf,

    /// Keep everything in memory (nothing survives a restart)
    #[arg(long, env = "IN_MEMORY", default_value = "false")]
    pub in_memory: bool,

    /// Public host name used in generated scripts (e.g. sh.example.com)
    #[arg(long, env = "PUBLIC_HOST", default_value = "localhost:8000")]
    pub public_host: String,

    /// Scheme used in generated scripts
    #[arg(long, env = "PUBLIC_SCHEME", default_value = "https")]
    pub public_scheme: String,

    /// Token required for /api/*; unset leaves the admin API open
    #[arg(long, env = "ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Seconds between expired-token sweeps
    #[arg(long, env = "TOKEN_SWEEP_SECS", default_value = "300")]
    pub token_sweep_secs: u64,
}

impl Args {
    /// Base URL embedded in generated scripts
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.public_scheme, self.public_host.trim_end_matches('/'))
    }

    /// Admin token, treating an empty value as unset
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.public_host.trim().is_empty() {
            return Err("PUBLIC_HOST must not be empty".to_string());
        }
        if self.public_host.contains("://") {
            return Err("PUBLIC_HOST must be a host name, not a URL".to_string());
        }
        if !matches!(self.public_scheme.as_str(), "http" | "https") {
            return Err(format!(
                "PUBLIC_SCHEME must be http or https (got {})",
                self.public_scheme
            ));
        }
        if self.token_sweep_secs == 0 {
            return Err("TOKEN_SWEEP_SECS must be greater than zero".to_string());
        }
        Ok(())
    }
}
