//! Command-line interface for the tictactoe server.

use clap::Parser;
use std::path::PathBuf;
use tictactoe_server::{ConfigError, ServerConfig};

/// Single-player tic-tac-toe REST service
#[derive(Parser, Debug)]
#[command(name = "tictactoe_server")]
#[command(about = "Tic-tac-toe against a random computer player", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML config file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub addr: Option<String>,

    /// Directory holding game records
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Base URL used in the location of new games
    #[arg(long)]
    pub public_url: Option<String>,

    /// PEM certificate chain; serves HTTPS together with --key
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// PEM private key; serves HTTPS together with --cert
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Debug logging for the service crates
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies flag overrides.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(addr) = self.addr {
            config = config.with_addr(addr);
        }
        if let Some(path) = self.storage_path {
            config = config.with_storage_path(path);
        }
        if let Some(url) = self.public_url {
            config = config.with_public_url(url);
        }
        if let Some(cert) = self.cert {
            config = config.with_cert(cert);
        }
        if let Some(key) = self.key {
            config = config.with_key(key);
        }
        if self.debug {
            config = config.with_debug(true);
        }

        Ok(config)
    }
}
