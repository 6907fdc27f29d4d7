use std::{path::PathBuf, time::Duration};

use crate::error::Result;
pub use clap::Parser;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "LAPANGIN_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "LAPANGIN_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "LAPANGIN_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/lapangin.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "LAPANGIN_DATA_DIR",
        help = "Data directory (database, token secret), default is system default like ~/.local/share/lapangin",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "LAPANGIN_TOKEN_VALIDITY",
        default_value = "1 day",
        help = "Token validity in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub token_validity: Duration,

    #[arg(
        long,
        env = "LAPANGIN_UTC_OFFSET",
        allow_hyphen_values = true,
        help = "Offset of the calendar used for booking dates (e.g. +07:00), default is the host's local offset",
        value_parser = parse_offset
    )]
    pub utc_offset: Option<UtcOffset>,

    #[arg(long, env = "LAPANGIN_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

fn parse_offset(s: &str) -> std::result::Result<UtcOffset, time::error::Parse> {
    UtcOffset::parse(
        s,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("lapangin"))
        .unwrap_or_else(|| PathBuf::from("lapangin"))
        .to_string_lossy()
        .to_string()
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    /// Explicit offset, otherwise the host's local one if it can be determined
    pub fn server_offset(&self) -> UtcOffset {
        self.utc_offset
            .or_else(|| UtcOffset::current_local_offset().ok())
            .unwrap_or(UtcOffset::UTC)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/lapangin.db", self.data_dir))
    }
}
