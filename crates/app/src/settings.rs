//! Handles settings for the application. Configuration is read from
//! `config/settings.toml` (optional) and from `KAZNA__*` environment
//! variables, e.g. `KAZNA__TELEGRAM__TOKEN`.
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/settings";

#[derive(Debug, Parser)]
#[command(name = "kazna", about = "Shared budget Telegram bot")]
struct Args {
    /// Settings file path; the extension may be omitted.
    #[arg(long)]
    config: Option<String>,
    /// Override the log level (`trace`, `debug`, `info`, ...).
    #[arg(long)]
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default = "default_bot_host")]
    pub bot_host: String,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub allowed_users: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    pub telegram: Telegram,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("KAZNA")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("telegram.allowed_users"),
            )
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        if let Some(level) = args.level {
            settings.app.level = level;
        }
        Ok(settings)
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_bot_host() -> String {
    "t.me".to_string()
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_session_ttl_secs() -> u64 {
    30 * 60
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn defaults_are_filled_in() {
        let settings = parse(
            r#"
            database = "memory"

            [telegram]
            token = "123:abc"
            "#,
        )
        .unwrap();

        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.database, Database::Memory);
        assert_eq!(settings.telegram.bot_host, "t.me");
        assert_eq!(settings.telegram.default_timezone, "Europe/Moscow");
        assert_eq!(settings.telegram.session_ttl_secs, 1800);
        assert!(settings.telegram.allowed_users.is_empty());
    }

    #[test]
    fn sqlite_database_and_overrides() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [database]
            sqlite = "./kazna.db"

            [telegram]
            token = "123:abc"
            bot_host = "telegram.me"
            default_timezone = "Asia/Tbilisi"
            session_ttl_secs = 60
            allowed_users = [1, 2]
            "#,
        )
        .unwrap();

        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database, Database::Sqlite("./kazna.db".to_string()));
        assert_eq!(settings.telegram.bot_host, "telegram.me");
        assert_eq!(settings.telegram.session_ttl_secs, 60);
        assert_eq!(settings.telegram.allowed_users, [1, 2]);
    }

    #[test]
    fn token_is_required() {
        assert!(parse(r#"database = "memory""#).is_err());
    }
}
