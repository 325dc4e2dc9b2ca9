use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    /// Secret for signing deferred-confirmation tokens.
    pub confirm_secret: String,
    /// Base URL of this API, used in emailed confirmation/cancel links.
    pub api_base_url: String,
    /// Base URL of the client app, target of confirmation redirects.
    pub client_url: String,
    /// Mail relay webhook that performs actual delivery.
    pub mailer_webhook_url: String,
    pub mail_from: String,
    /// Office mailboxes BCC'd on every notification, comma separated.
    pub office_bcc: Vec<String>,
    /// Phone number quoted in duplicate-submission remediation messages.
    pub office_phone: String,
    pub public_rps: u32,
    pub confirm_token_ttl_hours: i64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            confirm_secret: get_env("CONFIRM_SECRET")?,
            api_base_url: get_env("API_BASE_URL")?,
            client_url: get_env("CLIENT_URL")?,
            mailer_webhook_url: get_env("MAILER_WEBHOOK_URL")?,
            mail_from: get_env("MAIL_FROM")?,
            office_bcc: get_env("OFFICE_BCC")?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            office_phone: get_env("OFFICE_PHONE")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            confirm_token_ttl_hours: match env::var("CONFIRM_TOKEN_TTL_HOURS") {
                Ok(raw) => raw.parse().map_err(|e| {
                    Error::Config(format!("Invalid value for CONFIRM_TOKEN_TTL_HOURS: {}", e))
                })?,
                Err(_) => 72,
            },
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
