use crate::captcha_client::CaptchaPolicy;
use crate::retry::RetryPolicy;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::time::Duration;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub captcha: CaptchaSettings,
    pub email_client: EmailClientSettings,
}

impl Settings {
    pub fn get_configuration() -> Result<Settings, config::ConfigError> {
        let base_path = std::env::current_dir()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        let config_dir = base_path.join("configuration");

        let env: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or(Environment::Local.as_str().into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        // Read the configuration from the file
        // supported file extensions: json, toml, yaml, etc
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from(config_dir.join("share")))
            // ConfigBuilder will merge multiple sources to one when build
            .add_source(config::File::from(config_dir.join(env.as_str())))
            // e.g. APP_DATABASE__PASSWORD=secret sets database.password
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            // Hosting platforms hand the listen port over as a bare PORT variable
            .set_override_option("application.port", std::env::var("PORT").ok())?
            .build()?
            // Deserialize the configuration into a Settings struct
            .try_deserialize()?;

        settings.application.check_allowed_origins()?;
        Ok(settings)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub name: String,
    pub default_log_level: String,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    #[serde(default = "default_require_agreement")]
    pub require_agreement: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_require_agreement() -> bool {
    true
}

impl ApplicationSettings {
    pub fn get_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Browsers send `Origin` as `scheme://host[:port]`, CORS compares it byte for byte.
    /// Anything else would either never match or make actix-cors panic on worker start.
    pub fn check_allowed_origins(&self) -> Result<(), config::ConfigError> {
        for origin in &self.allowed_origins {
            let serialized = reqwest::Url::parse(origin)
                .ok()
                .map(|url| url.origin())
                .filter(|parsed| parsed.is_tuple())
                .map(|parsed| parsed.ascii_serialization());
            if serialized.as_deref() != Some(origin.as_str()) {
                return Err(config::ConfigError::Message(format!(
                    "Invalid entry in application.allowed_origins: {:?}, \
                    expected scheme://host[:port] without path or wildcard",
                    origin
                )));
            }
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_connections: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub acquire_timeout_seconds: u64,
}

impl DatabaseSettings {
    // Connection options to the server itself, e.g. to create a throwaway database in tests
    pub fn get_base_pg_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .ssl_mode(ssl_mode)
    }

    pub fn get_pg_options(&self) -> PgConnectOptions {
        self.get_base_pg_options().database(&self.database_name)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaMode {
    Checkbox,
    Score,
}

#[derive(serde::Deserialize, Clone)]
pub struct CaptchaSettings {
    pub verify_url: String,
    pub secret: Secret<String>,
    pub mode: CaptchaMode,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_expected_action")]
    pub expected_action: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

fn default_min_score() -> f64 {
    0.5
}

fn default_expected_action() -> String {
    "submit_form".into()
}

impl CaptchaSettings {
    pub fn policy(&self) -> CaptchaPolicy {
        match self.mode {
            CaptchaMode::Checkbox => CaptchaPolicy::Checkbox,
            CaptchaMode::Score => CaptchaPolicy::Score {
                min_score: self.min_score,
                expected_action: self.expected_action.clone(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    // Implicit TLS, usually port 465
    Wrapper,
    // Upgrade a plaintext session, usually port 587
    StartTls,
    // Local relays only (mailpit, mailhog, test doubles)
    None,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub smtp_host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub smtp_port: u16,
    pub tls: SmtpTls,
    pub username: String,
    pub password: Secret<String>,
    pub sender_email: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_messages_per_second: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub retry_base_delay_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_milliseconds),
        )
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_messages_per_second.max(1)
    }
}

#[derive(Debug)]
enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!("Invalid APP_ENVIRONMENT: {}", other)),
        }
    }
}
