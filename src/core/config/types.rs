use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) database: DatabaseSettings,
    pub(super) telegram: TelegramSettings,
    pub(super) bootstrap: BootstrapSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) database_url: String,
    pub(crate) max_connections: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct TelegramSettings {
    pub(crate) token: String,
    pub(crate) api_base_url: String,
    pub(crate) poll_timeout_seconds: u64,
}

/// Identities provisioned into `admins` at startup.
#[derive(Debug, Clone, Default)]
pub(crate) struct BootstrapSettings {
    pub(crate) admin_ids: Vec<i64>,
    pub(crate) headman_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}
