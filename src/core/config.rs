mod parsing;
mod settings;
mod types;

pub(crate) use types::{
    BootstrapSettings, ConfigError, DatabaseSettings, Environment, RuntimeSettings, Settings,
    TelegramSettings, TelemetrySettings,
};
