use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_id_list, parse_u32,
    parse_u64,
};
use super::types::{
    BootstrapSettings, ConfigError, DatabaseSettings, RuntimeSettings, Settings,
    TelegramSettings, TelemetrySettings,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://university_bot.db";
const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("BOT_ENV").or_else(|| env_optional("ENVIRONMENT")));

        let database_url = env_or_default("DATABASE_URL", DEFAULT_DATABASE_URL);
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default("DATABASE_MAX_CONNECTIONS", "5"),
        )?;

        let token =
            env_optional("BOT_TOKEN").or_else(|| env_optional("TG_TOKEN")).unwrap_or_default();
        let api_base_url = env_or_default("BOT_API_BASE_URL", DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let poll_timeout_seconds = parse_u64(
            "BOT_POLL_TIMEOUT_SECONDS",
            env_or_default("BOT_POLL_TIMEOUT_SECONDS", "30"),
        )?;

        let admin_ids = parse_id_list("BOOTSTRAP_ADMIN_IDS", env_optional("BOOTSTRAP_ADMIN_IDS"))?;
        let headman_ids =
            parse_id_list("BOOTSTRAP_HEADMAN_IDS", env_optional("BOOTSTRAP_HEADMAN_IDS"))?;

        let log_level = env_or_default("BOT_LOG_LEVEL", "info");
        let json = env_optional("BOT_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment },
            database: DatabaseSettings { database_url, max_connections },
            telegram: TelegramSettings { token, api_base_url, poll_timeout_seconds },
            bootstrap: BootstrapSettings { admin_ids, headman_ids },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn telegram(&self) -> &TelegramSettings {
        &self.telegram
    }

    pub(crate) fn bootstrap(&self) -> &BootstrapSettings {
        &self.bootstrap
    }

    #[cfg(test)]
    pub(crate) fn bootstrap_mut(&mut self) -> &mut BootstrapSettings {
        &mut self.bootstrap
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    #[cfg(test)]
    pub(crate) fn for_tests(database_url: &str) -> Self {
        use crate::core::config::Environment;

        Self {
            runtime: RuntimeSettings { environment: Environment::Test },
            database: DatabaseSettings {
                database_url: database_url.to_string(),
                max_connections: 1,
            },
            telegram: TelegramSettings {
                token: "test-token".to_string(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                poll_timeout_seconds: 1,
            },
            bootstrap: BootstrapSettings::default(),
            telemetry: TelemetrySettings {
                log_level: "debug".to_string(),
                json: false,
                prometheus_enabled: false,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.is_empty() {
            return Err(ConfigError::MissingSecret("BOT_TOKEN"));
        }

        if self.telegram.poll_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "BOT_POLL_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::{ConfigError, Environment, Settings};
    use crate::test_support::env_lock;

    fn clear_bot_env() {
        for key in [
            "BOT_TOKEN",
            "TG_TOKEN",
            "BOT_ENV",
            "ENVIRONMENT",
            "DATABASE_URL",
            "DATABASE_MAX_CONNECTIONS",
            "BOT_API_BASE_URL",
            "BOT_POLL_TIMEOUT_SECONDS",
            "BOOTSTRAP_ADMIN_IDS",
            "BOOTSTRAP_HEADMAN_IDS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[tokio::test]
    async fn load_requires_token() {
        let _guard = env_lock().await;
        clear_bot_env();

        let err = Settings::load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret("BOT_TOKEN")));
    }

    #[tokio::test]
    async fn load_applies_defaults_and_token_alias() {
        let _guard = env_lock().await;
        clear_bot_env();
        std::env::set_var("TG_TOKEN", "123:abc");
        std::env::set_var("BOT_API_BASE_URL", "http://localhost:8081/");
        std::env::set_var("BOOTSTRAP_ADMIN_IDS", "42");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.telegram().token, "123:abc");
        assert_eq!(settings.telegram().api_base_url, "http://localhost:8081");
        assert_eq!(settings.telegram().poll_timeout_seconds, 30);
        assert_eq!(settings.database().database_url, "sqlite://university_bot.db");
        assert_eq!(settings.bootstrap().admin_ids, vec![42]);
        assert!(settings.bootstrap().headman_ids.is_empty());
        assert_eq!(settings.runtime().environment, Environment::Development);

        clear_bot_env();
    }

    #[tokio::test]
    async fn load_rejects_zero_poll_timeout() {
        let _guard = env_lock().await;
        clear_bot_env();
        std::env::set_var("BOT_TOKEN", "t");
        std::env::set_var("BOT_POLL_TIMEOUT_SECONDS", "0");

        let err = Settings::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "BOT_POLL_TIMEOUT_SECONDS", .. }));

        clear_bot_env();
    }
}
