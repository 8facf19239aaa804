use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "TGFP_SEED_ENV";
const CONFIG_DIR_ENV: &str = "TGFP_SEED_CONFIG_DIR";
const ENV_PREFIX: &str = "TGFP_SEED";
/// Connection string read by the pool library; used as the lowest-priority URI.
const MONGO_URI_ENV: &str = "MONGO_URI";

/// Environment variables visible to [`Settings::from_sources`].
pub type EnvVars = config::Map<String, String>;

/// Deployment environment the seeder is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        let vars: EnvVars = std::env::vars().collect();
        Self::from_sources(&config_dir, &environment, &vars)
    }

    /// Build settings from `config_dir` for the named environment, taking
    /// `MONGO_URI` and `TGFP_SEED_*` overrides from `vars` instead of the
    /// process environment.
    pub fn from_sources(
        config_dir: &Path,
        environment: &str,
        vars: &EnvVars,
    ) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let mut builder = config::Config::builder();
        if let Some(uri) = vars.get(MONGO_URI_ENV) {
            builder = builder
                .set_default("database.uri", uri.as_str())
                .with_context(|| format!("invalid {MONGO_URI_ENV} value"))?;
        }

        let cfg = builder
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(vars.clone())),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_app_name() -> String {
        "tgfp-seed".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    fn default_server_selection_timeout_ms() -> u64 {
        10_000
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            app_name: Self::default_app_name(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            server_selection_timeout_ms: Self::default_server_selection_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_uri_is_localhost() {
        let settings = Settings::default();
        assert_eq!(settings.database.uri, "mongodb://127.0.0.1:27017");
        assert_eq!(settings.database.app_name, "tgfp-seed");
    }

    fn vars(pairs: &[(&str, &str)]) -> EnvVars {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[database]\nuri = \"mongodb://base:27017\"\nconnect_timeout_ms = 500\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("staging.toml"),
            "[database]\nuri = \"mongodb://staging:27017\"\n\n[telemetry]\nlog_format = \"json\"\n",
        )
        .unwrap();

        let settings = Settings::from_sources(dir.path(), "staging", &vars(&[])).unwrap();

        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.database.uri, "mongodb://staging:27017");
        assert_eq!(settings.database.connect_timeout_ms, 500);
        assert_eq!(settings.database.server_selection_timeout_ms, 10_000);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_config_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_sources(dir.path(), "local", &vars(&[])).unwrap();
        assert_eq!(settings.telemetry.filter, "info");
        assert_eq!(settings.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn mongo_uri_is_the_lowest_priority_uri() {
        let dir = tempfile::tempdir().unwrap();
        let env = vars(&[("MONGO_URI", "mongodb://pool:27017")]);

        let settings = Settings::from_sources(dir.path(), "local", &env).unwrap();
        assert_eq!(settings.database.uri, "mongodb://pool:27017");

        std::fs::write(
            dir.path().join("base.toml"),
            "[database]\nuri = \"mongodb://file:27017\"\n",
        )
        .unwrap();
        let settings = Settings::from_sources(dir.path(), "local", &env).unwrap();
        assert_eq!(settings.database.uri, "mongodb://file:27017");
    }

    #[test]
    fn prefixed_env_vars_override_files_and_mongo_uri() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[database]\nuri = \"mongodb://file:27017\"\nconnect_timeout_ms = 500\n",
        )
        .unwrap();
        let env = vars(&[
            ("MONGO_URI", "mongodb://pool:27017"),
            ("TGFP_SEED_DATABASE__URI", "mongodb://override:27017"),
            ("TGFP_SEED_DATABASE__CONNECT_TIMEOUT_MS", "42"),
            ("TGFP_SEED_TELEMETRY__LOG_FORMAT", "json"),
        ]);

        let settings = Settings::from_sources(dir.path(), "local", &env).unwrap();

        assert_eq!(settings.database.uri, "mongodb://override:27017");
        assert_eq!(settings.database.connect_timeout_ms, 42);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::from_sources(dir.path(), "qa", &vars(&[])).unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }
}
