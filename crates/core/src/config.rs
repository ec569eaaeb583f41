use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const CONFIG_CANDIDATES: [&str; 2] = ["easyshop.toml", "config/easyshop.toml"];

/// Runtime settings for the storefront. Sections missing from the file keep their defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://easyshop.db?mode=rwc".into(), max_connections: 5, timeout_secs: 30 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".into(), port: 8080, graceful_shutdown_secs: 15 }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token for catalog administration. Admin routes are refused when unset.
    #[serde(deserialize_with = "secret_from_str")]
    pub admin_token: Option<SecretString>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "logging.format `{other}` is not one of compact|pretty|json"
            ))),
        }
    }
}

/// Values supplied by the caller (CLI flags, tests). They win over file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references unset environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("config file has a `${{` without a closing `}}`")]
    UnterminatedInterpolation,
    #[error("environment variable `{key}` has unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl AuthConfig {
    /// Compares a presented bearer token against the configured one without
    /// short-circuiting on the first differing byte.
    pub fn admin_token_matches(&self, presented: &str) -> bool {
        let Some(expected) = &self.admin_token else {
            return false;
        };
        let expected = expected.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        let diff = expected.iter().zip(presented).fold(0u8, |acc, (a, b)| acc | (a ^ b));
        expected.len() == presented.len() && diff == 0
    }
}

impl AppConfig {
    /// Builds the configuration from defaults, the TOML file, `EASYSHOP_*` variables and
    /// caller overrides, in that order, then validates the result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;

        let mut config = match resolve_config_path(config_path.as_deref()) {
            Some(path) => Self::from_file(&path)?,
            None if require_file => {
                let expected = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let expanded = expand_env_references(&raw)?;
        toml::from_str(&expanded)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_into("EASYSHOP_DATABASE_URL", &mut self.database.url)?;
        env_into("EASYSHOP_DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections)?;
        env_into("EASYSHOP_DATABASE_TIMEOUT_SECS", &mut self.database.timeout_secs)?;
        env_into("EASYSHOP_SERVER_BIND_ADDRESS", &mut self.server.bind_address)?;
        env_into("EASYSHOP_SERVER_PORT", &mut self.server.port)?;
        env_into(
            "EASYSHOP_SERVER_GRACEFUL_SHUTDOWN_SECS",
            &mut self.server.graceful_shutdown_secs,
        )?;
        env_into("EASYSHOP_LOGGING_LEVEL", &mut self.logging.level)?;
        env_into("EASYSHOP_LOGGING_FORMAT", &mut self.logging.format)?;

        if let Some(token) = read_env("EASYSHOP_AUTH_ADMIN_TOKEN") {
            self.auth.admin_token = Some(token.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides { database_url, log_level, server_port, admin_token } = overrides;
        replace(&mut self.database.url, database_url);
        replace(&mut self.logging.level, log_level);
        replace(&mut self.server.port, server_port);
        if let Some(token) = admin_token {
            self.auth.admin_token = Some(token.into());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        require(
            url.starts_with("sqlite:") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        )?;
        require(self.database.max_connections > 0, "database.max_connections must be at least 1")?;
        require(
            (1..=300).contains(&self.database.timeout_secs),
            "database.timeout_secs must be in range 1..=300",
        )?;

        require(!self.server.bind_address.trim().is_empty(), "server.bind_address is empty")?;
        require(self.server.port > 0, "server.port must be non-zero")?;
        require(
            self.server.graceful_shutdown_secs > 0,
            "server.graceful_shutdown_secs must be at least 1",
        )?;

        if let Some(token) = &self.auth.admin_token {
            let token = token.expose_secret();
            require(!token.trim().is_empty(), "auth.admin_token is blank")?;
            require(token.len() >= 16, "auth.admin_token must be at least 16 characters")?;
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        require(
            matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

/// Returns the config file to load: the explicit path when it exists, else the first
/// conventional location present in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

/// Replaces every `${NAME}` in the file text with the value of that environment variable.
fn expand_env_references(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some((before, after)) = rest.split_once("${") {
        output.push_str(before);
        let (name, tail) = after.split_once('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        output.push_str(&value);
        rest = tail;
    }

    output.push_str(rest);
    Ok(output)
}

fn secret_from_str<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_into<T: FromStr>(key: &str, slot: &mut T) -> Result<(), ConfigError> {
    let Some(value) = read_env(key) else {
        return Ok(());
    };
    *slot = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value })?;
    Ok(())
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    condition.then_some(()).ok_or_else(|| ConfigError::Validation(message.to_string()))
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        expand_env_references, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };

    static ENV: Mutex<()> = Mutex::new(());

    /// Holds the process environment for one test; the listed variables are removed on drop.
    struct ScopedEnv {
        keys: Vec<&'static str>,
        _lock: MutexGuard<'static, ()>,
    }

    impl ScopedEnv {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let lock = ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self { keys: vars.iter().map(|(key, _)| *key).collect(), _lock: lock }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for key in &self.keys {
                env::remove_var(key);
            }
        }
    }

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("easyshop.toml");
        fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let _env = ScopedEnv::set(&[]);

        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.auth.admin_token.is_none());
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let _env = ScopedEnv::set(&[("EASYSHOP_TEST_TOKEN", "admin-token-from-env-1234")]);
        let (_dir, path) = write_config(
            "[auth]\nadmin_token = \"${EASYSHOP_TEST_TOKEN}\"\n\n[server]\nport = 9090\n",
        );

        let config = load_from(path).expect("file load");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.database.timeout_secs, 30);
        let token = config.auth.admin_token.as_ref().map(|token| token.expose_secret().to_owned());
        assert_eq!(token.as_deref(), Some("admin-token-from-env-1234"));
    }

    #[test]
    fn env_references_must_resolve_and_close() {
        let _env = ScopedEnv::set(&[("EASYSHOP_TEST_HOST", "0.0.0.0")]);

        let expanded = expand_env_references("bind = \"${EASYSHOP_TEST_HOST}\" # $ {x}")
            .expect("expand");
        assert_eq!(expanded, "bind = \"0.0.0.0\" # $ {x}");

        assert!(matches!(
            expand_env_references("url = \"${EASYSHOP_TEST_UNSET_VAR}\""),
            Err(ConfigError::MissingEnvInterpolation { ref var })
                if var == "EASYSHOP_TEST_UNSET_VAR"
        ));
        assert!(matches!(
            expand_env_references("url = \"${EASYSHOP_TEST_HOST"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
    }

    #[test]
    fn overrides_beat_env_and_env_beats_file() {
        let _env = ScopedEnv::set(&[
            ("EASYSHOP_DATABASE_URL", "sqlite://from-env.db"),
            ("EASYSHOP_SERVER_PORT", "7000"),
        ]);
        let (_dir, path) = write_config(
            r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 6000
bind_address = "0.0.0.0"

[logging]
level = "warn"
"#,
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("layered load");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn logging_env_vars_set_level_and_reject_unknown_format() {
        let _env = ScopedEnv::set(&[
            ("EASYSHOP_LOGGING_LEVEL", "warn"),
            ("EASYSHOP_LOGGING_FORMAT", "pretty"),
        ]);

        let config = AppConfig::load(LoadOptions::default()).expect("env load");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);

        env::set_var("EASYSHOP_LOGGING_FORMAT", "xml");
        assert!(matches!(
            AppConfig::load(LoadOptions::default()),
            Err(ConfigError::InvalidEnvOverride { ref key, .. })
                if key == "EASYSHOP_LOGGING_FORMAT"
        ));
    }

    #[test]
    fn non_sqlite_database_url_fails_validation() {
        let _env = ScopedEnv::set(&[("EASYSHOP_DATABASE_URL", "postgres://localhost/shop")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("postgres url rejected");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("database.url")
        ));
    }

    #[test]
    fn unparsable_numeric_env_names_the_key() {
        let _env = ScopedEnv::set(&[("EASYSHOP_SERVER_PORT", "not-a-port")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("bad port rejected");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, ref value }
                if key == "EASYSHOP_SERVER_PORT" && value == "not-a-port"
        ));
    }

    #[test]
    fn missing_required_file_is_reported() {
        let _env = ScopedEnv::set(&[]);
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("absent.toml");

        let error = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing file rejected");

        assert!(matches!(error, ConfigError::MissingConfigFile(ref path) if *path == missing));
    }

    #[test]
    fn short_admin_token_is_rejected() {
        let _env = ScopedEnv::set(&[]);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                admin_token: Some("short".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        assert!(matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("auth.admin_token")
        ));
    }

    #[test]
    fn admin_token_is_redacted_in_debug_and_matched_exactly() {
        let _env = ScopedEnv::set(&[("EASYSHOP_AUTH_ADMIN_TOKEN", "super-secret-admin-value")]);

        let config = AppConfig::load(LoadOptions::default()).expect("env load");

        assert!(!format!("{config:?}").contains("super-secret-admin-value"));
        assert!(config.auth.admin_token_matches("super-secret-admin-value"));
        assert!(!config.auth.admin_token_matches("super-secret-admin-valuX"));
        assert!(!config.auth.admin_token_matches("super-secret"));
    }
}
