use std::env;
use std::fs;
use std::path::Path;

use easyshop_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let line = |key_path: &str, env_key: &str, value: &str| {
        render_line(
            key_path,
            value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(line("database.url", "EASYSHOP_DATABASE_URL", &config.database.url));
    lines.push(line(
        "database.max_connections",
        "EASYSHOP_DATABASE_MAX_CONNECTIONS",
        &config.database.max_connections.to_string(),
    ));
    lines.push(line(
        "database.timeout_secs",
        "EASYSHOP_DATABASE_TIMEOUT_SECS",
        &config.database.timeout_secs.to_string(),
    ));

    lines.push(line(
        "server.bind_address",
        "EASYSHOP_SERVER_BIND_ADDRESS",
        &config.server.bind_address,
    ));
    lines.push(line("server.port", "EASYSHOP_SERVER_PORT", &config.server.port.to_string()));
    lines.push(line(
        "server.graceful_shutdown_secs",
        "EASYSHOP_SERVER_GRACEFUL_SHUTDOWN_SECS",
        &config.server.graceful_shutdown_secs.to_string(),
    ));

    lines.push(line(
        "auth.admin_token",
        "EASYSHOP_AUTH_ADMIN_TOKEN",
        &redact_token(config.auth.admin_token.as_ref()),
    ));

    lines.push(line("logging.level", "EASYSHOP_LOGGING_LEVEL", &config.logging.level));
    lines.push(line(
        "logging.format",
        "EASYSHOP_LOGGING_FORMAT",
        &format!("{:?}", config.logging.format).to_lowercase(),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Never prints any part of the admin token.
fn redact_token(token: Option<&SecretString>) -> String {
    match token {
        Some(token) if token.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}
