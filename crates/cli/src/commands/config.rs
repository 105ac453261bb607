use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use basketbot_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

/// One effective setting and the environment variables that may override it, first match wins.
struct Setting {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(&setting, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", setting.key, setting.value));
    }
    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let admins = if config.admins.user_ids.is_empty() {
        "<none>".to_string()
    } else {
        config.admins.user_ids.iter().map(|id| id.0.to_string()).collect::<Vec<_>>().join(",")
    };
    let catalog_path = config
        .catalog
        .path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());

    vec![
        Setting {
            key: "database.url",
            env_keys: &["BASKETBOT_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Setting {
            key: "database.max_connections",
            env_keys: &["BASKETBOT_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Setting {
            key: "database.timeout_secs",
            env_keys: &["BASKETBOT_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Setting {
            key: "telegram.bot_token",
            env_keys: &["BASKETBOT_TELEGRAM_BOT_TOKEN"],
            value: redact_token(config.telegram.bot_token.expose_secret()),
        },
        Setting {
            key: "telegram.api_base_url",
            env_keys: &["BASKETBOT_TELEGRAM_API_BASE_URL"],
            value: config.telegram.api_base_url.clone(),
        },
        Setting {
            key: "telegram.poll_timeout_secs",
            env_keys: &["BASKETBOT_TELEGRAM_POLL_TIMEOUT_SECS"],
            value: config.telegram.poll_timeout_secs.to_string(),
        },
        Setting { key: "admins.user_ids", env_keys: &["BASKETBOT_ADMIN_IDS"], value: admins },
        Setting { key: "catalog.path", env_keys: &["BASKETBOT_CATALOG_PATH"], value: catalog_path },
        Setting {
            key: "catalog.currency",
            env_keys: &["BASKETBOT_CATALOG_CURRENCY"],
            value: config.catalog.currency.clone(),
        },
        Setting {
            key: "server.bind_address",
            env_keys: &["BASKETBOT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Setting {
            key: "server.health_check_port",
            env_keys: &["BASKETBOT_SERVER_HEALTH_CHECK_PORT"],
            value: config.server.health_check_port.to_string(),
        },
        Setting {
            key: "server.graceful_shutdown_secs",
            env_keys: &["BASKETBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Setting {
            key: "logging.level",
            env_keys: &["BASKETBOT_LOGGING_LEVEL", "BASKETBOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Setting {
            key: "logging.format",
            env_keys: &["BASKETBOT_LOGGING_FORMAT", "BASKETBOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(setting: &Setting, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = setting.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, setting.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

/// Keeps the bot id before `:` and hides the secret part.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
