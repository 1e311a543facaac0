use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub session_cookie: Option<String>,
    pub request_timeout_secs: u64,
    pub notification_ttl_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3001/api".into(),
            session_cookie: None,
            request_timeout_secs: 30,
            notification_ttl_ms: 5000,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

/// Defaults, then the config file, then the process environment.
///
/// An explicit `--config` path must exist; the default `client.toml` is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if explicit_path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.api_base_url = settings.api_base_url.trim_end_matches('/').to_string();
    Ok(settings)
}

pub fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;

    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = as_text(v).context("api_base_url must be a string")?;
    }
    if let Some(v) = file_cfg.get("session_cookie") {
        settings.session_cookie = Some(as_text(v).context("session_cookie must be a string")?);
    }
    if let Some(v) = file_cfg.get("request_timeout_secs") {
        settings.request_timeout_secs =
            as_number(v).context("request_timeout_secs must be a non-negative integer")?;
    }
    if let Some(v) = file_cfg.get("notification_ttl_ms") {
        settings.notification_ttl_ms =
            as_number(v).context("notification_ttl_ms must be a non-negative integer")?;
    }
    Ok(())
}

/// Applies overrides from `lookup`. For each key the `APP__` form wins.
pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }
    if let Some(v) = lookup("APP__SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__NOTIFICATION_TTL_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.notification_ttl_ms = parsed;
        }
    }
}

fn as_text(value: &toml::Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_number(value: &toml::Value) -> Option<u64> {
    match value {
        toml::Value::Integer(n) => u64::try_from(*n).ok(),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
