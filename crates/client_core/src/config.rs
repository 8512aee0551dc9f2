use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "planner.toml";
pub const MIN_GEOMETRY_DEBOUNCE_MS: u64 = 100;
pub const MAX_GEOMETRY_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub session_database_url: String,
    pub geometry_debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub default_city: String,
    pub cities: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".into(),
            session_database_url: "sqlite://./data/session.db".into(),
            geometry_debounce_ms: MAX_GEOMETRY_DEBOUNCE_MS,
            request_timeout_secs: 10,
            default_city: "hyderabad".into(),
            cities: vec!["hyderabad".into(), "karnataka".into()],
        }
    }
}

impl Settings {
    pub fn geometry_debounce(&self) -> Duration {
        Duration::from_millis(
            self.geometry_debounce_ms
                .clamp(MIN_GEOMETRY_DEBOUNCE_MS, MAX_GEOMETRY_DEBOUNCE_MS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `planner.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, env);

    settings.session_database_url = normalize_database_url(&settings.session_database_url);
    if !settings.cities.contains(&settings.default_city) {
        warn!(
            default_city = %settings.default_city,
            "default city is not in the configured city list; adding it"
        );
        settings.cities.insert(0, settings.default_city.clone());
    }
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!("ignoring unreadable {SETTINGS_FILE}: {err}");
            return;
        }
    };

    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("session_database_url") {
        settings.session_database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("geometry_debounce_ms") {
        apply_number(&mut settings.geometry_debounce_ms, "geometry_debounce_ms", v);
    }
    if let Some(v) = file_cfg.get("request_timeout_secs") {
        apply_number(&mut settings.request_timeout_secs, "request_timeout_secs", v);
    }
    if let Some(v) = file_cfg.get("default_city") {
        settings.default_city = v.trim().to_ascii_lowercase();
    }
    if let Some(v) = file_cfg.get("cities") {
        settings.cities = parse_city_list(v);
    }
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("PLANNER_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("PLANNER_SESSION_DB") {
        settings.session_database_url = v;
    }
    if let Some(v) = env("APP__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }

    if let Some(v) = env("APP__GEOMETRY_DEBOUNCE_MS") {
        apply_number(&mut settings.geometry_debounce_ms, "APP__GEOMETRY_DEBOUNCE_MS", &v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        apply_number(&mut settings.request_timeout_secs, "APP__REQUEST_TIMEOUT_SECS", &v);
    }

    if let Some(v) = env("APP__DEFAULT_CITY") {
        settings.default_city = v.trim().to_ascii_lowercase();
    }
    if let Some(v) = env("APP__CITIES") {
        settings.cities = parse_city_list(&v);
    }
}

fn apply_number(slot: &mut u64, name: &str, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("ignoring non-numeric {name}={raw}"),
    }
}

fn parse_city_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|city| city.trim().to_ascii_lowercase())
        .filter(|city| !city.is_empty())
        .collect()
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().session_database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.replace('\\', "/");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
