use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_and_env_yield_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/planner.toml"), no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.geometry_debounce(), Duration::from_millis(500));
}

#[test]
fn file_values_apply_and_env_wins() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("planner_settings_{suffix}.toml"));
    fs::write(
        &path,
        r#"
api_base_url = "http://file-host:5000"
geometry_debounce_ms = "250"
cities = "Hyderabad, karnataka ,chennai"
default_city = "chennai"
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(&path, |key| match key {
        "APP__API_BASE_URL" => Some("http://env-host:8000".to_string()),
        "PLANNER_SESSION_DB" => Some("./state/session.db".to_string()),
        _ => None,
    });

    assert_eq!(settings.api_base_url, "http://env-host:8000");
    assert_eq!(settings.geometry_debounce_ms, 250);
    assert_eq!(settings.default_city, "chennai");
    assert_eq!(settings.cities, vec!["hyderabad", "karnataka", "chennai"]);
    assert_eq!(settings.session_database_url, "sqlite://./state/session.db");

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn debounce_is_clamped_to_supported_window() {
    let mut settings = Settings {
        geometry_debounce_ms: 5,
        ..Settings::default()
    };
    assert_eq!(settings.geometry_debounce(), Duration::from_millis(100));

    settings.geometry_debounce_ms = 10_000;
    assert_eq!(settings.geometry_debounce(), Duration::from_millis(500));
}

#[test]
fn non_numeric_env_values_are_ignored() {
    let settings = load_settings_from(Path::new("/nonexistent/planner.toml"), |key| {
        (key == "APP__REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
    });
    assert_eq!(settings.request_timeout_secs, 10);
}

#[test]
fn default_city_outside_list_is_added() {
    let settings = load_settings_from(Path::new("/nonexistent/planner.toml"), |key| {
        (key == "APP__DEFAULT_CITY").then(|| "Pune".to_string())
    });
    assert_eq!(settings.default_city, "pune");
    assert_eq!(settings.cities[0], "pune");
}

#[test]
fn normalizes_plain_paths_and_keeps_urls() {
    assert_eq!(
        normalize_database_url("./data/session.db"),
        "sqlite://./data/session.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("C:\\Users\\asha\\session.db"),
        "sqlite://C:/Users/asha/session.db"
    );
    assert_eq!(
        normalize_database_url("   "),
        Settings::default().session_database_url
    );
}
