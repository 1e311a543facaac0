use std::collections::HashMap;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_point_at_local_api() {
    let settings = Settings::default();
    assert_eq!(settings.api_base_url, "http://127.0.0.1:3001/api");
    assert_eq!(settings.session_cookie, None);
    assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    assert_eq!(settings.notification_ttl(), Duration::from_millis(5000));
}

#[test]
fn file_values_accept_integers_and_strings() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
api_base_url = "https://workflows.example.com/api"
session_cookie = "connect.sid=abc"
request_timeout_secs = 10
notification_ttl_ms = "2500"
"#,
    )
    .expect("valid config");

    assert_eq!(settings.api_base_url, "https://workflows.example.com/api");
    assert_eq!(settings.session_cookie.as_deref(), Some("connect.sid=abc"));
    assert_eq!(settings.request_timeout_secs, 10);
    assert_eq!(settings.notification_ttl_ms, 2500);
}

#[test]
fn file_with_wrong_type_is_an_error() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "request_timeout_secs = -4").is_err());
    assert!(apply_file(&mut settings, "api_base_url = 12").is_err());
}

#[test]
fn prefixed_env_overrides_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_of(&[
            ("API_BASE_URL", "http://plain.example.com/api"),
            ("APP__API_BASE_URL", "http://prefixed.example.com/api"),
            ("SESSION_COOKIE", "connect.sid=plain"),
        ]),
    );

    assert_eq!(settings.api_base_url, "http://prefixed.example.com/api");
    assert_eq!(settings.session_cookie.as_deref(), Some("connect.sid=plain"));
}

#[test]
fn unparseable_numeric_env_is_ignored() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_of(&[
            ("APP__REQUEST_TIMEOUT_SECS", "soon"),
            ("APP__NOTIFICATION_TTL_MS", " 750 "),
        ]),
    );

    assert_eq!(settings.request_timeout_secs, 30);
    assert_eq!(settings.notification_ttl_ms, 750);
}

#[test]
fn explicit_config_file_is_read_and_trailing_slash_trimmed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "api_base_url = \"https://ci.example.com/api/\"\n").expect("write");

    let settings = load_settings(Some(&path)).expect("load settings");

    if std::env::var("API_BASE_URL").is_err() && std::env::var("APP__API_BASE_URL").is_err() {
        assert_eq!(settings.api_base_url, "https://ci.example.com/api");
    }
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(load_settings(Some(&dir.path().join("absent.toml"))).is_err());
}
