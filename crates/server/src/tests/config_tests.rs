use std::collections::HashMap;

use super::{apply_env, apply_file, normalize_base_path, Settings};

#[test]
fn normalizes_base_path_variants() {
    assert_eq!(normalize_base_path(""), "");
    assert_eq!(normalize_base_path("/"), "");
    assert_eq!(normalize_base_path("app"), "/app");
    assert_eq!(normalize_base_path("/app/"), "/app");
    assert_eq!(normalize_base_path(" //ui//v1/ "), "/ui/v1");
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
            bind_addr = "0.0.0.0:9000"
            base_path = "/ui"
            response_chunk_bytes = 7
            page_title = "Counter"
        "#,
    )
    .expect("parse");

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.base_path, "/ui");
    assert_eq!(settings.response_chunk_bytes, 7);
    assert_eq!(settings.page_title, "Counter");
    assert_eq!(
        settings.max_event_body_bytes,
        Settings::default().max_event_body_bytes
    );
}

#[test]
fn malformed_file_is_an_error() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "response_chunk_bytes = \"many\"").is_err());
}

#[test]
fn env_overrides_and_prefers_app_prefix() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SERVER_BIND", "127.0.0.1:1"),
        ("APP__BIND_ADDR", "127.0.0.1:2"),
        ("APP__BASE_PATH", "demo"),
        ("APP__RESPONSE_CHUNK_BYTES", "3"),
        ("APP__MAX_EVENT_BODY_BYTES", "not-a-number"),
        ("APP__PAGE_TITLE", "From env"),
    ]);
    let mut settings = Settings::default();
    apply_env(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.server_bind, "127.0.0.1:2");
    assert_eq!(settings.base_path, "demo");
    assert_eq!(settings.response_chunk_bytes, 3);
    assert_eq!(
        settings.max_event_body_bytes,
        Settings::default().max_event_body_bytes
    );
    assert_eq!(settings.page_title, "From env");
}
