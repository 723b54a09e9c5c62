use std::fs;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    /// Mount point of the UI endpoints, either empty or `/segment[/...]`.
    pub base_path: String,
    pub response_chunk_bytes: usize,
    pub max_event_body_bytes: usize,
    pub page_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            base_path: String::new(),
            response_chunk_bytes: 1024,
            max_event_body_bytes: 16 * 1024,
            page_title: "Server UI".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    base_path: Option<String>,
    response_chunk_bytes: Option<usize>,
    max_event_body_bytes: Option<usize>,
    page_title: Option<String>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file(&mut settings, &raw).context("failed to parse server.toml")?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings.base_path = normalize_base_path(&settings.base_path);
    if settings.response_chunk_bytes == 0 {
        warn!("response_chunk_bytes must be positive; falling back to default");
        settings.response_chunk_bytes = Settings::default().response_chunk_bytes;
    }
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.base_path {
        settings.base_path = v;
    }
    if let Some(v) = file_cfg.response_chunk_bytes {
        settings.response_chunk_bytes = v;
    }
    if let Some(v) = file_cfg.max_event_body_bytes {
        settings.max_event_body_bytes = v;
    }
    if let Some(v) = file_cfg.page_title {
        settings.page_title = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__BASE_PATH") {
        settings.base_path = v;
    }

    if let Some(v) = var("APP__RESPONSE_CHUNK_BYTES") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.response_chunk_bytes = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__RESPONSE_CHUNK_BYTES"),
        }
    }
    if let Some(v) = var("APP__MAX_EVENT_BODY_BYTES") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.max_event_body_bytes = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__MAX_EVENT_BODY_BYTES"),
        }
    }

    if let Some(v) = var("APP__PAGE_TITLE") {
        settings.page_title = v;
    }
}

pub fn normalize_base_path(raw: &str) -> String {
    let segments: Vec<&str> = raw
        .trim()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return String::new();
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
