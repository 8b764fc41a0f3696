use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use shared::domain::{ScheduleId, ShiftLabel};

pub const SETTINGS_FILE: &str = "shiftboard.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct EditorSettings {
    pub server_url: String,
    pub schedule_id: ScheduleId,
    pub request_timeout_ms: u64,
    pub event_capacity: usize,
    pub shift_labels: Vec<ShiftLabel>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            schedule_id: ScheduleId(1),
            request_timeout_ms: 10_000,
            event_capacity: 256,
            shift_labels: ["day", "evening", "night"]
                .into_iter()
                .map(ShiftLabel::new)
                .collect(),
        }
    }
}

impl EditorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub fn load_settings() -> EditorSettings {
    load_settings_with(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the flat `key = "value"` file at `path`, then environment
/// variables. Values that fail to parse are ignored.
pub fn load_settings_with<F>(path: &Path, env: F) -> EditorSettings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = EditorSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("schedule_id") {
                apply_schedule_id(&mut settings, v);
            }
            if let Some(v) = file_cfg.get("request_timeout_ms") {
                apply_timeout(&mut settings, v);
            }
            if let Some(v) = file_cfg.get("event_capacity") {
                apply_capacity(&mut settings, v);
            }
            if let Some(v) = file_cfg.get("shift_labels") {
                apply_shift_labels(&mut settings, v);
            }
        }
    }

    if let Some(v) = env("SHIFTBOARD_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SCHEDULE_ID") {
        apply_schedule_id(&mut settings, &v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        apply_timeout(&mut settings, &v);
    }
    if let Some(v) = env("APP__EVENT_CAPACITY") {
        apply_capacity(&mut settings, &v);
    }
    if let Some(v) = env("APP__SHIFT_LABELS") {
        apply_shift_labels(&mut settings, &v);
    }

    settings
}

fn apply_schedule_id(settings: &mut EditorSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<i64>() {
        settings.schedule_id = ScheduleId(parsed);
    }
}

fn apply_timeout(settings: &mut EditorSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<u64>() {
        if parsed > 0 {
            settings.request_timeout_ms = parsed;
        }
    }
}

fn apply_capacity(settings: &mut EditorSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<usize>() {
        if parsed > 0 {
            settings.event_capacity = parsed;
        }
    }
}

fn apply_shift_labels(settings: &mut EditorSettings, raw: &str) {
    let labels: Vec<ShiftLabel> = raw
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(ShiftLabel::new)
        .collect();
    if !labels.is_empty() {
        settings.shift_labels = labels;
    }
}

/// Trims whitespace and trailing slashes; only http(s) URLs are accepted.
pub fn normalize_server_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("server_url must not be empty"));
    }
    let parsed = url::Url::parse(trimmed)
        .with_context(|| format!("invalid server_url '{trimmed}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(anyhow!(
            "server_url must start with http:// or https:// (got {other}://)"
        )),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
