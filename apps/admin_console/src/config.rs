use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{
    transport::{DEFAULT_API_PREFIX, DEFAULT_CSRF_HEADER},
    ClientConfig, WorkflowOptions,
};

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub api_prefix: String,
    pub csrf_header: String,
    pub csrf_token: Option<String>,
    pub debounce_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            api_prefix: DEFAULT_API_PREFIX.into(),
            csrf_header: DEFAULT_CSRF_HEADER.into(),
            csrf_token: None,
            debounce_ms: 350,
            request_timeout_ms: 15_000,
        }
    }
}

impl Settings {
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::new(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?
            .with_api_prefix(self.api_prefix.clone());
        config.csrf_header = self.csrf_header.clone();
        config.csrf_token = self.csrf_token.clone();
        Ok(config)
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// Defaults, then the TOML file (if readable), then environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        apply_overrides(&mut settings, |key| {
            file_cfg.get(key).map(|value| match value {
                toml::Value::String(text) => text.clone(),
                other => other.to_string(),
            })
        });
    }

    apply_overrides(&mut settings, |key| {
        let upper = key.to_ascii_uppercase();
        std::env::var(format!("APP__{upper}"))
            .or_else(|_| std::env::var(format!("CONSOLE_{upper}")))
            .ok()
    });

    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("api_prefix") {
        settings.api_prefix = v;
    }
    if let Some(v) = lookup("csrf_header") {
        settings.csrf_header = v;
    }
    if let Some(v) = lookup("csrf_token") {
        settings.csrf_token = Some(v).filter(|token| !token.is_empty());
    }
    if let Some(v) = lookup("debounce_ms").and_then(|v| v.trim().parse().ok()) {
        settings.debounce_ms = v;
    }
    if let Some(v) = lookup("request_timeout_ms").and_then(|v| v.trim().parse().ok()) {
        settings.request_timeout_ms = v;
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_replace_only_known_keys() {
        let mut settings = Settings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("server_url", "https://iam.example.test"),
                ("debounce_ms", "400"),
                ("request_timeout_ms", "not-a-number"),
                ("unrelated", "x"),
            ]),
        );

        assert_eq!(settings.server_url, "https://iam.example.test");
        assert_eq!(settings.debounce_ms, 400);
        assert_eq!(settings.request_timeout_ms, 15_000);
    }

    #[test]
    fn empty_csrf_token_means_none() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, lookup_from(&[("csrf_token", "")]));
        assert_eq!(settings.csrf_token, None);
    }

    #[test]
    fn file_values_are_loaded() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("admin_console_cfg_{suffix}.toml"));
        fs::write(
            &path,
            "server_url = \"http://10.0.0.2:9000\"\ncsrf_token = \"abc\"\ndebounce_ms = 300\n",
        )
        .expect("write config");

        let settings = load_settings(Some(&path)).expect("load");
        fs::remove_file(&path).expect("cleanup");

        assert_eq!(settings.server_url, "http://10.0.0.2:9000");
        assert_eq!(settings.csrf_token.as_deref(), Some("abc"));
        assert_eq!(settings.debounce_ms, 300);
    }

    #[test]
    fn settings_map_onto_library_config() {
        let settings = Settings {
            csrf_token: Some("t0k".into()),
            request_timeout_ms: 2_500,
            ..Settings::default()
        };

        let config = settings.client_config().expect("client config");
        assert_eq!(config.csrf_token.as_deref(), Some("t0k"));
        assert_eq!(config.csrf_header, DEFAULT_CSRF_HEADER);
        assert_eq!(
            settings.workflow_options().request_timeout,
            Duration::from_millis(2_500)
        );
    }

    #[test]
    fn bad_server_url_is_reported() {
        let settings = Settings {
            server_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(settings.client_config().is_err());
    }
}
