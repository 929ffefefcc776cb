use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::{
    service::{MissingRecordService, RecordService},
    transport::HttpRecordService,
};

pub const SETTINGS_FILE: &str = "records.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: Some("http://127.0.0.1:8443".into()),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Falls back to [`MissingRecordService`] when no server url is set, so
    /// every operation surfaces a request error instead of failing startup.
    pub fn build_service(&self) -> Result<Arc<dyn RecordService>> {
        match self.server_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                let service = HttpRecordService::new(url, self.request_timeout())
                    .context("failed to configure record service")?;
                Ok(Arc::new(service))
            }
            _ => {
                warn!("no record server url configured; requests will fail");
                Ok(Arc::new(MissingRecordService))
            }
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file at `path` if it parses, then environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = Some(v);
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout_secs = v;
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("RECORDS_SERVER_URL") {
        settings.server_url = Some(v);
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    settings
}
