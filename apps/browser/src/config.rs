use std::{fmt::Display, fs, str::FromStr, time::Duration};

use client_core::{
    options::{DEFAULT_ERROR_MESSAGE, DEFAULT_PAGE_SIZE},
    BatchPolicy, CommitPolicy, ControllerOptions,
};
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "browser.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub page_size: u32,
    pub error_message: String,
    pub commit_policy: CommitPolicy,
    pub batch_policy: BatchPolicy,
    pub query_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/catalog.db".into(),
            page_size: DEFAULT_PAGE_SIZE,
            error_message: DEFAULT_ERROR_MESSAGE.into(),
            commit_policy: CommitPolicy::default(),
            batch_policy: BatchPolicy::default(),
            query_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    page_size: Option<u32>,
    error_message: Option<String>,
    commit_policy: Option<String>,
    batch_policy: Option<String>,
    query_timeout_ms: Option<u64>,
}

/// Defaults, then `browser.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings.apply_file(&raw);
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) {
        let file_cfg = match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => file_cfg,
            Err(err) => {
                warn!(file = SETTINGS_FILE, error = %err, "ignoring unreadable settings file");
                return;
            }
        };

        if let Some(v) = file_cfg.database_url {
            self.database_url = v;
        }
        if let Some(v) = file_cfg.page_size {
            self.set_page_size(v);
        }
        if let Some(v) = file_cfg.error_message {
            self.error_message = v;
        }
        if let Some(v) = file_cfg.commit_policy.and_then(|v| parse_or_warn("commit_policy", &v)) {
            self.commit_policy = v;
        }
        if let Some(v) = file_cfg.batch_policy.and_then(|v| parse_or_warn("batch_policy", &v)) {
            self.batch_policy = v;
        }
        if let Some(v) = file_cfg.query_timeout_ms {
            self.query_timeout_ms = v;
        }
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("APP__DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("APP__PAGE_SIZE").and_then(|v| parse_or_warn("APP__PAGE_SIZE", &v)) {
            self.set_page_size(v);
        }
        if let Some(v) = lookup("APP__ERROR_MESSAGE") {
            self.error_message = v;
        }
        if let Some(v) =
            lookup("APP__COMMIT_POLICY").and_then(|v| parse_or_warn("APP__COMMIT_POLICY", &v))
        {
            self.commit_policy = v;
        }
        if let Some(v) =
            lookup("APP__BATCH_POLICY").and_then(|v| parse_or_warn("APP__BATCH_POLICY", &v))
        {
            self.batch_policy = v;
        }
        if let Some(v) = lookup("APP__QUERY_TIMEOUT_MS")
            .and_then(|v| parse_or_warn("APP__QUERY_TIMEOUT_MS", &v))
        {
            self.query_timeout_ms = v;
        }
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        if page_size == 0 {
            warn!("page size must be positive; keeping {}", self.page_size);
            return;
        }
        self.page_size = page_size;
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            page_size: self.page_size,
            error_message: self.error_message.clone(),
            commit_policy: self.commit_policy,
            batch_policy: self.batch_policy,
            query_timeout: (self.query_timeout_ms > 0)
                .then(|| Duration::from_millis(self.query_timeout_ms)),
            ..ControllerOptions::default()
        }
    }
}

fn parse_or_warn<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = raw, error = %err, "ignoring invalid setting");
            None
        }
    }
}
