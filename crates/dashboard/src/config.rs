use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Clone)]
pub struct DashboardConfig {
    pub panel_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub locale: String,
    pub refresh_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub toast_duration_ms: u64,
    pub toast_exit_ms: u64,
    pub request_timeout_secs: u64,
    pub data_file: String,
    pub log_dir: String,
}

impl std::fmt::Debug for DashboardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardConfig")
            .field("panel_url", &self.panel_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("locale", &self.locale)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("toast_duration_ms", &self.toast_duration_ms)
            .field("toast_exit_ms", &self.toast_exit_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("data_file", &self.data_file)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialDashboardConfig {
    panel_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    locale: Option<String>,
    refresh_interval_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    toast_duration_ms: Option<u64>,
    toast_exit_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    data_file: Option<String>,
    log_dir: Option<String>,
}

/// The backend container reads the same variable, unprefixed.
#[derive(Deserialize, Default, Debug)]
struct SharedEnv {
    data_file: Option<String>,
}

pub const ENV_PREFIX: &str = "VKPANEL_";

fn default_panel_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_locale() -> String {
    "ru".to_string()
}

fn default_data_file() -> String {
    "/opt/vkpanel/data.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::merge(
            PartialDashboardConfig::default(),
            PartialDashboardConfig::default(),
            SharedEnv::default(),
        )
    }
}

impl DashboardConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialDashboardConfig = match config_path {
            Some(path_str) => read_file_config(Path::new(path_str))?,
            None => PartialDashboardConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialDashboardConfig = envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;
        let shared_env: SharedEnv = envy::from_env()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Ok(Self::merge(env_config, file_config, shared_env))
    }

    fn merge(
        env_config: PartialDashboardConfig,
        file_config: PartialDashboardConfig,
        shared_env: SharedEnv,
    ) -> Self {
        DashboardConfig {
            panel_url: env_config
                .panel_url
                .or(file_config.panel_url)
                .unwrap_or_else(default_panel_url),
            username: env_config.username.or(file_config.username),
            password: env_config.password.or(file_config.password),
            locale: env_config
                .locale
                .or(file_config.locale)
                .unwrap_or_else(default_locale),
            refresh_interval_secs: env_config
                .refresh_interval_secs
                .or(file_config.refresh_interval_secs)
                .unwrap_or(60)
                .max(1),
            poll_interval_secs: env_config
                .poll_interval_secs
                .or(file_config.poll_interval_secs)
                .unwrap_or(60)
                .max(1),
            toast_duration_ms: env_config
                .toast_duration_ms
                .or(file_config.toast_duration_ms)
                .unwrap_or(3000),
            toast_exit_ms: env_config
                .toast_exit_ms
                .or(file_config.toast_exit_ms)
                .unwrap_or(300),
            request_timeout_secs: env_config
                .request_timeout_secs
                .or(file_config.request_timeout_secs)
                .unwrap_or(30)
                .max(1),
            data_file: env_config
                .data_file
                .or(shared_env.data_file)
                .or(file_config.data_file)
                .unwrap_or_else(default_data_file),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    pub fn toast_exit(&self) -> Duration {
        Duration::from_millis(self.toast_exit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_deref()?))
    }
}

fn read_file_config(path: &Path) -> Result<PartialDashboardConfig, String> {
    if !path.exists() {
        return Ok(PartialDashboardConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
    toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
}
