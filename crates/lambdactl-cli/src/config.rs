// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use lambdactl_app::{
    ConsoleSettings, DEFAULT_ERROR_TIMEOUT, DEFAULT_LAUNCH_POLL_INTERVAL, DEFAULT_LAUNCH_TIMEOUT,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_SHELL_PORT, DEFAULT_SHELL_USER, ShellSettings,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "lambdactl";
pub const CONFIG_PATH_ENV: &str = "LAMBDACTL_CONFIG_PATH";
pub const API_KEY_ENV: &str = "LAMBDA_API_KEY";
pub const API_URL_ENV: &str = "LAMBDA_API_URL";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_SSH_BINARY: &str = "ssh";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ssh: Ssh,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub launch: Launch,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ssh: Ssh::default(),
            ui: Ui::default(),
            launch: Launch::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(lambdactl_api::DEFAULT_BASE_URL.to_owned()),
            api_key: None,
            timeout: Some("30s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ssh {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub key_path: Option<String>,
    pub binary: Option<String>,
}

impl Default for Ssh {
    fn default() -> Self {
        Self {
            user: Some(DEFAULT_SHELL_USER.to_owned()),
            port: Some(DEFAULT_SHELL_PORT),
            key_path: None,
            binary: Some(DEFAULT_SSH_BINARY.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub refresh_interval: Option<String>,
    pub error_timeout: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            refresh_interval: Some("30s".to_owned()),
            error_timeout: Some("5s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Launch {
    pub poll_interval: Option<String>,
    pub timeout: Option<String>,
    pub ssh_key_names: Option<Vec<String>>,
}

impl Default for Launch {
    fn default() -> Self {
        Self {
            poll_interval: Some("10s".to_owned()),
            timeout: Some("15m".to_owned()),
            ssh_key_names: Some(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = {CONFIG_VERSION}` at the top and keep values under [api], [ssh], [ui], [launch], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = {CONFIG_VERSION}. Regenerate a template with `lambdactl --print-example-config`",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!("api.base_url in {} must not be empty", path.display());
        }

        if let Some(port) = self.ssh.port
            && port == 0
        {
            bail!("ssh.port in {} must be positive, got 0", path.display());
        }

        if let Some(user) = &self.ssh.user
            && user.trim().is_empty()
        {
            bail!("ssh.user in {} must not be empty", path.display());
        }

        for (field, raw) in [
            ("api.timeout", &self.api.timeout),
            ("ui.refresh_interval", &self.ui.refresh_interval),
            ("ui.error_timeout", &self.ui.error_timeout),
            ("launch.poll_interval", &self.launch.poll_interval),
            ("launch.timeout", &self.launch.timeout),
        ] {
            if let Some(raw) = raw {
                let parsed = parse_duration(raw)
                    .with_context(|| format!("{field} in {}", path.display()))?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{field} in {} must be positive, got {}",
                        path.display(),
                        raw
                    );
                }
            }
        }

        if let Some(level) = &self.log.level {
            parse_level(level).with_context(|| format!("log.level in {}", path.display()))?;
        }

        Ok(())
    }

    /// `LAMBDA_API_URL` wins over the file.
    pub fn api_base_url(&self) -> String {
        let raw = match env::var(API_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self
                .api
                .base_url
                .clone()
                .unwrap_or_else(|| lambdactl_api::DEFAULT_BASE_URL.to_owned()),
        };
        raw.trim().trim_end_matches('/').to_owned()
    }

    /// `LAMBDA_API_KEY` wins over the file.
    pub fn api_key(&self) -> Option<String> {
        match env::var(API_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            _ => self
                .api
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.api_key().ok_or_else(|| {
            anyhow!(
                "no API key configured; set {API_KEY_ENV} or [api].api_key, or run with --demo"
            )
        })
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or("30s"))
    }

    pub fn ssh_binary(&self) -> &str {
        self.ssh.binary.as_deref().unwrap_or(DEFAULT_SSH_BINARY)
    }

    pub fn shell_settings(&self) -> ShellSettings {
        ShellSettings {
            user: self
                .ssh
                .user
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL_USER.to_owned()),
            port: self.ssh.port.unwrap_or(DEFAULT_SHELL_PORT),
            key_path: self.ssh.key_path.as_deref().map(expand_home),
        }
    }

    pub fn launch_ssh_key_names(&self) -> Vec<String> {
        self.launch.ssh_key_names.clone().unwrap_or_default()
    }

    pub fn console_settings(&self) -> Result<ConsoleSettings> {
        Ok(ConsoleSettings {
            refresh_interval: optional_duration(
                self.ui.refresh_interval.as_deref(),
                DEFAULT_REFRESH_INTERVAL,
            )?,
            error_timeout: optional_duration(
                self.ui.error_timeout.as_deref(),
                DEFAULT_ERROR_TIMEOUT,
            )?,
            launch_poll_interval: optional_duration(
                self.launch.poll_interval.as_deref(),
                DEFAULT_LAUNCH_POLL_INTERVAL,
            )?,
            launch_timeout: optional_duration(
                self.launch.timeout.as_deref(),
                DEFAULT_LAUNCH_TIMEOUT,
            )?,
            shell: self.shell_settings(),
        })
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log.dir.as_deref().map(expand_home)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# lambdactl config\n# Place this file at: {}\n\nversion = {CONFIG_VERSION}\n\n[api]\nbase_url = \"{}\"\n# Prefer the {API_KEY_ENV} environment variable over storing the key here.\n# api_key = \"secret_...\"\ntimeout = \"30s\"\n\n[ssh]\nuser = \"{DEFAULT_SHELL_USER}\"\nport = {DEFAULT_SHELL_PORT}\n# key_path = \"~/.ssh/id_ed25519\"\nbinary = \"{DEFAULT_SSH_BINARY}\"\n\n[ui]\nrefresh_interval = \"30s\"\nerror_timeout = \"5s\"\n\n[launch]\npoll_interval = \"10s\"\ntimeout = \"15m\"\n# Registered key names to install on new instances. Empty uses the first key on the account.\nssh_key_names = []\n\n[log]\nlevel = \"{DEFAULT_LOG_LEVEL}\"\n# Optional. Default is the platform state dir (for example ~/.local/state/lambdactl/logs)\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            lambdactl_api::DEFAULT_BASE_URL,
        )
    }
}

fn optional_duration(raw: Option<&str>, fallback: Duration) -> Result<Duration> {
    raw.map_or(Ok(fallback), parse_duration)
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

pub fn parse_level(raw: &str) -> Result<tracing::Level> {
    raw.trim().parse::<tracing::Level>().map_err(|_| {
        anyhow!("invalid log level {raw:?}; use one of: error, warn, info, debug, trace")
    })
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{API_KEY_ENV, API_URL_ENV, CONFIG_PATH_ENV, Config, parse_duration, parse_level};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn clear_api_env() {
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::remove_var(API_URL_ENV);
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let _guard = env_lock();
        clear_api_env();
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.api_base_url(), lambdactl_api::DEFAULT_BASE_URL);
        assert_eq!(config.api_key(), None);

        let settings = config.console_settings()?;
        assert_eq!(settings.refresh_interval, Duration::from_secs(30));
        assert_eq!(settings.error_timeout, Duration::from_secs(5));
        assert_eq!(settings.launch_poll_interval, Duration::from_secs(10));
        assert_eq!(settings.launch_timeout, Duration::from_secs(15 * 60));
        assert_eq!(settings.shell.user, "ubuntu");
        assert_eq!(settings.shell.port, 22);
        assert_eq!(config.ssh_binary(), "ssh");
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[api]\napi_key=\"secret\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"), "{message}");
        assert!(message.contains("[api]"), "{message}");
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 7\n")?;
        let error = Config::load(&path).expect_err("v7 config should fail");
        let message = error.to_string();
        assert!(message.contains("unsupported config version 7"), "{message}");
        assert!(message.contains("--print-example-config"), "{message}");
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn full_config_parses_into_console_settings() -> Result<()> {
        let _guard = env_lock();
        clear_api_env();
        let (_temp, path) = write_config(
            "version = 1\n[api]\nbase_url = \"http://localhost:9000/api/v1//\"\napi_key = \" secret \"\ntimeout = \"2s\"\n[ssh]\nuser = \"root\"\nport = 2222\nkey_path = \"/keys/id\"\nbinary = \"/usr/bin/ssh\"\n[ui]\nrefresh_interval = \"1m\"\nerror_timeout = \"750ms\"\n[launch]\npoll_interval = \"3s\"\ntimeout = \"5m\"\nssh_key_names = [\"laptop\"]\n[log]\nlevel = \"debug\"\ndir = \"/var/log/lambdactl\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.api_base_url(), "http://localhost:9000/api/v1");
        assert_eq!(config.api_key().as_deref(), Some("secret"));
        assert_eq!(config.api_timeout()?, Duration::from_secs(2));
        assert_eq!(config.ssh_binary(), "/usr/bin/ssh");
        assert_eq!(config.launch_ssh_key_names(), vec!["laptop".to_owned()]);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_dir(), Some(PathBuf::from("/var/log/lambdactl")));

        let settings = config.console_settings()?;
        assert_eq!(settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(settings.error_timeout, Duration::from_millis(750));
        assert_eq!(settings.launch_poll_interval, Duration::from_secs(3));
        assert_eq!(settings.launch_timeout, Duration::from_secs(300));
        assert_eq!(settings.shell.user, "root");
        assert_eq!(settings.shell.port, 2222);
        assert_eq!(settings.shell.key_path, Some(PathBuf::from("/keys/id")));
        Ok(())
    }

    #[test]
    fn environment_overrides_api_key_and_url() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config(
            "version = 1\n[api]\nbase_url = \"https://file.example/api/v1\"\napi_key = \"from-file\"\n",
        )?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(API_KEY_ENV, "from-env");
            std::env::set_var(API_URL_ENV, "https://env.example/api/v1/");
        }
        let config = Config::load(&path)?;
        let key = config.api_key();
        let url = config.api_base_url();
        clear_api_env();
        assert_eq!(key.as_deref(), Some("from-env"));
        assert_eq!(url, "https://env.example/api/v1");
        Ok(())
    }

    #[test]
    fn missing_api_key_names_every_remedy() -> Result<()> {
        let _guard = env_lock();
        clear_api_env();
        let (_temp, path) = write_config("version = 1\n")?;
        let config = Config::load(&path)?;
        let error = config
            .require_api_key()
            .expect_err("missing key should fail");
        let message = error.to_string();
        assert!(message.contains(API_KEY_ENV), "{message}");
        assert!(message.contains("[api].api_key"), "{message}");
        assert!(message.contains("--demo"), "{message}");
        Ok(())
    }

    #[test]
    fn non_positive_durations_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[launch]\npoll_interval = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero interval should fail");
        let message = error.to_string();
        assert!(message.contains("launch.poll_interval"), "{message}");
        assert!(message.contains("must be positive"), "{message}");
        Ok(())
    }

    #[test]
    fn invalid_duration_names_the_field() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\nrefresh_interval = \"soon\"\n")?;
        let error = Config::load(&path).expect_err("bad duration should fail");
        let message = format!("{error:#}");
        assert!(message.contains("ui.refresh_interval"), "{message}");
        assert!(message.contains("invalid duration"), "{message}");
        Ok(())
    }

    #[test]
    fn zero_ssh_port_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ssh]\nport = 0\n")?;
        let error = Config::load(&path).expect_err("port 0 should fail");
        assert!(error.to_string().contains("ssh.port"));
        Ok(())
    }

    #[test]
    fn invalid_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("bad level should fail");
        assert!(format!("{error:#}").contains("invalid log level"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("oops").is_err());
        Ok(())
    }

    #[test]
    fn oversized_minutes_are_rejected() {
        let error = parse_duration("307445734561825861m").expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"), "{error}");
        assert_eq!(
            parse_duration("307445734561825860m").expect("largest minute count"),
            Duration::from_secs(307_445_734_561_825_860 * 60)
        );
    }

    #[test]
    fn levels_parse_case_insensitively() -> Result<()> {
        assert_eq!(parse_level("DEBUG")?, tracing::Level::DEBUG);
        assert_eq!(parse_level("warn")?, tracing::Level::WARN);
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let _guard = env_lock();
        clear_api_env();
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        for section in ["[api]", "[ssh]", "[ui]", "[launch]", "[log]"] {
            assert!(example.contains(section), "missing {section}");
        }
        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.api_key(), None);
        assert_eq!(config.console_settings()?, lambdactl_app::ConsoleSettings::default());
        Ok(())
    }
}
