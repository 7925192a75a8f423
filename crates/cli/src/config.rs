use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "taskdeck";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// When false the CLI always opens the database directly.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub socket_path: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: None,
            pid_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

pub fn get_config_dir() -> Result<PathBuf> {
    // TASKDECK_CONFIG_PATH overrides the default config directory
    if let Ok(path) = std::env::var("TASKDECK_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_data_dir() -> Result<PathBuf> {
    // The config-path override keeps everything in one place for tests
    if let Ok(path) = std::env::var("TASKDECK_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine data directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn get_socket_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.daemon.socket_path {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("taskdeck.sock"))
}

pub fn get_pid_file(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.daemon.pid_file {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("taskdeck.pid"))
}

pub fn get_db_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.database.path {
        return Ok(path.clone());
    }
    Ok(get_data_dir()?.join("taskdeck.db"))
}

pub fn load_config() -> Result<Config> {
    let config_file = get_config_file()?;

    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    let config_file = get_config_file()?;
    let config_dir = get_config_dir()?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&config_dir, perms)?;
        }
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(&config_file, contents)
        .with_context(|| format!("Failed to write config file: {}", config_file.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&config_file, perms)?;
    }

    Ok(())
}

pub fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "daemon.enabled" => Some(config.daemon.enabled.to_string()),
        "daemon.socket_path" => config
            .daemon
            .socket_path
            .as_ref()
            .map(|p| p.display().to_string()),
        "daemon.pid_file" => config
            .daemon
            .pid_file
            .as_ref()
            .map(|p| p.display().to_string()),
        "database.path" => config
            .database
            .path
            .as_ref()
            .map(|p| p.display().to_string()),
        _ => None,
    }
}

pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "daemon.enabled" => {
            config.daemon.enabled = value
                .parse()
                .with_context(|| format!("Invalid boolean: {}", value))?;
        }
        "daemon.socket_path" => config.daemon.socket_path = Some(PathBuf::from(value)),
        "daemon.pid_file" => config.daemon.pid_file = Some(PathBuf::from(value)),
        "database.path" => config.database.path = Some(PathBuf::from(value)),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_the_daemon() {
        let cfg = Config::default();
        assert!(cfg.daemon.enabled);
        assert!(cfg.daemon.socket_path.is_none());
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.daemon.enabled);
        assert!(cfg.database.path.is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut cfg = Config::default();
        set_config_value(&mut cfg, "database.path", "/tmp/deck.db").unwrap();
        assert_eq!(
            get_config_value(&cfg, "database.path").as_deref(),
            Some("/tmp/deck.db")
        );

        set_config_value(&mut cfg, "daemon.enabled", "false").unwrap();
        assert_eq!(
            get_config_value(&cfg, "daemon.enabled").as_deref(),
            Some("false")
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut cfg = Config::default();
        assert!(set_config_value(&mut cfg, "daemon.nope", "x").is_err());
        assert!(get_config_value(&cfg, "daemon.nope").is_none());
    }
}
