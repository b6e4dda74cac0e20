use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use dms_core::RestartPolicy;
use dms_gateway::SessionOptions;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "DMS_MANAGER_CONFIG";
pub const REFRESH_ENV: &str = "DMS_MANAGER_REFRESH_SECS";
pub const RESTART_MODE_ENV: &str = "DMS_MANAGER_RESTART_MODE";

const DEFAULT_REFRESH_SECS: u64 = 5;
const DEFAULT_POLL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    Immediate,
    Wait,
}

impl FromStr for RestartMode {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(RestartMode::Immediate),
            "wait" => Ok(RestartMode::Wait),
            other => Err(anyhow!("invalid restart mode '{other}' (use immediate or wait)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestartSection {
    pub mode: Option<RestartMode>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub restart: RestartSection,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub session: SessionOptions,
    pub refresh_interval: Duration,
    pub restart_policy: RestartPolicy,
}

pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn default_config_path(env: EnvLookup<'_>) -> Option<PathBuf> {
    env(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("dms-manager").join("config.toml")))
}

/// Missing file means defaults. A file that exists but does not parse is an
/// error naming the path.
pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
}

pub fn load(overrides: &Overrides) -> Result<Settings> {
    let file = match &overrides.config {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => load_file(path)?,
        None => match default_config_path(&process_env) {
            Some(path) => load_file(&path)?,
            None => FileConfig::default(),
        },
    };
    resolve(file, &process_env, overrides)
}

/// Flag, then environment, then file. When the environment carries a
/// session value it is left unset here so the session loader reads it.
fn layered(flag: &Option<String>, env_keys: &[&str], file: Option<String>, env: EnvLookup<'_>) -> Option<String> {
    if flag.is_some() {
        return flag.clone();
    }
    if env_keys.iter().any(|key| env(key).is_some()) {
        return None;
    }
    file
}

fn env_secs(env: EnvLookup<'_>, key: &str) -> Result<Option<u64>> {
    env(key)
        .map(|raw| {
            raw.parse::<u64>()
                .with_context(|| format!("invalid {key}: '{raw}' is not a number of seconds"))
        })
        .transpose()
}

pub fn resolve(file: FileConfig, env: EnvLookup<'_>, overrides: &Overrides) -> Result<Settings> {
    let session = SessionOptions {
        profile: layered(&overrides.profile, &["AWS_PROFILE"], file.profile, env),
        region: layered(
            &overrides.region,
            &["AWS_REGION", "AWS_DEFAULT_REGION"],
            file.region,
            env,
        ),
        endpoint_url: layered(
            &overrides.endpoint_url,
            &["AWS_ENDPOINT_URL"],
            file.endpoint_url,
            env,
        ),
    };

    let refresh_secs = env_secs(env, REFRESH_ENV)?
        .or(file.refresh_interval_secs)
        .unwrap_or(DEFAULT_REFRESH_SECS)
        .max(1);

    let mode = match env(RESTART_MODE_ENV) {
        Some(raw) => raw.parse()?,
        None => file.restart.mode.unwrap_or(RestartMode::Immediate),
    };
    let restart_policy = match mode {
        RestartMode::Immediate => RestartPolicy::Immediate,
        RestartMode::Wait => RestartPolicy::WaitForStopped {
            poll_interval: Duration::from_secs(
                file.restart.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS).max(1),
            ),
            timeout: Duration::from_secs(file.restart.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        },
    };

    Ok(Settings {
        session,
        refresh_interval: Duration::from_secs(refresh_secs),
        restart_policy,
    })
}
