//! Shared configuration for liveview tools.
//!
//! TOML profiles naming one camera each, an environment overlay, token
//! resolution (flag, env var, plaintext) and translation to
//! `liveview_core::ClientConfig`. Configuration is read-only here; users
//! edit the file by hand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liveview_core::ClientConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("no token configured for profile '{profile}'")]
    NoToken { profile: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named camera profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// API region used when a profile does not name one.
    pub region: Option<String>,

    #[serde(default)]
    pub insecure: bool,

    /// Session API timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Dial and first-read deadline for the stream (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            region: None,
            insecure: false,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    15
}

/// A named camera profile. Every field may be overridden from the CLI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API region (e.g. "u011").
    pub region: Option<String>,

    /// Device-family tag: "camera", "owl", "hawk", "doorbell" or "lotus".
    pub device_type: Option<String>,

    pub account_id: Option<u64>,
    pub network_id: Option<u64>,
    pub camera_id: Option<u64>,

    /// Bearer token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override connect timeout (seconds).
    pub connect_timeout: Option<u64>,
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    ///
    /// An explicitly named profile must exist; a missing default is not an
    /// error and yields `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<Option<(&str, &Profile)>, ConfigError> {
        if let Some(name) = name {
            return self
                .profiles
                .get_key_value(name)
                .map(|(k, p)| Some((k.as_str(), p)))
                .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() });
        }

        Ok(self
            .default_profile
            .as_deref()
            .and_then(|name| self.profiles.get_key_value(name))
            .map(|(k, p)| (k.as_str(), p)))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "liveview", "liveview").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("liveview");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the platform config file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit file, overlaid with `LIVEVIEW_` env vars.
///
/// Nested keys use a double underscore, e.g.
/// `LIVEVIEW_PROFILES__HOME__REGION=u011`. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIVEVIEW_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the bearer token: explicit flag, then the profile's
/// `token_env` variable, then the plaintext `token`.
pub fn resolve_token(
    flag: Option<&str>,
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(token) = flag.filter(|t| !t.is_empty()) {
        return Ok(SecretString::from(token.to_owned()));
    }

    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken {
        profile: profile_name.into(),
    })
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn client_config(profile: &Profile, defaults: &Defaults) -> Result<ClientConfig, ConfigError> {
    let connect_timeout = profile.connect_timeout.unwrap_or(defaults.connect_timeout);
    if connect_timeout == 0 {
        return Err(ConfigError::Validation {
            field: "connect_timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let mut config = ClientConfig::default()
        .with_insecure(profile.insecure.unwrap_or(defaults.insecure))
        .with_connect_timeout(Duration::from_secs(connect_timeout));
    config.http_timeout = Duration::from_secs(defaults.timeout.max(1));
    Ok(config)
}
