//! CLI-aware configuration: profile lookup merged with flag overrides.

use std::time::Duration;

use liveview_api::DeviceFamily;
use liveview_config::{Config, Profile};
use liveview_core::{ClientConfig, Credentials};
use secrecy::ExposeSecret;

use crate::cli::Cli;
use crate::error::CliError;

/// Everything needed to build a `Client`.
#[derive(Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub client: ClientConfig,
}

/// Merge the config file, the selected profile and CLI flags.
///
/// Flags win over the profile, the profile wins over `[defaults]`.
pub fn resolve(cli: &Cli, cfg: &Config) -> Result<Settings, CliError> {
    let selected = cfg
        .profile(cli.profile.as_deref())
        .map_err(|_| CliError::ProfileNotFound {
            name: cli.profile.clone().unwrap_or_default(),
            available: available_profiles(cfg),
        })?;

    let empty = Profile::default();
    let (profile_name, profile) = selected.unwrap_or(("(none)", &empty));

    let region = cli
        .region
        .clone()
        .or_else(|| profile.region.clone())
        .or_else(|| cfg.defaults.region.clone())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| missing("--region"))?;

    let device_type = cli
        .device_type
        .clone()
        .or_else(|| profile.device_type.clone())
        .unwrap_or_else(|| "camera".into());
    DeviceFamily::from_tag(&device_type)
        .map_err(|_| CliError::UnsupportedDevice { device_type: device_type.clone() })?;

    let account_id = required_id(cli.account_id, profile.account_id, "--account-id")?;
    let network_id = required_id(cli.network_id, profile.network_id, "--network-id")?;
    let camera_id = required_id(cli.camera_id, profile.camera_id, "--camera-id")?;

    let token = liveview_config::resolve_token(cli.token.as_deref(), profile, profile_name)
        .map_err(|_| CliError::NoToken {
            profile: profile_name.into(),
        })?;

    let overlay = Profile {
        insecure: Some(cli.insecure || profile.insecure.unwrap_or(cfg.defaults.insecure)),
        connect_timeout: cli.connect_timeout.or(profile.connect_timeout),
        ..profile.clone()
    };
    let client = liveview_config::client_config(&overlay, &cfg.defaults)?;

    tracing::debug!(
        profile = profile_name,
        %region,
        %device_type,
        account_id,
        network_id,
        camera_id,
        connect_timeout = ?client.stream.connect_timeout,
        "resolved settings"
    );

    Ok(Settings {
        credentials: Credentials::new(
            region,
            token.expose_secret(),
            device_type,
            account_id,
            network_id,
            camera_id,
        ),
        client,
    })
}

/// Connect timeout actually in effect, for log and error messages.
pub fn connect_timeout(settings: &Settings) -> Duration {
    settings.client.stream.connect_timeout
}

fn required_id(flag: Option<u64>, profile: Option<u64>, name: &str) -> Result<u64, CliError> {
    flag.or(profile)
        .filter(|id| *id != 0)
        .ok_or_else(|| missing(name))
}

fn missing(flag: &str) -> CliError {
    CliError::MissingArgument { flag: flag.into() }
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
