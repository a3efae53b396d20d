use std::fmt;

use secrecy::SecretString;
use strum::EnumString;

use crate::error::Error;

/// Identity of one camera plus the bearer token used to reach it.
///
/// Immutable once built; the token never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    /// Region to use for the API host (e.g. `"u011"`).
    pub region: String,
    /// Blink bearer token.
    pub token: SecretString,
    /// Device-family tag as reported by the account (e.g. `"owl"`).
    pub device_type: String,
    /// Account the camera belongs to.
    pub account_id: u64,
    /// Network (sync module) the camera is associated with.
    pub network_id: u64,
    /// The camera itself.
    pub camera_id: u64,
}

impl Credentials {
    pub fn new(
        region: impl Into<String>,
        token: impl Into<String>,
        device_type: impl Into<String>,
        account_id: u64,
        network_id: u64,
        camera_id: u64,
    ) -> Self {
        Self {
            region: region.into(),
            token: SecretString::from(token.into()),
            device_type: device_type.into(),
            account_id,
            network_id,
            camera_id,
        }
    }

    /// Resolve the device-family tag into a URL template family.
    pub fn device_family(&self) -> Result<DeviceFamily, Error> {
        DeviceFamily::from_tag(&self.device_type)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("token", &"[REDACTED]")
            .field("device_type", &self.device_type)
            .field("account_id", &self.account_id)
            .field("network_id", &self.network_id)
            .field("camera_id", &self.camera_id)
            .finish()
    }
}

/// URL template family selected by the device-family tag.
///
/// Several tags share a family: the Mini cameras report `owl` or `hawk`,
/// the doorbells `doorbell` or `lotus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum DeviceFamily {
    #[strum(serialize = "camera")]
    Camera,
    #[strum(serialize = "owl", serialize = "hawk")]
    Mini,
    #[strum(serialize = "doorbell", serialize = "lotus")]
    Doorbell,
}

impl DeviceFamily {
    pub fn from_tag(tag: &str) -> Result<Self, Error> {
        tag.parse().map_err(|_| Error::UnsupportedDevice {
            device_type: tag.to_owned(),
        })
    }

    /// The API version segment used by this family's live-view endpoint.
    pub fn api_version(self) -> &'static str {
        match self {
            Self::Camera => "v5",
            Self::Mini | Self::Doorbell => "v2",
        }
    }

    /// The collection segment (`cameras`, `owls`, `doorbells`).
    pub fn collection(self) -> &'static str {
        match self {
            Self::Camera => "cameras",
            Self::Mini => "owls",
            Self::Doorbell => "doorbells",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_map_to_families() {
        assert_eq!(DeviceFamily::from_tag("camera").ok(), Some(DeviceFamily::Camera));
        assert_eq!(DeviceFamily::from_tag("owl").ok(), Some(DeviceFamily::Mini));
        assert_eq!(DeviceFamily::from_tag("hawk").ok(), Some(DeviceFamily::Mini));
        assert_eq!(DeviceFamily::from_tag("doorbell").ok(), Some(DeviceFamily::Doorbell));
        assert_eq!(DeviceFamily::from_tag("lotus").ok(), Some(DeviceFamily::Doorbell));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = DeviceFamily::from_tag("toaster").unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedDevice { ref device_type } if device_type == "toaster"),
            "unexpected error: {err:?}"
        );
        assert!(DeviceFamily::from_tag("").is_err());
        assert!(DeviceFamily::from_tag("Camera").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let creds = Credentials::new("u011", "super-secret", "camera", 1, 2, 3);
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("REDACTED"));
    }
}
