// Session API HTTP client
//
// Wraps `reqwest::Client` with Blink-specific URL construction and the
// fixed header set. The command lifecycle (start, poll, stop) lives in
// `session.rs` as inherent methods to keep this module focused on
// transport mechanics.

use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the live-view command API.
///
/// Bound to one camera's [`Credentials`]; every request carries the
/// bearer token, locale and JSON content type.
pub struct LiveViewApi {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl LiveViewApi {
    /// Create a client for the credentials' regional API host.
    pub fn new(credentials: Credentials, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = region_base_url(&credentials.region)?;
        Self::with_base_url(base_url, credentials, transport)
    }

    /// Create a client against an explicit API root (proxies, tests).
    pub fn with_base_url(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(&credentials.token)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub fn live_view_url(&self) -> Result<Url, Error> {
        live_view_url(&self.base_url, &self.credentials)
    }

    pub fn command_url(&self, command_id: u64) -> Result<Url, Error> {
        command_url(&self.base_url, &self.credentials, command_id)
    }

    pub fn stop_url(&self, command_id: u64) -> Result<Url, Error> {
        stop_url(&self.base_url, &self.credentials, command_id)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a request, returning the status and the raw body.
    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let resp = request.send().await?;
        let status = resp.status();
        debug!(%status, url = %resp.url(), "API response");
        let body = resp.text().await?;
        Ok((status, body))
    }
}

// ── Pure URL construction ────────────────────────────────────────────

/// `https://rest-{region}.immedia-semi.com`
pub fn region_base_url(region: &str) -> Result<Url, Error> {
    Ok(Url::parse(&format!("https://rest-{region}.immedia-semi.com"))?)
}

fn join(base: &Url, path: &str) -> Result<Url, Error> {
    Ok(Url::parse(&format!(
        "{}{}",
        base.as_str().trim_end_matches('/'),
        path
    ))?)
}

/// Live-view start endpoint, selected by the device family.
pub fn live_view_url(base: &Url, credentials: &Credentials) -> Result<Url, Error> {
    let family = credentials.device_family()?;
    join(
        base,
        &format!(
            "/api/{}/accounts/{}/networks/{}/{}/{}/liveview",
            family.api_version(),
            credentials.account_id,
            credentials.network_id,
            family.collection(),
            credentials.camera_id,
        ),
    )
}

/// Command endpoint used for polling a session.
pub fn command_url(base: &Url, credentials: &Credentials, command_id: u64) -> Result<Url, Error> {
    join(
        base,
        &format!("/network/{}/command/{command_id}", credentials.network_id),
    )
}

/// Command endpoint used for stopping a session.
pub fn stop_url(base: &Url, credentials: &Credentials, command_id: u64) -> Result<Url, Error> {
    join(
        base,
        &format!("/network/{}/command/{command_id}/done", credentials.network_id),
    )
}

/// Live-view start URI against the credentials' regional host.
pub fn live_view_uri(credentials: &Credentials) -> Result<String, Error> {
    let base = region_base_url(&credentials.region)?;
    Ok(live_view_url(&base, credentials)?.into())
}
