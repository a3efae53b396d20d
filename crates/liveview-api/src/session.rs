// Live-view command lifecycle: start, keep-alive polling, stop.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use url::Url;

use crate::client::LiveViewApi;
use crate::error::Error;

/// Command code the API returns once a session has been stopped.
pub const STOPPED_CODE: i64 = 902;

// ── Models ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct LiveViewRequest {
    intent: &'static str,
}

/// Response to a live-view start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Handle used to poll and stop the session.
    #[serde(default)]
    pub command_id: u64,

    /// Seconds between keep-alive polls.
    #[serde(default)]
    pub polling_interval: u64,

    /// Connection string naming the stream server.
    #[serde(default)]
    pub server: String,
}

impl SessionDescriptor {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }
}

/// Status of a command, returned by both the poll and stop endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub complete: bool,
}

// ── Lifecycle ────────────────────────────────────────────────────────

impl LiveViewApi {
    /// Ask the camera to start a live-view session.
    pub async fn start_session(&self) -> Result<SessionDescriptor, Error> {
        let url = self.live_view_url()?;
        debug!("POST {}", url);

        let start_err = |reason: String| Error::SessionStart { reason };

        let body = serde_json::to_vec(&LiveViewRequest { intent: "liveview" })
            .map_err(|e| start_err(e.to_string()))?;

        let (status, text) = self
            .send(self.http().post(url).body(body))
            .await
            .map_err(|e| start_err(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(start_err(format!("HTTP status {status}")));
        }

        let descriptor: SessionDescriptor = serde_json::from_str(&text)
            .map_err(|e| start_err(format!("undecodable response: {e}")))?;

        if descriptor.command_id == 0 {
            return Err(start_err("response carried no command id".into()));
        }

        info!(
            command_id = descriptor.command_id,
            polling_interval = descriptor.polling_interval,
            "live-view session started"
        );
        Ok(descriptor)
    }

    /// Fetch the current status of a command once.
    pub async fn poll_command(&self, command_id: u64) -> Result<CommandStatus, Error> {
        let url = self.command_url(command_id)?;
        self.poll_url(&url, command_id).await
    }

    /// Keep a session alive by polling its command every `interval`.
    ///
    /// Runs until `cancel` fires (returns `Ok(())`) or a poll fails. A
    /// response flagged `complete` ends the loop with
    /// [`Error::SessionComplete`]. A zero interval is treated as one second.
    pub async fn poll_session(
        &self,
        cancel: &CancellationToken,
        command_id: u64,
        interval: Duration,
    ) -> Result<(), Error> {
        let url = self.command_url(command_id)?;
        let period = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let status = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                status = self.poll_url(&url, command_id) => status?,
            };

            if status.complete {
                return Err(Error::SessionComplete { command_id });
            }
            trace!(command_id, code = status.code, "command still active");
        }

        debug!(command_id, "polling cancelled");
        Ok(())
    }

    /// Mark a session as done. Succeeds only on code [`STOPPED_CODE`].
    pub async fn stop_session(&self, command_id: u64) -> Result<CommandStatus, Error> {
        let url = self.stop_url(command_id)?;
        debug!("POST {}", url);

        let stop_err = |code: Option<i64>, message: String| Error::SessionStop { code, message };

        let (status, text) = self
            .send(self.http().post(url))
            .await
            .map_err(|e| stop_err(None, e.to_string()))?;

        if status != StatusCode::OK {
            return Err(stop_err(None, format!("HTTP status {status}")));
        }

        let result: CommandStatus = serde_json::from_str(&text)
            .map_err(|e| stop_err(None, format!("undecodable response: {e}")))?;

        if result.code != STOPPED_CODE {
            return Err(stop_err(Some(result.code), result.message));
        }

        info!(command_id, "live-view session stopped");
        Ok(result)
    }

    async fn poll_url(&self, url: &Url, command_id: u64) -> Result<CommandStatus, Error> {
        trace!("GET {}", url);

        let poll_err = |reason: String| Error::Poll { command_id, reason };

        let (status, text) = self
            .send(self.http().get(url.clone()))
            .await
            .map_err(|e| poll_err(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(poll_err(format!("HTTP status {status}")));
        }

        serde_json::from_str(&text).map_err(|e| poll_err(format!("undecodable response: {e}")))
    }
}
