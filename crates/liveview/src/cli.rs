//! Clap derive structures for the `liveview` CLI.

use std::path::PathBuf;

use clap::Parser;

/// liveview -- relay a Blink camera's live stream
#[derive(Debug, Parser)]
#[command(
    name = "liveview",
    version,
    about = "Stream live video from a Blink camera",
    long_about = "Starts a live-view session for one Blink camera and relays the raw\n\
        MPEG-TS stream to stdout, a file, or an ffplay window until interrupted.\n\n\
        Identity fields may come from a config profile; flags override it."
)]
pub struct Cli {
    /// Config profile to use
    #[arg(long, short = 'p', env = "LIVEVIEW_PROFILE")]
    pub profile: Option<String>,

    /// Account region (e.g. u011)
    #[arg(long)]
    pub region: Option<String>,

    /// Blink API bearer token
    #[arg(long, env = "LIVEVIEW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Device type: camera, owl, hawk, doorbell, lotus
    #[arg(long)]
    pub device_type: Option<String>,

    /// Account ID
    #[arg(long)]
    pub account_id: Option<u64>,

    /// Network ID
    #[arg(long)]
    pub network_id: Option<u64>,

    /// Camera ID
    #[arg(long)]
    pub camera_id: Option<u64>,

    /// Accept any certificate from the stream server
    #[arg(long, short = 'k')]
    pub insecure: bool,

    /// Seconds to wait for the stream connection and first video packet
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Write the stream to a file ("-" for stdout)
    #[arg(long, short = 'o', value_name = "PATH", default_value = "-", conflicts_with = "play")]
    pub output: PathBuf,

    /// Pipe the stream into ffplay instead of writing it out
    #[arg(long)]
    pub play: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Whether the stream goes to stdout.
    pub fn to_stdout(&self) -> bool {
        !self.play && self.output.as_os_str() == "-"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_stdout() {
        let cli = Cli::try_parse_from(["liveview", "--camera-id", "3"]).unwrap();
        assert!(cli.to_stdout());
        assert_eq!(cli.camera_id, Some(3));
    }

    #[test]
    fn play_conflicts_with_output() {
        let err = Cli::try_parse_from(["liveview", "--play", "-o", "out.ts"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["liveview", "-vvv", "--play"]).unwrap();
        assert_eq!(cli.verbose, 3);
        assert!(!cli.to_stdout());
    }
}
