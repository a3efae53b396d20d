mod cli;
mod config;
mod error;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncWrite;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use liveview_core::{Client, SessionEvent};

use crate::cli::Cli;
use crate::error::CliError;

type Sink = Box<dyn AsyncWrite + Unpin + Send>;

/// How long a failed session waits for the player to be reaped.
const PLAYER_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout may carry the video stream; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cfg = liveview_config::load_config()?;
    let settings = config::resolve(&cli, &cfg)?;
    debug!(connect_timeout = ?config::connect_timeout(&settings), "settings resolved");

    let client = Client::new(settings.credentials, settings.client)?;
    let mut events = client.events();

    let (sink, mut player) = open_sink(&cli).await?;
    client.connect(sink).await?;
    info!("streaming live view; press Ctrl-C to stop");

    let outcome = tokio::select! {
        biased;
        status = player_exit(player.as_mut()) => {
            info!(?status, "player exited");
            Ok(())
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
            Ok(())
        }
        result = session_end(&mut events) => result,
    };
    let outcome = settle(outcome, player.as_mut()).await;

    client.disconnect().await;

    if let Some(mut child) = player {
        if let Err(e) = child.kill().await {
            debug!(error = %e, "player already gone");
        }
    }

    outcome
}

/// Pick the stream destination: stdout, a file, or ffplay's stdin.
async fn open_sink(cli: &Cli) -> Result<(Sink, Option<Child>), CliError> {
    if cli.play {
        let mut child = Command::new("ffplay")
            .args([
                "-f",
                "mpegts",
                "-err_detect",
                "ignore_err",
                "-window_title",
                "Blink Live View",
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CliError::Player { source })?;

        let stdin = child.stdin.take().ok_or_else(|| CliError::Internal {
            message: "ffplay started without a stdin pipe".into(),
        })?;
        return Ok((Box::new(stdin), Some(child)));
    }

    if cli.to_stdout() {
        return Ok((Box::new(tokio::io::stdout()), None));
    }

    let file = tokio::fs::File::create(&cli.output).await?;
    info!(path = %cli.output.display(), "writing stream to file");
    Ok((Box::new(file), None))
}

/// Resolve once the session ends on its own.
async fn session_end(events: &mut broadcast::Receiver<Arc<SessionEvent>>) -> Result<(), CliError> {
    loop {
        match events.recv().await {
            Ok(event) => match &*event {
                SessionEvent::Started { host, port, .. } => {
                    info!(%host, port, "stream server assigned");
                }
                SessionEvent::Completed { command_id } => {
                    info!(command_id, "camera ended the session");
                    return Ok(());
                }
                SessionEvent::Failed { error, .. } => {
                    return Err(CliError::SessionLost {
                        reason: error.to_string(),
                    });
                }
                SessionEvent::Stopped { .. } => return Ok(()),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "session events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

/// Closing the player window breaks the sink and fails the session.
/// Report that as a clean exit once the player is confirmed gone.
async fn settle(outcome: Result<(), CliError>, player: Option<&mut Child>) -> Result<(), CliError> {
    if outcome.is_ok() {
        return outcome;
    }
    let Some(child) = player else {
        return outcome;
    };

    match tokio::time::timeout(PLAYER_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?status, "player exited");
            Ok(())
        }
        _ => outcome,
    }
}

async fn player_exit(player: Option<&mut Child>) -> Option<std::process::ExitStatus> {
    match player {
        Some(child) => child.wait().await.ok(),
        None => std::future::pending().await,
    }
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
