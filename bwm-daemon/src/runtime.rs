//! Daemon runtime: the trigger server, log rotation and signal handling
//! around the blocking [`RunLoop`].
//!
//! Clients connect over localhost TCP, answer a challenge with an HMAC of
//! the auth-file key and get `{"ok":true}` once their trigger is queued.
//! The run loop owns all session state; the async side only feeds it
//! [`DaemonEvent`]s.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bwm_menu::MenuGate;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use zeroize::Zeroizing;

use crate::error::{io_err, DaemonError};
use crate::log_rotation;
use crate::protocol::{self, Challenge, DaemonRequest, DaemonResponse, TriggerArgs};
use crate::rendezvous::BoundDaemon;
use crate::state::{DaemonEvent, DaemonState, RunLoop, SessionHost};

const LOG_ROTATION_INTERVAL: Duration = Duration::from_secs(60);

/// Where the daemon keeps its files and how long it stays unlocked.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub auth_path: PathBuf,
    pub log_path: Option<PathBuf>,
    pub timeout: Duration,
}

/// Start the daemon runtime and block the current thread until the vault
/// locks.
pub fn start_blocking<H>(
    bound: BoundDaemon,
    options: DaemonOptions,
    host: H,
    initial: TriggerArgs,
) -> Result<DaemonState, DaemonError>
where
    H: SessionHost + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(bound, options, host, initial))
}

/// Serve triggers until the run loop reaches `Locked`, then remove the auth
/// file and stop every task.
pub async fn run<H>(
    bound: BoundDaemon,
    options: DaemonOptions,
    host: H,
    initial: TriggerArgs,
) -> Result<DaemonState, DaemonError>
where
    H: SessionHost + Send + 'static,
{
    let BoundDaemon { listener, envelope } = bound;
    listener
        .set_nonblocking(true)
        .map_err(|e| io_err("daemon listener", e))?;
    let listener = TcpListener::from_std(listener).map_err(|e| io_err("daemon listener", e))?;
    let authkey = Arc::new(Zeroizing::new(envelope.authkey.clone()));

    let (events_tx, events_rx) = mpsc::unbounded_channel::<DaemonEvent>();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let events = events_tx.clone();
        tokio::spawn(async move {
            let result = server_task(listener, authkey, events, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let log_path = options.log_path.clone();
        tokio::spawn(async move { log_rotation_task(log_path, shutdown.subscribe()).await })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let events = events_tx.clone();
        let gate = host.menu_gate();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = termination_signal() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received termination signal, locking");
                            request_kill(&events, gate.as_ref());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("signal handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let timeout = options.timeout;
    let loop_handle = tokio::task::spawn_blocking(move || {
        let mut run_loop = RunLoop::new(host, events_rx, events_tx, timeout);
        run_loop.run(initial)
    });

    let loop_result = loop_handle.await;

    if let Err(err) = envelope.remove_if_current(&options.auth_path) {
        tracing::warn!(error = %err, "could not remove auth file");
    }
    let _ = shutdown_tx.send(());

    let (server_result, rotation_result, signal_result) =
        tokio::join!(server_handle, rotation_handle, signal_handle);
    handle_join("socket_server", server_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;

    let state = loop_result
        .map_err(|err| DaemonError::Protocol(format!("run loop join failure: {err}")))?;
    tracing::info!(?state, "daemon stopped");
    Ok(state)
}

async fn server_task(
    listener: TcpListener,
    authkey: Arc<Zeroizing<String>>,
    events: mpsc::UnboundedSender<DaemonEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                tracing::debug!(%peer, "client connected");
                let authkey = Arc::clone(&authkey);
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_client(stream, authkey, events).await {
                        tracing::warn!(error = %err, "client error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_client(
    stream: TcpStream,
    authkey: Arc<Zeroizing<String>>,
    events: mpsc::UnboundedSender<DaemonEvent>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let nonce = protocol::new_nonce();
    write_line(&mut writer, &Challenge { nonce: nonce.clone() }).await?;

    let mut lines = BufReader::new(reader).lines();
    let line = tokio::time::timeout(protocol::IO_TIMEOUT, lines.next_line())
        .await
        .map_err(|_| DaemonError::Protocol("client sent nothing".to_string()))?
        .map_err(|e| io_err("daemon socket read", e))?;
    let Some(line) = line else {
        return Ok(());
    };

    let request: DaemonRequest = match serde_json::from_str(&line) {
        Ok(request) => request,
        Err(err) => {
            let response = DaemonResponse::error(format!("invalid request JSON: {err}"));
            return write_line(&mut writer, &response).await;
        }
    };

    if !protocol::verify(&authkey, &nonce, &request.mac) {
        tracing::warn!("rejected trigger with bad MAC");
        return write_line(&mut writer, &DaemonResponse::error(protocol::AUTH_FAILED)).await;
    }

    let event = if request.args.is_empty() {
        DaemonEvent::Trigger
    } else {
        DaemonEvent::ArgsReady(request.args)
    };
    events
        .send(event)
        .map_err(|_| DaemonError::ChannelClosed("daemon events"))?;
    write_line(&mut writer, &DaemonResponse::ok(json!({ "queued": true }))).await
}

async fn log_rotation_task(
    log_path: Option<PathBuf>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let Some(log_path) = log_path else {
        let _ = shutdown_rx.recv().await;
        return Ok(());
    };
    let mut interval = tokio::time::interval(LOG_ROTATION_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let path = log_path.clone();
                tokio::task::spawn_blocking(move || log_rotation::rotate_log(&path))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

/// Queue a kill for the run loop and close any prompt it may be blocked on.
fn request_kill(events: &mpsc::UnboundedSender<DaemonEvent>, gate: Option<&MenuGate>) {
    let _ = events.send(DaemonEvent::Kill);
    if let Some(gate) = gate {
        gate.close();
    }
}

#[cfg(unix)]
async fn termination_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

async fn write_line<T: serde::Serialize>(
    writer: &mut OwnedWriteHalf,
    message: &T,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(message)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Daemon logging: rotate once, then append to `log_path` without colours.
pub fn init_file_tracing(log_path: &Path) -> Result<(), DaemonError> {
    use tracing_subscriber::{fmt, EnvFilter};

    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    log_rotation::rotate_log(log_path);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(AppendLog(log_path.to_path_buf()))
        .try_init();
    Ok(())
}

/// Client-side logging to stderr.
pub fn init_stderr_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Opens the log for every event so rotation never leaves the daemon
/// writing into a renamed file.
struct AppendLog(PathBuf);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for AppendLog {
    type Writer = Box<dyn io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.0) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    }
}
