//! SpaceNotes Daemon
//!
//! Main daemon process for SpaceNotes.
//!
//! Responsibilities:
//! - Host the space engine and its note store
//! - Forward desktop switches from the platform watcher
//! - Handle IPC commands from UI clients and the CLI
//! - Run deferred re-checks when their settle delays expire

mod config;
mod service;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use service::NoteService;
use spacenotes_ipc::{
    decode_line, encode_line, IpcCommand, IpcResponse, IPC_READ_TIMEOUT, MAX_IPC_MESSAGE_SIZE,
};
use spacenotes_platform_macos::{install_space_watcher, native_oracle, PlatformEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::JsonNoteStore;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// An event from the platform watcher.
    Platform(PlatformEvent),
    /// Shutdown signal.
    Shutdown,
}

/// Fallback response when a response cannot be serialized.
const SERIALIZATION_ERROR_LINE: &str =
    "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n";

#[derive(Debug, Parser)]
#[command(name = "spacenotes", version, about = "SpaceNotes space engine daemon")]
struct Args {
    /// Config file to use instead of the standard locations
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "spacenotes_core=trace" (overrides config and RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Socket path (overrides SPACENOTES_SOCKET)
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

/// Run the IPC server, accepting connections and dispatching commands.
async fn run_ipc_server(listener: UnixListener, event_tx: mpsc::Sender<DaemonEvent>) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        debug!("Client connected");

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

fn response_line(response: &IpcResponse) -> String {
    encode_line(response).unwrap_or_else(|e| {
        warn!("Failed to serialize IPC response: {}", e);
        SERIALIZATION_ERROR_LINE.to_string()
    })
}

/// Handle a single client connection.
async fn handle_client(stream: UnixStream, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut reader = BufReader::new(limited_reader);
    let mut line = String::new();

    // Read command (single line of JSON) with timeout and size bound
    let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
    let bytes_read = match read_result {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            debug!("Client did not send a command in time");
            return Ok(());
        }
    };
    if bytes_read == 0 {
        return Ok(());
    }

    debug!("Received command: {}", line.trim());

    let cmd: IpcCommand = match decode_line(&line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            writer.write_all(response_line(&response).as_bytes()).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);

    let (resp_tx, resp_rx) = oneshot::channel();
    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = IpcResponse::error("Daemon is shutting down");
        writer.write_all(response_line(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => IpcResponse::error("Failed to get response from daemon"),
    };
    writer.write_all(response_line(&response).as_bytes()).await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Spawn a named forwarding thread that receives events from a std::sync::mpsc channel
/// and forwards them to a tokio mpsc sender. Returns the JoinHandle for graceful shutdown.
fn spawn_forwarding_thread<T: Send + 'static>(
    name: &str,
    receiver: std::sync::mpsc::Receiver<T>,
    sender: mpsc::Sender<DaemonEvent>,
    map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(map_fn(event)).is_err() {
                    break; // Channel closed, daemon shutting down
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

/// Bind the daemon socket, replacing a stale socket file.
///
/// Returns `None` if another daemon already answers on `path`.
async fn bind_socket(path: &Path) -> Result<Option<UnixListener>> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Ok(None);
        }
        debug!("Removing stale socket {}", path.display());
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
    }
    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind socket {}", path.display()))?;
    Ok(Some(listener))
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid --log-level {:?}", level))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.behavior.log_level.to_lowercase())),
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (needed for log level)
    let loaded = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });
    let config_warnings = config.validate();

    init_logging(&args, &config)?;
    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("SpaceNotes daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let socket_path = spacenotes_ipc::socket_path(args.socket.clone());
    let Some(listener) = bind_socket(&socket_path).await? else {
        error!(
            "Another spacenotes daemon is already running (socket {} is active)",
            socket_path.display()
        );
        return Ok(());
    };

    let delays = config.settle.to_settle_delays();
    info!(
        "Settle delays: space change {:?}/{:?}, drag {:?}, pin restore {:?}, initial pin {:?}",
        delays.space_change_first,
        delays.space_change_second,
        delays.drag,
        delays.pin_restore,
        delays.initial_pin
    );

    let store_path = config.store.resolve_path();
    let store = JsonNoteStore::open(&store_path);
    info!("Note store: {}", store.path().display());

    let oracle = native_oracle();
    let mut service = NoteService::new(Box::new(oracle), Box::new(store), delays);
    service.engine().directory().log_topology();

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    // Collect forwarding thread handles for graceful shutdown
    let mut thread_handles: Vec<std::thread::JoinHandle<()>> = Vec::new();

    let watcher = if config.watcher.enabled {
        let (platform_tx, platform_rx) = std::sync::mpsc::channel::<PlatformEvent>();
        match install_space_watcher(oracle, config.watcher.to_watcher_config(), move |event| {
            let _ = platform_tx.send(event);
        }) {
            Ok(handle) => {
                info!(
                    "Space watcher polling every {}ms",
                    config.watcher.poll_interval_ms
                );
                match spawn_forwarding_thread(
                    "space-fwd",
                    platform_rx,
                    event_tx.clone(),
                    DaemonEvent::Platform,
                ) {
                    Ok(handle) => thread_handles.push(handle),
                    Err(e) => warn!("{}", e),
                }
                Some(handle)
            }
            Err(e) => {
                warn!("{}. Desktop switches will not be tracked.", e);
                None
            }
        }
    } else {
        info!("Space watcher disabled by config (watcher.enabled = false)");
        None
    };

    // Spawn IPC server
    let ipc_tx = event_tx.clone();
    tokio::spawn(async move {
        run_ipc_server(listener, ipc_tx).await;
    });

    info!("IPC server listening on {}", socket_path.display());

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }
    drop(event_tx);

    info!("Ready. Use spacenotes-cli to send commands.");

    // Virtual time of the engine is measured from here
    let start = Instant::now();

    // Main event loop
    loop {
        let deadline = service.next_deadline().map(|at| start + at);
        let event = tokio::select! {
            event = event_rx.recv() => event,
            _ = sleep_until(deadline) => {
                service.advance_to(start.elapsed());
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };

        // Run anything that became due before this event
        service.advance_to(start.elapsed());

        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let response = service.handle_command(cmd);
                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
            }
            DaemonEvent::Platform(PlatformEvent::SpaceSwitched(space_id)) => {
                debug!("Platform reported switch to space {}", space_id);
                service.space_switched();
            }
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Stopping the watcher drops its sender, which ends the forwarding thread
    drop(watcher);
    info!("Waiting for forwarding threads to exit...");
    for handle in thread_handles {
        let _ = handle.join();
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!("Failed to remove socket {}: {}", socket_path.display(), e);
    }

    info!("SpaceNotes daemon shutting down.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn roundtrip(path: &Path, payload: &str) -> String {
        let stream = UnixStream::connect(path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(payload.as_bytes()).await.unwrap();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "spacenotes",
            "--config",
            "/tmp/config.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/config.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.socket.is_none());
    }

    #[test]
    fn test_bind_socket_replaces_stale_file() {
        runtime().block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("spacenotes.sock");
            std::fs::write(&path, "").unwrap();

            let listener = bind_socket(&path).await.unwrap();
            assert!(listener.is_some());

            // A live listener is detected as a running daemon
            assert!(bind_socket(&path).await.unwrap().is_none());
        });
    }

    #[test]
    fn test_client_command_reaches_event_loop() {
        runtime().block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("spacenotes.sock");
            let listener = bind_socket(&path).await.unwrap().unwrap();
            let (event_tx, mut event_rx) = mpsc::channel(8);
            tokio::spawn(run_ipc_server(listener, event_tx));

            // Answer one command like the event loop would
            tokio::spawn(async move {
                if let Some(DaemonEvent::IpcCommand { cmd, responder }) = event_rx.recv().await {
                    assert_eq!(cmd, IpcCommand::QueryCurrentSpace);
                    let _ = responder.send(IpcResponse::CurrentSpace {
                        space_id: Some(42),
                        name: "Main Desktop 1".to_string(),
                    });
                }
            });

            let line = roundtrip(&path, "{\"type\":\"query_current_space\"}\n").await;
            let response: IpcResponse = decode_line(&line).unwrap();
            assert_eq!(
                response,
                IpcResponse::CurrentSpace {
                    space_id: Some(42),
                    name: "Main Desktop 1".to_string(),
                }
            );
        });
    }

    #[test]
    fn test_invalid_command_gets_error_response() {
        runtime().block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("spacenotes.sock");
            let listener = bind_socket(&path).await.unwrap().unwrap();
            let (event_tx, _event_rx) = mpsc::channel(8);
            tokio::spawn(run_ipc_server(listener, event_tx));

            let line = roundtrip(&path, "{\"type\":\"bogus\"}\n").await;
            let response: IpcResponse = decode_line(&line).unwrap();
            match response {
                IpcResponse::Error { message } => assert!(message.starts_with("Invalid command")),
                other => panic!("Expected Error response, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_stop_command_triggers_shutdown() {
        runtime().block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("spacenotes.sock");
            let listener = bind_socket(&path).await.unwrap().unwrap();
            let (event_tx, mut event_rx) = mpsc::channel(8);
            tokio::spawn(run_ipc_server(listener, event_tx));

            let client = tokio::spawn({
                let path = path.clone();
                async move { roundtrip(&path, "{\"type\":\"stop\"}\n").await }
            });

            match event_rx.recv().await {
                Some(DaemonEvent::IpcCommand { cmd, responder }) => {
                    assert_eq!(cmd, IpcCommand::Stop);
                    responder.send(IpcResponse::Ok).unwrap();
                }
                _ => panic!("Expected the stop command first"),
            }
            let line = client.await.unwrap();
            assert_eq!(decode_line::<IpcResponse>(&line).unwrap(), IpcResponse::Ok);
            assert!(matches!(event_rx.recv().await, Some(DaemonEvent::Shutdown)));
        });
    }

    #[test]
    fn test_forwarding_thread_maps_events() {
        runtime().block_on(async {
            let (std_tx, std_rx) = std::sync::mpsc::channel();
            let (event_tx, mut event_rx) = mpsc::channel(8);
            let handle =
                spawn_forwarding_thread("test-fwd", std_rx, event_tx, DaemonEvent::Platform)
                    .unwrap();

            std_tx.send(PlatformEvent::SpaceSwitched(43)).unwrap();
            drop(std_tx);

            match event_rx.recv().await {
                Some(DaemonEvent::Platform(PlatformEvent::SpaceSwitched(id))) => assert_eq!(id, 43),
                _ => panic!("Expected forwarded platform event"),
            }
            handle.join().unwrap();
        });
    }

    #[test]
    fn test_sleep_until_deadline() {
        runtime().block_on(async {
            let before = Instant::now();
            sleep_until(Some(before + Duration::from_millis(10))).await;
            assert!(before.elapsed() >= Duration::from_millis(10));
        });
    }
}
