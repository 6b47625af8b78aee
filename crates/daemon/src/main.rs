//! Tilework engine
//!
//! Long-running process that tiles app webviews inside the shell's content
//! area.
//!
//! Responsibilities:
//! - Own the tiling state of the active workspace
//! - Handle commands from the UI host and the CLI
//! - Recompute and apply webview placements
//! - Persist per-workspace tiling through the backend

mod config;
mod controller;
mod debounce;
mod submit;

use anyhow::{Context, Result};
use config::Config;
use controller::Controller;
use std::sync::Arc;
use std::time::Duration;
use tilework_backend::{Backend, IpcBackend, MemoryBackend};
use tilework_ipc::{encode_line, IpcCommand, IpcResponse, WorkspaceRecord, MAX_IPC_MESSAGE_SIZE};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events that the engine event loop processes.
pub(crate) enum DaemonEvent {
    /// A command from the UI host or a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// The webview for a newly assigned app has been prepared. Stamped with
    /// the controller generation current at assignment time.
    TileReady {
        generation: u64,
        tile: usize,
        app_id: String,
    },
    /// Persistence debounce elapsed.
    PersistTiling,
    /// Shutdown signal.
    Shutdown,
}

/// IPC read timeout - clients must send within this period.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Shutdown,
}

/// Process a batch of events and run a single layout flush for all of them.
///
/// Responses are sent after the flush so a narrow-window fallback triggered
/// by any command in the batch is reported to every successful caller.
async fn process_batch(controller: &mut Controller, events: Vec<DaemonEvent>) -> LoopControl {
    let mut responders = Vec::new();
    let mut warning = None;
    let mut control = LoopControl::Continue;

    for event in events {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let response = controller.handle_command(cmd).await;
                responders.push((responder, response));
            }
            DaemonEvent::TileReady {
                generation,
                tile,
                app_id,
            } => {
                if let Some(w) = controller.tile_ready(generation, tile, &app_id) {
                    warning = Some(w);
                }
            }
            DaemonEvent::PersistTiling => controller.persist_settled(),
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                control = LoopControl::Shutdown;
            }
        }
    }

    if let Some(w) = controller.flush() {
        warning = Some(w);
    }

    for (responder, response) in responders {
        let response = match (&warning, response) {
            (Some(message), IpcResponse::Ok) => IpcResponse::warning(message.clone()),
            (_, response) => response,
        };
        if responder.send(response).is_err() {
            debug!("Client disconnected before receiving IPC response");
        }
    }

    if control == LoopControl::Shutdown {
        controller.shutdown().await;
    }
    control
}

/// Run the event loop until shutdown or until every sender is gone.
async fn run_event_loop(mut controller: Controller, mut event_rx: mpsc::Receiver<DaemonEvent>) {
    while let Some(event) = event_rx.recv().await {
        let mut batch = vec![event];
        while let Ok(event) = event_rx.try_recv() {
            batch.push(event);
        }
        if batch.len() > 1 {
            debug!("Coalescing {} events", batch.len());
        }
        if process_batch(&mut controller, batch).await == LoopControl::Shutdown {
            break;
        }
    }
    info!(
        "Event loop stopped (workspace {}, layout {})",
        controller.workspace_id().unwrap_or("-"),
        controller.state().mode()
    );
}

async fn run_ipc_server(listener: TcpListener, event_tx: mpsc::Sender<DaemonEvent>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        debug!("Client connected from {}", peer);

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
        "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
    })
}

/// Handle a single client connection: one command line in, one response
/// line out.
async fn handle_client(stream: TcpStream, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();

    let bytes_read = match tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        // Client did not send in time, close silently.
        Err(_) => return Ok(()),
    };
    if bytes_read == 0 {
        return Ok(());
    }

    let line = line.trim();
    debug!("Received command: {}", line);

    let cmd: IpcCommand = match serde_json::from_str(line) {
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
        let response = IpcResponse::error("Engine is shutting down");
        writer.write_all(response_line(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = resp_rx
        .await
        .unwrap_or_else(|_| IpcResponse::error("Failed to get response from engine"));
    writer.write_all(response_line(&response).as_bytes()).await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Backend used when none is configured: an in-process store holding just
/// the default workspace.
fn standalone_backend(config: &Config) -> MemoryBackend {
    let workspace_id = config.behavior.default_workspace.clone();
    MemoryBackend::with_workspaces(
        vec![WorkspaceRecord {
            id: workspace_id.clone(),
            name: workspace_id.clone(),
            tiling_layout: String::new(),
            tile_assignments: Vec::new(),
        }],
        workspace_id,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level)
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    // RUST_LOG overrides the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.behavior.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    for w in config.validate() {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("Tilework engine starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: min_width={}, min_width_three_column={}, persist_debounce_ms={}, log_level={}",
        config.tiling.min_width,
        config.tiling.min_width_three_column,
        config.tiling.persist_debounce_ms,
        config.behavior.log_level
    );

    let backend: Arc<dyn Backend> = match &config.ipc.backend_addr {
        Some(addr) => {
            let client = IpcBackend::new(addr.clone(), config.ipc.request_timeout());
            info!("Using backend at {}", client.addr());
            Arc::new(client)
        }
        None => {
            info!("No backend configured, running standalone");
            Arc::new(standalone_backend(&config))
        }
    };

    let listener = TcpListener::bind(&config.ipc.listen_addr)
        .await
        .with_context(|| {
            format!(
                "Failed to listen on {}. Is another tilework engine already running?",
                config.ipc.listen_addr
            )
        })?;
    info!("IPC server listening on {}", config.ipc.listen_addr);

    let (event_tx, event_rx) = mpsc::channel::<DaemonEvent>(EVENT_CHANNEL_CAPACITY);

    let mut controller = Controller::new(config, backend, event_tx.clone());
    controller.bootstrap().await;

    let ipc_tx = event_tx.clone();
    tokio::spawn(async move {
        run_ipc_server(listener, ipc_tx).await;
    });

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

    info!("Ready. Use tilework-cli to send commands.");

    run_event_loop(controller, event_rx).await;

    info!("Tilework engine shutting down.");
    Ok(())
}
