//! Tilework CLI
//!
//! Command-line interface for driving the tilework engine.
//!
//! Commands are sent to the engine over its local TCP socket as one JSON
//! line; the engine answers with one JSON line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tilework_ipc::{
    decode_line, encode_line, IpcCommand, IpcResponse, DEFAULT_ENGINE_ADDR, MAX_IPC_MESSAGE_SIZE,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "tilework-cli")]
#[command(version, about = "Control the tilework tiling engine")]
struct Cli {
    /// Engine address
    #[arg(long, default_value = DEFAULT_ENGINE_ADDR)]
    addr: String,

    /// Print the raw JSON response
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a layout mode (single, split-vertical, split-horizontal,
    /// three-column, grid, two-thirds-left, two-thirds-right)
    Layout { mode: String },
    /// Show an app in a tile
    Assign { tile: usize, app_id: String },
    /// Mark a tile as active
    FocusTile { tile: usize },
    /// Report the content area bounds
    Resize {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        width: f64,
        height: f64,
    },
    /// Split ratio of the divider
    Ratio {
        #[command(subcommand)]
        action: RatioAction,
    },
    /// Simulate divider pointer events
    Divider {
        #[command(subcommand)]
        event: DividerEvent,
    },
    /// Switch to another workspace
    Workspace { id: String },
    /// Show the tiling state
    Query,
    /// Re-apply the current layout
    Apply,
    /// Reload configuration
    Reload,
    /// Stop the engine
    Stop,
}

#[derive(Subcommand)]
enum RatioAction {
    /// Set the ratio (clamped to 0.1..=0.9)
    Set { ratio: f64 },
    /// Reset the ratio to 0.5
    Reset,
}

#[derive(Subcommand)]
enum DividerEvent {
    /// Pointer pressed on the divider
    Down,
    /// Pointer moved to a screen position
    Move {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    /// Pointer released
    Up,
}

impl Commands {
    fn into_ipc(self) -> IpcCommand {
        match self {
            Commands::Layout { mode } => IpcCommand::SetLayoutMode { mode },
            Commands::Assign { tile, app_id } => IpcCommand::AssignApp { tile, app_id },
            Commands::FocusTile { tile } => IpcCommand::FocusTile { tile },
            Commands::Resize {
                x,
                y,
                width,
                height,
            } => IpcCommand::ContainerResized {
                x,
                y,
                width,
                height,
            },
            Commands::Ratio { action } => match action {
                RatioAction::Set { ratio } => IpcCommand::SetSplitRatio { ratio },
                RatioAction::Reset => IpcCommand::DividerDoubleClick,
            },
            Commands::Divider { event } => match event {
                DividerEvent::Down => IpcCommand::DividerPointerDown,
                DividerEvent::Move { x, y } => IpcCommand::DividerPointerMove { x, y },
                DividerEvent::Up => IpcCommand::DividerPointerUp,
            },
            Commands::Workspace { id } => IpcCommand::SwitchWorkspace { workspace_id: id },
            Commands::Query => IpcCommand::QueryTiling,
            Commands::Apply => IpcCommand::Apply,
            Commands::Reload => IpcCommand::Reload,
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

async fn send_command(addr: &str, cmd: &IpcCommand) -> Result<String> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to tilework engine at {addr}. Is it running?"))?;
    let (reader, mut writer) = stream.into_split();

    writer.write_all(encode_line(cmd)?.as_bytes()).await?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    let n = tokio::time::timeout(RESPONSE_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for engine response")??;
    if n == 0 {
        bail!("Engine closed the connection without responding");
    }
    Ok(line)
}

fn render(response: &IpcResponse) -> String {
    match response {
        IpcResponse::Ok => "ok".to_string(),
        IpcResponse::Warning { message } => format!("warning: {message}"),
        IpcResponse::Error { message } => format!("error: {message}"),
        IpcResponse::TilingState {
            workspace_id,
            mode,
            split_ratio,
            active_tile,
            tiles,
            dragging,
            placements,
        } => {
            let mut out = format!(
                "workspace: {}\nlayout:    {}\nratio:     {:.3}{}\n",
                workspace_id.as_deref().unwrap_or("-"),
                mode,
                split_ratio,
                if *dragging { " (dragging)" } else { "" }
            );
            for (index, app_id) in tiles.iter().enumerate() {
                let marker = if *active_tile == Some(index) { "*" } else { " " };
                let app = if app_id.is_empty() { "-" } else { app_id.as_str() };
                out.push_str(&format!("{marker} tile {index}: {app}\n"));
            }
            for p in placements {
                out.push_str(&format!(
                    "  {} @ {},{} {}x{}\n",
                    p.app_id, p.x, p.y, p.width, p.height
                ));
            }
            out.trim_end().to_string()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.into_ipc();

    let line = send_command(&cli.addr, &cmd).await?;
    let response: IpcResponse = decode_line(&line)?;

    if cli.json {
        println!("{}", line.trim_end());
    } else {
        println!("{}", render(&response));
    }

    if matches!(response, IpcResponse::Error { .. }) {
        std::process::exit(1);
    }
    Ok(())
}
