//! SpaceNotes CLI
//!
//! Command-line interface for the SpaceNotes daemon.
//!
//! Commands are sent to the daemon over its Unix domain socket. Besides
//! note management, the CLI can stand in for a UI process by reporting
//! window lifecycle events and draining queued window directives.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spacenotes_ipc::{
    decode_line, encode_line, socket_path, IpcCommand, IpcError, IpcEvent, IpcResponse, NoteInfo,
    WindowDirective, IPC_READ_TIMEOUT, MAX_IPC_MESSAGE_SIZE,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "spacenotes-cli")]
#[command(author, version, about = "Control the SpaceNotes daemon")]
struct Cli {
    /// Daemon socket (defaults to SPACENOTES_SOCKET or the per-user runtime directory)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Note management
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
    /// Toggle a note's pin
    Pin { note_id: Uuid },
    /// Set a custom label for a note's space
    Rename { note_id: Uuid, name: String },
    /// Raise a note's window
    Activate { note_id: Uuid },
    /// List displays and desktops
    Spaces,
    /// Show the active space
    Current,
    /// Drain pending window directives and events
    Poll,
    /// Report window lifecycle events (for UI processes)
    Window {
        #[command(subcommand)]
        event: WindowEvent,
    },
    /// Stop the daemon
    Stop,
}

#[derive(Subcommand)]
enum NotesAction {
    /// List notes
    List {
        /// Only notes on this space
        #[arg(long)]
        space: Option<i64>,
    },
    /// Create a note
    Create {
        /// Space to create the note on (default: the active space)
        #[arg(long)]
        space: Option<i64>,
    },
    /// Delete a note
    Delete { note_id: Uuid },
    /// Bring a note's window forward, switching to its desktop
    Open { note_id: Uuid },
}

#[derive(Subcommand)]
enum WindowEvent {
    /// A note window appeared
    Created { note_id: Uuid, window_number: i64 },
    /// A note window closed
    Closed { note_id: Uuid },
    /// A note window moved to another display
    ChangedScreen { note_id: Uuid },
    /// A note window finished a drag
    Moved { note_id: Uuid },
}

impl Commands {
    fn into_ipc(self) -> IpcCommand {
        match self {
            Commands::Notes { action } => match action {
                NotesAction::List { space } => IpcCommand::ListNotes { space_id: space },
                NotesAction::Create { space } => IpcCommand::CreateNote { space_id: space },
                NotesAction::Delete { note_id } => IpcCommand::DeleteNote { note_id },
                NotesAction::Open { note_id } => IpcCommand::OpenNote { note_id },
            },
            Commands::Pin { note_id } => IpcCommand::TogglePin { note_id },
            Commands::Rename { note_id, name } => IpcCommand::RenameSpace { note_id, name },
            Commands::Activate { note_id } => IpcCommand::Activate { note_id },
            Commands::Spaces => IpcCommand::QuerySpaces,
            Commands::Current => IpcCommand::QueryCurrentSpace,
            Commands::Poll => IpcCommand::Poll,
            Commands::Window { event } => match event {
                WindowEvent::Created {
                    note_id,
                    window_number,
                } => IpcCommand::WindowCreated {
                    note_id,
                    window_number,
                },
                WindowEvent::Closed { note_id } => IpcCommand::WindowClosed { note_id },
                WindowEvent::ChangedScreen { note_id } => {
                    IpcCommand::WindowChangedScreen { note_id }
                }
                WindowEvent::Moved { note_id } => IpcCommand::WindowMoved { note_id },
            },
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

/// Send one command and wait for the daemon's reply.
async fn send_command(socket: &Path, cmd: &IpcCommand) -> Result<IpcResponse> {
    let stream = UnixStream::connect(socket).await.with_context(|| {
        format!(
            "Failed to connect to the daemon at {}. Is spacenotes running?",
            socket.display()
        )
    })?;
    let (reader, mut writer) = stream.into_split();

    writer
        .write_all(encode_line(cmd)?.as_bytes())
        .await
        .map_err(IpcError::Io)?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| IpcError::Timeout)?
        .map_err(IpcError::Io)?;

    Ok(decode_line(&line)?)
}

fn format_note(note: &NoteInfo) -> String {
    format!(
        "{}  space {:<6} {}{}",
        note.id,
        note.space_id,
        note.space_name,
        if note.is_pinned { "  [pinned]" } else { "" }
    )
}

fn format_directive(directive: &WindowDirective) -> String {
    match directive {
        WindowDirective::SetLevel {
            window_number,
            level_offset,
        } => format!("window {}: set level {:+}", window_number, level_offset),
        WindowDirective::SetCollectionBehavior {
            window_number,
            managed,
        } => format!(
            "window {}: collection behavior {}",
            window_number,
            if *managed { "managed" } else { "default" }
        ),
        WindowDirective::OrderBack { window_number } => {
            format!("window {}: order back", window_number)
        }
        WindowDirective::OrderFrontRegardless { window_number } => {
            format!("window {}: order front regardless", window_number)
        }
        WindowDirective::MakeKeyAndOrderFront { window_number } => {
            format!("window {}: make key and order front", window_number)
        }
        WindowDirective::ActivateApplication => "activate application".to_string(),
    }
}

fn format_event(event: &IpcEvent) -> String {
    match event {
        IpcEvent::SpaceChanged { space_id } => format!("space changed to {}", space_id),
        IpcEvent::PinToggled { note_id, pinned } => format!(
            "note {} {}",
            note_id,
            if *pinned { "pinned" } else { "unpinned" }
        ),
        IpcEvent::SpaceRenamed { note_id, name } => format!("note {} renamed to {:?}", note_id, name),
    }
}

/// Human-readable rendering of a response.
fn format_response(response: &IpcResponse) -> Vec<String> {
    match response {
        IpcResponse::Ok => vec!["ok".to_string()],
        IpcResponse::Error { message } => vec![format!("error: {}", message)],
        IpcResponse::Pinned { note_id, pinned } => vec![format!(
            "note {} is now {}",
            note_id,
            if *pinned { "pinned" } else { "unpinned" }
        )],
        IpcResponse::Note { note } => vec![format_note(note)],
        IpcResponse::Notes { notes } if notes.is_empty() => vec!["no notes".to_string()],
        IpcResponse::Notes { notes } => notes.iter().map(format_note).collect(),
        IpcResponse::Spaces { displays } if displays.is_empty() => {
            vec!["space topology unavailable".to_string()]
        }
        IpcResponse::Spaces { displays } => {
            let mut lines = Vec::new();
            for display in displays {
                lines.push(format!(
                    "{} ({}){}",
                    display.name,
                    display.identifier,
                    if display.is_primary { " [primary]" } else { "" }
                ));
                for desktop in &display.desktops {
                    lines.push(format!(
                        "  {} {:<6} {}",
                        if desktop.is_current { "*" } else { " " },
                        desktop.space_id,
                        desktop.name
                    ));
                }
                for space_id in &display.fullscreen {
                    lines.push(format!("    {:<6} Fullscreen App", space_id));
                }
            }
            lines
        }
        IpcResponse::CurrentSpace {
            space_id: Some(space_id),
            name,
        } => vec![format!("{} ({})", name, space_id)],
        IpcResponse::CurrentSpace { space_id: None, name } => {
            vec![format!("{} (active space unavailable)", name)]
        }
        IpcResponse::Updates { directives, events }
            if directives.is_empty() && events.is_empty() =>
        {
            vec!["nothing pending".to_string()]
        }
        IpcResponse::Updates { directives, events } => directives
            .iter()
            .map(format_directive)
            .chain(events.iter().map(format_event))
            .collect(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket = socket_path(cli.socket);
    let cmd = cli.command.into_ipc();
    let response = send_command(&socket, &cmd).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        for line in format_response(&response) {
            println!("{}", line);
        }
    }

    if let IpcResponse::Error { message } = response {
        bail!("daemon returned an error: {}", message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    fn parse(args: &[&str]) -> IpcCommand {
        let mut argv = vec!["spacenotes-cli"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command.into_ipc()
    }

    #[test]
    fn test_parse_note_commands() {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        assert_eq!(
            parse(&["notes", "list"]),
            IpcCommand::ListNotes { space_id: None }
        );
        assert_eq!(
            parse(&["notes", "create", "--space", "43"]),
            IpcCommand::CreateNote { space_id: Some(43) }
        );
        assert_eq!(
            parse(&["notes", "delete", &id_str]),
            IpcCommand::DeleteNote { note_id: id }
        );
        assert_eq!(
            parse(&["rename", &id_str, "Focus Zone"]),
            IpcCommand::RenameSpace {
                note_id: id,
                name: "Focus Zone".to_string(),
            }
        );
        assert_eq!(parse(&["pin", &id_str]), IpcCommand::TogglePin { note_id: id });
    }

    #[test]
    fn test_parse_window_commands() {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        assert_eq!(
            parse(&["window", "created", &id_str, "88"]),
            IpcCommand::WindowCreated {
                note_id: id,
                window_number: 88,
            }
        );
        assert_eq!(
            parse(&["window", "changed-screen", &id_str]),
            IpcCommand::WindowChangedScreen { note_id: id }
        );
    }

    #[test]
    fn test_rejects_invalid_note_id() {
        assert!(Cli::try_parse_from(["spacenotes-cli", "pin", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "spacenotes-cli",
            "current",
            "--json",
            "--socket",
            "/tmp/s.sock",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/s.sock")));
    }

    #[test]
    fn test_format_response() {
        assert_eq!(format_response(&IpcResponse::Ok), vec!["ok"]);
        assert_eq!(
            format_response(&IpcResponse::Updates {
                directives: vec![WindowDirective::SetLevel {
                    window_number: 7,
                    level_offset: -1,
                }],
                events: vec![IpcEvent::SpaceChanged { space_id: 43 }],
            }),
            vec!["window 7: set level -1", "space changed to 43"]
        );
        assert_eq!(
            format_response(&IpcResponse::CurrentSpace {
                space_id: None,
                name: "Desktop".to_string(),
            }),
            vec!["Desktop (active space unavailable)"]
        );
    }

    #[test]
    fn test_send_command_roundtrip() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("daemon.sock");
            let listener = UnixListener::bind(&path).unwrap();

            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                let (reader, mut writer) = stream.into_split();
                let mut reader = BufReader::new(reader);
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let cmd: IpcCommand = decode_line(&line).unwrap();
                assert_eq!(cmd, IpcCommand::Poll);
                let response = IpcResponse::Updates {
                    directives: vec![],
                    events: vec![],
                };
                writer
                    .write_all(encode_line(&response).unwrap().as_bytes())
                    .await
                    .unwrap();
            });

            let response = send_command(&path, &IpcCommand::Poll).await.unwrap();
            assert_eq!(
                response,
                IpcResponse::Updates {
                    directives: vec![],
                    events: vec![],
                }
            );
        });
    }

    #[test]
    fn test_send_command_times_out_on_silent_daemon() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("silent.sock");
            let listener = UnixListener::bind(&path).unwrap();

            let server = tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::time::sleep(IPC_READ_TIMEOUT * 2).await;
                drop(stream);
            });

            let err = send_command(&path, &IpcCommand::Poll).await.unwrap_err();
            assert!(matches!(err.downcast_ref::<IpcError>(), Some(IpcError::Timeout)));
            server.abort();
        });
    }

    #[test]
    fn test_send_command_without_daemon() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = runtime
            .block_on(send_command(&dir.path().join("missing.sock"), &IpcCommand::Stop))
            .unwrap_err();
        assert!(err.to_string().contains("Is spacenotes running?"));
    }
}
