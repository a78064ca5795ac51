//! Line commands read from stdin.

/// One parsed stdin line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Connect,
    Disconnect,
    Toggle,
    Track { title: String, artist: String },
    Volume(u8),
    Device(Option<String>),
    RemoteConnected(Option<String>),
    RemoteDisconnected,
    RemotePaused(bool),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  connect | disconnect | toggle
  track <title> [| <artist>]
  volume <0-100>
  device [name]
  remote-connected [name] | remote-disconnected
  remote-paused | remote-playing
  status | help | quit";

/// Parse a stdin line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<DaemonCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());

    let command = match word.to_ascii_lowercase().as_str() {
        "connect" => DaemonCommand::Connect,
        "disconnect" => DaemonCommand::Disconnect,
        "toggle" | "play" | "pause" => DaemonCommand::Toggle,
        "track" => {
            let (title, artist) = rest.split_once('|').unwrap_or((rest, ""));
            DaemonCommand::Track {
                title: title.trim().to_string(),
                artist: artist.trim().to_string(),
            }
        }
        "volume" => {
            let volume = rest
                .parse::<u8>()
                .map_err(|_| format!("Invalid volume: '{}'", rest))?;
            DaemonCommand::Volume(volume)
        }
        "device" => DaemonCommand::Device(optional(rest)),
        "remote-connected" => DaemonCommand::RemoteConnected(optional(rest)),
        "remote-disconnected" => DaemonCommand::RemoteDisconnected,
        "remote-paused" => DaemonCommand::RemotePaused(true),
        "remote-playing" => DaemonCommand::RemotePaused(false),
        "status" => DaemonCommand::Status,
        "help" | "?" => DaemonCommand::Help,
        "quit" | "exit" => DaemonCommand::Quit,
        other => return Err(format!("Unknown command: '{}'", other)),
    };
    Ok(Some(command))
}
