//! The interactive command language.
//!
//! A line is split on the first space. A single word is a keyword; two
//! parts are `<target> <body>`, with the body kept verbatim.

use courier_core::{Message, Username};

use crate::errors::ClientError;

/// Fetch pending messages.
pub const FETCH: &str = "obtener";
/// List connected users.
pub const LIST: &str = "listar";
/// Disconnect and quit.
pub const QUIT: &str = "salir";

/// Help text printed after a successful connect.
pub const HELP: &str = "\
\t obtener - show new messages since the last fetch
\t listar - show every connected user
\t salir - disconnect
\t <user> <message...> - send <message> to <user>";

/// A parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// `obtener`
    Fetch,
    /// `listar`
    List,
    /// `salir`
    Quit,
    /// `<target> <body>`
    Send {
        /// Recipient.
        target: Username,
        /// Message text.
        body: String,
    },
}

impl Command {
    /// Parse a command line.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        match line.split_once(' ') {
            Some((target, body)) => Ok(Self::Send {
                target: Username::from(target),
                body: body.to_owned(),
            }),
            None => match line {
                FETCH => Ok(Self::Fetch),
                LIST => Ok(Self::List),
                QUIT => Ok(Self::Quit),
                other => Err(ClientError::Usage(format!(
                    "unknown command '{other}': try {FETCH}, {LIST}, {QUIT} or <user> <message...>"
                ))),
            },
        }
    }
}

/// One `[sender]: body` line per message, newline-terminated.
pub fn format_messages(messages: &[Message]) -> String {
    let lines: Vec<String> = messages
        .iter()
        .map(|m| format!("[{}]: {}", m.sender, m.body))
        .collect();
    format!("{}\n", lines.join("\n"))
}

/// Comma-separated usernames, newline-terminated.
pub fn format_usernames(usernames: &[Username]) -> String {
    let names: Vec<&str> = usernames.iter().map(Username::as_str).collect();
    format!("{}\n", names.join(","))
}
