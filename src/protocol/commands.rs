//! Module `commands`
//!
//! Defines the FTP command set understood by the server and the parsing of a
//! validated control line into a [`Command`].

/// Represents an FTP command parsed from the client input.
///
/// Arguments are everything after the first space, with the line terminator
/// already removed. An argument may be empty; handlers reject empty arguments
/// where one is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Type(String),
    Port(String),
    Pasv,
    List,
    Retr(String),
    Stor(String),
    Help(Option<String>),
    Quit,
    Unknown(String),
}

impl Command {
    /// Commands accepted before login.
    pub fn allowed_unauthenticated(&self) -> bool {
        matches!(
            self,
            Command::User(_) | Command::Pass(_) | Command::Help(_) | Command::Quit
        )
    }
}

/// Log-safe rendering of a raw command line: PASS arguments are masked.
pub fn redact(line: &str) -> String {
    match line.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => format!("{} ****", verb),
        _ => line.to_string(),
    }
}

/// Parses a control line (terminator already stripped) into a `Command`.
///
/// The verb is matched case-insensitively; the argument is kept verbatim.
pub fn parse_command(line: &str) -> Command {
    let (verb, arg) = match line.split_once(' ') {
        Some((verb, arg)) => (verb, arg),
        None => (line, ""),
    };
    let verb_upper = verb.to_ascii_uppercase();
    let arg = arg.to_string();

    match verb_upper.as_str() {
        "USER" => Command::User(arg),
        "PASS" => Command::Pass(arg),
        "TYPE" => Command::Type(arg),
        "PORT" => Command::Port(arg),
        "PASV" => Command::Pasv,
        "LIST" => Command::List,
        "RETR" => Command::Retr(arg),
        "STOR" => Command::Stor(arg),
        "HELP" if arg.trim().is_empty() => Command::Help(None),
        "HELP" => Command::Help(Some(arg.trim().to_string())),
        "QUIT" => Command::Quit,
        _ => Command::Unknown(verb_upper),
    }
}
