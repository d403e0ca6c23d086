//! Command tokens sent by clients.

use std::fmt;

/// Token that starts a publish exchange.
pub const PUBLISH: &str = "PUBLISH";

/// Token that starts a consume exchange.
pub const CONSUME: &str = "CONSUME";

/// A command line received while the connection awaits a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Store one message under a topic.
    Publish,
    /// Read every message stored under a topic.
    Consume,
    /// Anything else, kept verbatim for the error reply.
    Unknown(String),
}

impl Command {
    /// Parse a command line.
    ///
    /// Matching is exact and case-sensitive; the empty line is an unknown
    /// command.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        match line {
            PUBLISH => Command::Publish,
            CONSUME => Command::Consume,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Get the wire token for this command.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Command::Publish => PUBLISH,
            Command::Consume => CONSUME,
            Command::Unknown(token) => token,
        }
    }

    /// Short label used for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Publish => "publish",
            Command::Consume => "consume",
            Command::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
