use std::fmt;
use std::io;

/// Errors that occur when interacting with a remote process.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to establish the Telnet connection to the remote host.
    ///
    /// This covers refused connections, unresolvable host names and connection attempts that
    /// exceeded the configured [connect timeout](crate::SessionBuilder::connect_timeout).
    Connect(io::Error),

    /// The remote host rejected the supplied username or password.
    ///
    /// This is kept apart from other failures so that callers can react to it, for example by
    /// asking for new credentials.
    Authentication,

    /// The remote Telnet server emitted a VT100/ANSI escape sequence.
    ///
    /// The Windows Telnet service must be configured to use stream mode
    /// (`tlntadmn config mode=stream`), otherwise its output cannot be scanned reliably.
    IncompatibleTerminal,

    /// The remote command could not be executed.
    ///
    /// This is reported when the connection ends, or fails, while the session is still waiting
    /// for a prompt. `command` is the command line as it appears in logs, so any
    /// [secret arguments](crate::Command::secret_arg) are masked.
    Remote {
        /// The command line that was being executed.
        command: String,
        /// The underlying I/O failure.
        source: io::Error,
    },

    /// The connection to the remote host was severed while waiting for the remote command.
    ///
    /// This is what [`RemoteChild::wait`](crate::RemoteChild::wait) returns after the child was
    /// disconnected through a [`DisconnectHandle`](crate::DisconnectHandle).
    Disconnected,

    /// IO Error when reading/writing from ChildStdin, ChildStdout, ChildStderr.
    ChildIo(io::Error),

    /// A remote path could not be translated into a file-share address.
    InvalidPath {
        /// The path as it was given.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid command that contains a carriage return or line feed.
    InvalidCommand,

    /// A required connection option was not supplied.
    MissingOption(&'static str),

    /// A connection option has a value that cannot be used.
    InvalidOption {
        /// The option name.
        key: String,
        /// The offending value.
        value: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Connect(_) => write!(f, "failed to connect to the remote host"),
            Error::Authentication => write!(f, "the remote host rejected the login"),
            Error::IncompatibleTerminal => write!(
                f,
                "VT100/ANSI escape sequence found in output stream, \
                 configure the Windows Telnet server to use stream mode \
                 (tlntadmn config mode=stream)"
            ),
            Error::Remote { ref command, .. } => {
                write!(f, "the remote command `{}` could not be executed", command)
            }
            Error::Disconnected => write!(f, "the connection was terminated"),
            Error::ChildIo(_) => {
                write!(f, "failure while accessing standard I/O of remote process")
            }
            Error::InvalidPath { ref path, reason } => {
                write!(f, "invalid remote path \"{}\": {}", path, reason)
            }
            Error::InvalidCommand => {
                write!(f, "invalid command: command contains a line break")
            }
            Error::MissingOption(key) => write!(f, "missing connection option `{}`", key),
            Error::InvalidOption { ref key, ref value } => {
                write!(f, "invalid value \"{}\" for connection option `{}`", value, key)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Connect(ref e) | Error::ChildIo(ref e) => Some(e),
            Error::Remote { ref source, .. } => Some(source),

            Error::Authentication
            | Error::IncompatibleTerminal
            | Error::Disconnected
            | Error::InvalidPath { .. }
            | Error::InvalidCommand
            | Error::MissingOption(_)
            | Error::InvalidOption { .. } => None,
        }
    }
}
