use super::escape::escape;
use super::smb::{self, SmbTarget};
use super::{Command, Error, SessionBuilder};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to run commands on one Windows host over Telnet.
///
/// You can use [`command`](Session::command) to start a new command on the host.
///
/// A `Session` does not hold a connection. Each command logs in on a Telnet connection of its own,
/// which is closed again once the command has finished; this is the only way to learn the exit
/// code of a command run through the Windows Telnet service. Sessions are cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub(crate) address: Arc<str>,
    pub(crate) port: u16,
    pub(crate) username: Arc<str>,
    pub(crate) password: Arc<str>,
    pub(crate) connect_timeout: Duration,
    pub(crate) cifs_port: u16,
    pub(crate) window_size: (u16, u16),
    pub(crate) output_buffer_size: usize,
    pub(crate) path_share_mappings: Arc<[(String, String)]>,
}

fn required<'o>(options: &'o HashMap<String, String>, key: &'static str) -> Result<&'o str, Error> {
    options
        .get(key)
        .map(String::as_str)
        .ok_or(Error::MissingOption(key))
}

fn parsed<T: FromStr>(options: &HashMap<String, String>, key: &str) -> Result<Option<T>, Error> {
    options
        .get(key)
        .map(|value| {
            value.parse().map_err(|_| Error::InvalidOption {
                key: key.to_owned(),
                value: value.clone(),
            })
        })
        .transpose()
}

impl Session {
    /// Create a session from connection options given as key/value pairs.
    ///
    /// The keys are `address`, `username` and `password`, which are required, and `port`,
    /// `connectionTimeoutMillis` and `cifsPort`, which default as on [`SessionBuilder`].
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self, Error> {
        let address = required(options, "address")?;

        let mut builder = SessionBuilder::default();
        builder
            .user(required(options, "username")?.to_owned())
            .password(required(options, "password")?.to_owned());
        if let Some(port) = parsed(options, "port")? {
            builder.port(port);
        }
        if let Some(millis) = parsed(options, "connectionTimeoutMillis")? {
            builder.connect_timeout(Duration::from_millis(millis));
        }
        if let Some(port) = parsed(options, "cifsPort")? {
            builder.cifs_port(port);
        }

        builder.session(address)
    }

    /// The host name or IP address of the remote host.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The port of the Telnet service.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The user commands are run as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Constructs a new [`Command`] for launching the program at path `program` on the remote
    /// host.
    ///
    /// Before it is passed to the remote host, `program` is quoted so that special characters
    /// aren't evaluated by `cmd.exe`. If you do not want this behavior, use
    /// [`raw_command`](Session::raw_command).
    ///
    /// The returned `Command` is a builder, with no arguments to the program. Builder methods
    /// are provided to add them.
    ///
    /// If `program` is not an absolute path, the `PATH` of the remote user is searched.
    pub fn command<'a, S: Into<Cow<'a, str>>>(&self, program: S) -> Command<'_> {
        self.raw_command(&*escape(&program.into()))
    }

    /// Constructs a new [`Command`] for launching the program at path `program` on the remote
    /// host.
    ///
    /// Unlike [`command`](Session::command), this method does not quote `program`, so it may be
    /// evaluated by `cmd.exe`. This is what makes built-in commands with arguments work, such as
    /// `raw_command("dir /b")`, as well as pipes and redirections.
    pub fn raw_command<'a, S: Into<Cow<'a, str>>>(&self, program: S) -> Command<'_> {
        Command::new(self, program.into().into_owned())
    }

    /// The `smb://` URL under which the file at the Windows path `path` on the remote host can be
    /// reached, credentials included.
    ///
    /// See [`smb::encode_smb_url`].
    pub fn smb_url(&self, path: &str) -> Result<String, Error> {
        smb::encode_smb_url(
            path,
            &SmbTarget {
                username: &self.username,
                password: &self.password,
                address: &self.address,
                port: self.cifs_port,
                share_mappings: &self.path_share_mappings,
            },
        )
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cifs_telnet://{}@{}", self.username, self.address)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .field("cifs_port", &self.cifs_port)
            .finish_non_exhaustive()
    }
}
