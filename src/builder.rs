use super::smb::DEFAULT_CIFS_PORT;
use super::{Error, Session};

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The port the Telnet service listens on unless told otherwise.
pub const DEFAULT_TELNET_PORT: u16 = 23;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Wide enough that the Windows console does not wrap command output.
const DEFAULT_WINDOW_SIZE: (u16, u16) = (299, 25);

const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Build a [`Session`] with options.
#[derive(Clone)]
pub struct SessionBuilder {
    user: Option<String>,
    password: Option<String>,
    port: u16,
    connect_timeout: Duration,
    cifs_port: u16,
    window_size: (u16, u16),
    output_buffer_size: usize,
    path_share_mappings: Vec<(String, String)>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            port: DEFAULT_TELNET_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cifs_port: DEFAULT_CIFS_PORT,
            window_size: DEFAULT_WINDOW_SIZE,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
            path_share_mappings: Vec::new(),
        }
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("cifs_port", &self.cifs_port)
            .field("window_size", &self.window_size)
            .field("output_buffer_size", &self.output_buffer_size)
            .field("path_share_mappings", &self.path_share_mappings)
            .finish()
    }
}

impl SessionBuilder {
    /// Set the user to log in as. A domain account is given as `DOMAIN\user`.
    ///
    /// Must be set, either here or in the destination passed to [`build`](Self::build).
    pub fn user(&mut self, user: String) -> &mut Self {
        self.user = Some(user);
        self
    }

    /// Set the password to log in with.
    ///
    /// Must be set.
    pub fn password(&mut self, password: String) -> &mut Self {
        self.password = Some(password);
        self
    }

    /// Set the port the Telnet service listens on.
    ///
    /// Defaults to `23`.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    /// Set how long to wait for the TCP connection to be established.
    ///
    /// Only connecting is bounded; once connected, the session waits for the remote host for as
    /// long as it takes. Defaults to two minutes.
    pub fn connect_timeout(&mut self, d: Duration) -> &mut Self {
        self.connect_timeout = d;
        self
    }

    /// Set the port the file shares of the host are reached on.
    ///
    /// Defaults to `445`.
    pub fn cifs_port(&mut self, port: u16) -> &mut Self {
        self.cifs_port = port;
        self
    }

    /// Set the terminal size reported to the server.
    ///
    /// The Windows console wraps lines at this width, which can split up the markers the session
    /// waits for. Defaults to 299 columns by 25 rows.
    pub fn window_size(&mut self, width: u16, height: u16) -> &mut Self {
        self.window_size = (width, height);
        self
    }

    /// Set how many bytes of output are buffered for a child's stdout before the session stops
    /// reading from the server.
    ///
    /// The login banner is buffered before the caller gets hold of the stdout handle, so this
    /// should not be made very small. Defaults to 64 KiB.
    pub fn output_buffer_size(&mut self, size: usize) -> &mut Self {
        self.output_buffer_size = size;
        self
    }

    /// Reach the directory `prefix` (such as `C:\deploy`) through the share `share` instead of
    /// the administrative share of its drive.
    ///
    /// When more than one prefix applies to a path, the longest one is used.
    pub fn path_share_mapping(
        &mut self,
        prefix: impl Into<String>,
        share: impl Into<String>,
    ) -> &mut Self {
        self.path_share_mappings.push((prefix.into(), share.into()));
        self
    }

    /// Create a [`Session`] for the host `destination`.
    ///
    /// `destination` may be specified as either `[user@]hostname[:port]` or a URI of the form
    /// `telnet://[user@]hostname[:port]`. A username or port that is specified in the
    /// destination overrides the one set in the builder (but does not change the builder).
    ///
    /// No connection is made here: every command opens a connection of its own.
    pub fn build<S: AsRef<str>>(&self, destination: S) -> Result<Session, Error> {
        let (builder, address) = self.resolve(destination.as_ref());
        builder.session(address)
    }

    fn resolve<'a, 'b>(&'a self, mut destination: &'b str) -> (Cow<'a, Self>, &'b str) {
        let mut user = None;
        let mut port = None;
        if let Some(rest) = destination.strip_prefix("telnet://") {
            destination = rest;
        }
        if let Some(at) = destination.rfind('@') {
            // specified a username -- extract it:
            user = Some(&destination[..at]);
            destination = &destination[(at + 1)..];
        }
        if let Some(colon) = destination.rfind(':') {
            let p = &destination[(colon + 1)..];
            if let Ok(p) = p.parse() {
                // user specified a port -- extract it:
                port = Some(p);
                destination = &destination[..colon];
            }
        }

        if user.is_none() && port.is_none() {
            return (Cow::Borrowed(self), destination);
        }

        let mut with_overrides = self.clone();
        if let Some(user) = user {
            with_overrides.user(user.to_owned());
        }

        if let Some(port) = port {
            with_overrides.port(port);
        }

        (Cow::Owned(with_overrides), destination)
    }

    pub(crate) fn session(&self, address: &str) -> Result<Session, Error> {
        if address.is_empty() {
            return Err(Error::MissingOption("address"));
        }
        let username = self.user.clone().ok_or(Error::MissingOption("username"))?;
        let password = self
            .password
            .clone()
            .ok_or(Error::MissingOption("password"))?;

        Ok(Session {
            address: Arc::from(address),
            port: self.port,
            username: Arc::from(username),
            password: Arc::from(password),
            connect_timeout: self.connect_timeout,
            cifs_port: self.cifs_port,
            window_size: self.window_size,
            output_buffer_size: self.output_buffer_size,
            path_share_mappings: Arc::from(self.path_share_mappings.clone()),
        })
    }
}
