//! Scriptable command execution on Windows hosts through the Telnet service.
//!
//! Windows hosts that have the Telnet service enabled, but no SSH or WinRM, can still be automated
//! by doing what a person at a Telnet client would do: wait for the login prompt, type the
//! username and password, wait for the shell prompt and type a command. This crate does exactly
//! that.
//!
//! The library's API is modeled closely after that of [`std::process::Command`]. However, there
//! are some differences.
//!
//! First of all, a [`Session`] does not hold a connection. It is merely the configuration needed
//! to reach one host. Every [`Command`] that is [spawned](Command::spawn) opens a Telnet
//! connection of its own, logs in, runs the command, and closes the connection again once the
//! command has finished. This is the only reliable way to learn the exit code of a command: after
//! the command has finished, the session asks the remote shell for `%errorlevel%` and reads the
//! answer off the terminal.
//!
//! Much like with [`std::process::Command`], you have multiple options when it comes to launching
//! a remote command. You can [spawn](Command::spawn) the remote command, which just gives you a
//! handle to the running process, you can run the command and wait for its
//! [output](Command::output), or you can run it and just extract its [exit
//! status](Command::status). Unlike its `std` counterpart though, these methods on [`Command`] can
//! fail even if the remote command executed successfully, since there is a fallible network
//! separating you from it.
//!
//! # Output
//!
//! A Telnet session is a terminal, not a process. There is one output stream, and it carries
//! everything the terminal shows: the login banner, the echo of every line that is typed, the
//! output of the command (standard output and standard error alike), and the exit code query at
//! the end. [`ChildStdout`] passes all of that on as-is; [`ChildStderr`] is always empty.
//!
//! # Server requirements
//!
//! The Telnet service must be set to stream mode (`tlntadmn config mode=stream`). In console
//! mode the server redraws the screen with VT100 escape sequences, which is reported as
//! [`Error::IncompatibleTerminal`].
//!
//! # Files
//!
//! Files are not transferred over Telnet. Instead, [`Session::smb_url`] gives the `smb://` URL
//! under which a path on the remote host can be reached over its file shares; see [`smb`].
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: connects and disconnects at `INFO`, prompts and option
//! negotiation at `DEBUG`. Passwords and [secret arguments](Command::secret_arg) are never
//! logged.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), wintelnet::Error> {
//! use wintelnet::SessionBuilder;
//!
//! let session = SessionBuilder::default()
//!     .password("s3cret".to_string())
//!     .build("telnet://Administrator@win.example.com")?;
//!
//! let dir = session.raw_command("dir /b C:\\").output().await?;
//! eprintln!("{}", String::from_utf8_lossy(&dir.stdout));
//!
//! let status = session.command("ping").args(["-n", "1", "localhost"]).status().await?;
//! assert!(status.success());
//! # Ok(()) }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links,
    rust_2018_idioms,
    unreachable_pub
)]

mod builder;
pub use builder::{SessionBuilder, DEFAULT_TELNET_PORT};

mod command;
pub use command::Command;

mod child;
pub use child::{DisconnectHandle, ExitStatus, Output, RemoteChild};

mod error;
pub use error::Error;

mod session;
pub use session::Session;

mod stdio;
pub use stdio::{ChildStderr, ChildStdin, ChildStdout};

pub mod smb;

mod escape;
mod protocol;
mod relay;
mod scanner;
mod telnet;
mod transport;
