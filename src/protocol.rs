//! The conversation we hold with the Windows Telnet service.
//!
//! Everything here is a sequence of [`Step`]s: wait for the current terminal line to end with a
//! marker, then type a line. The login steps take the session from the connection banner to a
//! shell with a prompt we recognise; the exit-code steps run after the user's command and make
//! the shell print `%errorlevel%` between two sentinels.

use super::relay::Relay;
use super::scanner::ScanError;
use super::transport::Connection;
use super::{Error, ExitStatus};

use std::io;

pub(crate) const LOGIN_PROMPT: &str = "ogin:";
pub(crate) const PASSWORD_PROMPT: &str = "assword:";
pub(crate) const SHELL_PROMPT: &str = ">";
pub(crate) const LOGON_FAILURE: &str = "ogon failure";

/// Installed as the shell prompt right after logging in, so that the end of a command can be told
/// apart from a `>` in its output.
pub(crate) const SYNTHETIC_PROMPT: &str = "WINDOWS4DEPLOYIT ";

pub(crate) const ERRORLEVEL_PREAMBLE: &str = "ERRORLEVEL-PREAMBLE";
pub(crate) const ERRORLEVEL_POSTAMBLE: &str = "ERRORLEVEL-POSTAMBLE";

/// Wait for `expect` (failing on `reject`), then send `send`, if any.
#[derive(Debug)]
struct Step<'a> {
    expect: &'static str,
    reject: Option<&'static str>,
    send: Option<&'a str>,
    /// Keep `send` out of the logs.
    secret: bool,
}

impl<'a> Step<'a> {
    fn expect(expect: &'static str) -> Self {
        Self {
            expect,
            reject: None,
            send: None,
            secret: false,
        }
    }

    fn rejecting(mut self, reject: &'static str) -> Self {
        self.reject = Some(reject);
        self
    }

    fn then_send(mut self, line: &'a str) -> Self {
        self.send = Some(line);
        self
    }

    fn then_send_secret(mut self, line: &'a str) -> Self {
        self.send = Some(line);
        self.secret = true;
        self
    }
}

async fn run(conn: &mut Connection, relay: &mut Relay, steps: &[Step<'_>]) -> Result<(), ScanError> {
    for step in steps {
        conn.scan_until(relay, step.expect, step.reject).await?;
        if let Some(line) = step.send {
            if step.secret {
                tracing::debug!("Sending line ******** after \"{}\"", step.expect);
            } else {
                tracing::debug!("Sending line \"{}\" after \"{}\"", line, step.expect);
            }
            conn.send_line(line).await?;
        }
    }
    Ok(())
}

/// Log in and leave the session sitting at the synthetic prompt.
pub(crate) async fn login(
    conn: &mut Connection,
    relay: &mut Relay,
    username: &str,
    password: &str,
) -> Result<(), ScanError> {
    let set_prompt = format!("PROMPT {}", SYNTHETIC_PROMPT);
    let steps = [
        Step::expect(LOGIN_PROMPT).then_send(username),
        Step::expect(PASSWORD_PROMPT).then_send_secret(password),
        Step::expect(SHELL_PROMPT)
            .rejecting(LOGON_FAILURE)
            .then_send(&set_prompt),
        // the echo of the PROMPT command, then the new prompt itself
        Step::expect(SYNTHETIC_PROMPT),
        Step::expect(SYNTHETIC_PROMPT),
    ];
    run(conn, relay, &steps).await
}

/// Type the user's command line into the shell.
///
/// `logged` is what goes into the log in place of `command_line`.
pub(crate) async fn dispatch(
    conn: &mut Connection,
    command_line: &str,
    logged: &str,
) -> Result<(), ScanError> {
    tracing::debug!("Executing command \"{}\"", logged);
    conn.send_line(command_line).await?;
    Ok(())
}

/// Wait for the command to finish and ask the shell what it exited with.
pub(crate) async fn collect_exit_code(
    conn: &mut Connection,
    relay: &mut Relay,
) -> Result<ExitStatus, ScanError> {
    let probe = format!(
        "ECHO \"{}%errorlevel%{}",
        ERRORLEVEL_PREAMBLE, ERRORLEVEL_POSTAMBLE
    );
    let steps = [
        Step::expect(SYNTHETIC_PROMPT).then_send(&probe),
        // the echo of the ECHO command, then its output
        Step::expect(ERRORLEVEL_POSTAMBLE),
        Step::expect(ERRORLEVEL_POSTAMBLE),
    ];
    run(conn, relay, &steps).await?;

    let line = String::from_utf8_lossy(conn.line());
    match parse_exit_code(&line) {
        Some(code) => {
            tracing::debug!("Remote command exited with code {}", code);
            Ok(ExitStatus::from_code(code))
        }
        None => {
            tracing::error!(
                "Could not determine exit code of remote command from line \"{}\"",
                line
            );
            Ok(ExitStatus::UNDETERMINED)
        }
    }
}

/// The exit code printed between the two sentinels on `line`.
pub(crate) fn parse_exit_code(line: &str) -> Option<i32> {
    let start = line.find(ERRORLEVEL_PREAMBLE)? + ERRORLEVEL_PREAMBLE.len();
    let end = start + line[start..].find(ERRORLEVEL_POSTAMBLE)?;
    line[start..end].parse().ok()
}

impl ScanError {
    /// What the caller gets to see. `command` is the masked command line.
    pub(crate) fn into_error(self, command: &str) -> Error {
        let source = match self {
            ScanError::Rejected(_) => return Error::Authentication,
            ScanError::EscapeSequence => return Error::IncompatibleTerminal,
            ScanError::Eof => io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "the Telnet server closed the connection",
            ),
            ScanError::Io(err) => err,
        };
        Error::Remote {
            command: command.to_owned(),
            source,
        }
    }
}
