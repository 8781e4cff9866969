use super::escape::escape;
use super::protocol;
use super::relay::{self, Relay};
use super::transport::Connection;
use super::{ChildStdin, Error, ExitStatus, Output, RemoteChild, Session};

use std::fmt;

/// What secret arguments look like in logs and error messages.
const MASK: &str = "********";

enum Arg {
    Plain(String),
    Secret(String),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Plain(arg) => fmt::Debug::fmt(arg, f),
            Arg::Secret(_) => f.write_str(MASK),
        }
    }
}

/// A remote process builder, providing fine-grained control over how a new remote process should
/// be spawned.
///
/// A default configuration can be generated using [`Session::command(program)`](Session::command),
/// where `program` gives a path to the program to be executed. Additional builder methods allow
/// the configuration to be changed (for example, by adding arguments) prior to spawning.
///
/// `Command` can be reused to spawn multiple remote processes. Each of them runs on a Telnet
/// connection of its own.
///
/// # Command line
///
/// The program and its arguments are joined with spaces into a single line, which is typed into
/// `cmd.exe` on the remote host. Arguments added with [`arg`](Command::arg) are quoted for
/// `cmd.exe`, but `%VARIABLE%` references are expanded by the remote shell regardless. A command
/// line may not contain line breaks, since everything after one would run as a command of its own.
///
/// # Exit status
///
/// The Telnet service has no notion of an exit status. Once the command has finished, the session
/// asks the shell for `%errorlevel%` and reads the answer back from the terminal. If that fails
/// the child exits with [`ExitStatus::UNDETERMINED`].
#[derive(Debug)]
pub struct Command<'s> {
    session: &'s Session,
    program: String,
    args: Vec<Arg>,
}

impl<'s> Command<'s> {
    pub(crate) fn new(session: &'s Session, program: String) -> Self {
        Self {
            session,
            program,
            args: Vec::new(),
        }
    }

    /// Adds an argument to pass to the remote program.
    ///
    /// Before it is passed to the remote host, `arg` is quoted so that special characters aren't
    /// evaluated by `cmd.exe`. If you do not want this behavior, use
    /// [`raw_arg`](Command::raw_arg).
    ///
    /// Only one argument can be passed per use. So instead of:
    ///
    /// ```no_run
    /// # fn foo(c: &mut wintelnet::Command<'_>) { c
    /// .arg("/C C:\\Temp")
    /// # ; }
    /// ```
    ///
    /// usage would be:
    ///
    /// ```no_run
    /// # fn foo(c: &mut wintelnet::Command<'_>) { c
    /// .arg("/C")
    /// .arg("C:\\Temp")
    /// # ; }
    /// ```
    ///
    /// To pass multiple arguments see [`args`](Command::args).
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.raw_arg(escape(arg.as_ref()))
    }

    /// Adds an argument to pass to the remote program.
    ///
    /// Unlike [`arg`](Command::arg), this method does not quote `arg`, so `cmd.exe` may interpret
    /// characters such as spaces, `&` and `>`.
    ///
    /// To pass multiple unquoted arguments see [`raw_args`](Command::raw_args).
    pub fn raw_arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(Arg::Plain(arg.as_ref().to_owned()));
        self
    }

    /// Adds multiple arguments to pass to the remote program.
    ///
    /// Before they are passed to the remote host, each argument in `args` is quoted so that
    /// special characters aren't evaluated by `cmd.exe`. If you do not want this behavior,
    /// use [`raw_args`](Command::raw_args).
    ///
    /// To pass a single argument see [`arg`](Command::arg).
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Adds multiple arguments to pass to the remote program.
    ///
    /// Unlike [`args`](Command::args), this method does not quote `args`.
    ///
    /// To pass a single argument see [`raw_arg`](Command::raw_arg).
    pub fn raw_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.raw_arg(arg);
        }
        self
    }

    /// Adds an argument that must not show up in logs, such as a password.
    ///
    /// The argument is quoted like with [`arg`](Command::arg). Wherever the command line is logged
    /// or reported in an [`Error`], it is replaced by `********`.
    pub fn secret_arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(Arg::Secret(escape(arg.as_ref())));
        self
    }

    /// The command line as typed into the remote shell, or as logged if `for_logging` is set.
    pub(crate) fn to_command_line(&self, for_logging: bool) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            match arg {
                Arg::Plain(arg) => line.push_str(arg),
                Arg::Secret(_) if for_logging => line.push_str(MASK),
                Arg::Secret(arg) => line.push_str(arg),
            }
        }
        line
    }

    /// Executes the remote command without waiting for it, returning a handle to it instead.
    ///
    /// This returns once the session has logged in and typed the command line, so failures to
    /// connect or to log in are reported here. Everything the session prints from the login
    /// banner on is available from the child's stdout.
    pub async fn spawn(&mut self) -> Result<RemoteChild<'s>, Error> {
        let command_line = self.to_command_line(false);
        if command_line.contains(|c: char| c == '\r' || c == '\n') {
            return Err(Error::InvalidCommand);
        }
        let logged = self.to_command_line(true);
        let session = self.session;

        tracing::info!("Connecting to {}", session);
        let mut conn = Connection::open(
            session.address(),
            session.port(),
            session.connect_timeout,
            session.window_size,
        )
        .await
        .map_err(Error::Connect)?;
        tracing::info!("Connected to {}", session);

        let (mut relay, stdout) = relay::pipe(session.output_buffer_size);
        let started = async {
            protocol::login(&mut conn, &mut relay, session.username(), &session.password).await?;
            protocol::dispatch(&mut conn, &command_line, &logged).await
        }
        .await;
        if let Err(err) = started {
            drop(conn);
            tracing::info!("Disconnected from {}", session);
            return Err(err.into_error(&logged));
        }

        let stdin = ChildStdin::new(conn.sender());
        let worker = tokio::spawn(finish(conn, relay, logged, session.to_string()));

        Ok(RemoteChild::new(session, worker, stdin, stdout))
    }

    /// Executes the remote command, waiting for it to finish and collecting all of its output.
    ///
    /// Since the Telnet session has a single output channel, the output includes the login
    /// banner, the echo of the command line and the exit-code query; stderr is always empty.
    pub async fn output(&mut self) -> Result<Output, Error> {
        self.spawn().await?.wait_with_output().await
    }

    /// Executes the remote command, waiting for it to finish and collecting its exit status.
    ///
    /// Output of the command is discarded.
    pub async fn status(&mut self) -> Result<ExitStatus, Error> {
        self.spawn().await?.wait().await
    }
}

/// Runs in a task of its own for as long as the child is alive.
async fn finish(
    mut conn: Connection,
    mut relay: Relay,
    logged: String,
    peer: String,
) -> Result<ExitStatus, Error> {
    let status = protocol::collect_exit_code(&mut conn, &mut relay).await;
    relay.close().await;
    drop(conn);
    tracing::info!("Disconnected from {}", peer);
    status.map_err(|err| err.into_error(&logged))
}
