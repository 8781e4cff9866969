use super::{ChildStderr, ChildStdin, ChildStdout, Error, Session};

use std::fmt;

use tokio::task::{AbortHandle, JoinError, JoinHandle};

/// The exit status of a remote command.
///
/// Windows reports exit codes as signed 32-bit integers. Since the code is scraped from terminal
/// output, it may be impossible to tell what it was; such a status is
/// [`UNDETERMINED`](ExitStatus::UNDETERMINED).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    /// The exit code of the remote command could not be determined.
    pub const UNDETERMINED: ExitStatus = ExitStatus(-999_999);

    pub(crate) fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// The exit code of the remote command, or `None` if it could not be determined.
    pub fn code(&self) -> Option<i32> {
        if *self == Self::UNDETERMINED {
            None
        } else {
            Some(self.0)
        }
    }

    /// The raw exit code, with [`UNDETERMINED`](ExitStatus::UNDETERMINED) showing up as
    /// `-999999`.
    pub fn raw(&self) -> i32 {
        self.0
    }

    /// Was the exit code known to be zero?
    pub fn success(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "exit code: {}", code),
            None => write!(f, "exit code undetermined"),
        }
    }
}

/// The output of a finished remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// The exit status of the command.
    pub status: ExitStatus,
    /// Everything the Telnet session printed while the command ran.
    pub stdout: Vec<u8>,
    /// Always empty; see [`ChildStderr`].
    pub stderr: Vec<u8>,
}

/// Representation of a running or exited remote child process.
///
/// A remote child process is created via the [`Command`](crate::Command) struct through
/// [`Session::command`]. Each child has a Telnet connection of its own, which is closed once the
/// exit code of the command has been collected.
///
/// Calling [`wait`](RemoteChild::wait) (or other functions that wrap around it) will make the
/// caller wait until the remote shell prompt has come back and the exit code has been read.
///
/// `RemoteChild` implements [`Drop`], and closes the Telnet connection when it goes out of scope.
/// Note that this does _not_ terminate the remote process. Windows usually ends the processes of
/// a Telnet session when the session goes away, but that is up to the server.
///
/// `RemoteChild` exposes [`stdin`](RemoteChild::stdin), [`stdout`](RemoteChild::stdout), and
/// [`stderr`](RemoteChild::stderr) as methods. Callers can call `.take()` to get the same effect
/// as a split borrow and use multiple streams concurrently.
///
/// ```rust,no_run
/// # async fn foo(mut child: wintelnet::RemoteChild<'_>) {
/// use tokio::io::AsyncWriteExt;
///
/// let mut stdin = child.stdin().take().unwrap();
/// stdin.write_all(b"y\r\n").await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct RemoteChild<'s> {
    session: &'s Session,
    worker: JoinHandle<Result<ExitStatus, Error>>,

    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl<'s> RemoteChild<'s> {
    pub(crate) fn new(
        session: &'s Session,
        worker: JoinHandle<Result<ExitStatus, Error>>,
        stdin: ChildStdin,
        stdout: ChildStdout,
    ) -> Self {
        Self {
            session,
            worker,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(ChildStderr::new()),
        }
    }

    /// Access the session that this remote process was spawned from.
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Close the Telnet connection of this child.
    ///
    /// A stdout handle taken from this child reaches end-of-file. To disconnect while waiting,
    /// use a [`DisconnectHandle`].
    pub async fn disconnect(mut self) {
        if self.worker.is_finished() {
            return;
        }
        self.worker.abort();
        let _ = (&mut self.worker).await;
        tracing::info!("Disconnected from {}", self.session);
    }

    /// A handle that can disconnect this child from elsewhere, for example while another task is
    /// waiting for it.
    pub fn disconnect_handle(&self) -> DisconnectHandle {
        DisconnectHandle(self.worker.abort_handle())
    }

    /// Waits for the remote command to finish, returning the status that it exited with.
    ///
    /// The stdin handle to the child process, if any, will be closed before waiting. So will the
    /// stdout handle: output that nobody reads would otherwise hold up the session.
    pub async fn wait(mut self) -> Result<ExitStatus, Error> {
        self.stdin.take();
        self.stdout.take();
        join(&mut self.worker).await
    }

    /// Simultaneously waits for the remote command to finish and collects all remaining output
    /// on the stdout handle, returning an [`Output`] instance.
    ///
    /// The stdin handle to the child process, if any, will be closed before waiting.
    ///
    /// Only output that has not already been read through [`stdout`](RemoteChild::stdout) is
    /// collected, and none at all if the handle was taken.
    pub async fn wait_with_output(mut self) -> Result<Output, Error> {
        self.stdin.take();
        let child_stdout = self.stdout.take();

        let read_stdout = async move {
            let mut stdout = Vec::new();
            if let Some(mut child_stdout) = child_stdout {
                child_stdout.read_all(&mut stdout).await?;
            }
            Ok::<_, Error>(stdout)
        };
        let (status, stdout) = tokio::try_join!(join(&mut self.worker), read_stdout)?;

        Ok(Output {
            status,
            stdout,
            stderr: Vec::new(),
        })
    }

    /// Access the handle for writing to the remote child's standard input (stdin).
    pub fn stdin(&mut self) -> &mut Option<ChildStdin> {
        &mut self.stdin
    }

    /// Access the handle for reading from the remote child's standard output (stdout).
    pub fn stdout(&mut self) -> &mut Option<ChildStdout> {
        &mut self.stdout
    }

    /// Access the handle for reading from the remote child's standard error (stderr).
    pub fn stderr(&mut self) -> &mut Option<ChildStderr> {
        &mut self.stderr
    }
}

async fn join(worker: &mut JoinHandle<Result<ExitStatus, Error>>) -> Result<ExitStatus, Error> {
    worker.await.unwrap_or_else(|err: JoinError| {
        if err.is_panic() {
            std::panic::resume_unwind(err.into_panic())
        }
        Err(Error::Disconnected)
    })
}

impl Drop for RemoteChild<'_> {
    fn drop(&mut self) {
        // this closes the connection, but does not kill the remote process
        self.worker.abort();
    }
}

/// Disconnects a [`RemoteChild`] without access to the child itself.
#[derive(Debug)]
pub struct DisconnectHandle(AbortHandle);

impl DisconnectHandle {
    /// Close the Telnet connection of the child. Calling this more than once, or after the child
    /// has finished, does nothing.
    pub fn disconnect(&self) {
        self.0.abort();
    }
}
