use super::relay::Relay;
use super::scanner::{ScanError, Scanner};
use super::telnet::{self, Decoded, Frame, Negotiator};

use std::time::Duration;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, BufReader, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Frames queued for the writer task before senders have to wait.
const WRITE_QUEUE: usize = 32;

/// A byte stream a Telnet conversation can be held over.
pub(crate) trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static> Transport for T {}

/// One Telnet connection, good for exactly one remote command.
///
/// Reading is done in place; writing is handed off to a task that owns the write half, so that
/// the caller's stdin, our own command lines, and protocol replies can all be sent while a read
/// is in progress. Dropping the connection closes it.
pub(crate) struct Connection {
    reader: BufReader<ReadHalf<Box<dyn Transport>>>,
    frames: mpsc::Sender<Frame>,
    writer: JoinHandle<io::Result<()>>,
    negotiator: Negotiator,
    scanner: Scanner,
}

impl Connection {
    /// Open a TCP connection to `address:port`, giving up after `timeout`.
    pub(crate) async fn open(
        address: &str,
        port: u16,
        timeout: Duration,
        window: (u16, u16),
    ) -> io::Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((address, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection timed out after {:?}", timeout),
                )
            })??;
        stream.set_nodelay(true)?;
        Self::new(Box::new(stream), window).await
    }

    /// Start talking Telnet over an already established stream.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) async fn new(stream: Box<dyn Transport>, window: (u16, u16)) -> io::Result<Self> {
        let (read, write) = io::split(stream);
        let (frames, rx) = mpsc::channel(WRITE_QUEUE);
        let writer = tokio::spawn(telnet::write_frames(write, rx));

        let mut negotiator = Negotiator::new(window);
        let greeting = negotiator.greeting();
        let conn = Self {
            reader: BufReader::new(read),
            frames,
            writer,
            negotiator,
            scanner: Scanner::new(),
        };
        conn.send(Frame::Command(greeting)).await?;
        Ok(conn)
    }

    /// A handle for sending bytes on this connection from elsewhere.
    pub(crate) fn sender(&self) -> mpsc::Sender<Frame> {
        self.frames.clone()
    }

    async fn send(&self, frame: Frame) -> io::Result<()> {
        self.frames.send(frame).await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "the telnet connection is closed")
        })
    }

    /// Send `line` followed by CRLF.
    pub(crate) async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.send(Frame::Data(data)).await
    }

    /// The next byte of terminal output, or `None` at end-of-stream.
    async fn next_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            let byte = match self.reader.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e),
            };
            match self.negotiator.feed(byte) {
                Some(Decoded::Data(byte)) => return Ok(Some(byte)),
                Some(Decoded::Reply(reply)) => self.send(Frame::Command(reply)).await?,
                None => {}
            }
        }
    }

    /// Read until the current line ends with `expected`, relaying every byte to the caller.
    ///
    /// Fails if the line ends with `reject` first, on `ESC [`, and at end-of-stream: there is no
    /// point in the conversation where the server may legitimately hang up on us.
    pub(crate) async fn scan_until(
        &mut self,
        relay: &mut Relay,
        expected: &str,
        reject: Option<&str>,
    ) -> Result<(), ScanError> {
        loop {
            let byte = self.next_byte().await?.ok_or(ScanError::Eof)?;
            relay.write(byte).await;

            if self.scanner.feed(byte, expected, reject)? {
                tracing::debug!("Expected string \"{}\" found in Telnet output", expected);
                return Ok(());
            }
        }
    }

    /// The terminal line the scanner is currently looking at.
    pub(crate) fn line(&self) -> &[u8] {
        self.scanner.line()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // dropping the task's write half along with our read half closes the stream
        self.writer.abort();
    }
}
