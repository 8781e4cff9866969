use super::telnet::Frame;
use super::Error;

use core::pin::Pin;
use core::task::{ready, Context, Poll};

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

fn connection_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "the telnet connection is closed")
}

/// Input for the remote child.
///
/// Bytes written here are typed into the remote shell as-is, so a program reading its standard
/// input sees them, and the shell echoes them back on [`ChildStdout`].
#[derive(Debug)]
pub struct ChildStdin {
    inner: PollSender<Frame>,
}

impl ChildStdin {
    pub(crate) fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self {
            inner: PollSender::new(sender),
        }
    }
}

impl AsyncWrite for ChildStdin {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        let this = self.get_mut();
        ready!(this.inner.poll_reserve(cx)).map_err(|_| connection_closed())?;
        this.inner
            .send_item(Frame::Data(buf.to_vec()))
            .map_err(|_| connection_closed())?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        // frames are flushed by the writer task as soon as it picks them up
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        self.get_mut().inner.close();
        Poll::Ready(Ok(()))
    }
}

/// The live terminal output of the remote child.
///
/// This is everything the Telnet server prints, byte for byte: the login banner, the echo of the
/// command, the command's output and the exit-code probe. It reaches end-of-file once the
/// connection is torn down.
#[derive(Debug)]
pub struct ChildStdout(DuplexStream);

impl ChildStdout {
    pub(crate) fn new(pipe: DuplexStream) -> Self {
        Self(pipe)
    }

    pub(crate) async fn read_all(&mut self, output: &mut Vec<u8>) -> Result<(), Error> {
        AsyncReadExt::read_to_end(self, output)
            .await
            .map_err(Error::ChildIo)?;
        Ok(())
    }
}

impl AsyncRead for ChildStdout {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

/// Error output of the remote child.
///
/// A Telnet session has a single output channel, so anything the command writes to its standard
/// error shows up on [`ChildStdout`] instead. This stream is always empty.
#[derive(Debug, Default)]
pub struct ChildStderr(());

impl ChildStderr {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

impl AsyncRead for ChildStderr {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}
