use tokio::io::{self, AsyncWriteExt, DuplexStream};

use super::ChildStdout;

/// Create a bounded byte pipe holding at most `capacity` unread bytes.
///
/// The [`Relay`] end is written to by the scanner, the [`ChildStdout`] end is handed to the
/// caller. Writes wait while the pipe is full, so a caller that does not read stalls the session.
pub(crate) fn pipe(capacity: usize) -> (Relay, ChildStdout) {
    let (producer, consumer) = io::duplex(capacity.max(1));
    (
        Relay {
            inner: Some(producer),
        },
        ChildStdout::new(consumer),
    )
}

/// Producer end of the output relay.
#[derive(Debug)]
pub(crate) struct Relay {
    inner: Option<DuplexStream>,
}

impl Relay {
    /// Pass one byte of terminal output on to the caller.
    ///
    /// Once the caller has dropped its end, bytes are discarded: the scan carries on regardless
    /// of whether anyone is still listening.
    pub(crate) async fn write(&mut self, byte: u8) {
        if let Some(producer) = self.inner.as_mut() {
            if let Err(e) = producer.write_all(&[byte]).await {
                tracing::trace!("output relay closed by reader: {}", e);
                self.inner = None;
            }
        }
    }

    /// Signal end-of-output to the caller. Safe to call more than once.
    pub(crate) async fn close(&mut self) {
        if let Some(mut producer) = self.inner.take() {
            let _ = producer.shutdown().await;
        }
    }
}
