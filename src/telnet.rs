//! Just enough of the Telnet protocol (RFC 854) to hold a conversation with the Windows Telnet
//! service: interpret-as-command bytes are taken out of the data stream, option requests are
//! answered, and outgoing data has its `IAC` bytes doubled.
//!
//! The only option we agree to is NAWS (RFC 1073), since the server lays out its output according
//! to the window size we report. Everything else is refused.

use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

pub(crate) const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Negotiate About Window Size.
const NAWS: u8 = 31;

/// Something to put on the wire.
#[derive(Debug)]
pub(crate) enum Frame {
    /// Terminal data; `IAC` bytes are escaped on the way out.
    Data(Vec<u8>),
    /// A protocol command, written as-is.
    Command(Vec<u8>),
}

/// What one incoming byte turned out to be.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// A byte of terminal output.
    Data(u8),
    /// Protocol traffic that calls for an answer.
    Reply(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// Just passed a CR, which the server may follow with a NUL.
    Cr,
    Iac,
    Verb(u8),
    Sub,
    SubIac,
}

/// Incoming-side protocol state.
#[derive(Debug)]
pub(crate) struct Negotiator {
    state: State,
    width: u16,
    height: u16,
    naws_requested: bool,
    naws_enabled: bool,
}

impl Negotiator {
    pub(crate) fn new((width, height): (u16, u16)) -> Self {
        Self {
            state: State::Data,
            width,
            height,
            naws_requested: false,
            naws_enabled: false,
        }
    }

    /// The commands to send as soon as the connection is up.
    pub(crate) fn greeting(&mut self) -> Vec<u8> {
        self.naws_requested = true;
        vec![IAC, WILL, NAWS]
    }

    /// Run one byte from the wire through the protocol.
    ///
    /// Returns `None` for bytes that are pure protocol and need no answer.
    pub(crate) fn feed(&mut self, byte: u8) -> Option<Decoded> {
        match self.state {
            State::Cr if byte == 0 => {
                self.state = State::Data;
                None
            }
            State::Data | State::Cr => match byte {
                IAC => {
                    self.state = State::Iac;
                    None
                }
                b'\r' => {
                    self.state = State::Cr;
                    Some(Decoded::Data(byte))
                }
                _ => {
                    self.state = State::Data;
                    Some(Decoded::Data(byte))
                }
            },
            State::Iac => {
                self.state = State::Data;
                match byte {
                    IAC => Some(Decoded::Data(IAC)),
                    WILL | WONT | DO | DONT => {
                        self.state = State::Verb(byte);
                        None
                    }
                    SB => {
                        self.state = State::Sub;
                        None
                    }
                    // NOP, GA, AYT and friends carry nothing for us
                    _ => None,
                }
            }
            State::Verb(verb) => {
                self.state = State::Data;
                self.negotiate(verb, byte).map(Decoded::Reply)
            }
            State::Sub => {
                if byte == IAC {
                    self.state = State::SubIac;
                }
                None
            }
            State::SubIac => {
                self.state = if byte == SE { State::Data } else { State::Sub };
                None
            }
        }
    }

    fn negotiate(&mut self, verb: u8, option: u8) -> Option<Vec<u8>> {
        tracing::debug!("telnet option negotiation: {} {}", verb_name(verb), option);
        match (verb, option) {
            (DO, NAWS) => {
                let mut reply = Vec::new();
                if !self.naws_enabled && !self.naws_requested {
                    reply.extend_from_slice(&[IAC, WILL, NAWS]);
                }
                self.naws_requested = false;
                self.naws_enabled = true;
                reply.extend(self.window_size());
                Some(reply)
            }
            (DONT, NAWS) => {
                let was_enabled = self.naws_enabled;
                self.naws_requested = false;
                self.naws_enabled = false;
                if was_enabled {
                    Some(vec![IAC, WONT, NAWS])
                } else {
                    None
                }
            }
            (DO, _) => Some(vec![IAC, WONT, option]),
            (WILL, _) => Some(vec![IAC, DONT, option]),
            _ => None,
        }
    }

    fn window_size(&self) -> Vec<u8> {
        let mut sub = vec![IAC, SB, NAWS];
        for b in self
            .width
            .to_be_bytes()
            .into_iter()
            .chain(self.height.to_be_bytes())
        {
            sub.push(b);
            if b == IAC {
                sub.push(IAC);
            }
        }
        sub.extend_from_slice(&[IAC, SE]);
        sub
    }
}

fn verb_name(verb: u8) -> &'static str {
    match verb {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        _ => "?",
    }
}

/// Double every `IAC` so the server reads it as data.
pub(crate) fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Drain `frames` onto `writer` until every sender is gone.
pub(crate) async fn write_frames<W>(mut writer: W, mut frames: mpsc::Receiver<Frame>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        match frame {
            Frame::Data(data) => writer.write_all(&escape(&data)).await?,
            Frame::Command(cmd) => writer.write_all(&cmd).await?,
        }
        writer.flush().await?;
    }
    writer.shutdown().await
}
