#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use wintelnet::{Session, SessionBuilder};

pub const USER: &str = "admin";
pub const PASSWORD: &str = "s3cret";

pub const SET_PROMPT: &str = "PROMPT WINDOWS4DEPLOYIT ";
pub const PROMPT: &str = "WINDOWS4DEPLOYIT ";
pub const PROBE: &str = "ECHO \"ERRORLEVEL-PREAMBLE%errorlevel%ERRORLEVEL-POSTAMBLE";

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;

/// Initialize the global tracing subscriber once (shows up with `RUST_LOG`).
pub fn init_tracing_from_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer();
        let _ = subscriber.try_init();
    });
}

/// Log lines written by a subscriber installed with [`capture_logs`].
#[derive(Clone, Debug, Default)]
pub struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Record `INFO` events of the current thread until the guard is dropped.
///
/// Only sees tasks polled on this thread, so use it from a current-thread runtime.
pub fn capture_logs() -> (Logs, tracing::subscriber::DefaultGuard) {
    let logs = Logs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// A session for [`USER`] on a host listening on `port` of the loopback interface.
pub fn session(port: u16) -> Session {
    let mut builder = SessionBuilder::default();
    builder
        .user(USER.to_string())
        .password(PASSWORD.to_string())
        .port(port)
        .connect_timeout(Duration::from_secs(5));
    builder.build("127.0.0.1").unwrap()
}

/// Accept a single Telnet client and play `script` against it.
///
/// Await the returned handle at the end of the test so that failed assertions in the script are
/// noticed.
pub async fn serve<F, Fut>(script: F) -> (Session, JoinHandle<()>)
where
    F: FnOnce(Peer) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    init_tracing_from_env();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(Peer::from(stream)).await;
    });
    (session(port), server)
}

/// The server side of a fake Windows Telnet service.
#[derive(Debug)]
pub struct Peer(BufReader<TcpStream>);

impl From<TcpStream> for Peer {
    fn from(stream: TcpStream) -> Self {
        Self(BufReader::new(stream))
    }
}

impl Peer {
    /// Show `text` on the client's terminal.
    pub async fn send(&mut self, text: &[u8]) {
        self.0.write_all(text).await.unwrap();
        self.0.flush().await.unwrap();
    }

    async fn data_byte(&mut self) -> Option<u8> {
        loop {
            let byte = self.0.read_u8().await.ok()?;
            if byte != IAC {
                return Some(byte);
            }
            match self.0.read_u8().await.ok()? {
                IAC => return Some(IAC),
                SB => {
                    let mut last = 0;
                    loop {
                        let b = self.0.read_u8().await.ok()?;
                        if last == IAC && b == SE {
                            break;
                        }
                        last = b;
                    }
                }
                // WILL, WONT, DO, DONT carry an option byte
                251..=254 => {
                    self.0.read_u8().await.ok()?;
                }
                _ => {}
            }
        }
    }

    /// The next line the client typed, without Telnet commands and without the CRLF.
    pub async fn read_line(&mut self) -> String {
        let mut line = Vec::new();
        loop {
            match self.data_byte().await {
                Some(b'\n') if line.last() == Some(&b'\r') => {
                    line.pop();
                    return String::from_utf8(line).unwrap();
                }
                Some(b) => line.push(b),
                None => panic!("client hung up after {:?}", String::from_utf8_lossy(&line)),
            }
        }
    }

    /// Take bytes off the wire as they are, Telnet commands included.
    pub async fn read_raw(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.0.read_exact(&mut buf).await.unwrap();
        buf
    }

    /// Ask for the username and password, and check that the client sends the right ones.
    pub async fn credentials(&mut self) {
        self.send(b"Welcome to Microsoft Telnet Service \r\n\r\nlogin: ")
            .await;
        assert_eq!(self.read_line().await, USER);
        self.send(format!("{}\r\npassword: ", USER).as_bytes()).await;
        assert_eq!(self.read_line().await, PASSWORD);
    }

    /// Go through the login dialog of the Windows Telnet service, up to the command line the
    /// client sends, which is returned.
    pub async fn login(&mut self) -> String {
        self.credentials().await;
        self.send(
            b"\r\n*===============================================================\r\n\
              Welcome to Microsoft Telnet Server.\r\n\
              *===============================================================\r\n\
              C:\\Users\\admin>",
        )
        .await;
        assert_eq!(self.read_line().await, SET_PROMPT);
        self.send(format!("{}\r\n\r\n{}", SET_PROMPT, PROMPT).as_bytes())
            .await;
        self.read_line().await
    }

    /// Echo `command`, print `output`, and answer the exit code query with `errorlevel`.
    pub async fn run(&mut self, command: &str, output: &str, errorlevel: &str) {
        let answer = format!("\"ERRORLEVEL-PREAMBLE{}ERRORLEVEL-POSTAMBLE", errorlevel);
        self.run_answering(command, output, &answer).await
    }

    /// Like [`Peer::run`], but print `answer` as the line the exit code query produced.
    pub async fn run_answering(&mut self, command: &str, output: &str, answer: &str) {
        self.send(format!("{}\r\n{}\r\n{}", command, output, PROMPT).as_bytes())
            .await;
        assert_eq!(self.read_line().await, PROBE);
        self.send(format!("{}\r\n{}\r\n\r\n{}", PROBE, answer, PROMPT).as_bytes())
            .await;
    }

    /// Wait for the client to hang up, returning whatever it still sent.
    pub async fn expect_close(&mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        match self.0.read_to_end(&mut rest).await {
            Ok(_) => {}
            // closing with unread output pending resets the connection
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {}
            Err(e) => panic!("reading until hang-up failed: {}", e),
        }
        rest
    }
}
