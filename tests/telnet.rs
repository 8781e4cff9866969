use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use wintelnet::*;

mod common;
use common::*;

#[tokio::test]
async fn runs_command_and_collects_output() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        assert_eq!(command, r#"echo "hello world""#);
        peer.run(&command, "hello world", "0").await;
        peer.expect_close().await;
    })
    .await;

    let output = session
        .command("echo")
        .arg("hello world")
        .output()
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(output.status.success());
    assert!(output.stderr.is_empty());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Welcome to Microsoft Telnet Service"));
    assert!(stdout.contains("\r\nhello world\r\n"));
    assert!(stdout.ends_with("\"ERRORLEVEL-PREAMBLE0ERRORLEVEL-POSTAMBLE"));
}

#[tokio::test]
async fn reports_non_zero_exit_code() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        assert_eq!(command, r"dir C:\missing");
        peer.run(&command, "File Not Found", "1").await;
        peer.expect_close().await;
    })
    .await;

    let status = session.raw_command(r"dir C:\missing").status().await.unwrap();
    server.await.unwrap();

    assert_eq!(status.code(), Some(1));
    assert!(!status.success());
}

#[tokio::test]
async fn reports_negative_exit_code() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.run(&command, "", "-1073741510").await;
        peer.expect_close().await;
    })
    .await;

    let status = session.command("crash.exe").status().await.unwrap();
    server.await.unwrap();

    assert_eq!(status.code(), Some(-1073741510));
}

#[tokio::test]
async fn garbled_exit_code_keeps_output() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.run(&command, "still here", "%errorlevel%").await;
        peer.expect_close().await;
    })
    .await;

    let output = session.command("whoami").output().await.unwrap();
    server.await.unwrap();

    assert_eq!(output.status, ExitStatus::UNDETERMINED);
    assert_eq!(output.status.code(), None);
    assert!(String::from_utf8_lossy(&output.stdout).contains("\r\nstill here\r\n"));
}

#[tokio::test]
async fn exit_code_without_preamble_keeps_output() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.run_answering(&command, "done", "0ERRORLEVEL-POSTAMBLE")
            .await;
        peer.expect_close().await;
    })
    .await;

    let output = session.command("hostname").output().await.unwrap();
    server.await.unwrap();

    assert_eq!(output.status, ExitStatus::UNDETERMINED);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\r\ndone\r\n"));
    assert!(stdout.ends_with("\r\n0ERRORLEVEL-POSTAMBLE"));
}

#[tokio::test]
async fn logon_failure() {
    let (session, server) = serve(|mut peer| async move {
        peer.credentials().await;
        peer.send(
            b"\r\nThe handle is invalid.\r\n\r\n\
              Logon failure: unknown user name or bad password.\r\n\r\nlogin: ",
        )
        .await;
        peer.expect_close().await;
    })
    .await;

    let err = session.command("dir").status().await.unwrap_err();
    server.await.unwrap();

    assert_matches!(err, Error::Authentication);
}

#[tokio::test]
async fn console_mode_server_is_incompatible() {
    let (session, server) = serve(|mut peer| async move {
        peer.send(b"\x1b[1;1H\x1b[2JWelcome to Microsoft Telnet Service")
            .await;
        peer.expect_close().await;
    })
    .await;

    let err = session.command("dir").status().await.unwrap_err();
    server.await.unwrap();

    assert_matches!(err, Error::IncompatibleTerminal);
}

#[tokio::test]
async fn hang_up_during_login_names_the_command() {
    let (session, server) = serve(|mut peer| async move {
        peer.send(b"Welcome to Microsoft Telnet Service \r\n").await;
    })
    .await;

    let err = session
        .command("net")
        .args(["user", "deployer"])
        .secret_arg("hunter2")
        .status()
        .await
        .unwrap_err();
    server.await.unwrap();

    assert_matches!(
        &err,
        Error::Remote { command, .. } if command == "net user deployer ********"
    );
    assert!(!err.to_string().contains("hunter2"));
}

#[tokio::test]
async fn connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = session(port).command("dir").status().await.unwrap_err();
    assert_matches!(err, Error::Connect(_));
}

#[tokio::test]
async fn answers_option_negotiation() {
    let (session, server) = serve(|mut peer| async move {
        assert_eq!(peer.read_raw(3).await, [255, 251, 31]); // WILL NAWS

        // DO NAWS, WILL ECHO, DO TERMINAL-TYPE
        peer.send(&[255, 253, 31, 255, 251, 1, 255, 253, 24]).await;
        assert_eq!(
            peer.read_raw(15).await,
            [
                255, 250, 31, 0x01, 0x2B, 0x00, 0x19, 255, 240, // 299x25
                255, 254, 1, // DONT ECHO
                255, 252, 24, // WONT TERMINAL-TYPE
            ]
        );

        let command = peer.login().await;
        peer.run(&command, "", "0").await;
        peer.expect_close().await;
    })
    .await;

    let status = session.command("ver").status().await.unwrap();
    server.await.unwrap();

    assert!(status.success());
}

#[tokio::test]
async fn stdin_reaches_the_remote_shell() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        assert_eq!(command, "set /p ANSWER=Continue? ");
        assert_eq!(peer.read_line().await, "y");
        peer.run(&command, "y", "0").await;
        peer.expect_close().await;
    })
    .await;

    let mut child = session
        .raw_command("set /p ANSWER=Continue? ")
        .spawn()
        .await
        .unwrap();
    let mut stdin = child.stdin().take().unwrap();
    stdin.write_all(b"y\r\n").await.unwrap();

    let output = child.wait_with_output().await.unwrap();
    server.await.unwrap();

    assert!(output.status.success());
}

#[tokio::test]
async fn stdout_is_live() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.send(format!("{}\r\nfirst\r\n", command).as_bytes())
            .await;
        // the client shows "first" before the command is done
        assert_eq!(peer.read_line().await, "ack");
        peer.run("", "second", "0").await;
        peer.expect_close().await;
    })
    .await;

    let mut child = session
        .command("type")
        .arg(r"C:\notes.txt")
        .spawn()
        .await
        .unwrap();
    let mut stdout = child.stdout().take().unwrap();

    let mut seen = Vec::new();
    while !String::from_utf8_lossy(&seen).contains("first\r\n") {
        let mut buf = [0u8; 256];
        let n = stdout.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "stdout ended early");
        seen.extend_from_slice(&buf[..n]);
    }
    child
        .stdin()
        .as_mut()
        .unwrap()
        .write_all(b"ack\r\n")
        .await
        .unwrap();

    let (status, rest) = tokio::join!(child.wait(), async move {
        let mut rest = Vec::new();
        stdout.read_to_end(&mut rest).await.unwrap();
        rest
    });
    server.await.unwrap();

    assert!(status.unwrap().success());
    assert!(String::from_utf8_lossy(&rest).contains("second"));
}

#[tokio::test]
async fn disconnect_while_waiting() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.send(format!("{}\r\nPress any key to continue . . . ", command).as_bytes())
            .await;
        peer.expect_close().await;
    })
    .await;

    let child = session.command("pause").spawn().await.unwrap();
    let handle = child.disconnect_handle();

    let (result, ()) = tokio::join!(child.wait(), async {
        sleep(Duration::from_millis(100)).await;
        handle.disconnect();
        handle.disconnect();
    });
    server.await.unwrap();

    assert_matches!(result, Err(Error::Disconnected));
}

#[tokio::test]
async fn disconnect_closes_the_connection() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.send(format!("{}\r\n", command).as_bytes()).await;
        peer.expect_close().await;
    })
    .await;

    let mut child = session.command("pause").spawn().await.unwrap();
    let mut stdout = child.stdout().take().unwrap();
    child.disconnect().await;

    let mut rest = Vec::new();
    stdout.read_to_end(&mut rest).await.unwrap();
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server still connected")
        .unwrap();
}

#[tokio::test]
async fn disconnect_after_exit_logs_once() {
    let (logs, _guard) = capture_logs();
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.run(&command, "", "0").await;
        peer.expect_close().await;
    })
    .await;

    let mut child = session.command("ver").spawn().await.unwrap();
    let mut stdout = child.stdout().take().unwrap();
    let mut seen = Vec::new();
    stdout.read_to_end(&mut seen).await.unwrap();
    server.await.unwrap();

    child.disconnect().await;
    assert_eq!(logs.contents().matches("Disconnected from").count(), 1);
}

#[tokio::test]
async fn silent_remote_keeps_wait_pending() {
    let (session, server) = serve(|mut peer| async move {
        let command = peer.login().await;
        peer.send(format!("{}\r\n", command).as_bytes()).await;
        // never print the prompt again
        peer.expect_close().await;
    })
    .await;

    let child = session.command("ping").args(["-t", "localhost"]).spawn().await.unwrap();

    // waiting has no timeout of its own
    assert!(timeout(Duration::from_millis(300), child.wait()).await.is_err());

    // giving up on the wait dropped the child, which hangs up
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server still connected")
        .unwrap();
}

#[tokio::test]
async fn sessions_are_reusable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        for code in ["0", "5"] {
            let (stream, _) = listener.accept().await.unwrap();
            let mut peer = Peer::from(stream);
            let command = peer.login().await;
            peer.run(&command, "", code).await;
            peer.expect_close().await;
        }
    });

    let session = session(port);
    let mut cmd = session.command("ver");
    assert_eq!(cmd.status().await.unwrap().code(), Some(0));
    assert_eq!(cmd.status().await.unwrap().code(), Some(5));
    server.await.unwrap();
}
