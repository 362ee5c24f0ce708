use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pasv_ftp::auth::CredentialStore;
use pasv_ftp::client::{ScriptSource, Shell};
use pasv_ftp::protocol::address;
use pasv_ftp::protocol::responses::Reply;
use pasv_ftp::storage::FsStorage;
use pasv_ftp::transfer::TransferType;
use pasv_ftp::{FtpClient, FtpError, Server, ServerConfig};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    root: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let root = TempDir::new().unwrap();
        let config = ServerConfig {
            control_port: 0,
            storage_root: root.path().to_string_lossy().into_owned(),
            data_timeout_secs: 5,
            ..ServerConfig::default()
        };
        let credentials = CredentialStore::new()
            .with_user("alice", "secret")
            .with_user("bob", "hunter2");
        let storage = FsStorage::new(root.path(), true);

        let server = Server::bind(config, Arc::new(credentials), Arc::new(storage))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            root,
            shutdown: Some(tx),
            handle,
        }
    }

    fn user_file(&self, user: &str, name: &str) -> std::path::PathBuf {
        self.root.path().join(user).join(name)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

/// A bare control connection speaking raw lines.
struct Control {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Control {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut control = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        assert_eq!(control.reply().await.code(), 220);
        control
    }

    async fn reply(&mut self) -> Reply {
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert!(n > 0, "control connection closed");
        Reply::parse_line(&line).unwrap().0
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn cmd(&mut self, line: &str) -> Reply {
        self.send_raw(format!("{}\r\n", line).as_bytes()).await;
        self.reply().await
    }

    async fn login(&mut self, user: &str, pass: &str) {
        assert_eq!(self.cmd(&format!("USER {}", user)).await.code(), 331);
        assert_eq!(self.cmd(&format!("PASS {}", pass)).await.code(), 230);
    }

    async fn pasv(&mut self) -> SocketAddr {
        let reply = self.cmd("PASV").await;
        assert_eq!(reply.code(), 227, "{}", reply);
        SocketAddr::V4(address::parse_pasv_reply(reply.text()).unwrap())
    }
}

#[tokio::test]
async fn passive_list_after_login() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;
    std::fs::write(server.user_file("alice", "readme.txt"), b"hi").unwrap();

    let data_addr = control.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    control.send_raw(b"LIST\r\n").await;
    assert_eq!(control.reply().await.code(), 150);

    let mut listing = String::new();
    data.read_to_string(&mut listing).await.unwrap();
    assert_eq!(listing, "readme.txt\r\n");
    assert_eq!(control.reply().await.code(), 226);

    assert_eq!(control.cmd("QUIT").await.to_string(), "221 Goodbye.");
    server.stop().await;
}

#[tokio::test]
async fn pass_before_user_is_bad_sequence() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    assert_eq!(control.cmd("PASS secret").await.code(), 503);
    assert_eq!(control.cmd("PASS").await.code(), 503);
    assert_eq!(control.cmd("LIST").await.code(), 530);
    control.login("alice", "secret").await;
    server.stop().await;
}

#[tokio::test]
async fn second_pasv_closes_first_listener() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;

    let first = control.pasv().await;
    let second = control.pasv().await;
    assert_ne!(first, second);
    assert!(TcpStream::connect(first).await.is_err());
    assert!(TcpStream::connect(second).await.is_ok());
    server.stop().await;
}

#[tokio::test]
async fn retr_of_missing_file_is_550_and_session_continues() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;
    control.pasv().await;

    assert_eq!(control.cmd("RETR nothing-here").await.code(), 550);
    assert_eq!(control.cmd("TYPE I").await.code(), 200);
    server.stop().await;
}

#[tokio::test]
async fn malformed_port_is_rejected_and_session_continues() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;

    assert_eq!(control.cmd("PORT 1,2,3").await.code(), 501);
    assert_eq!(control.cmd("PORT 127,0,0,1,0,0").await.code(), 501);
    assert_eq!(control.cmd("PORT 256,0,0,1,4,1").await.code(), 501);
    // No data endpoint was recorded.
    assert_eq!(control.cmd("LIST").await.code(), 425);
    server.stop().await;
}

#[tokio::test]
async fn overlong_line_is_rejected_without_closing() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;

    let long = format!("USER {}\r\n", "x".repeat(508));
    assert_eq!(long.len(), 515);
    control.send_raw(long.as_bytes()).await;
    assert_eq!(control.reply().await.code(), 500);

    let huge = format!("{}\r\n", "y".repeat(10_000));
    control.send_raw(huge.as_bytes()).await;
    assert_eq!(control.reply().await.code(), 500);

    control.send_raw(b"USER \x01alice\r\n").await;
    assert_eq!(control.reply().await.code(), 500);

    control.login("alice", "secret").await;
    server.stop().await;
}

#[tokio::test]
async fn unknown_command_is_502_once_logged_in() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    assert_eq!(control.cmd("MKD stuff").await.code(), 530);
    control.login("alice", "secret").await;
    assert_eq!(control.cmd("MKD stuff").await.code(), 502);
    assert_eq!(control.cmd("HELP").await.code(), 214);
    server.stop().await;
}

#[tokio::test]
async fn active_mode_retrieve() {
    let server = TestServer::start().await;
    std::fs::create_dir_all(server.root.path().join("alice")).unwrap();
    std::fs::write(server.user_file("alice", "data.bin"), [0u8, 1, 2, 255]).unwrap();

    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;
    assert_eq!(control.cmd("TYPE I").await.code(), 200);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = match listener.local_addr().unwrap() {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => unreachable!(),
    };
    let port = control.cmd(&format!("PORT {}", address::encode(local))).await;
    assert_eq!(port.code(), 200);

    control.send_raw(b"RETR data.bin\r\n").await;
    assert_eq!(control.reply().await.code(), 150);
    let (mut data, _) = listener.accept().await.unwrap();
    let mut content = Vec::new();
    data.read_to_end(&mut content).await.unwrap();
    assert_eq!(content, [0u8, 1, 2, 255]);
    assert_eq!(control.reply().await.code(), 226);
    server.stop().await;
}

#[tokio::test]
async fn users_only_see_their_own_files() {
    let server = TestServer::start().await;
    let mut bob = Control::connect(server.addr).await;
    bob.login("bob", "hunter2").await;
    std::fs::write(server.user_file("bob", "private.txt"), b"bob's").unwrap();

    let mut alice = Control::connect(server.addr).await;
    alice.login("alice", "secret").await;
    alice.pasv().await;
    assert_eq!(alice.cmd("RETR private.txt").await.code(), 550);
    assert_eq!(alice.cmd("RETR ../bob/private.txt").await.code(), 550);
    server.stop().await;
}

#[tokio::test]
async fn client_store_then_retrieve_in_both_modes() {
    let server = TestServer::start().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();

    for passive in [true, false] {
        let (mut client, greeting) = FtpClient::connect(&server.addr.to_string()).await.unwrap();
        assert_eq!(greeting.code(), 220);
        client.set_passive(passive);
        client.login("alice", "secret").await.unwrap();
        client.set_type(TransferType::Binary).await.unwrap();

        let (sent, reply) = client.store("blob.bin", &payload[..]).await.unwrap();
        assert_eq!(sent, payload.len() as u64);
        assert_eq!(reply.code(), 226);

        let mut fetched = Vec::new();
        let (received, _) = client.retrieve("blob.bin", &mut fetched).await.unwrap();
        assert_eq!(received, payload.len() as u64);
        assert_eq!(fetched, payload);

        let (names, reply) = client.list().await.unwrap();
        assert_eq!(names, ["blob.bin"]);
        assert_eq!(reply.to_string(), "226 Directory send OK.");

        assert_eq!(client.quit().await.unwrap().code(), 221);
    }

    let stored = std::fs::read(server.user_file("alice", "blob.bin")).unwrap();
    assert_eq!(stored, payload);
    server.stop().await;
}

#[tokio::test]
async fn ascii_retrieve_uses_crlf() {
    let server = TestServer::start().await;
    let (mut client, _) = FtpClient::connect(&server.addr.to_string()).await.unwrap();
    client.set_passive(true);
    client.login("alice", "secret").await.unwrap();
    std::fs::write(server.user_file("alice", "notes.txt"), b"one\ntwo\n").unwrap();

    let mut fetched = Vec::new();
    client.retrieve("notes.txt", &mut fetched).await.unwrap();
    assert_eq!(fetched, b"one\r\ntwo\r\n");
    server.stop().await;
}

#[tokio::test]
async fn ascii_store_keeps_bytes_and_retrieve_normalises() {
    let server = TestServer::start().await;
    let payload = b"one\ntwo\n\x00\x01\xff".to_vec();

    for passive in [true, false] {
        let (mut client, _) = FtpClient::connect(&server.addr.to_string()).await.unwrap();
        client.set_passive(passive);
        client.login("alice", "secret").await.unwrap();
        assert_eq!(client.transfer_type(), TransferType::Ascii);

        let (sent, reply) = client.store("mixed.dat", &payload[..]).await.unwrap();
        assert_eq!(reply.code(), 226);
        assert_eq!(sent, payload.len() as u64);
        let stored = std::fs::read(server.user_file("alice", "mixed.dat")).unwrap();
        assert_eq!(stored, payload, "passive={}", passive);

        let mut ascii = Vec::new();
        client.retrieve("mixed.dat", &mut ascii).await.unwrap();
        assert_eq!(ascii, b"one\r\ntwo\r\n\x00\x01\xff\r\n");

        client.set_type(TransferType::Binary).await.unwrap();
        let mut binary = Vec::new();
        client.retrieve("mixed.dat", &mut binary).await.unwrap();
        assert_eq!(binary, payload);
        client.quit().await.unwrap();
    }
    server.stop().await;
}

#[tokio::test]
async fn port_to_closed_address_is_425_and_session_continues() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;
    std::fs::write(server.user_file("alice", "here.txt"), b"x").unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = match listener.local_addr().unwrap() {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => unreachable!(),
    };
    drop(listener);

    let port = control.cmd(&format!("PORT {}", address::encode(closed))).await;
    assert_eq!(port.code(), 200);
    assert_eq!(control.cmd("LIST").await.code(), 425);
    assert_eq!(control.cmd("RETR here.txt").await.code(), 425);
    assert_eq!(control.cmd("TYPE I").await.code(), 200);
    server.stop().await;
}

#[tokio::test]
async fn client_sees_server_rejections() {
    let server = TestServer::start().await;
    let (mut client, _) = FtpClient::connect(&server.addr.to_string()).await.unwrap();

    match client.login("alice", "wrong").await {
        Err(FtpError::Rejected { code, .. }) => assert_eq!(code, 530),
        other => panic!("unexpected login result: {:?}", other.map(|r| r.to_string())),
    }
    client.login("alice", "secret").await.unwrap();
    client.set_passive(true);

    let mut sink = Vec::new();
    match client.retrieve("missing", &mut sink).await {
        Err(FtpError::Rejected { code, .. }) => assert_eq!(code, 550),
        other => panic!("unexpected retrieve result: {:?}", other.map(|(n, _)| n)),
    }
    assert_eq!(client.help(Some("PASV")).await.unwrap().code(), 214);
    server.stop().await;
}

#[tokio::test]
async fn shell_runs_a_script() {
    let server = TestServer::start().await;
    let local = TempDir::new().unwrap();
    std::fs::write(local.path().join("upload.txt"), b"line one\r\nline two\r\n").unwrap();

    let (client, _) = FtpClient::connect(&server.addr.to_string()).await.unwrap();
    let mut script = ScriptSource::parse(
        "LIST\n\
         USER alice\n\
         PASS secret\n\
         PASV\n\
         STOR upload.txt\n\
         PORT\n\
         LIST\n\
         RETR upload.txt\n\
         RETR missing.txt\n\
         QUIT\n",
    );
    let mut shell = Shell::new(local.path(), Vec::new());
    shell.run(client, &mut script).await.unwrap();

    let output = String::from_utf8(shell.into_output()).unwrap();
    assert!(output.starts_with("Not logged in."), "{}", output);
    assert!(output.contains("230 Login successful."), "{}", output);
    assert!(output.contains("\nupload.txt\n226 Directory send OK."), "{}", output);
    assert!(output.contains("550 File not found."), "{}", output);
    assert!(output.trim_end().ends_with("221 Goodbye."), "{}", output);

    assert_eq!(
        std::fs::read(server.user_file("alice", "upload.txt")).unwrap(),
        b"line one\r\nline two\r\n"
    );
    assert!(!local.path().join("missing.txt").exists());
    server.stop().await;
}

#[tokio::test]
async fn shutdown_ends_live_sessions() {
    let server = TestServer::start().await;
    let mut control = Control::connect(server.addr).await;
    control.login("alice", "secret").await;
    let data_addr = control.pasv().await;

    server.stop().await;

    let mut buf = Vec::new();
    let n = control.reader.read_to_end(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);
    assert!(TcpStream::connect(data_addr).await.is_err());
}
