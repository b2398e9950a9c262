//! Progress polling against a live upload: a second client must be able to
//! read a non-zero byte count while the first is still sending, and the
//! session must vanish once the transfer dies.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use share_core::{ShareConfig, ShareServer, Storage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

const BOUNDARY: &str = "progressboundary4e71";

/// Payload bytes actually sent before the socket is held open.
const PAYLOAD_SENT: usize = 512 * 1024;

async fn start_server() -> (
    PathBuf,
    SocketAddr,
    share_core::Lifecycle,
    tokio::task::JoinHandle<Result<(), share_core::ShareError>>,
) {
    let dir = std::env::temp_dir().join(format!("share_progress_{}", Uuid::new_v4()));
    let storage = Storage::open(&dir).await.expect("open storage");
    let config = ShareConfig {
        port: 0,
        storage_dir: dir.clone(),
    };
    let server = ShareServer::bind(&config, storage).await.expect("bind");
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();
    let handle = tokio::spawn(server.run());
    (dir, addr, lifecycle, handle)
}

/// One request over a fresh connection; returns the head and the body.
async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(
            format!("GET {path} HTTP/1.1\r\nhost: share\r\nconnection: close\r\n\r\n").as_bytes(),
        )
        .await
        .unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8_lossy(&reply);
    match reply.split_once("\r\n\r\n") {
        Some((head, body)) => (head.to_string(), body.to_string()),
        None => (reply.into_owned(), String::new()),
    }
}

/// Start an upload for `session` declaring far more body than `data_len`,
/// send `data_len` payload bytes, and hand back the held-open socket plus
/// the declared body length.
async fn begin_upload(addr: SocketAddr, session: Uuid, data_len: usize) -> (TcpStream, u64) {
    let prologue = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n\r\n"
    );
    let declared = prologue.len() + 10 * 1024 * 1024;
    let header = format!(
        "POST /api/upload?session={session} HTTP/1.1\r\nhost: share\r\ncontent-type: multipart/form-data; boundary={BOUNDARY}\r\ncontent-length: {declared}\r\n\r\n"
    );

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(header.as_bytes()).await.unwrap();
    stream.write_all(prologue.as_bytes()).await.unwrap();
    stream.write_all(&vec![0x5au8; data_len]).await.unwrap();
    stream.flush().await.unwrap();
    (stream, declared as u64)
}

/// Poll the progress endpoint until a snapshot with counted bytes appears.
async fn poll_snapshot(addr: SocketAddr, session: Uuid) -> serde_json::Value {
    for _ in 0..50 {
        let (head, body) = http_get(addr, &format!("/api/progress/{session}")).await;
        if head.starts_with("HTTP/1.1 200") {
            let report: serde_json::Value =
                serde_json::from_str(body.trim()).expect("progress body is json");
            if report["received"].as_u64().unwrap_or(0) > 0 {
                return report;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("never observed an in-flight snapshot for {session}");
}

#[tokio::test]
async fn test_progress_reports_bytes_while_upload_in_flight() {
    let (dir, addr, lifecycle, handle) = start_server().await;
    let session = Uuid::new_v4();

    // Most of the declared body is still owed, so the upload stays open
    let (stream, declared) = begin_upload(addr, session, PAYLOAD_SENT).await;

    let report = poll_snapshot(addr, session).await;
    let received = report["received"].as_u64().unwrap();
    assert!(received > 0, "got: {report}");
    assert!(
        received <= PAYLOAD_SENT as u64,
        "counted more than was sent: {report}"
    );
    assert_eq!(report["total"].as_u64().unwrap(), declared);
    let percent = report["percent"].as_f64().unwrap();
    assert!(percent > 0.0 && percent < 100.0, "got: {report}");

    drop(stream);
    lifecycle.trigger_shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_severed_upload_discards_its_session() {
    let (dir, addr, lifecycle, handle) = start_server().await;
    let session = Uuid::new_v4();

    let (stream, _declared) = begin_upload(addr, session, 64 * 1024).await;

    // Registered and counting before the connection dies
    poll_snapshot(addr, session).await;
    drop(stream);

    // Once the server notices the disconnect the session must go away
    let mut gone = false;
    for _ in 0..50 {
        let (head, _) = http_get(addr, &format!("/api/progress/{session}")).await;
        if head.starts_with("HTTP/1.1 404") {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(gone, "session {session} still pollable after its upload died");

    lifecycle.trigger_shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
}
