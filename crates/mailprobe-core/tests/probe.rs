//! Integration tests for the public probe entry points.
//!
//! These run against loopback sockets; nothing leaves the machine except the
//! DNS lookup for a reserved `.invalid` name.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mailprobe_core::{
    Direction, ErrorKind, ProbeConfig, ProbeRequest, ProtocolVariant, probe, probe_request,
    probe_with,
};

fn directions(result: &mailprobe_core::ProbeResult) -> Vec<Direction> {
    result.logs.entries().iter().map(|e| e.direction).collect()
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn connection_refused_logs_info_then_error() {
    let port = closed_port().await;

    let result = probe("127.0.0.1", port).await;

    assert!(!result.success());
    assert_eq!(result.protocol, ProtocolVariant::StartTls);
    assert_eq!(result.error_kind(), Some(ErrorKind::Connect));
    assert_eq!(directions(&result), vec![Direction::Info, Direction::Error]);
    assert_eq!(
        result.logs.entries()[0].message,
        format!("Connecting to 127.0.0.1:{port}...")
    );
    assert_eq!(result.logs.entries()[1].message, result.error().unwrap());
    assert!(!result.error().unwrap().is_empty());
}

#[tokio::test]
async fn unresolvable_host_logs_info_then_error() {
    let config = ProbeConfig::builder()
        .connect_timeout(Duration::from_secs(15))
        .build();

    let result = probe_with(&config, "nonexistent.invalid", 587).await;

    assert!(!result.success());
    assert_eq!(result.hostname, "nonexistent.invalid");
    assert_eq!(result.port, 587);
    assert_eq!(directions(&result), vec![Direction::Info, Direction::Error]);
    assert!(result.greeting().is_none());
    assert!(result.capabilities().is_none());
}

#[tokio::test]
async fn implicit_tls_port_is_selected_by_number() {
    // Nothing listens on 465 here; only the variant and the log wording matter.
    let config = ProbeConfig::builder()
        .connect_timeout(Duration::from_secs(2))
        .build();

    let result = probe_with(&config, "127.0.0.1", 465).await;

    assert_eq!(result.protocol, ProtocolVariant::ImplicitTls);
    assert_eq!(
        result.logs.entries()[0].message,
        "Connecting to 127.0.0.1:465 with implicit TLS..."
    );
}

#[tokio::test]
async fn plaintext_server_without_starttls() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut io = BufReader::new(socket);
        let mut line = String::new();

        io.get_mut()
            .write_all(b"220 127.0.0.1 ESMTP test\r\n")
            .await
            .unwrap();
        io.read_line(&mut line).await.unwrap();
        assert_eq!(line, "EHLO test.local\r\n");

        io.get_mut()
            .write_all(b"250-127.0.0.1 greets test.local\r\n250-127.0.0.1\r\n250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n")
            .await
            .unwrap();
        line.clear();
        io.read_line(&mut line).await.unwrap();
        assert_eq!(line, "QUIT\r\n");

        io.get_mut().write_all(b"221 Bye\r\n").await.unwrap();
    });

    let request = ProbeRequest::new(" 127.0.0.1 ", port).unwrap();
    let result = probe_request(&ProbeConfig::default(), &request).await;
    server.await.unwrap();

    assert!(result.success(), "{:?}", result.error());
    assert_eq!(result.error(), None);
    assert_eq!(result.tls_upgraded(), Some(false));

    let capabilities = result.capabilities().unwrap();
    assert_eq!(
        capabilities.as_slice(),
        ["127.0.0.1 greets test.local", "SIZE 35882577", "AUTH LOGIN PLAIN"]
    );
    assert_eq!(capabilities.max_message_size(), Some(35_882_577));
    assert_eq!(capabilities.auth_mechanisms().len(), 2);
    assert!(
        result
            .logs
            .entries()
            .iter()
            .all(|e| !e.message.ends_with('\n') && !e.message.ends_with('\r'))
    );
    assert_eq!(
        result.summary(),
        format!("Successfully connected to 127.0.0.1:{port} using STARTTLS")
    );
}

#[tokio::test]
async fn failure_serializes_to_flat_json() {
    let port = closed_port().await;

    let result = probe("127.0.0.1", port).await;
    let json = serde_json::to_value(&result).unwrap();
    let obj = json.as_object().unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["protocol"], "starttls");
    assert_eq!(json["hostname"], "127.0.0.1");
    assert_eq!(json["port"], port);
    assert_eq!(json["error"], result.error().unwrap());
    assert!(!obj.contains_key("greeting"));
    assert!(!obj.contains_key("capabilities"));
    assert!(!obj.contains_key("tlsUpgraded"));

    let logs = json["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["direction"], "info");
    assert_eq!(logs[1]["direction"], "error");
    assert!(logs[0]["timestamp"].as_i64().unwrap() <= logs[1]["timestamp"].as_i64().unwrap());
}
