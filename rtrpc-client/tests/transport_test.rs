//! SCGI transport integration tests
//!
//! Frame layout, trust flag, connection failures, empty and malformed
//! responses, timeouts and Unix sockets.

mod common;

use common::{values_reply, MockDaemon};
use rtrpc_client::transport::{Endpoint, ScgiTransport, Transport};
use rtrpc_client::{ClientBuilder, RtClient, RunOutcome};
use rtrpc_core::Error;
use std::time::Duration;

fn transport(daemon: &MockDaemon) -> ScgiTransport {
    ScgiTransport::new(daemon.endpoint().parse().unwrap()).with_timeout(Duration::from_secs(2))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frame_headers() {
    let mut daemon = MockDaemon::replying(values_reply(&["<i4>0</i4>"])).await;
    let scgi = transport(&daemon);

    let raw = tokio::task::spawn_blocking(move || scgi.send("<methodCall/>", true))
        .await
        .unwrap()
        .unwrap();
    assert!(raw.starts_with("Status: 200 OK"));

    let call = daemon.next_call().await.unwrap();
    let names: Vec<&str> = call.headers.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        names,
        vec!["CONTENT_LENGTH", "CONTENT_TYPE", "SCGI", "UNTRUSTED_CONNECTION"]
    );
    assert_eq!(call.header("CONTENT_LENGTH"), Some("13"));
    assert_eq!(call.header("CONTENT_TYPE"), Some("text/xml"));
    assert_eq!(call.header("SCGI"), Some("1"));
    assert_eq!(call.header("UNTRUSTED_CONNECTION"), Some("0"));
    assert_eq!(call.body, "<methodCall/>");

    daemon.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_untrusted_flag() {
    let mut daemon = MockDaemon::replying(values_reply(&["<i4>0</i4>"])).await;
    let client = RtClient::connect(&daemon.endpoint()).unwrap();

    tokio::task::spawn_blocking(move || {
        let mut request = client
            .request()
            .command(client.command("system.pid", std::iter::empty::<&str>()));
        assert!(request.run(false));
    })
    .await
    .unwrap();

    let call = daemon.next_call().await.unwrap();
    assert_eq!(call.header("UNTRUSTED_CONNECTION"), Some("1"));

    daemon.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_refused() {
    // Reserve a port, then free it so nothing listens there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = RtClient::connect(&endpoint).unwrap();
    let (ok, fault, outcome, error) = tokio::task::spawn_blocking(move || {
        let mut request = client
            .request()
            .command(client.command("system.client_version", std::iter::empty::<&str>()));
        let ok = request.success(true);
        (ok, request.fault(), request.outcome(), request.failure())
    })
    .await
    .unwrap();

    assert!(!ok);
    assert!(!fault);
    assert_eq!(outcome, Some(RunOutcome::TransportFailed));
    assert!(matches!(error, Error::Connect(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_response() {
    let daemon = MockDaemon::with_handler(|_call| None).await;
    let scgi = transport(&daemon);

    let result = tokio::task::spawn_blocking(move || scgi.send("<methodCall/>", true))
        .await
        .unwrap();
    assert!(matches!(result, Err(Error::EmptyResponse)));

    daemon.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_response_is_parse_failure() {
    let daemon = MockDaemon::replying("Status: 500 Internal Server Error\r\n\r\n".to_string()).await;
    let client = RtClient::connect(&daemon.endpoint()).unwrap();

    let (ok, outcome) = tokio::task::spawn_blocking(move || {
        let mut request = client
            .request()
            .command(client.command("system.pid", std::iter::empty::<&str>()));
        let ok = request.run(true);
        (ok, request.outcome())
    })
    .await
    .unwrap();

    assert!(!ok);
    assert_eq!(outcome, Some(RunOutcome::ParseFailed));

    daemon.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_read_timeout() {
    // Accepts and holds connections without answering
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let client = ClientBuilder::new(endpoint)
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let result = tokio::task::spawn_blocking(move || client.call("system.pid", std::iter::empty::<&str>()))
        .await
        .unwrap();

    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_large_response_read_to_eof() {
    let big = "x".repeat(64 * 1024);
    let daemon = MockDaemon::replying(values_reply(&[&format!("<string>{}</string>", big)])).await;
    let client = RtClient::connect(&daemon.endpoint()).unwrap();

    let values = tokio::task::spawn_blocking(move || client.call("d.name", ["H"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(values[0].as_str().map(str::len), Some(64 * 1024));

    daemon.shutdown().await;
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_unix_socket_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rpc.socket");
    let mut calls = common::unix_daemon(&path, |_call| Some(values_reply(&["<string>0.9.8</string>"]))).await;

    let endpoint = format!("unix://{}", path.display());
    assert_eq!(endpoint.parse::<Endpoint>().unwrap(), Endpoint::Unix(path.clone()));

    let client = RtClient::connect(&endpoint).unwrap();
    let version = tokio::task::spawn_blocking(move || client.detect_version())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version, 0x908);

    let call = tokio::time::timeout(Duration::from_secs(5), calls.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(call.body.contains("<methodName>system.client_version</methodName>"));
}
