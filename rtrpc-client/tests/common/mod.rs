//! Common test utilities for rtrpc-client integration tests
//!
//! This module provides a mock SCGI daemon and response helpers for
//! testing client behavior without a running rTorrent.

#![allow(dead_code)]

use rtrpc_client::CallLog;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// One SCGI request as seen by the daemon
#[derive(Debug, Clone)]
pub struct ScgiCall {
    /// Header pairs in wire order
    pub headers: Vec<(String, String)>,
    /// Request document
    pub body: String,
}

impl ScgiCall {
    /// Value of the first header called `name`
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of calls packed in the document
    pub fn method_count(&self) -> usize {
        if self.body.contains("<methodName>system.multicall</methodName>") {
            self.body.matches("<name>methodName</name>").count()
        } else {
            1
        }
    }
}

type Handler = Arc<dyn Fn(&ScgiCall) -> Option<String> + Send + Sync>;

/// Mock SCGI daemon for client testing
///
/// Every connection carries one request. The handler's answer is written
/// back and the connection closed; `None` closes it without a byte.
pub struct MockDaemon {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    call_rx: mpsc::Receiver<ScgiCall>,
}

impl MockDaemon {
    /// Start a daemon that answers every call with the same body
    pub async fn replying(body: String) -> Self {
        Self::with_handler(move |_call| Some(body.clone())).await
    }

    /// Start a daemon with a custom handler
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&ScgiCall) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (call_tx, call_rx) = mpsc::channel::<ScgiCall>(256);
        let handler: Handler = Arc::new(handler);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        if let Ok((stream, _)) = accepted {
                            tokio::spawn(serve(stream, handler.clone(), call_tx.clone()));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            call_rx,
        }
    }

    /// `host:port` endpoint of this daemon
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Wait for the next call received by the daemon
    pub async fn next_call(&mut self) -> Option<ScgiCall> {
        tokio::time::timeout(tokio::time::Duration::from_secs(5), self.call_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Every call received so far, without waiting
    pub fn drain_calls(&mut self) -> Vec<ScgiCall> {
        let mut calls = Vec::new();
        while let Ok(call) = self.call_rx.try_recv() {
            calls.push(call);
        }
        calls
    }

    /// Shutdown the mock daemon
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Start a Unix-socket daemon at `path`; it runs until the test ends
#[cfg(unix)]
pub async fn unix_daemon<F>(path: &std::path::Path, handler: F) -> mpsc::Receiver<ScgiCall>
where
    F: Fn(&ScgiCall) -> Option<String> + Send + Sync + 'static,
{
    let listener = tokio::net::UnixListener::bind(path).unwrap();
    let (call_tx, call_rx) = mpsc::channel::<ScgiCall>(16);
    let handler: Handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, handler.clone(), call_tx.clone()));
        }
    });
    call_rx
}

async fn serve<S>(mut stream: S, handler: Handler, call_tx: mpsc::Sender<ScgiCall>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let call = match read_call(&mut stream).await {
        Some(call) => call,
        None => return,
    };
    let reply = handler(&call);
    let _ = call_tx.send(call).await;

    if let Some(reply) = reply {
        let _ = stream.write_all(reply.as_bytes()).await;
    }
    let _ = stream.shutdown().await;
}

async fn read_call<S: AsyncRead + Unpin>(stream: &mut S) -> Option<ScgiCall> {
    // netstring length prefix
    let mut length = String::new();
    loop {
        let byte = stream.read_u8().await.ok()?;
        if byte == b':' {
            break;
        }
        length.push(byte as char);
    }
    let mut header = vec![0u8; length.parse().ok()?];
    stream.read_exact(&mut header).await.ok()?;
    if stream.read_u8().await.ok()? != b',' {
        return None;
    }

    let fields: Vec<String> = header
        .split(|b| *b == 0)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    let headers: Vec<(String, String)> = fields
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(key, _)| key == "CONTENT_LENGTH")?
        .1
        .parse()
        .ok()?;
    let mut body = vec![0u8; content_length];
    stream.read_exact(&mut body).await.ok()?;

    Some(ScgiCall {
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Wrap a document the way rTorrent's SCGI listener does
pub fn http_reply(document: &str) -> String {
    format!(
        "Status: 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
        document.len(),
        document
    )
}

/// Response to a plain call carrying `values` (already tagged, e.g. `<i8>1</i8>`)
pub fn values_reply(values: &[&str]) -> String {
    let values: String = values
        .iter()
        .map(|value| format!("<value>{}</value>", value))
        .collect();
    http_reply(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><methodResponse><params><param>{}</param></params></methodResponse>",
        values
    ))
}

/// Response to a `system.multicall`, one inner list per call
pub fn multicall_reply(results: &[&[&str]]) -> String {
    let mut data = String::new();
    for result in results {
        data.push_str("<value><array><data>");
        for value in *result {
            data.push_str(&format!("<value>{}</value>", value));
        }
        data.push_str("</data></array></value>");
    }
    http_reply(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><methodResponse><params><param><value><array><data>{}</data></array></value></param></params></methodResponse>",
        data
    ))
}

/// Fault response
pub fn fault_reply(code: i64, message: &str) -> String {
    http_reply(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><methodResponse><fault><value><struct>\
         <member><name>faultCode</name><value><i4>{}</i4></value></member>\
         <member><name>faultString</name><value><string>{}</string></value></member>\
         </struct></value></fault></methodResponse>",
        code, message
    ))
}

/// Call log that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryCallLog {
    records: Mutex<Vec<String>>,
}

impl MemoryCallLog {
    /// Records so far
    pub fn records(&self) -> Vec<String> {
        self.records.lock().unwrap().clone()
    }
}

impl CallLog for MemoryCallLog {
    fn record(&self, blob: &str) {
        self.records.lock().unwrap().push(blob.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_daemon_creation() {
        let daemon = MockDaemon::replying(values_reply(&["<i4>1</i4>"])).await;
        assert!(daemon.endpoint().starts_with("127.0.0.1:"));
        daemon.shutdown().await;
    }

    #[test]
    fn test_values_reply_format() {
        let reply = values_reply(&["<string>x</string>", "<i8>2</i8>"]);
        assert!(reply.starts_with("Status: 200 OK\r\n"));
        assert!(reply.contains("<value><string>x</string></value><value><i8>2</i8></value>"));
    }

    #[test]
    fn test_fault_reply_format() {
        let reply = fault_reply(-501, "Could not find info-hash.");
        assert!(reply.contains("faultCode"));
        assert!(reply.contains("<i4>-501</i4>"));
    }
}
