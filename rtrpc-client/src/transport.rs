//! Synchronous SCGI transport
//!
//! rTorrent listens for XML-RPC on an SCGI socket, TCP or Unix domain. Each
//! call opens a fresh connection, writes one frame, reads until the daemon
//! closes the connection, and returns the raw response text, headers
//! included.
//!
//! # Framing
//!
//! The frame is a netstring of NUL-separated header pairs followed by the
//! body:
//!
//! ```text
//! <len>:CONTENT_LENGTH\0<body len>\0CONTENT_TYPE\0text/xml\0SCGI\01\0UNTRUSTED_CONNECTION\0<0|1>\0,<body>
//! ```
//!
//! `UNTRUSTED_CONNECTION` is `1` when the caller did not ask for a trusted
//! call.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_client::transport::{encode_frame, Endpoint};
//!
//! let frame = encode_frame("<x/>", true);
//! assert!(frame.starts_with(b"69:CONTENT_LENGTH\x004\x00"));
//!
//! let endpoint: Endpoint = "unix:///run/rtorrent/rpc.socket".parse().unwrap();
//! assert_eq!(endpoint.to_string(), "unix:///run/rtorrent/rpc.socket");
//! ```

use crate::call_log::CallLog;
use rtrpc_core::{Error, Result};
use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Size of each read from the daemon connection
pub const READ_CHUNK_SIZE: usize = 4096;

/// Default connect, read and write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const UNIX_SCHEME: &str = "unix://";

/// Delivers one request document and returns the raw response
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `document`; `trusted` controls the SCGI trust header
    ///
    /// An empty response is reported as `Error::EmptyResponse`.
    fn send(&self, document: &str, trusted: bool) -> Result<String>;
}

/// Address of the daemon's SCGI listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`
    Tcp {
        /// Host name or IP address, without brackets
        host: String,
        /// Port number
        port: u16,
    },
    /// Unix domain socket path
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();

        if let Some(path) = text.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(Error::InvalidEndpoint(format!("'{}' has no socket path", text)));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let (host, port) = text
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidEndpoint(format!("'{}' is not host:port", text)))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() || (host.contains(':') && !text.starts_with('[')) {
            return Err(Error::InvalidEndpoint(format!("'{}' has an invalid host", text)));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidEndpoint(format!("'{}' has an invalid port", text)))?;

        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix(path) => write!(f, "{}{}", UNIX_SCHEME, path.display()),
        }
    }
}

/// Build the SCGI frame for a document
pub fn encode_frame(document: &str, trusted: bool) -> Vec<u8> {
    let header = format!(
        "CONTENT_LENGTH\0{}\0CONTENT_TYPE\0text/xml\0SCGI\01\0UNTRUSTED_CONNECTION\0{}\0",
        document.len(),
        if trusted { "0" } else { "1" }
    );

    let prefix = format!("{}:", header.len());
    let mut frame = Vec::with_capacity(prefix.len() + header.len() + 1 + document.len());
    frame.extend_from_slice(prefix.as_bytes());
    frame.extend_from_slice(header.as_bytes());
    frame.push(b',');
    frame.extend_from_slice(document.as_bytes());
    frame
}

/// Blocking SCGI client, one connection per call
#[derive(Debug, Clone)]
pub struct ScgiTransport {
    endpoint: Endpoint,
    timeout: Duration,
    call_log: Option<Arc<dyn CallLog>>,
}

impl ScgiTransport {
    /// Create a transport for `endpoint` with the default timeout
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            call_log: None,
        }
    }

    /// Bound every connect, write and read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record outgoing documents and raw responses
    pub fn with_call_log(mut self, log: Arc<dyn CallLog>) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Daemon endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Per-operation timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn exchange(&self, frame: &[u8]) -> Result<Vec<u8>> {
        match &self.endpoint {
            Endpoint::Tcp { host, port } => {
                let stream = self.connect_tcp(host, *port)?;
                exchange(stream, frame)
            }
            Endpoint::Unix(path) => self.exchange_unix(path, frame),
        }
    }

    fn connect_tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Connect(format!("cannot resolve {}: {}", self.endpoint, e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) if e.kind() == std::io::ErrorKind::TimedOut => Error::Timeout,
            Some(e) => Error::Connect(format!("{}: {}", self.endpoint, e)),
            None => Error::Connect(format!("{}: no addresses", self.endpoint)),
        })
    }

    #[cfg(unix)]
    fn exchange_unix(&self, path: &std::path::Path, frame: &[u8]) -> Result<Vec<u8>> {
        let stream = std::os::unix::net::UnixStream::connect(path)
            .map_err(|e| Error::Connect(format!("{}: {}", self.endpoint, e)))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        exchange(stream, frame)
    }

    #[cfg(not(unix))]
    fn exchange_unix(&self, _path: &std::path::Path, _frame: &[u8]) -> Result<Vec<u8>> {
        Err(Error::InvalidEndpoint(format!(
            "{}: unix sockets are not supported on this platform",
            self.endpoint
        )))
    }

    fn record(&self, blob: &str) {
        if let Some(log) = &self.call_log {
            log.record(blob);
        }
    }
}

impl Transport for ScgiTransport {
    fn send(&self, document: &str, trusted: bool) -> Result<String> {
        self.record(document);

        if document.is_empty() {
            return Err(Error::Internal("refusing to send an empty document".into()));
        }

        let frame = encode_frame(document, trusted);
        let response = self.exchange(&frame);

        let raw = match response {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                self.record("");
                return Err(e);
            }
        };
        self.record(&raw);

        tracing::trace!(endpoint = %self.endpoint, sent = frame.len(), received = raw.len(), "SCGI exchange complete");

        if raw.is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(raw)
    }
}

/// Write the whole frame, then read until the peer closes
fn exchange<S: Read + Write>(mut stream: S, frame: &[u8]) -> Result<Vec<u8>> {
    stream.write_all(frame)?;
    stream.flush()?;

    let mut response = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => response.extend_from_slice(&chunk[..read]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory stream: reads come from `input`, writes land in `output`
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        /// Reads that fail with `Interrupted` before any data arrives
        interrupts: usize,
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(std::io::ErrorKind::Interrupted.into());
            }
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_encode_frame_trusted() {
        let frame = encode_frame("<methodCall/>", true);
        let expected = concat!(
            "70:CONTENT_LENGTH\u{0}13\u{0}CONTENT_TYPE\u{0}text/xml\u{0}SCGI\u{0}1\u{0}",
            "UNTRUSTED_CONNECTION\u{0}0\u{0},<methodCall/>"
        );
        assert_eq!(String::from_utf8(frame).unwrap(), expected);
    }

    #[test]
    fn test_encode_frame_untrusted() {
        let frame = String::from_utf8(encode_frame("abc", false)).unwrap();
        assert!(frame.contains("UNTRUSTED_CONNECTION\u{0}1\u{0},abc"));
        assert!(frame.starts_with("69:"));
    }

    #[test]
    fn test_encode_frame_counts_bytes_not_chars() {
        let frame = String::from_utf8(encode_frame("é", true)).unwrap();
        assert!(frame.contains("CONTENT_LENGTH\u{0}2\u{0}"));
    }

    #[test]
    fn test_exchange_reads_until_eof() {
        let payload = vec![b'x'; READ_CHUNK_SIZE * 2 + 17];
        let mut stream = FakeStream {
            input: Cursor::new(payload.clone()),
            output: Vec::new(),
            interrupts: 0,
        };

        let response = exchange(&mut stream, b"frame").unwrap();
        assert_eq!(response, payload);
        assert_eq!(stream.output, b"frame");
    }

    #[test]
    fn test_exchange_retries_interrupted_reads() {
        let mut stream = FakeStream {
            input: Cursor::new(b"Status: 200 OK".to_vec()),
            output: Vec::new(),
            interrupts: 3,
        };

        let response = exchange(&mut stream, b"frame").unwrap();
        assert_eq!(response, b"Status: 200 OK");
        assert_eq!(stream.interrupts, 0);
    }

    #[test]
    fn test_parse_tcp_endpoints() {
        assert_eq!(
            "127.0.0.1:5000".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port: 5000
            }
        );
        assert_eq!(
            "[::1]:5000".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp {
                host: "::1".into(),
                port: 5000
            }
        );
        assert_eq!(
            "seedbox.local:5000".parse::<Endpoint>().unwrap().to_string(),
            "seedbox.local:5000"
        );
        assert_eq!("[::1]:5000".parse::<Endpoint>().unwrap().to_string(), "[::1]:5000");
    }

    #[test]
    fn test_parse_invalid_endpoints() {
        for text in ["", "localhost", ":5000", "host:port", "host:70000", "::1:5000", "unix://"] {
            assert!(
                matches!(text.parse::<Endpoint>(), Err(Error::InvalidEndpoint(_))),
                "'{}' should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_parse_unix_endpoint() {
        let endpoint: Endpoint = "unix:///tmp/rtorrent.sock".parse().unwrap();
        assert_eq!(endpoint, Endpoint::Unix(PathBuf::from("/tmp/rtorrent.sock")));
    }

    #[test]
    fn test_connection_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = ScgiTransport::new(Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port,
        })
        .with_timeout(Duration::from_secs(1));

        match transport.send("<methodCall/>", true) {
            Err(Error::Connect(_)) | Err(Error::Timeout) => {}
            other => panic!("Expected connect failure, got {:?}", other),
        }
    }
}
