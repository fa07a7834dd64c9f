//! Frame upload client
//!
//! Producer-side counterpart of the relay's ingest endpoint: posts raw
//! JPEG frames, one `POST /stream/{channel}` per frame, reusing a
//! keep-alive connection. Delivery is best effort — a failed upload is
//! reported and the next [`send`](FrameUploader::send) reconnects; the
//! producer is never blocked beyond the configured timeouts.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::http;
use crate::registry::RegistryError;

use super::config::ClientConfig;

/// Events from the frame uploader
#[derive(Debug)]
pub enum UploadEvent {
    /// Connected to the relay
    Connected(std::net::SocketAddr),

    /// One frame uploaded and acknowledged
    Sent {
        /// Running count of uploaded frames
        seq: u64,
        /// Frame payload length
        len: usize,
    },

    /// Upload failed; the next send reconnects
    Error(String),

    /// Connection closed by [`close`](FrameUploader::close)
    Disconnected,
}

/// Best-effort MJPEG frame uploader
///
/// # Example
/// ```no_run
/// use bytes::Bytes;
/// use mjpeg_rs::client::{ClientConfig, FrameUploader};
/// use mjpeg_rs::registry::ChannelId;
///
/// # async fn example() -> mjpeg_rs::error::Result<()> {
/// let config = ClientConfig::new("194.233.84.144:8080".parse().unwrap(), ChannelId::new("cam-1"));
/// let (mut uploader, mut events) = FrameUploader::new(config);
///
/// // Spawn event handler
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// // One POST per captured frame
/// uploader.send(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9])).await?;
/// # Ok(())
/// # }
/// ```
pub struct FrameUploader {
    config: ClientConfig,
    stream: Option<TcpStream>,
    buf: BytesMut,
    frames_sent: u64,
    event_tx: mpsc::Sender<UploadEvent>,
}

impl FrameUploader {
    /// Create a new uploader and its event stream
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<UploadEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);

        (
            Self {
                config,
                stream: None,
                buf: BytesMut::with_capacity(1024),
                frames_sent: 0,
                event_tx,
            },
            event_rx,
        )
    }

    /// Number of frames uploaded and acknowledged
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Upload one JPEG frame
    ///
    /// Empty frames are rejected locally — the relay would answer 400
    /// anyway. On failure the connection is discarded and the error
    /// reported on the event stream as well as returned.
    pub async fn send(&mut self, jpeg: Bytes) -> Result<()> {
        if jpeg.is_empty() {
            return Err(Error::Registry(RegistryError::EmptyFrame(
                self.config.channel.clone(),
            )));
        }

        match self.try_send(&jpeg).await {
            Ok(()) => {
                self.frames_sent += 1;
                let _ = self.event_tx.try_send(UploadEvent::Sent {
                    seq: self.frames_sent,
                    len: jpeg.len(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    channel = %self.config.channel,
                    error = %e,
                    "Frame upload failed"
                );
                self.stream = None;
                self.buf.clear();
                let _ = self.event_tx.try_send(UploadEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Close the connection, if any
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            let _ = self.event_tx.try_send(UploadEvent::Disconnected);
        }
        self.buf.clear();
    }

    async fn try_send(&mut self, jpeg: &Bytes) -> Result<()> {
        if self.stream.is_none() {
            let stream = match timeout(
                self.config.connect_timeout,
                TcpStream::connect(self.config.server_addr),
            )
            .await
            {
                Ok(res) => res?,
                Err(_) => return Err(Error::Timeout("connect to relay")),
            };
            stream.set_nodelay(true)?;

            tracing::debug!(
                addr = %self.config.server_addr,
                channel = %self.config.channel,
                "Connected to relay"
            );
            let _ = self
                .event_tx
                .try_send(UploadEvent::Connected(self.config.server_addr));
            self.stream = Some(stream);
        }

        let head = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            self.config.path(),
            self.config.server_addr,
            jpeg.len()
        );

        // stream is always present here; insert keeps this unwrap-free
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(Error::Timeout("connect to relay")),
        };

        let request = async {
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(jpeg).await?;
            Ok::<_, Error>(())
        };
        match timeout(self.config.request_timeout, request).await {
            Ok(res) => res?,
            Err(_) => return Err(Error::Timeout("frame upload")),
        }

        let status = match timeout(
            self.config.request_timeout,
            Self::read_response(stream, &mut self.buf),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => return Err(Error::Timeout("relay response")),
        };

        if !(200..300).contains(&status) {
            return Err(Error::RemoteStatus(status));
        }

        Ok(())
    }

    /// Read one response (head + body) and return the status code
    async fn read_response(stream: &mut TcpStream, buf: &mut BytesMut) -> Result<u16> {
        let head_len = loop {
            if let Some(end) = http::head_end(buf) {
                break end;
            }
            let n = stream.read_buf(buf).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "relay closed connection",
                )));
            }
        };

        let head = buf.split_to(head_len);
        let text = std::str::from_utf8(&head).map_err(|_| invalid_response("non-text head"))?;
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let status_line = lines.next().unwrap_or("");
        let status: u16 = status_line
            .split_ascii_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| invalid_response("malformed status line"))?;

        let mut body_len = 0usize;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    body_len = value
                        .trim()
                        .parse()
                        .map_err(|_| invalid_response("invalid Content-Length"))?;
                }
            }
        }

        // Drain the body so the connection can be reused
        while buf.len() < body_len {
            let n = stream.read_buf(buf).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "relay closed connection mid-body",
                )));
            }
        }
        let _ = buf.split_to(body_len);

        Ok(status)
    }
}

fn invalid_response(msg: &str) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::TcpListener;

    use crate::registry::ChannelId;
    use crate::server::{MjpegServer, ServerConfig};

    use super::*;

    async fn start_relay() -> (std::net::SocketAddr, Arc<MjpegServer>) {
        let server = Arc::new(MjpegServer::new(ServerConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let srv = Arc::clone(&server);
        tokio::spawn(async move {
            srv.serve(listener, std::future::pending()).await.unwrap();
        });

        (addr, server)
    }

    #[tokio::test]
    async fn test_upload_reuses_connection() {
        let (addr, server) = start_relay().await;
        let channel = ChannelId::new("cam-1");

        let (mut uploader, mut events) = FrameUploader::new(ClientConfig::new(addr, channel.clone()));

        uploader.send(Bytes::from(vec![1u8; 500])).await.unwrap();
        uploader.send(Bytes::from(vec![2u8; 700])).await.unwrap();
        assert_eq!(uploader.frames_sent(), 2);

        // The relay holds the latest frame
        let latest = server.registry().latest_frame(&channel).await.unwrap();
        assert_eq!(latest.len(), 700);
        assert_eq!(latest.seq, 1);

        // Both frames went over one keep-alive connection
        assert_eq!(server.stats().await.total_connections, 1);

        assert!(matches!(events.recv().await, Some(UploadEvent::Connected(_))));
        assert!(matches!(
            events.recv().await,
            Some(UploadEvent::Sent { seq: 1, len: 500 })
        ));
        assert!(matches!(
            events.recv().await,
            Some(UploadEvent::Sent { seq: 2, len: 700 })
        ));

        uploader.close().await;
        assert!(matches!(events.recv().await, Some(UploadEvent::Disconnected)));
    }

    #[tokio::test]
    async fn test_empty_frame_rejected_locally() {
        // Port 9 (discard) is never contacted: the reject happens before I/O
        let config = ClientConfig::new("127.0.0.1:9".parse().unwrap(), ChannelId::single());
        let (mut uploader, _events) = FrameUploader::new(config);

        let result = uploader.send(Bytes::new()).await;
        assert!(matches!(
            result,
            Err(Error::Registry(RegistryError::EmptyFrame(_)))
        ));
        assert_eq!(uploader.frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_upload_error_reported_and_recovered() {
        let (addr, _server) = start_relay().await;
        let channel = ChannelId::new("cam-1");

        // First aim at a dead port
        let dead = ClientConfig::new("127.0.0.1:1".parse().unwrap(), channel.clone())
            .connect_timeout(std::time::Duration::from_millis(200));
        let (mut uploader, mut events) = FrameUploader::new(dead);

        assert!(uploader.send(Bytes::from(vec![1u8; 10])).await.is_err());
        assert!(matches!(events.recv().await, Some(UploadEvent::Error(_))));

        // Repoint at the live relay; the next send reconnects
        uploader.config.server_addr = addr;
        uploader.send(Bytes::from(vec![1u8; 10])).await.unwrap();
        assert_eq!(uploader.frames_sent(), 1);
    }
}
