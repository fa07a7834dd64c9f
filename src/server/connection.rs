//! Per-connection request handling
//!
//! Each accepted socket gets one task running [`Connection::run`]. An
//! ingest connection loops over keep-alive `POST /stream` requests; a
//! viewer connection switches into the MJPEG push loop and stays there
//! until the client disconnects, a write fails or times out, or the
//! server shuts down. Viewer failures are local: the subscription's
//! drop guard removes the viewer and nothing propagates to the producer
//! or to other viewers.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::http::{self, Request, RequestError, Route, MAX_HEAD_SIZE};
use crate::protocol::mjpeg;
use crate::registry::{ChannelId, ChannelRegistry, RegistryError};
use crate::server::config::ServerConfig;
use crate::server::handler::{Access, ConnectionInfo, StreamHandler};
use crate::stats::SessionStats;

pub(crate) struct Connection<H: StreamHandler> {
    info: ConnectionInfo,
    stream: TcpStream,
    buf: BytesMut,
    config: ServerConfig,
    handler: Arc<H>,
    registry: Arc<ChannelRegistry>,
    shutdown: watch::Receiver<bool>,
    stats: SessionStats,
}

impl<H: StreamHandler> Connection<H> {
    pub(crate) fn new(
        info: ConnectionInfo,
        stream: TcpStream,
        config: ServerConfig,
        handler: Arc<H>,
        registry: Arc<ChannelRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            info,
            stream,
            buf: BytesMut::with_capacity(4 * 1024),
            config,
            handler,
            registry,
            shutdown,
            stats: SessionStats::new(),
        }
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        if *self.shutdown.borrow() {
            return Ok(());
        }
        if !self.handler.on_connection(&self.info).await {
            debug!(
                session_id = self.info.session_id,
                peer = %self.info.peer_addr,
                "Connection refused by handler"
            );
            return Ok(());
        }

        let mut shutdown = self.shutdown.clone();
        loop {
            let req = tokio::select! {
                _ = shutdown.changed() => break,
                res = timeout(
                    self.config.idle_timeout,
                    Self::read_request(&mut self.stream, &mut self.buf),
                ) => match res {
                    Ok(Ok(Some((req, head_len)))) => {
                        self.stats.bytes_received += head_len as u64;
                        req
                    }
                    Ok(Ok(None)) => break, // clean EOF between requests
                    Ok(Err(Error::Request(e))) => {
                        warn!(session_id = self.info.session_id, error = %e, "Malformed request");
                        let _ = self
                            .send(http::plain_response(400, "Bad Request", "bad request\n", true))
                            .await;
                        break;
                    }
                    Ok(Err(e)) => {
                        debug!(session_id = self.info.session_id, error = %e, "Read failed");
                        break;
                    }
                    Err(_) => {
                        debug!(session_id = self.info.session_id, "Idle timeout");
                        break;
                    }
                },
            };

            let keep_alive = req.keep_alive();
            match req.route() {
                Route::Ingest(channel) => {
                    if !self.handle_ingest(&channel, &req).await? {
                        break;
                    }
                }
                Route::View(channel) => {
                    self.handle_view(&channel).await?;
                    break; // a multipart response never returns to request mode
                }
                Route::MethodNotAllowed => {
                    self.send(http::plain_response(
                        405,
                        "Method Not Allowed",
                        "method not allowed\n",
                        true,
                    ))
                    .await?;
                    break;
                }
                Route::NotFound => {
                    debug!(
                        session_id = self.info.session_id,
                        target = %req.target,
                        "No route"
                    );
                    self.send(http::plain_response(404, "Not Found", "not found\n", true))
                        .await?;
                    break;
                }
            }

            if !keep_alive {
                break;
            }
        }

        debug!(
            session_id = self.info.session_id,
            bytes_received = self.stats.bytes_received,
            bytes_sent = self.stats.bytes_sent,
            frames_ingested = self.stats.frames_ingested,
            frames_delivered = self.stats.frames_delivered,
            "Connection closed"
        );

        Ok(())
    }

    /// Handle one `POST /stream[/{channel}]` request
    ///
    /// Returns whether the connection may serve further requests.
    async fn handle_ingest(&mut self, channel: &ChannelId, req: &Request) -> Result<bool> {
        let len = match req.content_length() {
            Ok(Some(len)) => len,
            Ok(None) => {
                // Without a length we cannot frame the body; close
                self.send(http::plain_response(
                    400,
                    "Bad Request",
                    "missing Content-Length\n",
                    true,
                ))
                .await?;
                return Ok(false);
            }
            Err(e) => {
                warn!(session_id = self.info.session_id, error = %e, "Bad ingest request");
                self.send(http::plain_response(400, "Bad Request", "bad request\n", true))
                    .await?;
                return Ok(false);
            }
        };

        if len == 0 {
            // Empty frame: rejected, no state change, connection stays usable
            debug!(
                session_id = self.info.session_id,
                channel = %channel,
                "Empty frame rejected"
            );
            self.send(http::plain_response(400, "Bad Request", "empty frame\n", false))
                .await?;
            return Ok(true);
        }

        if len > self.config.max_frame_size {
            warn!(
                session_id = self.info.session_id,
                channel = %channel,
                len,
                limit = self.config.max_frame_size,
                "Frame too large"
            );
            self.send(http::plain_response(
                413,
                "Payload Too Large",
                "frame too large\n",
                true,
            ))
            .await?;
            return Ok(false);
        }

        if let Access::Deny(reason) = self.handler.on_ingest(channel, &self.info).await {
            warn!(
                session_id = self.info.session_id,
                channel = %channel,
                reason,
                "Ingest denied"
            );
            self.send(http::plain_response(403, "Forbidden", "forbidden\n", true))
                .await?;
            return Ok(false);
        }

        let body = match timeout(
            self.config.idle_timeout,
            Self::read_body(&mut self.stream, &mut self.buf, len),
        )
        .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                debug!(session_id = self.info.session_id, error = %e, "Body read failed");
                return Ok(false);
            }
            Err(_) => {
                debug!(session_id = self.info.session_id, "Body read timed out");
                return Ok(false);
            }
        };
        self.stats.bytes_received += len as u64;

        match self.registry.ingest(channel, body).await {
            Ok(frame) => {
                trace!(
                    session_id = self.info.session_id,
                    channel = %channel,
                    seq = frame.seq,
                    len = frame.len(),
                    "Frame accepted"
                );
                self.stats.frames_ingested += 1;
                self.send(http::plain_response(200, "OK", "OK", false)).await?;
                Ok(true)
            }
            Err(RegistryError::EmptyFrame(_)) => {
                self.send(http::plain_response(400, "Bad Request", "empty frame\n", false))
                    .await?;
                Ok(true)
            }
            Err(e @ RegistryError::TooManyChannels(_)) => {
                warn!(session_id = self.info.session_id, error = %e, "Ingest rejected");
                self.send(http::plain_response(
                    503,
                    "Service Unavailable",
                    "channel limit reached\n",
                    true,
                ))
                .await?;
                Ok(false)
            }
        }
    }

    /// Handle `GET /video[/{channel}]`: the MJPEG push loop
    async fn handle_view(&mut self, channel: &ChannelId) -> Result<()> {
        if let Access::Deny(reason) = self.handler.on_view(channel, &self.info).await {
            warn!(
                session_id = self.info.session_id,
                channel = %channel,
                reason,
                "Viewer denied"
            );
            self.send(http::plain_response(403, "Forbidden", "forbidden\n", true))
                .await?;
            return Ok(());
        }

        let mut sub = match self.registry.subscribe(channel).await {
            Ok(sub) => sub,
            Err(e) => {
                warn!(session_id = self.info.session_id, error = %e, "Subscribe failed");
                self.send(http::plain_response(
                    503,
                    "Service Unavailable",
                    "channel limit reached\n",
                    true,
                ))
                .await?;
                return Ok(());
            }
        };

        debug!(
            session_id = self.info.session_id,
            channel = %channel,
            "Viewer connected"
        );

        let write_timeout = self.config.viewer_write_timeout;
        let mut shutdown = self.shutdown.clone();
        let (mut rd, mut wr) = self.stream.split();

        // Preamble goes out immediately: a viewer on an empty channel
        // sees the multipart headers and then silence until the first frame
        Self::write_timed(&mut wr, mjpeg::PREAMBLE, write_timeout).await?;
        self.stats.bytes_sent += mjpeg::PREAMBLE.len() as u64;

        if let Some(frame) = sub.take_replay() {
            trace!(
                session_id = self.info.session_id,
                channel = %channel,
                seq = frame.seq,
                "Replaying latest frame"
            );
            let part = mjpeg::encode_part(&frame);
            Self::write_timed(&mut wr, &part, write_timeout).await?;
            self.stats.bytes_sent += part.len() as u64;
            self.stats.frames_delivered += 1;
        }

        let mut probe = [0u8; 512];
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(
                        session_id = self.info.session_id,
                        channel = %channel,
                        "Server shutdown, closing viewer"
                    );
                    break;
                }
                res = rd.read(&mut probe) => match res {
                    // The client never sends payload after the request;
                    // data here is ignored, EOF or error means it left
                    Ok(0) | Err(_) => {
                        debug!(
                            session_id = self.info.session_id,
                            channel = %channel,
                            "Viewer disconnected"
                        );
                        break;
                    }
                    Ok(_) => {}
                },
                frame = sub.recv() => match frame {
                    Some(frame) => {
                        let part = mjpeg::encode_part(&frame);
                        if let Err(e) = Self::write_timed(&mut wr, &part, write_timeout).await {
                            debug!(
                                session_id = self.info.session_id,
                                channel = %channel,
                                error = %e,
                                "Viewer write failed, removing"
                            );
                            break;
                        }
                        self.stats.bytes_sent += part.len() as u64;
                        self.stats.frames_delivered += 1;
                    }
                    None => break, // channel removed
                },
            }
        }

        // Dropping the subscription unregisters the viewer exactly once
        Ok(())
    }

    /// Read one request head, leaving any extra bytes (the body) in `buf`
    async fn read_request(
        stream: &mut TcpStream,
        buf: &mut BytesMut,
    ) -> Result<Option<(Request, usize)>> {
        loop {
            if let Some(end) = http::head_end(buf) {
                let head = buf.split_to(end);
                let req = Request::parse(&head)?;
                return Ok(Some((req, end)));
            }
            if buf.len() > MAX_HEAD_SIZE {
                return Err(Error::Request(RequestError::HeadTooLarge));
            }
            let n = stream.read_buf(buf).await?;
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-request",
                )));
            }
        }
    }

    /// Read exactly `len` body bytes, consuming what is already buffered
    async fn read_body(stream: &mut TcpStream, buf: &mut BytesMut, len: usize) -> Result<Bytes> {
        while buf.len() < len {
            let n = stream.read_buf(buf).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-body",
                )));
            }
        }
        Ok(buf.split_to(len).freeze())
    }

    /// Write with the per-viewer timeout so one stalled socket cannot hang the task
    async fn write_timed<W>(wr: &mut W, data: &[u8], dur: Duration) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        match timeout(dur, wr.write_all(data)).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(Error::Timeout("viewer write")),
        }
    }

    async fn send(&mut self, response: Bytes) -> Result<()> {
        self.stream.write_all(&response).await?;
        self.stats.bytes_sent += response.len() as u64;
        Ok(())
    }
}
