//! TCP transport: one length-prefixed frame stream per socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

use crate::frame::{FrameDecoder, encode_frame};
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 8 * 1024;

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::BindFailed`] if the port cannot be
    /// acquired. Callers treat this as fatal; it is never retried here.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_frame_len: FrameDecoder::DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Overrides the frame ceiling applied to accepted connections.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, addr, self.max_frame_len);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }
}

/// Read side of a connection: the socket half plus its frame buffer.
struct FrameReader {
    half: OwnedReadHalf,
    decoder: FrameDecoder,
}

/// A single framed TCP connection.
///
/// The read and write halves sit behind separate locks so one task can
/// wait for inbound frames while another flushes outbound ones.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    max_frame_len: usize,
    reader: Mutex<FrameReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Opens a client-side connection to `addr`.
    pub async fn connect(
        addr: impl ToSocketAddrs,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::AcceptFailed)?;
        Ok(Self::from_stream(
            stream,
            peer,
            FrameDecoder::DEFAULT_MAX_FRAME_LEN,
        ))
    }

    fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        max_frame_len: usize,
    ) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        let (read, write) = stream.into_split();
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        Self {
            id,
            peer,
            max_frame_len,
            reader: Mutex::new(FrameReader {
                half: read,
                decoder: FrameDecoder::with_max_frame_len(max_frame_len),
            }),
            writer: Mutex::new(write),
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, payload: &[u8]) -> Result<(), Self::Error> {
        let mut frame = BytesMut::new();
        encode_frame(payload, self.max_frame_len, &mut frame)?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Bytes>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let FrameReader { half, decoder } = &mut *reader;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = decoder.decode_next()? {
                return Ok(Some(frame));
            }
            let n = half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if decoder.buffered() > 0 {
                    tracing::debug!(
                        id = %self.id,
                        discarded = decoder.buffered(),
                        "peer closed mid-frame"
                    );
                }
                return Ok(None);
            }
            decoder.extend(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
