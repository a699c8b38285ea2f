// ============================================
// File: crates/orbitguard-transport/src/tcp.rs
// ============================================
//! # TCP Transport Implementation
//!
//! ## Creation Reason
//! Provides the stream sockets the relay speaks: an inbound listener that
//! sensors connect to, a bounded reader for the single message each
//! connection carries, and the one-shot outbound sender used to reach the
//! ground station.
//!
//! ## Main Functionality
//! - `TcpTransport`: Listener built with socket2 (`SO_REUSEADDR`, backlog)
//! - `read_message`: Read to EOF under a deadline and a size cap
//! - `TcpOutbound`: `Outbound` implementation with connect/write timeouts
//!
//! ## Framing
//! ```text
//! sensor: connect ─► write(envelope) ─► shutdown(write) / close
//! relay:  accept  ─► read until EOF (≤ max+1 bytes, ≤ read timeout)
//! ```
//! The cap reads one byte past the limit so the codec can tell an exact-fit
//! message from an oversize one.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A peer that connects and never sends is cut off by the read timeout
//! - Timeouts and resets are not security events; callers log at debug
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP transport implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{ConnectionSource, Outbound};

// ============================================
// Constants
// ============================================

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Read chunk size.
const READ_CHUNK: usize = 1024;

// ============================================
// TcpTransport
// ============================================

/// Inbound TCP listener.
///
/// # Example
/// ```ignore
/// use orbitguard_transport::{read_message, TcpTransport};
///
/// let listener = TcpTransport::bind("0.0.0.0:5000", 128).await?;
/// let (mut stream, source) = listener.accept().await?;
/// let bytes = read_message(&mut stream, 4096, Duration::from_secs(5)).await?;
/// ```
pub struct TcpTransport {
    /// Underlying listener
    listener: TcpListener,
    /// Local address we're bound to
    local_addr: SocketAddr,
    /// Shutdown flag
    shutdown: AtomicBool,
}

impl TcpTransport {
    /// Binds a listener to the specified address string.
    ///
    /// # Errors
    /// - `InvalidAddress`: If the string is not a socket address
    /// - `BindFailed` / `AddressInUse`: If binding fails
    pub async fn bind(addr: impl AsRef<str>, backlog: u32) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr =
            addr_str
                .parse()
                .map_err(|_| TransportError::InvalidAddress {
                    addr: addr_str.to_string(),
                })?;

        Self::bind_addr(socket_addr, backlog).await
    }

    /// Binds a listener to the specified socket address.
    ///
    /// # Socket Options
    /// - `SO_REUSEADDR`: Enabled for quick rebinding after restart
    /// - Non-blocking: Required for async operations
    ///
    /// # Errors
    /// Returns error if binding fails.
    #[allow(clippy::unused_async)]
    pub async fn bind_addr(addr: SocketAddr, backlog: u32) -> Result<Self> {
        info!("Binding TCP listener to {}", addr);

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| TransportError::io("creating TCP socket", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;

        socket.bind(&addr.into()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse { addr }
            } else {
                TransportError::bind_failed(addr, e.to_string())
            }
        })?;

        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        socket
            .listen(backlog)
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| TransportError::io("converting to Tokio listener", e))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        info!("TCP listener bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Accepts the next inbound connection.
    ///
    /// # Errors
    /// - `ShuttingDown`: If `shutdown` has been called
    /// - `AcceptFailed`: If the OS rejects the accept
    pub async fn accept(&self) -> Result<(TcpStream, ConnectionSource)> {
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        let (stream, addr) =
            self.listener
                .accept()
                .await
                .map_err(|e| TransportError::AcceptFailed {
                    reason: e.to_string(),
                })?;

        trace!("Accepted connection from {}", addr);

        Ok((stream, ConnectionSource::new(addr)))
    }

    /// Returns the local address this listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections.
    pub fn shutdown(&self) {
        debug!("Shutting down TCP listener");
        self.shutdown.store(true, Ordering::Release);
    }

    /// Checks if the listener has been shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

// ============================================
// Message Read
// ============================================

/// Reads one message: everything the peer sends until EOF.
///
/// Stops early once `max_size + 1` bytes have arrived, so the returned
/// buffer is never larger than that.
///
/// # Errors
/// - `Timeout`: If the whole read did not finish within `deadline`
/// - `ReceiveFailed`: If the connection failed mid-read
pub async fn read_message<R>(reader: &mut R, max_size: usize, deadline: Duration) -> Result<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    timeout(deadline, read_to_limit(reader, max_size.saturating_add(1)))
        .await
        .map_err(|_| TransportError::timeout("message read", deadline))?
}

async fn read_to_limit<R>(reader: &mut R, limit: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK.min(limit));
    let mut chunk = [0u8; READ_CHUNK];

    while buf.len() < limit {
        let want = READ_CHUNK.min(limit - buf.len());
        let n = reader
            .read(&mut chunk[..want])
            .await
            .map_err(|e| TransportError::ReceiveFailed {
                reason: e.to_string(),
            })?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf.freeze())
}

// ============================================
// TcpOutbound
// ============================================

/// Outbound sender: one fresh TCP connection per delivery.
#[derive(Debug, Clone, Copy)]
pub struct TcpOutbound {
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpOutbound {
    /// Creates a sender with the given deadlines.
    #[must_use]
    pub const fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
        }
    }
}

#[async_trait]
impl Outbound for TcpOutbound {
    async fn deliver(&self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(dest))
            .await
            .map_err(|_| TransportError::timeout("connect", self.connect_timeout))?
            .map_err(|e| TransportError::ConnectFailed {
                dest,
                reason: e.to_string(),
            })?;

        let write = async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        };

        timeout(self.write_timeout, write)
            .await
            .map_err(|_| TransportError::timeout("write", self.write_timeout))?
            .map_err(|e| TransportError::SendFailed {
                dest,
                reason: e.to_string(),
            })?;

        trace!("Delivered {} bytes to {}", payload.len(), dest);
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
