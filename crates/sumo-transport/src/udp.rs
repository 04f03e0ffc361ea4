use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::DatagramTransport;

/// Largest datagram the device link can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Default interval at which a blocked reader re-checks for close.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// UDP endpoint bound to the local d2c port, sending to the device c2d port.
///
/// The socket is not `connect`ed: the device answers from whatever source
/// port it likes, so every datagram arriving on the local port is accepted.
pub struct UdpTransport {
    socket: UdpSocket,
    local: SocketAddr,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Bind `0.0.0.0:local_port` and target `peer` for sends.
    pub fn bind(local_port: u16, peer: SocketAddr) -> Result<Self> {
        let local = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, local_port));
        Self::bind_addr(local, peer)
    }

    /// Bind an explicit local address and target `peer` for sends.
    pub fn bind_addr(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket =
            UdpSocket::bind(local).map_err(|source| TransportError::Bind { addr: local, source })?;
        socket
            .set_read_timeout(Some(DEFAULT_POLL_INTERVAL))
            .map_err(|source| TransportError::Bind { addr: local, source })?;
        let local = socket.local_addr()?;

        info!(%local, %peer, "udp transport bound");

        Ok(Self {
            socket,
            local,
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// Override how often a blocked [`recv`](DatagramTransport::recv) wakes to
    /// check for close.
    pub fn with_poll_interval(self, interval: Duration) -> Result<Self> {
        self.socket.set_read_timeout(Some(interval))?;
        Ok(self)
    }

    /// The bound local address (useful when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The device address every datagram is sent to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    #[cfg(unix)]
    fn wake_reader(&self) {
        use std::os::fd::AsRawFd;

        // SAFETY: the descriptor is owned by `self.socket` and stays open for
        // the lifetime of `self`; shutdown does not release it.
        let rc = unsafe { libc::shutdown(self.socket.as_raw_fd(), libc::SHUT_RDWR) };
        // Unconnected UDP sockets report ENOTCONN but still wake the reader.
        trace!(rc, "udp socket shutdown");
    }

    #[cfg(not(unix))]
    fn wake_reader(&self) {}
}

impl DatagramTransport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let written = self.socket.send_to(datagram, self.peer)?;
        if written != datagram.len() {
            return Err(TransportError::PartialWrite {
                written,
                expected: datagram.len(),
            });
        }
        Ok(written)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.is_closed() {
                return Err(TransportError::Closed);
            }

            match self.socket.recv_from(buf) {
                Ok((0, _)) if self.is_closed() => return Err(TransportError::Closed),
                Ok((len, from)) => {
                    trace!(len, %from, "datagram received");
                    return Ok(len);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(_) if self.is_closed() => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(local = %self.local, "closing udp transport");
        self.wake_reader();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.local)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
