use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// The TCP control connection used to exchange the controller configuration.
///
/// The device listens on its control port, accepts exactly one text request
/// and answers with one text reply. The connection is dropped afterwards.
pub struct ControlConnection {
    stream: TcpStream,
    addr: SocketAddr,
}

impl ControlConnection {
    /// Connect to the device control port (blocking, bounded by
    /// `connect_timeout`).
    ///
    /// `io_timeout` bounds every later read and write on the connection.
    pub fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_read_timeout(Some(io_timeout))?;
        stream.set_write_timeout(Some(io_timeout))?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to control port");
        Ok(Self { stream, addr })
    }

    /// Send `request` and read the single reply (at most `max_reply` bytes).
    ///
    /// An empty reply means the device hung up and is reported as
    /// [`TransportError::Closed`].
    pub fn exchange(&mut self, request: &[u8], max_reply: usize) -> Result<Vec<u8>> {
        self.stream.write_all(request)?;
        self.stream.flush()?;

        let mut reply = vec![0u8; max_reply];
        let len = loop {
            match self.stream.read(&mut reply) {
                Ok(len) => break len,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        };

        if len == 0 {
            return Err(TransportError::Closed);
        }
        reply.truncate(len);
        debug!(addr = %self.addr, len, "control reply received");
        Ok(reply)
    }

    /// Address of the device control port.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl std::fmt::Debug for ControlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConnection")
            .field("addr", &self.addr)
            .finish()
    }
}
