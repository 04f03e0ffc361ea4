use crate::error::Result;

/// A connected, message-oriented link to the device.
///
/// Implementations must be shareable between threads: one reader thread sits
/// in [`recv`](DatagramTransport::recv) while any number of writers call
/// [`send`](DatagramTransport::send). Callers that need writes to stay whole
/// and ordered serialize them above this layer.
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram, returning the number of bytes written.
    fn send(&self, datagram: &[u8]) -> Result<usize>;

    /// Block until one datagram arrives and copy it into `buf`.
    ///
    /// Returns [`TransportError::Closed`](crate::TransportError::Closed) once
    /// [`close`](DatagramTransport::close) was called, including for a reader
    /// that was already blocked at that moment.
    fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Close the transport and wake any blocked reader.
    fn close(&self);

    /// Whether [`close`](DatagramTransport::close) has been called.
    fn is_closed(&self) -> bool;
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for std::sync::Arc<T> {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        (**self).send(datagram)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).recv(buf)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
