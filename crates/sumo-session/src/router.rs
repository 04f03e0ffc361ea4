//! The dispatch router: the single reader of the data socket.

use std::sync::Arc;

use bytes::Bytes;
use sumo_frame::{kind, split_datagram, Header};
use sumo_transport::{DatagramTransport, MAX_DATAGRAM_SIZE};
use tracing::{debug, error, trace, warn};

use crate::queue::ByteQueue;
use crate::worker::{StopFlag, Worker};

/// Where an inbound frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Device-initiated sync, to be echoed.
    KeepaliveIn,
    /// Echo of a keepalive we sent.
    KeepaliveOut,
    Image,
    /// Acks of our commands, consumed by the session.
    Ack,
    /// Device-originated ioctls.
    Inbound,
    Unhandled,
}

impl Route {
    pub fn for_header(header: &Header) -> Self {
        match header.frame_type {
            kind::SYNC if header.ext == kind::SYNC_EXT_ECHO => Route::KeepaliveOut,
            kind::SYNC => Route::KeepaliveIn,
            kind::IMAGE => Route::Image,
            kind::ACK => Route::Ack,
            kind::IOCTL => Route::Inbound,
            _ => Route::Unhandled,
        }
    }
}

/// The consumer queues the router feeds.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    pub keepalive_in: Arc<ByteQueue>,
    pub keepalive_out: Arc<ByteQueue>,
    pub image: Arc<ByteQueue>,
    pub acks: Arc<ByteQueue>,
    pub inbound: Arc<ByteQueue>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, route: Route) -> Option<&ByteQueue> {
        match route {
            Route::KeepaliveIn => Some(&self.keepalive_in),
            Route::KeepaliveOut => Some(&self.keepalive_out),
            Route::Image => Some(&self.image),
            Route::Ack => Some(&self.acks),
            Route::Inbound => Some(&self.inbound),
            Route::Unhandled => None,
        }
    }
}

/// Split one datagram into frames and push each onto its queue, in wire order.
///
/// Processing stops at the first malformed or truncated frame; frames before
/// it are still delivered. Returns the number of frames delivered.
pub fn route_datagram(datagram: Bytes, routes: &Routes) -> usize {
    let total = datagram.len();
    let mut delivered = 0;

    for raw in split_datagram(datagram) {
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, datagram_len = total, "dropping rest of datagram");
                break;
            }
        };

        let route = Route::for_header(&raw.header);
        match routes.queue(route) {
            Some(queue) => {
                trace!(
                    ?route,
                    frame_type = kind::type_name(raw.header.frame_type),
                    ext = raw.header.ext,
                    seqno = raw.header.seqno,
                    size = raw.header.size,
                    "routed"
                );
                queue.push(raw.bytes);
                delivered += 1;
            }
            None => {
                warn!(
                    frame_type = raw.header.frame_type,
                    ext = raw.header.ext,
                    "unhandled frame type, dropped"
                );
            }
        }
    }

    delivered
}

/// Worker reading datagrams off the transport and routing them.
///
/// Exits when the transport is closed or fails. On a failure it closes the
/// transport itself so the rest of the session observes the loss, and in
/// both cases wakes a command waiting for its ack.
pub struct Router {
    transport: Arc<dyn DatagramTransport>,
    routes: Routes,
    stop: StopFlag,
}

impl Router {
    pub fn new(transport: Arc<dyn DatagramTransport>, routes: Routes, stop: StopFlag) -> Self {
        Self {
            transport,
            routes,
            stop,
        }
    }
}

impl Worker for Router {
    fn name(&self) -> &'static str {
        "router"
    }

    fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn run(&mut self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        while !self.stop.is_stop_requested() {
            match self.transport.recv(&mut buf) {
                Ok(len) => {
                    route_datagram(Bytes::copy_from_slice(&buf[..len]), &self.routes);
                }
                Err(err) if err.is_closed() => {
                    debug!("transport closed, router exiting");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "receive failed, session lost");
                    self.transport.close();
                    break;
                }
            }
        }
        self.routes.acks.push_sentinel();
    }
}
