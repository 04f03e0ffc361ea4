//! Network transport for talking to a Jumping Sumo.
//!
//! Two channels reach the device:
//! - a short-lived TCP control connection used once per session to exchange
//!   the controller configuration ([`ControlConnection`])
//! - a UDP socket carrying every protocol frame afterwards ([`UdpTransport`])
//!
//! This is the lowest layer of sumo. Everything above talks to the datagram
//! side through the [`DatagramTransport`] trait so that tests can swap in
//! [`MockTransport`].

pub mod control;
pub mod error;
pub mod mock;
pub mod traits;
pub mod udp;

pub use control::ControlConnection;
pub use error::{Result, TransportError};
pub use mock::MockTransport;
pub use traits::DatagramTransport;
pub use udp::{UdpTransport, MAX_DATAGRAM_SIZE};
