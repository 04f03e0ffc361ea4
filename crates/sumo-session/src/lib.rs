//! Session engine for the Jumping Sumo protocol.
//!
//! A [`Session`] performs the control-port handshake, binds the data socket
//! and runs five cooperating workers, each fed by its own [`ByteQueue`]:
//!
//! - the [`Router`] reads datagrams and routes every frame by type
//! - [`KeepaliveIn`] echoes the device's sync frames
//! - [`KeepaliveOut`] emits our own keepalives and streams motion setpoints
//! - [`InboundProcessor`] records device reports and acks every ioctl
//! - [`ImageChannel`] hands JPEGs to an [`ImageSink`]
//!
//! The caller's thread issues commands through the session, one in flight at
//! a time, each waiting for the device's ack.

pub mod command;
pub mod config;
pub mod confirm;
pub mod error;
pub mod handshake;
pub mod heartbeat;
pub mod image;
pub mod inbound;
pub mod queue;
pub mod router;
pub mod sender;
pub mod session;
pub mod state;
pub mod worker;

pub use command::{AckCheck, CommandChannel};
pub use config::{
    HandshakeConfig, HeartbeatTiming, SessionConfig, DEFAULT_CONTROL_PORT, DEFAULT_DATA_PORT,
    DEFAULT_DEVICE_ADDR,
};
pub use confirm::Confirmation;
pub use error::{Result, SessionError};
pub use handshake::{
    handshake_client, handshake_client_with_config, HandshakeRequest, HandshakeResponse,
    HandshakeResult,
};
pub use heartbeat::{KeepaliveIn, KeepaliveOut, MotionState};
pub use image::{FileSink, ImageChannel, ImageSink, MemorySink, NullSink, PipeSink, DEFAULT_PLAYER};
pub use inbound::InboundProcessor;
pub use queue::ByteQueue;
pub use router::{route_datagram, Route, Router, Routes};
pub use sender::{FrameSender, SeqCounter};
pub use session::{InitReport, Session};
pub use state::{DeviceIdentity, DeviceState};
pub use worker::{spawn, QueueConsumer, StopFlag, Worker, WorkerHandle};
