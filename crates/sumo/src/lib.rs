//! Client for the Parrot Jumping Sumo.
//!
//! sumo speaks the robot's reverse-engineered UDP protocol: it performs the
//! control-port handshake, keeps the clock heartbeat alive, streams motion
//! setpoints, issues acknowledged maneuvers and relays the MJPEG video.
//!
//! # Crate Structure
//!
//! - [`transport`]: UDP data socket, TCP control connection, mock transport
//! - [`frame`]: wire header, typed frames, ioctl catalogue
//! - [`session`]: the concurrent session engine
//!
//! ```no_run
//! use sumo::Session;
//!
//! let session = Session::open()?;
//! session.high_jump()?;
//! println!("battery: {}%", session.battery_level());
//! session.close();
//! # Ok::<(), sumo::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use sumo_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sumo_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use sumo_session::*;
}

pub use sumo_frame::{Flip, Jump, Maneuver, Special};
pub use sumo_session::{
    DeviceIdentity, ImageSink, InitReport, Session, SessionConfig, SessionError,
};
