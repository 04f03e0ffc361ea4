use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Address the device answers on when acting as its own access point.
pub const DEFAULT_DEVICE_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 1);
pub const DEFAULT_CONTROL_PORT: u16 = 44444;
pub const DEFAULT_DATA_PORT: u16 = 54321;

/// Configuration for the control-port handshake and the UDP endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub device_addr: IpAddr,
    /// TCP port accepting the controller configuration.
    pub control_port: u16,
    pub controller_name: String,
    pub controller_type: String,
    /// Local UDP port the device sends to (device-to-controller).
    pub d2c_port: u16,
    /// Device UDP port the controller sends to, unless the device names another.
    pub c2d_port: u16,
    pub connect_timeout: Duration,
    /// Bound for each read and write on the control connection.
    pub io_timeout: Duration,
    /// Largest accepted configuration reply, in bytes.
    pub max_reply: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            device_addr: IpAddr::V4(DEFAULT_DEVICE_ADDR),
            control_port: DEFAULT_CONTROL_PORT,
            controller_name: "PC".to_string(),
            controller_type: "PC".to_string(),
            d2c_port: DEFAULT_DATA_PORT,
            c2d_port: DEFAULT_DATA_PORT,
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(2),
            max_reply: 4 * 1024,
        }
    }
}

impl HandshakeConfig {
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.device_addr, self.control_port)
    }

    /// Wildcard address the UDP socket binds to.
    pub fn local_data_addr(&self) -> SocketAddr {
        let any = match self.device_addr {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };
        SocketAddr::new(any, self.d2c_port)
    }
}

/// Pacing of the keepalive-out and motion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatTiming {
    /// Bound on each poll for the echo of our own keepalive.
    pub response_poll: Duration,
    /// Pause after each move frame.
    pub motion_interval: Duration,
    /// Pause when neither keepalive nor motion is active.
    pub idle_interval: Duration,
    /// Pause after a keepalive could not be sent.
    pub send_backoff: Duration,
}

impl Default for HeartbeatTiming {
    fn default() -> Self {
        Self {
            response_poll: Duration::from_millis(5),
            motion_interval: Duration::from_millis(20),
            idle_interval: Duration::from_millis(50),
            send_backoff: Duration::from_millis(100),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub handshake: HandshakeConfig,
    /// Wait for the device to confirm the date.
    pub date_wait: Duration,
    /// Wait for the device to confirm the time.
    pub time_wait: Duration,
    /// Wait for the end of the identity reports.
    pub info_wait: Duration,
    /// Wait for the ack of each outgoing command.
    pub ack_timeout: Duration,
    pub heartbeat: HeartbeatTiming,
    /// Emit our own keepalive frames. The device does not need them.
    pub keepalive_out: bool,
    /// How often a blocked UDP read checks whether the session was closed.
    pub recv_poll: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            date_wait: Duration::from_millis(100),
            time_wait: Duration::from_millis(100),
            info_wait: Duration::from_millis(1000),
            ack_timeout: Duration::from_secs(1),
            heartbeat: HeartbeatTiming::default(),
            keepalive_out: false,
            recv_poll: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_device_access_point() {
        let config = SessionConfig::default();
        assert_eq!(
            config.handshake.control_addr(),
            "192.168.2.1:44444".parse::<SocketAddr>().expect("valid addr")
        );
        assert_eq!(
            config.handshake.local_data_addr(),
            "0.0.0.0:54321".parse::<SocketAddr>().expect("valid addr")
        );
        assert!(!config.keepalive_out);
        assert_eq!(config.heartbeat.motion_interval, Duration::from_millis(20));
    }
}
