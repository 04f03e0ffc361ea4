use serde::{Deserialize, Serialize};
use sumo_transport::ControlConnection;
use tracing::{debug, info, warn};

use crate::config::HandshakeConfig;
use crate::error::{Result, SessionError};

/// Controller configuration sent on the control port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub controller_name: String,
    pub controller_type: String,
    /// UDP port the controller listens on.
    pub d2c_port: u16,
}

/// The device's reply. Only the fields we act on are typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HandshakeResponse {
    /// Zero when the device accepted the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// UDP port the device listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c2d_port: Option<u16>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of a completed control-port exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResult {
    /// The reply as received, NUL bytes and trailing whitespace stripped.
    pub raw_reply: String,
    /// `None` when the reply was not JSON.
    pub response: Option<HandshakeResponse>,
    /// Port the data socket sends to.
    pub c2d_port: u16,
}

impl HandshakeRequest {
    pub fn from_config(config: &HandshakeConfig) -> Self {
        Self {
            controller_name: config.controller_name.clone(),
            controller_type: config.controller_type.clone(),
            d2c_port: config.d2c_port,
        }
    }
}

/// Perform the control-port exchange using default configuration.
pub fn handshake_client() -> Result<HandshakeResult> {
    handshake_client_with_config(&HandshakeConfig::default())
}

/// Perform the control-port exchange using explicit configuration.
///
/// Connect, write and an empty reply fail with
/// [`SessionError::HandshakeFailed`]. A reply that does not parse is logged
/// and tolerated: the device's configuration text is informational.
pub fn handshake_client_with_config(config: &HandshakeConfig) -> Result<HandshakeResult> {
    let addr = config.control_addr();
    let mut conn = ControlConnection::connect(addr, config.connect_timeout, config.io_timeout)
        .map_err(|err| SessionError::HandshakeFailed(format!("connect to {addr}: {err}")))?;

    let request = serde_json::to_vec(&HandshakeRequest::from_config(config))?;
    let reply = conn
        .exchange(&request, config.max_reply)
        .map_err(|err| SessionError::HandshakeFailed(format!("config exchange with {addr}: {err}")))?;

    let result = interpret_reply(&reply, config.c2d_port);
    info!(%addr, c2d_port = result.c2d_port, "controller configuration accepted");
    Ok(result)
}

fn interpret_reply(reply: &[u8], default_c2d_port: u16) -> HandshakeResult {
    let text = String::from_utf8_lossy(reply);
    let raw_reply = text.trim_end_matches(['\0', '\n', '\r', ' ']).to_string();
    debug!(reply = %raw_reply, "device configuration");

    let response = match serde_json::from_str::<HandshakeResponse>(&raw_reply) {
        Ok(response) => Some(response),
        Err(err) => {
            warn!(error = %err, "device configuration is not JSON, continuing");
            None
        }
    };

    if let Some(status) = response.as_ref().and_then(|r| r.status) {
        if status != 0 {
            warn!(status, "device reported non-zero configuration status");
        }
    }

    let c2d_port = response
        .as_ref()
        .and_then(|r| r.c2d_port)
        .unwrap_or(default_c2d_port);

    HandshakeResult {
        raw_reply,
        response,
        c2d_port,
    }
}
