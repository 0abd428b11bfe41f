//! Store connection state machine.
//!
//! # States
//! - Disconnected: no usable connection (initial, after driver disconnect, after close)
//! - Connecting: a connect attempt is in flight
//! - Connected: a connection has been established and published
//! - Errored: the last connect attempt failed; a retry is scheduled
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: connect loop starts an attempt
//! Connecting   → Connected:  attempt succeeded
//! Connecting   → Errored:    attempt failed
//! Errored      → Connecting: retry delay elapsed
//! Connected    → Disconnected: driver reports lost connection
//! Disconnected → Connected:  driver reports re-established connection
//! any          → Disconnected: close on shutdown
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Errored => "errored",
        }
    }

    /// Numeric value exported as a gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            ConnectionState::Disconnected => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Connected => 2.0,
            ConnectionState::Errored => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
