//! Serial transport used underneath the MSP codec.
//!
//! The session never touches a port directly. A [`Connector`] opens a
//! [`Port`] and hands it to a codec constructor, and does so again every
//! time the board comes back after a disconnect.
//!
//! ```text
//! +-----------------+  connect()  +------------------+  open  +-----------+
//! |     Session     | ----------> | SerialConnector  | -----> | NativePort|
//! +-----------------+             +--------+---------+        +-----+-----+
//!                                          | make_codec(port)       |
//!                                          v                        |
//!                                 +------------------+   Read/Write |
//!                                 |    FrameCodec    | <------------+
//!                                 +------------------+
//! ```
//!
//! [`Connector`]: crate::protocol::Connector

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default MSP baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte transport a codec reads frames from.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, SerialConnector};
