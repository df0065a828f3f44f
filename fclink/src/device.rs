//! Board state accumulated over one session.
//!
//! MSP answers arrive one field group at a time and in no particular order,
//! so every record here starts empty and is filled in by the frame handlers
//! in [`crate::identity`] and [`crate::patch`]. The session keeps a single
//! [`SessionState`] and swaps it for the one a handler returns.

use {
    crate::{
        error::{Error, Result},
        protocol::{
            Command, FieldReader,
            msp::{FEATURE_DEBUG_TRACE, FUNCTION_DEBUG_TRACE, FUNCTION_MSP},
        },
    },
    byteorder::{LittleEndian, WriteBytesExt},
    std::fmt,
};

/// Firmware version triple, ordered lexicographically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Patch version.
    pub patch: u8,
}

impl Version {
    /// Create a version triple.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// MSP API version reported by the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiVersion {
    /// Protocol version.
    pub protocol: u8,
    /// API major version.
    pub major: u8,
    /// API minor version.
    pub minor: u8,
}

/// Build stamp of the running firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildInfo {
    /// Build date, `MMM DD YYYY`.
    pub date: String,
    /// Build time, `HH:MM:SS`.
    pub time: String,
    /// Short source revision (7 chars on BF/CF, 8 on INAV).
    pub revision: String,
}

/// What the board told us about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    /// Firmware variant tag, e.g. `INAV` or `BTFL`.
    pub variant: String,
    /// Firmware version.
    pub version: Version,
    /// Four character board identifier.
    pub board_id: String,
    /// Build target name, only sent by recent firmware.
    pub target_name: Option<String>,
    /// Build stamp.
    pub build: Option<BuildInfo>,
    /// MSP API version.
    pub api: Option<ApiVersion>,
}

impl DeviceIdentity {
    /// Whether variant, version and board ID are all known.
    pub fn is_complete(&self) -> bool {
        !self.variant.is_empty() && self.version.major != 0 && !self.board_id.is_empty()
    }

    /// One line summary, once the identity is complete.
    pub fn summary(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        let target = self
            .target_name
            .as_deref()
            .map(|name| format!(", target {name}"))
            .unwrap_or_default();
        Some(format!(
            "{} {} (board {}{target})",
            self.variant, self.version, self.board_id
        ))
    }
}

/// Firmware feature mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureSet(pub u32);

impl FeatureSet {
    /// Whether the debug trace feature is on.
    pub fn has_debug_trace(self) -> bool {
        self.0 & FEATURE_DEBUG_TRACE != 0
    }

    /// Same mask with the debug trace feature set.
    #[must_use]
    pub fn with_debug_trace(self) -> Self {
        Self(self.0 | FEATURE_DEBUG_TRACE)
    }
}

/// One serial port function assignment, as carried by `MSP_CF_SERIALPORT_CONFIG`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialPortEntry {
    /// Port identifier.
    pub identifier: u8,
    /// Function flags.
    pub function_mask: u16,
    /// MSP baud rate index.
    pub msp_baud: u8,
    /// GPS baud rate index.
    pub gps_baud: u8,
    /// Telemetry baud rate index.
    pub telemetry_baud: u8,
    /// Peripheral (blackbox) baud rate index.
    pub peripheral_baud: u8,
}

impl SerialPortEntry {
    /// Encoded size of one entry.
    pub const SIZE: usize = 7;

    /// Whether the port carries MSP.
    pub fn has_msp(&self) -> bool {
        self.function_mask & FUNCTION_MSP != 0
    }

    /// Whether the port carries both MSP and debug trace.
    pub fn has_msp_debug_trace(&self) -> bool {
        let mask = FUNCTION_MSP | FUNCTION_DEBUG_TRACE;
        self.function_mask & mask == mask
    }

    /// Read the next entry. `Ok(None)` once the payload is used up.
    pub fn read(reader: &mut FieldReader<'_>) -> Result<Option<Self>> {
        if reader.is_empty() {
            return Ok(None);
        }
        let remaining = reader.remaining();
        let truncated =
            |_| Error::Protocol(format!("truncated serial port entry ({remaining} bytes left)"));
        Ok(Some(Self {
            identifier: reader.read_u8().map_err(truncated)?,
            function_mask: reader.read_u16().map_err(truncated)?,
            msp_baud: reader.read_u8().map_err(truncated)?,
            gps_baud: reader.read_u8().map_err(truncated)?,
            telemetry_baud: reader.read_u8().map_err(truncated)?,
            peripheral_baud: reader.read_u8().map_err(truncated)?,
        }))
    }

    /// Append the wire encoding of this entry to `buf`.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.identifier);
        buf.write_u16::<LittleEndian>(self.function_mask)
            .unwrap();
        buf.push(self.msp_baud);
        buf.push(self.gps_baud);
        buf.push(self.telemetry_baud);
        buf.push(self.peripheral_baud);
    }
}

/// Decode the variable-length entry sequence of a serial config frame.
pub fn parse_serial_ports(reader: &mut FieldReader<'_>) -> Result<Vec<SerialPortEntry>> {
    let mut entries = Vec::new();
    while let Some(entry) = SerialPortEntry::read(reader)? {
        entries.push(entry);
    }
    Ok(entries)
}

/// Encode an entry sequence for `MSP_SET_CF_SERIALPORT_CONFIG`.
pub fn encode_serial_ports(entries: &[SerialPortEntry]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entries.len() * SerialPortEntry::SIZE);
    for entry in entries {
        entry.write_to(&mut buf);
    }
    buf
}

/// Everything learned from the board since the last (re)connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Number of successful reconnects before this state was created.
    pub epoch: u64,
    /// Number of updates applied within this epoch.
    pub revision: u64,
    /// Board identity.
    pub identity: DeviceIdentity,
    /// Feature mask, once received.
    pub features: Option<FeatureSet>,
    /// Serial port assignments, in board order.
    pub serial_ports: Vec<SerialPortEntry>,
}

impl SessionState {
    /// Empty state for the given epoch.
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    /// Copy of this state with the revision bumped, ready to be modified.
    #[must_use]
    pub fn next(&self) -> Self {
        let mut next = self.clone();
        next.revision += 1;
        next
    }
}

/// A command the session should send on behalf of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Command to send.
    pub command: Command,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

/// Result of applying one frame to a [`SessionState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Replacement state.
    pub state: SessionState,
    /// Commands to send, in order.
    pub outgoing: Vec<Outgoing>,
    /// Lines for the operator.
    pub messages: Vec<String>,
}

impl Update {
    /// Update carrying `state` with nothing to send or print.
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            outgoing: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Queue an operator message.
    pub fn say(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Queue a command.
    pub fn send(&mut self, command: Command, payload: Vec<u8>) {
        self.outgoing.push(Outgoing { command, payload });
    }
}
