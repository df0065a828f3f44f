//! MSP command codes and flag bits used by the session.
//!
//! Codes follow the MultiWii Serial Protocol v1 numbering shared by
//! Cleanflight, Betaflight and INAV.

/// MSP commands the session sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Protocol and API version (1).
    ApiVersion = 1,
    /// Firmware variant tag, e.g. `INAV` (2).
    FcVariant = 2,
    /// Firmware version triple (3).
    FcVersion = 3,
    /// Board identifier and target name (4).
    BoardInfo = 4,
    /// Build date, time and revision (5).
    BuildInfo = 5,
    /// Enabled feature mask (36).
    Feature = 36,
    /// Replace the feature mask (37).
    SetFeature = 37,
    /// Serial port function assignments (54).
    CfSerialConfig = 54,
    /// Replace serial port function assignments (55).
    SetCfSerialConfig = 55,
    /// Reboot acknowledgement (68).
    Reboot = 68,
    /// Persist configuration to storage (250).
    EepromWrite = 250,
    /// Debug trace text pushed by the firmware (253).
    DebugMsg = 253,
}

impl Command {
    /// Numeric wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a command by its wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        let command = match code {
            1 => Self::ApiVersion,
            2 => Self::FcVariant,
            3 => Self::FcVersion,
            4 => Self::BoardInfo,
            5 => Self::BuildInfo,
            36 => Self::Feature,
            37 => Self::SetFeature,
            54 => Self::CfSerialConfig,
            55 => Self::SetCfSerialConfig,
            68 => Self::Reboot,
            250 => Self::EepromWrite,
            253 => Self::DebugMsg,
            _ => return None,
        };
        Some(command)
    }
}

/// Requests sent on every fresh connection, in order.
pub const INFO_REQUESTS: [Command; 7] = [
    Command::ApiVersion,
    Command::FcVariant,
    Command::FcVersion,
    Command::BoardInfo,
    Command::BuildInfo,
    Command::Feature,
    Command::CfSerialConfig,
];

/// Feature bit enabling the firmware debug trace output.
pub const FEATURE_DEBUG_TRACE: u32 = 1 << 31;

/// Serial port function: MSP.
pub const FUNCTION_MSP: u16 = 1 << 0;

/// Serial port function: debug trace output.
pub const FUNCTION_DEBUG_TRACE: u16 = 1 << 15;
