//! Debug trace enablement.
//!
//! When the operator asks for it and the firmware supports it, the patcher
//! turns on `FEATURE_DEBUG_TRACE` and routes `FUNCTION_DEBUG_TRACE` to the
//! first MSP serial port, persisting each change with `MSP_EEPROM_WRITE`.
//! Bits are only ever set, and once set the guards stop further writes.

use crate::{
    device::{FeatureSet, SessionState, Update, Version, encode_serial_ports, parse_serial_ports},
    error::{Error, Result},
    protocol::{Command, Frame, msp::FUNCTION_DEBUG_TRACE},
};

/// Who may get debug trace turned on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugTracePolicy {
    /// Whether the operator asked for debug trace.
    pub requested: bool,
}

impl DebugTracePolicy {
    /// Only this firmware family implements debug trace.
    pub const VARIANT: &'static str = "INAV";

    /// First version with debug trace support.
    pub const MIN_VERSION: Version = Version::new(1, 9, 0);

    /// Policy for the given operator request.
    pub fn new(requested: bool) -> Self {
        Self { requested }
    }

    /// Whether the board described by `state` should be patched.
    pub fn allows(&self, state: &SessionState) -> bool {
        self.requested
            && state.identity.variant == Self::VARIANT
            && state.identity.version >= Self::MIN_VERSION
    }
}

/// `MSP_FEATURE`: store the mask and turn on debug trace if allowed.
pub fn features(state: &SessionState, frame: &Frame, policy: &DebugTracePolicy) -> Result<Update> {
    let mask = frame
        .reader()
        .read_u32()
        .map_err(|_| Error::Protocol(format!("short feature payload: {:?}", frame.payload)))?;
    let features = FeatureSet(mask);

    let mut next = state.next();
    next.features = Some(features);

    if features.has_debug_trace() || !policy.allows(state) {
        return Ok(Update::new(next));
    }

    let patched = features.with_debug_trace();
    next.features = Some(patched);
    let mut update = Update::new(next);
    update.say("Enabling FEATURE_DEBUG_TRACE");
    update.send(Command::SetFeature, patched.0.to_le_bytes().to_vec());
    update.send(Command::EepromWrite, Vec::new());
    Ok(update)
}

/// `MSP_CF_SERIALPORT_CONFIG`: store the ports and route debug trace to the
/// first MSP port if allowed and no port carries both functions yet.
pub fn serial_ports(
    state: &SessionState,
    frame: &Frame,
    policy: &DebugTracePolicy,
) -> Result<Update> {
    let mut ports = parse_serial_ports(&mut frame.reader())?;

    let mut next = state.next();
    next.serial_ports.clone_from(&ports);

    if !policy.allows(state) || ports.iter().any(|p| p.has_msp_debug_trace()) {
        return Ok(Update::new(next));
    }

    let Some(port) = ports.iter_mut().find(|p| p.has_msp()) else {
        let mut update = Update::new(next);
        update.say("Warning: no serial port has MSP enabled, cannot enable FUNCTION_DEBUG_TRACE");
        return Ok(update);
    };
    port.function_mask |= FUNCTION_DEBUG_TRACE;
    let identifier = port.identifier;

    next.serial_ports.clone_from(&ports);
    let mut update = Update::new(next);
    update.say(format!(
        "Enabling FUNCTION_DEBUG_TRACE on serial port {identifier}"
    ));
    update.send(Command::SetCfSerialConfig, encode_serial_ports(&ports));
    update.send(Command::EepromWrite, Vec::new());
    Ok(update)
}
