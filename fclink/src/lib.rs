//! # fclink
//!
//! A library for talking to MSP flight controllers and reflashing them.
//!
//! This crate provides:
//!
//! - A long-lived [`Session`] that survives board resets and cable pulls
//! - Board identity gathering (variant, version, board ID, target, build)
//! - Optional debug trace enablement on INAV 1.9+ firmware
//! - A build-and-flash sequence driving `make` and `dfu-util`
//!
//! MSP frame encoding is not part of this crate. Plug a codec in through
//! [`FrameCodec`] and a [`Connector`]; on native targets
//! [`SerialConnector`] opens the serial port for it.
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,ignore
//! use fclink::{FlashOptions, FlashOrchestrator, SerialConfig, SerialConnector, Session, SessionOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = SerialConnector::new(SerialConfig::new("/dev/ttyACM0", 115200), MyCodec::new);
//!     let mut session = Session::connect(connector, SessionOptions::new().with_debug_trace(true))?;
//!
//!     // Let the board report its identity first.
//!     while !session.has_detected_target_name() {
//!         session.step()?;
//!     }
//!
//!     let mut flasher = FlashOrchestrator::new(FlashOptions::new());
//!     flasher.flash(&mut session, "inav".as_ref(), None, &mut |event| println!("{event}"))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod device;
pub mod dfu;
pub mod error;
pub mod identity;
pub mod patch;
pub mod port;
pub mod protocol;
pub mod session;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, SerialConnector};
pub use {
    clock::{Clock, SystemClock},
    device::{
        ApiVersion, BuildInfo, DeviceIdentity, FeatureSet, SerialPortEntry, SessionState, Update,
        Version,
    },
    dfu::{
        BootloaderReboot, DfuDescriptor, FlashEvent, FlashJob, FlashOptions, FlashOrchestrator,
        ProcessRunner, ToolCommand, ToolRunner,
    },
    error::{Error, Result},
    patch::DebugTracePolicy,
    port::{Port, SerialConfig},
    protocol::{Command, Connector, Frame, FrameCodec, ReadError},
    session::{LinkState, Session, SessionOptions, Step},
};
