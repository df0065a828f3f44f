//! Codec seam between the session and the MSP wire format.
//!
//! fclink does not encode or decode MSP frames itself. A codec implementation
//! plugs in through [`FrameCodec`], and a [`Connector`] knows how to open a
//! fresh codec over a new transport every time the session (re)connects.
//!
//! ```text
//! +-----------+    Frame / ReadError    +------------+    bytes    +-----------+
//! |  Session  | <---------------------- | FrameCodec | <---------- | Transport |
//! |           | ----------------------> |            | ----------> | (serial)  |
//! +-----------+  Command + payload      +------------+             +-----------+
//! ```

pub mod msp;

pub use msp::Command;

use {
    crate::error::{Error, Result},
    byteorder::{LittleEndian, ReadBytesExt},
    std::fmt,
    thiserror::Error as ThisError,
};

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Numeric message code.
    pub code: u16,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from a code and payload.
    pub fn new(code: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Create a frame for a known command.
    pub fn for_command(command: Command, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(command.code(), payload)
    }

    /// The known command this frame answers, if any.
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.code)
    }

    /// Byte at `index`, or 0 when the payload is shorter.
    pub fn byte(&self, index: usize) -> u8 {
        self.payload
            .get(index)
            .copied()
            .unwrap_or(0)
    }

    /// Typed little-endian reader over the payload.
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.payload)
    }
}

/// Signals that a read ran past the end of the frame payload.
///
/// Repeated sub-structures (serial port entries) are terminated by this
/// condition rather than by an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("end of frame data")]
pub struct EndOfData;

/// Cursor reading little-endian fields from a payload.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    /// Create a reader over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> std::result::Result<u8, EndOfData> {
        self.buf.read_u8().map_err(|_| EndOfData)
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> std::result::Result<u16, EndOfData> {
        self.buf
            .read_u16::<LittleEndian>()
            .map_err(|_| EndOfData)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> std::result::Result<u32, EndOfData> {
        self.buf
            .read_u32::<LittleEndian>()
            .map_err(|_| EndOfData)
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> std::result::Result<&'a [u8], EndOfData> {
        if self.buf.len() < len {
            return Err(EndOfData);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}

/// Classified failure of [`FrameCodec::read_frame`].
#[derive(Debug, ThisError)]
pub enum ReadError {
    /// The transport reached end-of-stream; the board went away.
    #[error("board disconnected")]
    Disconnected,

    /// A recoverable decode-level problem. The stream is still usable.
    #[error("MSP error: {0}")]
    Protocol(String),

    /// Anything else. The session cannot continue.
    #[error(transparent)]
    Fatal(Error),
}

/// Frame encoder/decoder bound to one open transport.
pub trait FrameCodec {
    /// Encode and send a command with the given payload.
    fn write_command(&mut self, command: Command, payload: &[u8]) -> Result<()>;

    /// Block until the next frame is decoded or the read fails.
    fn read_frame(&mut self) -> std::result::Result<Frame, ReadError>;

    /// Send the zero-payload reboot-to-bootloader command.
    ///
    /// The board drops off the bus right after; no response is expected.
    fn reboot_into_bootloader(&mut self) -> Result<()>;

    /// Release the transport.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens a fresh [`FrameCodec`] every time it is asked to.
pub trait Connector {
    /// Codec produced by this connector.
    type Codec: FrameCodec;

    /// Open the transport and wrap it in a codec.
    fn connect(&mut self) -> Result<Self::Codec>;

    /// Port name used for operator messages.
    fn port_name(&self) -> &str;

    /// Baud rate used for operator messages.
    fn baud_rate(&self) -> u32;
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Some(command) => write!(f, "{command:?} ({} bytes)", self.payload.len()),
            None => write!(f, "MSP frame {} ({} bytes)", self.code, self.payload.len()),
        }
    }
}
