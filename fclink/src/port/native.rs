//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::Result,
        port::{Port, SerialConfig},
        protocol::{Connector, FrameCodec},
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::io::{Read, Write},
};

/// Native serial port implementation.
///
/// The port is released when the value is dropped, which is how a codec
/// closes it.
pub struct NativePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        trace!("Opening {} @ {}", config.port_name, config.baud_rate);
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .open()?;

        Ok(Self {
            port,
            name: config
                .port_name
                .clone(),
            baud_rate: config.baud_rate,
        })
    }
}

impl Port for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::All)?;
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .flush()
    }
}

/// Opens a [`NativePort`] per connection and wraps it in a codec.
///
/// ```rust,ignore
/// let connector = SerialConnector::new(SerialConfig::new("/dev/ttyACM0", 115200), MspCodec::new);
/// let mut session = Session::connect(connector, SessionOptions::new())?;
/// ```
pub struct SerialConnector<F> {
    config: SerialConfig,
    make_codec: F,
}

impl<F, C> SerialConnector<F>
where
    F: FnMut(NativePort) -> C,
    C: FrameCodec,
{
    /// Connector for `config`, building codecs with `make_codec`.
    pub fn new(config: SerialConfig, make_codec: F) -> Self {
        Self { config, make_codec }
    }

    /// Port configuration used for every open.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl<F, C> Connector for SerialConnector<F>
where
    F: FnMut(NativePort) -> C,
    C: FrameCodec,
{
    type Codec = C;

    fn connect(&mut self) -> Result<C> {
        let mut port = NativePort::open(&self.config)?;
        // Drop whatever the board sent while nobody was listening.
        port.clear_buffers()?;
        debug!("Opened {}", port.name());
        Ok((self.make_codec)(port))
    }

    fn port_name(&self) -> &str {
        &self.config.port_name
    }

    fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{Command, Frame, ReadError};

    struct NullCodec;

    impl FrameCodec for NullCodec {
        fn write_command(&mut self, _: Command, _: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read_frame(&mut self) -> std::result::Result<Frame, ReadError> {
            Err(ReadError::Disconnected)
        }

        fn reboot_into_bootloader(&mut self) -> Result<()> {
            Ok(())
        }
    }

    const MISSING: &str = "/dev/fclink-test-no-such-port";

    #[test]
    fn test_open_missing_port_fails() {
        let result = NativePort::open(&SerialConfig::new(MISSING, 115200));
        assert!(matches!(result, Err(Error::Serial(_))));
    }

    #[test]
    fn test_connector_reports_config_and_propagates_open_failure() {
        let mut built = 0;
        let mut connector = SerialConnector::new(SerialConfig::new(MISSING, 57600), |_port| {
            built += 1;
            NullCodec
        });
        assert_eq!(connector.port_name(), MISSING);
        assert_eq!(connector.baud_rate(), 57600);
        assert_eq!(connector.config().baud_rate, 57600);
        assert!(connector.connect().is_err());
        drop(connector);
        assert_eq!(built, 0);
    }
}
