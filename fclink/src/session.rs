//! Long-lived MSP session with automatic reconnection.
//!
//! A [`Session`] owns the codec for one board. Every time a codec is opened
//! the session asks the board for its identity and configuration, then feeds
//! whatever comes back through the identity and patch handlers.
//!
//! ```text
//!              read ok / protocol error
//!                 +-------------+
//!                 v             |
//!          +-------------+------+    disconnected     +--------------+
//! connect->|  Connected  |---------------------------->| Reconnecting |--+
//!          +-------------+<----------------------------+--------------+  | open failed,
//!                 |            open ok: reset state,          ^           | sleep 1ms
//!                 | fatal      resend info requests           +-----------+
//!                 v
//!          returned to caller
//! ```
//!
//! Retries are not backed off.

use {
    crate::{
        clock::{Clock, SystemClock},
        device::{DeviceIdentity, SessionState, Update},
        dfu::BootloaderReboot,
        error::{Error, Result},
        identity,
        patch::{self, DebugTracePolicy},
        protocol::{Command, Connector, Frame, FrameCodec, ReadError, msp::INFO_REQUESTS},
    },
    log::{debug, info, trace, warn},
    std::{
        convert::Infallible,
        io::{self, Write},
        time::Duration,
    },
};

/// Delay between two reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1);

/// Session configuration.
pub struct SessionOptions {
    /// Turn on debug trace when the firmware supports it.
    pub enable_debug_trace: bool,
    /// Where operator messages are written.
    pub output: Box<dyn Write + Send>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enable_debug_trace: false,
            output: Box::new(io::stdout()),
        }
    }
}

impl SessionOptions {
    /// Default options: no debug trace, messages to stdout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request debug trace enablement.
    #[must_use]
    pub fn with_debug_trace(mut self, enable: bool) -> Self {
        self.enable_debug_trace = enable;
        self
    }

    /// Redirect operator messages.
    #[must_use]
    pub fn with_output<W: Write + Send + 'static>(mut self, output: W) -> Self {
        self.output = Box::new(output);
        self
    }
}

/// Link state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A codec is open.
    Connected,
    /// The board went away; `attempts` opens have been tried so far.
    Reconnecting {
        /// Open attempts in the current reconnect cycle.
        attempts: u64,
    },
    /// [`Session::close`] was called.
    Closed,
}

/// Outcome of one [`Session::step`].
#[derive(Debug)]
pub enum Step {
    /// A frame was read and handled.
    Frame(Frame),
    /// The codec reported a recoverable error.
    ProtocolError(String),
    /// The board disconnected and the session reconnected.
    Reconnected {
        /// Open attempts it took.
        attempts: u64,
    },
}

/// Apply one frame to `state`.
///
/// Pure: nothing is sent or printed, the returned [`Update`] says what to do.
pub fn apply_frame(
    state: &SessionState,
    frame: &Frame,
    policy: &DebugTracePolicy,
) -> Result<Update> {
    let Some(command) = frame.command() else {
        let mut update = Update::new(state.clone());
        update.say(format!(
            "Unhandled MSP frame {} with payload {:?}",
            frame.code, frame.payload
        ));
        return Ok(update);
    };

    match command {
        Command::ApiVersion => identity::api_version(state, frame),
        Command::FcVariant => identity::variant(state, frame),
        Command::FcVersion => identity::version(state, frame),
        Command::BoardInfo => identity::board_info(state, frame),
        Command::BuildInfo => identity::build_info(state, frame),
        Command::DebugMsg => Ok(identity::debug_message(state, frame)),
        Command::Feature => patch::features(state, frame, policy),
        Command::CfSerialConfig => patch::serial_ports(state, frame, policy),
        Command::Reboot => {
            let mut update = Update::new(state.clone());
            update.say("Rebooting board...");
            Ok(update)
        },
        Command::SetFeature | Command::SetCfSerialConfig | Command::EepromWrite => {
            Ok(Update::new(state.clone()))
        },
    }
}

/// MSP session with one board.
pub struct Session<K: Connector, C: Clock = SystemClock> {
    connector: K,
    codec: Option<K::Codec>,
    clock: C,
    policy: DebugTracePolicy,
    output: Box<dyn Write + Send>,
    state: SessionState,
    link: LinkState,
}

impl<K: Connector> Session<K> {
    /// Open the transport and request the board info.
    pub fn connect(connector: K, options: SessionOptions) -> Result<Self> {
        Self::connect_with_clock(connector, options, SystemClock)
    }
}

impl<K: Connector, C: Clock> Session<K, C> {
    /// Like [`Session::connect`], sleeping through `clock` while reconnecting.
    pub fn connect_with_clock(mut connector: K, options: SessionOptions, clock: C) -> Result<Self> {
        let codec = connector.connect()?;
        info!(
            "Connected to {} @ {}bps",
            connector.port_name(),
            connector.baud_rate()
        );

        let mut session = Self {
            connector,
            codec: Some(codec),
            clock,
            policy: DebugTracePolicy::new(options.enable_debug_trace),
            output: options.output,
            state: SessionState::new(0),
            link: LinkState::Connected,
        };
        session.request_info();
        Ok(session)
    }

    /// Current accumulated state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Board identity gathered so far.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.state.identity
    }

    /// Whether the board reported its build target name.
    pub fn has_detected_target_name(&self) -> bool {
        self.state
            .identity
            .target_name
            .is_some()
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Port this session talks to.
    pub fn port_name(&self) -> &str {
        self.connector.port_name()
    }

    /// Close the codec. Further reads fail.
    pub fn close(&mut self) {
        self.release_codec();
        self.link = LinkState::Closed;
    }

    /// Ask the board for a normal reboot. It comes back through the
    /// reconnect path.
    pub fn reboot(&mut self) -> Result<()> {
        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| Error::Fatal("session is closed".into()))?;
        debug!("Requesting reboot");
        codec.write_command(Command::Reboot, &[])
    }

    /// Send the reboot-to-bootloader command.
    pub fn reboot_to_bootloader(&mut self) -> Result<()> {
        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| Error::Fatal("session is closed".into()))?;
        debug!("Requesting bootloader reboot");
        codec.reboot_into_bootloader()
    }

    /// Read and handle one frame, reconnecting if the board went away.
    pub fn step(&mut self) -> Result<Step> {
        let Some(codec) = self.codec.as_mut() else {
            return Err(Error::Fatal("session is closed".into()));
        };

        match codec.read_frame() {
            Ok(frame) => {
                trace!("Received {frame}");
                self.handle_frame(&frame);
                Ok(Step::Frame(frame))
            },
            Err(ReadError::Disconnected) => {
                self.say("Board disconnected, trying to reconnect...");
                self.release_codec();
                let attempts = self.reconnect();
                Ok(Step::Reconnected { attempts })
            },
            Err(ReadError::Protocol(message)) => {
                self.say(&format!("MSP error: {message}"));
                Ok(Step::ProtocolError(message))
            },
            Err(ReadError::Fatal(err)) => Err(err),
        }
    }

    /// Receive loop. Each handled frame is also passed to `on_frame`.
    ///
    /// Only returns when reading fails fatally.
    pub fn run_with<F: FnMut(&Frame)>(&mut self, mut on_frame: F) -> Result<Infallible> {
        loop {
            if let Step::Frame(frame) = self.step()? {
                on_frame(&frame);
            }
        }
    }

    /// Receive loop without an observer.
    pub fn run(&mut self) -> Result<Infallible> {
        self.run_with(|_| {})
    }

    fn reconnect(&mut self) -> u64 {
        let mut attempts = 0;
        loop {
            attempts += 1;
            self.link = LinkState::Reconnecting { attempts };
            match self.connector.connect() {
                Ok(codec) => {
                    let message = format!(
                        "Reconnected to {} @ {}bps",
                        self.connector.port_name(),
                        self.connector.baud_rate()
                    );
                    self.say(&message);
                    debug!("Reconnected after {attempts} attempts");
                    self.state = SessionState::new(self.state.epoch + 1);
                    self.codec = Some(codec);
                    self.link = LinkState::Connected;
                    self.request_info();
                    return attempts;
                },
                Err(err) => {
                    trace!("Reconnect attempt {attempts} failed: {err}");
                    self.clock.sleep(RECONNECT_DELAY);
                },
            }
        }
    }

    fn release_codec(&mut self) {
        if let Some(mut codec) = self.codec.take() {
            if let Err(err) = codec.close() {
                debug!("Error closing codec: {err}");
            }
        }
    }

    fn request_info(&mut self) {
        for command in INFO_REQUESTS {
            self.send(command, &[]);
        }
    }

    fn send(&mut self, command: Command, payload: &[u8]) {
        let Some(codec) = self.codec.as_mut() else {
            return;
        };
        trace!("Sending {command:?} ({} bytes)", payload.len());
        // The next read reports the disconnect.
        if let Err(err) = codec.write_command(command, payload) {
            warn!("Failed to send {command:?}: {err}");
        }
    }

    fn handle_frame(&mut self, frame: &Frame) {
        match apply_frame(&self.state, frame, &self.policy) {
            Ok(update) => self.apply(update),
            Err(err) => {
                warn!("Could not handle {frame}: {err}");
                self.say(&err.to_string());
            },
        }
    }

    fn apply(&mut self, update: Update) {
        let Update {
            state,
            outgoing,
            messages,
        } = update;
        self.state = state;
        for message in &messages {
            self.say(message);
        }
        for command in outgoing {
            self.send(command.command, &command.payload);
        }
    }

    fn say(&mut self, message: &str) {
        if let Err(err) = writeln!(self.output, "{message}") {
            debug!("Error writing operator output: {err}");
        }
    }
}

impl<K: Connector, C: Clock> BootloaderReboot for Session<K, C> {
    fn reboot_to_bootloader(&mut self) -> Result<()> {
        Session::reboot_to_bootloader(self)
    }

    fn detected_target(&self) -> Option<&str> {
        self.state
            .identity
            .target_name
            .as_deref()
    }
}
