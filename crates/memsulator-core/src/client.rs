//! MEMS client
//!
//! Turns a named command into one blocking request/response transaction
//! over a [`Transport`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::protocol::{
    Codec, Command, Dataframe, Frame, MemsError, Result, DEFAULT_INTER_CHUNK_GAP_MS,
    DEFAULT_RESPONSE_TIMEOUT_MS,
};
use crate::transport::{LinkState, ResponseSignal, Transport, Wake};

/// Synchronous diagnostic client. One transaction is in flight at a time.
pub struct Client {
    transport: Transport,
    codec: Codec,
    signal: Arc<ResponseSignal>,
    response_timeout: Duration,
    inter_chunk_gap: Duration,
    firmware: Option<&'static str>,
    late_reply_possible: bool,
}

impl Client {
    /// Create a client driving `transport` with the canonical protocol tables
    pub fn new(transport: Transport) -> Self {
        Self::with_codec(transport, Codec::default())
    }

    /// Create a client with a specific codec
    pub fn with_codec(transport: Transport, codec: Codec) -> Self {
        let signal = Arc::new(ResponseSignal::new());
        transport.add_receive_hook(signal.clone());
        Self {
            transport,
            codec,
            signal,
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            inter_chunk_gap: Duration::from_millis(DEFAULT_INTER_CHUNK_GAP_MS),
            firmware: None,
            late_reply_possible: false,
        }
    }

    /// Bound on how long a transaction waits for the ECU
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Quiet period that ends a reply whose length is not known in advance
    pub fn with_inter_chunk_gap(mut self, gap: Duration) -> Self {
        self.inter_chunk_gap = gap;
        self
    }

    /// Protocol tables in use
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// The underlying transport
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// True while the link is up
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// True once the handshake has completed on the current connection
    pub fn is_initialized(&self) -> bool {
        self.firmware.is_some()
    }

    /// Firmware label read during the handshake
    pub fn firmware(&self) -> Option<&'static str> {
        self.firmware
    }

    /// True while a command is still queued for writing
    pub fn has_data_to_send(&self) -> bool {
        self.transport.has_data_to_send()
    }

    /// Open the link; no-op when already connected
    pub fn connect(&mut self) -> Result<()> {
        if !self.transport.is_connected() {
            self.transport.connect()?;
            self.firmware = None;
            self.late_reply_possible = false;
            info!(device = %self.transport.device(), "client connected");
        }
        Ok(())
    }

    /// Close the link after pending sends drain; no-op when not connected
    pub fn disconnect(&mut self) -> Result<()> {
        if self.transport.state() != LinkState::Idle {
            self.transport.disconnect()?;
            self.firmware = None;
            info!(device = %self.transport.device(), "client disconnected");
        }
        Ok(())
    }

    /// Send a command (name or raw bytes) with an optional payload and
    /// return the ECU's reply
    pub fn send_command<'a>(
        &mut self,
        command: impl Into<Command<'a>>,
        payload: &[u8],
    ) -> Result<Frame> {
        let opcode = self.codec.resolve_command(command);
        let expected_len = self.codec.expected_response_len(&opcode);

        let mut frame = opcode;
        frame.extend_from_slice(payload);
        self.transact(frame, expected_len)
    }

    /// Run the opening handshake and return the firmware label
    pub fn initialize(&mut self) -> Result<&'static str> {
        let Some((last, leading)) = self.codec.initialization_sequence().split_last() else {
            return Err(MemsError::Config("empty initialization sequence".to_string()));
        };

        for step in leading {
            let reply = self.send_command(&[step.tx], &[])?;
            if reply.as_bytes() != step.response {
                return Err(MemsError::UnexpectedResponse {
                    expected: Frame::from(step.response),
                    actual: reply,
                });
            }
        }

        // any known firmware signature completes the handshake
        let reply = self.send_command(&[last.tx], &[])?;
        let label = self.codec.version_label(&reply).ok_or_else(|| {
            MemsError::UnexpectedResponse {
                expected: Frame::from(last.response),
                actual: reply.clone(),
            }
        })?;

        info!(firmware = label, "ECU initialized");
        self.firmware = Some(label);
        Ok(label)
    }

    /// Request a data frame and split it into named fields
    pub fn read_dataframe<'a>(&mut self, command: impl Into<Command<'a>>) -> Result<Dataframe> {
        let command = command.into();
        let reply = self.send_command(command, &[])?;
        let expected = self.codec.resolve_command(command);
        match self.codec.parse_dataframe(&reply) {
            Some(dataframe) if reply.opcode() == expected.opcode() => Ok(dataframe),
            _ => Err(MemsError::UnexpectedResponse {
                expected,
                actual: reply,
            }),
        }
    }

    fn transact(&mut self, frame: Frame, expected_len: usize) -> Result<Frame> {
        if self.late_reply_possible {
            // a reply to the command that timed out may still be on its way
            let settle = Instant::now() + self.response_timeout + self.inter_chunk_gap;
            if !self.wait_until_quiet(settle) {
                warn!("line still busy after previous timeout");
            }
            self.late_reply_possible = false;
        }
        let stale = self.transport.clear_received();
        if stale > 0 {
            warn!(chunks = stale, "discarding unread chunks before new command");
        }

        let deadline = Instant::now() + self.response_timeout;
        debug!(frame = %frame, expected = expected_len, "sending command");
        self.signal.arm(expected_len);
        self.transport.send(frame.clone(), expected_len)?;

        debug!("waiting for response");
        match self.signal.wait(self.response_timeout) {
            Wake::Ready => {}
            Wake::TimedOut => return Err(self.timed_out(frame)),
            Wake::Failed(e) => return Err(MemsError::TransportIo(e)),
        }

        // length unknown: take chunks until the line goes quiet
        if expected_len == 0 && !self.wait_until_quiet(deadline) {
            return Err(self.timed_out(frame));
        }

        let mut response = Frame::new();
        while let Some(chunk) = self.transport.read() {
            response.extend_from_slice(&chunk);
        }

        info!(command = %frame, response = %response, "response from ECU");
        Ok(response)
    }

    fn timed_out(&mut self, command: Frame) -> MemsError {
        self.late_reply_possible = true;
        MemsError::ResponseTimeout {
            command,
            timeout: self.response_timeout,
        }
    }

    /// Block until no bytes arrive for one inter-chunk gap.
    ///
    /// Returns false if `deadline` passes before the line goes quiet.
    fn wait_until_quiet(&self, deadline: Instant) -> bool {
        let mut seen = self.signal.received();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            let window = self.inter_chunk_gap.min(left);
            let now = self.signal.wait_for_more(seen, window);
            if now == seen {
                return window == self.inter_chunk_gap;
            }
            seen = now;
        }
    }
}
