use tracing::{debug, error};

use crate::protocol::{Codec, Frame};
use crate::transport::{LinkHandle, ReceiveHook};

/// Receive hook that answers every inbound chunk as the ECU would.
///
/// Each chunk is treated as one command frame. Known opcodes get their
/// canned response; anything else is echoed back with the OK marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoResponder {
    codec: Codec,
}

impl AutoResponder {
    /// Answer from the tables behind `codec`
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    /// The reply the emulated ECU gives to `command`
    pub fn response_to(&self, command: &[u8]) -> Frame {
        self.codec
            .expected_response(command)
            .map(Frame::from)
            .unwrap_or_else(|| self.codec.fallback_response(command))
    }
}

impl ReceiveHook for AutoResponder {
    fn on_receive(&self, chunk: &Frame, link: &LinkHandle) {
        let response = self.response_to(chunk);
        debug!(command = %chunk, response = %response, "emulated ECU response");
        if let Err(e) = link.send(response, 0) {
            error!(command = %chunk, error = %e, "failed to queue emulated response");
        }
    }
}
