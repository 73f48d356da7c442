//! Byte frames exchanged with the ECU

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// An ordered byte sequence: a command, a payload or a response.
///
/// The first byte of a command or response is its opcode. Frames display as
/// upper-case hex without separators, e.g. `D099000303`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// First byte of the frame, if any
    pub fn opcode(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Append bytes to the end of the frame
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Consume the frame, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Frame {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_upper_hex() {
        let frame = Frame::from([0xD0, 0x99, 0x00, 0x03, 0x03]);
        assert_eq!(frame.to_string(), "D099000303");
    }

    #[test]
    fn test_opcode() {
        assert_eq!(Frame::from([0x7D, 0x20]).opcode(), Some(0x7D));
        assert_eq!(Frame::new().opcode(), None);
    }
}
