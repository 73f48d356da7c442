//! Lookups over the protocol tables

use super::tables::{InitStep, ProtocolTables, OK_MARKER, ROSCO_TABLES};
use super::{Dataframe, Frame};

/// A command as a caller names it: either a table name or raw bytes.
///
/// Unknown names are not an error; their UTF-8 bytes pass through unchanged,
/// which lets raw opcodes and named commands be used interchangeably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// A name from the command table, e.g. `"heartbeat"`
    Named(&'a str),
    /// Raw command bytes, sent as they are
    Raw(&'a [u8]),
}

impl<'a> From<&'a str> for Command<'a> {
    fn from(name: &'a str) -> Self {
        Command::Named(name)
    }
}

impl<'a> From<&'a String> for Command<'a> {
    fn from(name: &'a String) -> Self {
        Command::Named(name.as_str())
    }
}

impl<'a> From<&'a [u8]> for Command<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Command::Raw(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Command<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Command::Raw(bytes)
    }
}

impl<'a> From<&'a Frame> for Command<'a> {
    fn from(frame: &'a Frame) -> Self {
        Command::Raw(frame.as_bytes())
    }
}

/// Read-only lookup service over a [`ProtocolTables`] set.
///
/// Cheap to copy; every component shares the same static tables.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    tables: &'static ProtocolTables,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(&ROSCO_TABLES)
    }
}

impl Codec {
    /// Create a codec over the given tables
    pub fn new(tables: &'static ProtocolTables) -> Self {
        Self { tables }
    }

    /// The underlying tables
    pub fn tables(&self) -> &'static ProtocolTables {
        self.tables
    }

    /// Resolve a command to the bytes that go on the wire
    pub fn resolve_command<'a>(&self, command: impl Into<Command<'a>>) -> Frame {
        match command.into() {
            Command::Named(name) => self
                .opcode(name)
                .map(|op| Frame::from(vec![op]))
                .unwrap_or_else(|| Frame::from(name.as_bytes())),
            Command::Raw(bytes) => Frame::from(bytes),
        }
    }

    /// Opcode for a command name, if the name is in the table
    pub fn opcode(&self, name: &str) -> Option<u8> {
        self.tables
            .commands
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, op)| *op)
    }

    /// Canned response for an exact single-opcode frame.
    ///
    /// `None` means the reply is unknown, not that the command is invalid.
    pub fn expected_response(&self, frame: &[u8]) -> Option<&'static [u8]> {
        match frame {
            [opcode] => self
                .tables
                .responses
                .iter()
                .find(|(op, _)| op == opcode)
                .map(|(_, response)| *response),
            _ => None,
        }
    }

    /// Length of the reply to expect for a frame; 0 when unknown
    pub fn expected_response_len(&self, frame: &[u8]) -> usize {
        self.expected_response(frame).map_or(0, <[u8]>::len)
    }

    /// Echo-plus-acknowledge reply used when no canned response exists
    pub fn fallback_response(&self, frame: &[u8]) -> Frame {
        let mut response = Frame::from(frame);
        response.extend_from_slice(&OK_MARKER);
        response
    }

    /// Positional field names of the data frame a command returns
    pub fn dataframe_fields<'a>(
        &self,
        command: impl Into<Command<'a>>,
    ) -> Option<&'static [&'static str]> {
        let frame = self.resolve_command(command);
        let [opcode] = frame.as_bytes() else {
            return None;
        };
        self.tables
            .dataframes
            .iter()
            .find(|(op, _)| op == opcode)
            .map(|(_, fields)| *fields)
    }

    /// Pair the bytes of a data frame response with their field names
    pub fn parse_dataframe(&self, response: &[u8]) -> Option<Dataframe> {
        let opcode = *response.first()?;
        let fields = self.dataframe_fields(&[opcode])?;
        Some(Dataframe::from_layout(opcode, fields, response))
    }

    /// Firmware label for a `0xD0` reply
    pub fn version_label(&self, response: &[u8]) -> Option<&'static str> {
        self.tables
            .versions
            .iter()
            .find(|(_, signature)| *signature == response)
            .map(|(label, _)| *label)
    }

    /// The opening handshake, in order
    pub fn initialization_sequence(&self) -> &'static [InitStep] {
        self.tables.initialization
    }
}
