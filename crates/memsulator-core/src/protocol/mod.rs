//! Rosco protocol
//!
//! Static knowledge of the Rover MEMS 1.6 diagnostic protocol: command
//! opcodes, canned responses, data frame layouts and the handshake used to
//! open a session. No I/O happens here.

mod codec;
mod dataframe;
mod error;
mod frame;
pub mod tables;

pub use codec::{Codec, Command};
pub use dataframe::{Dataframe, DataframeField};
pub use error::{MemsError, Result};
pub use frame::Frame;
pub use tables::{InitStep, ProtocolTables, OK_MARKER, ROSCO_TABLES, TABLE_REVISION};

/// Default time a client waits for the ECU to answer, in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2000;

/// Quiet period that ends a response of unknown length, in milliseconds
pub const DEFAULT_INTER_CHUNK_GAP_MS: u64 = 25;
