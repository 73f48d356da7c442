//! # Memsulator Core Library
//!
//! Diagnostic client and ECU emulator for the Rover MEMS 1.6 engine
//! management unit.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The Rosco protocol tables (command opcodes, canned responses, data
//!   frame layouts, firmware versions, initialization handshake)
//! - A queued duplex serial transport driven by a background worker
//! - A blocking request/response client with bounded waits
//! - An emulator answering the same command set over a loopback link
//!
//! ## Example
//!
//! ```rust,ignore
//! use memsulator_core::prelude::*;
//!
//! // Fake ECU on an in-process loopback pair
//! let emulator = Emulator::start(ConnectionConfig::default(), MemoryLoopback::new())?;
//!
//! let opener = emulator.client_opener().expect("pair provisioned");
//! let transport = Transport::new(ConnectionConfig::default(), opener);
//! let mut client = Client::new(transport);
//! client.connect()?;
//!
//! let firmware = client.initialize()?;
//! let reply = client.send_command("heartbeat", &[])?;
//! assert_eq!(reply.as_bytes(), &[0xF4, 0x00]);
//! ```

pub mod client;
pub mod emulator;
pub mod protocol;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::emulator::{
        AutoResponder, Emulator, LoopbackProvisioner, MemoryLoopback, SocatProvisioner,
    };
    pub use crate::protocol::{Codec, Command, Dataframe, Frame, MemsError};
    pub use crate::transport::{
        ConnectionConfig, LinkHandle, LinkState, ReceiveHook, ResponseSignal, Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
