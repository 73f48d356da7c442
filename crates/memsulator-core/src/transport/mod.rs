//! Queued serial transport
//!
//! Duplex, FIFO-buffered byte exchange with a device. Callers enqueue
//! frames and pop received chunks; a background worker owns the device and
//! moves bytes between it and the queues.

mod channel;
mod config;
mod hook;
mod queued;
pub mod serial;

pub use channel::{
    memory_pair, Channel, DeviceOpener, MemoryOpener, MemoryPort, SerialChannel, SerialOpener,
};
pub use config::{ByteSize, ConnectionConfig, Parity, StopBits};
pub use hook::{ReceiveHook, ResponseSignal, Wake};
pub use queued::{LinkHandle, LinkState, TransmitRequest, Transport};
pub use serial::{list_ports, PortInfo};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// MEMS diagnostic line speed
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Write timeout for the MEMS line in milliseconds
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1000;

/// Largest chunk the worker reads in one go
pub const MAX_CHUNK_SIZE: usize = 512;

// Queue state stays consistent across a panicking hook, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
