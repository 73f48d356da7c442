use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{lock, serial, ConnectionConfig};
use crate::protocol::{MemsError, Result};

/// Abstraction for a duplex byte device (serial port or in-process pipe)
pub trait Channel: Read + Write + Send {
    /// Get number of bytes available to read
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Clear input buffers
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Something that can open a [`Channel`], possibly many times over
pub trait DeviceOpener: Send + Sync {
    /// Open the device with the given line settings
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Channel>>;

    /// Name of the device for logs
    fn device(&self) -> String;
}

/// Serial port wrapper implementing Channel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an open port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Channel for SerialChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::other)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

/// Opens a serial device at a fixed path
#[derive(Debug, Clone)]
pub struct SerialOpener {
    path: String,
}

impl SerialOpener {
    /// Opener for the device at `path`
    pub fn at(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceOpener for SerialOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Channel>> {
        let port = serial::open_port(&config.with_port(self.path.clone()))?;
        Ok(Box::new(SerialChannel::new(port)))
    }

    fn device(&self) -> String {
        self.path.clone()
    }
}

#[derive(Debug, Default)]
struct PipeLink {
    /// Bytes travelling from side A to side B
    a_to_b: Mutex<VecDeque<u8>>,
    /// Bytes travelling from side B to side A
    b_to_a: Mutex<VecDeque<u8>>,
    broken: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// One end of an in-process duplex pipe
pub struct MemoryPort {
    link: Arc<PipeLink>,
    side: Side,
}

impl MemoryPort {
    fn incoming(&self) -> &Mutex<VecDeque<u8>> {
        match self.side {
            Side::A => &self.link.b_to_a,
            Side::B => &self.link.a_to_b,
        }
    }

    fn outgoing(&self) -> &Mutex<VecDeque<u8>> {
        match self.side {
            Side::A => &self.link.a_to_b,
            Side::B => &self.link.b_to_a,
        }
    }

    fn check_link(&self) -> io::Result<()> {
        if self.link.broken.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "loopback link released"))
        } else {
            Ok(())
        }
    }
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_link()?;
        let mut incoming = lock(self.incoming());
        if incoming.is_empty() {
            // same as a serial port with a zero read timeout
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(incoming.len());
        for (slot, byte) in buf.iter_mut().zip(incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_link()?;
        lock(self.outgoing()).extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_link()
    }
}

impl Channel for MemoryPort {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.check_link()?;
        Ok(lock(self.incoming()).len() as u32)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.check_link()?;
        lock(self.incoming()).clear();
        Ok(())
    }
}

/// Opens one end of an in-process pipe created by [`memory_pair`]
#[derive(Debug, Clone)]
pub struct MemoryOpener {
    link: Arc<PipeLink>,
    side: Side,
}

impl MemoryOpener {
    /// Break the pipe: every open end fails with `BrokenPipe` from now on
    pub fn break_link(&self) {
        self.link.broken.store(true, Ordering::SeqCst);
    }

    /// True once the pipe has been broken
    pub fn is_broken(&self) -> bool {
        self.link.broken.load(Ordering::SeqCst)
    }
}

impl DeviceOpener for MemoryOpener {
    fn open(&self, _config: &ConnectionConfig) -> Result<Box<dyn Channel>> {
        if self.is_broken() {
            return Err(MemsError::TransportOpen {
                device: self.device(),
                reason: "loopback link released".to_string(),
            });
        }
        Ok(Box::new(MemoryPort {
            link: self.link.clone(),
            side: self.side,
        }))
    }

    fn device(&self) -> String {
        match self.side {
            Side::A => "memory:a".to_string(),
            Side::B => "memory:b".to_string(),
        }
    }
}

/// Create two linked pipe ends: what one writes, the other reads
pub fn memory_pair() -> (MemoryOpener, MemoryOpener) {
    let link = Arc::new(PipeLink::default());
    (
        MemoryOpener {
            link: link.clone(),
            side: Side::A,
        },
        MemoryOpener { link, side: Side::B },
    )
}
