//! Transport lifecycle and the background send/receive worker

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{lock, Channel, ConnectionConfig, DeviceOpener, ReceiveHook, SerialOpener, MAX_CHUNK_SIZE};
use crate::protocol::{Frame, MemsError, Result};

/// Idle sleep between worker iterations with nothing to do
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Pause before the worker thread exits after being told to stop
const EXIT_YIELD: Duration = Duration::from_millis(50);

/// Lifecycle of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No device open, no worker
    Idle,
    /// Worker running
    Connected,
    /// Draining the send queue before stopping
    Disconnecting,
}

/// A frame waiting to be written, with the reply length to read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    /// Bytes to write
    pub data: Frame,
    /// Bytes to read for the reply; 0 reads whatever is available
    pub expected_response_len: usize,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: io::ErrorKind,
    message: String,
}

impl Fault {
    fn to_error(&self) -> io::Error {
        io::Error::new(self.kind, self.message.clone())
    }
}

#[derive(Default)]
struct Queues {
    send: VecDeque<TransmitRequest>,
    receive: VecDeque<Frame>,
    fault: Option<Fault>,
    worker_alive: bool,
}

/// State shared between a transport, its worker and its link handles
struct Shared {
    queues: Mutex<Queues>,
    /// Signalled when the send queue shrinks or the worker exits
    changed: Condvar,
    running: AtomicBool,
    /// Whether received chunks go to the receive queue as well as the hooks
    queue_received: AtomicBool,
    hooks: Mutex<Vec<Arc<dyn ReceiveHook>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            changed: Condvar::new(),
            running: AtomicBool::new(false),
            queue_received: AtomicBool::new(true),
            hooks: Mutex::new(Vec::new()),
        }
    }

    fn hooks(&self) -> Vec<Arc<dyn ReceiveHook>> {
        lock(&self.hooks).clone()
    }

    fn fail(&self, err: &io::Error) {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.queues).fault = Some(Fault {
            kind: err.kind(),
            message: err.to_string(),
        });
        for hook in self.hooks() {
            hook.on_fault(err);
        }
    }
}

/// Cloneable handle for queueing frames on a transport.
///
/// Receive hooks get one so they can answer without owning the transport.
#[derive(Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

impl LinkHandle {
    /// Queue a frame for the worker to write; does not wait for the device
    pub fn send(&self, frame: impl Into<Frame>, expected_response_len: usize) -> Result<()> {
        let data = frame.into();
        let mut queues = lock(&self.shared.queues);
        if let Some(fault) = &queues.fault {
            return Err(MemsError::TransportIo(fault.to_error()));
        }
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(MemsError::NotConnected);
        }
        debug!(frame = %data, expected = expected_response_len, "queued");
        queues.send.push_back(TransmitRequest {
            data,
            expected_response_len,
        });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }
}

/// Duplex queued transport over one device.
///
/// `connect` opens the device and starts exactly one worker thread. Each
/// worker iteration writes at most one queued request, then reads every
/// chunk the device has ready into the receive queue, firing the receive
/// hooks after each one. Frames are written in send order and chunks are
/// queued in arrival order.
pub struct Transport {
    config: ConnectionConfig,
    opener: Arc<dyn DeviceOpener>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    state: LinkState,
}

impl Transport {
    /// Create a transport over any device (not yet connected)
    pub fn new(config: ConnectionConfig, opener: Arc<dyn DeviceOpener>) -> Self {
        Self {
            config,
            opener,
            shared: Arc::new(Shared::new()),
            worker: None,
            state: LinkState::Idle,
        }
    }

    /// Create a transport over the serial port named in `config`
    pub fn serial(config: ConnectionConfig) -> Self {
        let opener = Arc::new(SerialOpener::at(config.port_name.clone()));
        Self::new(config, opener)
    }

    /// Stop queueing received chunks; only the receive hooks see them.
    ///
    /// For transports whose hooks consume every chunk, such as the emulator's.
    pub fn without_receive_queue(self) -> Self {
        self.shared.queue_received.store(false, Ordering::SeqCst);
        self
    }

    /// Register a hook fired for every received chunk
    pub fn add_receive_hook(&self, hook: Arc<dyn ReceiveHook>) {
        lock(&self.shared.hooks).push(hook);
    }

    /// Handle for queueing frames from other threads
    pub fn handle(&self) -> LinkHandle {
        LinkHandle {
            shared: self.shared.clone(),
        }
    }

    /// Line settings the device is opened with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Name of the underlying device
    pub fn device(&self) -> String {
        self.opener.device()
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True while the worker is running
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected && self.shared.running.load(Ordering::SeqCst)
    }

    /// The I/O failure that stopped the worker, if any
    pub fn fault(&self) -> Option<io::Error> {
        lock(&self.shared.queues).fault.as_ref().map(Fault::to_error)
    }

    /// Open the device, clear its input and start the worker.
    ///
    /// Does nothing when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!(device = %self.device(), "already connected");
            return Ok(());
        }
        // a worker that died on a fault has already exited
        self.join_worker();

        let mut channel = self.opener.open(&self.config)?;
        channel.clear_input()?;
        channel.flush()?;

        {
            let mut queues = lock(&self.shared.queues);
            queues.fault = None;
            if !queues.send.is_empty() {
                warn!(dropped = queues.send.len(), "discarding sends left by a failed session");
                queues.send.clear();
            }
            queues.worker_alive = true;
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("mems-link".to_string())
            .spawn(move || run_worker(shared, channel));

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.state = LinkState::Connected;
                info!(device = %self.device(), "connected");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                lock(&self.shared.queues).worker_alive = false;
                Err(MemsError::TransportIo(e))
            }
        }
    }

    /// Wait for the send queue to drain, then stop the worker.
    ///
    /// Does nothing when not connected.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == LinkState::Idle && self.worker.is_none() {
            return Ok(());
        }
        self.state = LinkState::Disconnecting;

        {
            let queues = lock(&self.shared.queues);
            let _drained = self
                .shared
                .changed
                .wait_while(queues, |q| !q.send.is_empty() && q.worker_alive)
                .unwrap_or_else(|e| e.into_inner());
        }

        self.shared.running.store(false, Ordering::SeqCst);
        self.join_worker();
        self.state = LinkState::Idle;
        info!(device = %self.device(), "disconnected");
        Ok(())
    }

    /// Queue a frame; `expected_response_len` bytes are read back as the reply
    pub fn send(&self, frame: impl Into<Frame>, expected_response_len: usize) -> Result<()> {
        self.handle().send(frame, expected_response_len)
    }

    /// Pop the oldest received chunk, if any
    pub fn read(&self) -> Option<Frame> {
        let chunk = lock(&self.shared.queues).receive.pop_front();
        if let Some(chunk) = &chunk {
            debug!(frame = %chunk, "read from receive queue");
        }
        chunk
    }

    /// Drop every queued chunk, returning how many there were
    pub fn clear_received(&self) -> usize {
        let mut queues = lock(&self.shared.queues);
        let count = queues.receive.len();
        queues.receive.clear();
        count
    }

    /// True while frames are waiting to be written
    pub fn has_data_to_send(&self) -> bool {
        !lock(&self.shared.queues).send.is_empty()
    }

    /// True while received chunks are waiting to be read
    pub fn has_received_data(&self) -> bool {
        !lock(&self.shared.queues).receive.is_empty()
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(device = %self.opener.device(), "link worker panicked");
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

fn run_worker(shared: Arc<Shared>, mut channel: Box<dyn Channel>) {
    let mut buffer = [0u8; MAX_CHUNK_SIZE];
    let mut remaining = 0usize;

    while shared.running.load(Ordering::SeqCst) {
        match service(&shared, channel.as_mut(), &mut buffer, &mut remaining) {
            Ok(true) => {}
            Ok(false) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                error!(error = %e, "serial I/O failed, stopping link worker");
                shared.fail(&e);
                break;
            }
        }
    }

    thread::sleep(EXIT_YIELD);
    lock(&shared.queues).worker_alive = false;
    shared.changed.notify_all();
}

/// One worker iteration. Returns whether any bytes moved.
fn service(
    shared: &Arc<Shared>,
    channel: &mut dyn Channel,
    buffer: &mut [u8],
    remaining: &mut usize,
) -> io::Result<bool> {
    let mut busy = false;

    let request = lock(&shared.queues).send.pop_front();
    if let Some(request) = request {
        channel.write_all(&request.data)?;
        channel.flush()?;
        debug!(frame = %request.data, "sent");
        *remaining = request.expected_response_len;
        busy = true;
        shared.changed.notify_all();
    }

    loop {
        let available = channel.bytes_to_read()? as usize;
        if available == 0 {
            break;
        }
        let want = if *remaining > 0 {
            available.min(*remaining)
        } else {
            available
        }
        .min(buffer.len());

        let n = match channel.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                break
            }
            Err(e) => return Err(e),
        };
        *remaining = remaining.saturating_sub(n);
        channel.flush()?;

        let chunk = Frame::from(&buffer[..n]);
        debug!(frame = %chunk, "received");
        if shared.queue_received.load(Ordering::SeqCst) {
            lock(&shared.queues).receive.push_back(chunk.clone());
        }

        let link = LinkHandle {
            shared: shared.clone(),
        };
        for hook in shared.hooks() {
            hook.on_receive(&chunk, &link);
        }
        busy = true;
    }

    Ok(busy)
}
