use memsulator_core::protocol::{Frame, MemsError};
use memsulator_core::transport::{
    memory_pair, Channel, ConnectionConfig, DeviceOpener, LinkHandle, LinkState, ReceiveHook,
    Transport,
};
use pretty_assertions::assert_eq;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Device that records every write and never has anything to read
struct RecordingChannel {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: bool,
}

impl Read for RecordingChannel {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
    }
}

impl Write for RecordingChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        self.writes.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for RecordingChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(0)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingOpener {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: bool,
    fail_open: bool,
}

impl RecordingOpener {
    fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

impl DeviceOpener for RecordingOpener {
    fn open(&self, _config: &ConnectionConfig) -> memsulator_core::protocol::Result<Box<dyn Channel>> {
        if self.fail_open {
            return Err(MemsError::TransportOpen {
                device: self.device(),
                reason: "no such device".to_string(),
            });
        }
        Ok(Box::new(RecordingChannel {
            writes: self.writes.clone(),
            fail_writes: self.fail_writes,
        }))
    }

    fn device(&self) -> String {
        "recording".to_string()
    }
}

#[derive(Default)]
struct CollectHook {
    chunks: Mutex<Vec<Frame>>,
}

impl CollectHook {
    fn total(&self) -> usize {
        self.chunks.lock().unwrap().iter().map(|c| c.len()).sum()
    }
}

impl ReceiveHook for CollectHook {
    fn on_receive(&self, chunk: &Frame, _link: &LinkHandle) {
        self.chunks.lock().unwrap().push(chunk.clone());
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_frames_are_written_in_send_order() {
    for pause_ms in [0u64, 1, 3] {
        let opener = Arc::new(RecordingOpener::default());
        let mut transport = Transport::new(ConnectionConfig::default(), opener.clone());
        transport.connect().unwrap();

        transport.send([0xCAu8], 1).unwrap();
        thread::sleep(Duration::from_millis(pause_ms));
        transport.send([0x75u8], 1).unwrap();
        transport.send([0xD0u8, 0x01], 0).unwrap();

        transport.disconnect().unwrap();
        assert_eq!(
            opener.writes(),
            vec![vec![0xCA], vec![0x75], vec![0xD0, 0x01]],
            "pause {pause_ms}ms"
        );
        assert!(!transport.has_data_to_send());
    }
}

#[test]
fn test_send_before_connect_is_rejected() {
    let opener = Arc::new(RecordingOpener::default());
    let transport = Transport::new(ConnectionConfig::default(), opener.clone());
    assert_eq!(transport.state(), LinkState::Idle);
    assert!(matches!(
        transport.send([0xF4u8], 2),
        Err(MemsError::NotConnected)
    ));
    assert!(opener.writes().is_empty());
}

#[test]
fn test_open_failure_is_reported() {
    let opener = Arc::new(RecordingOpener {
        fail_open: true,
        ..Default::default()
    });
    let mut transport = Transport::new(ConnectionConfig::default(), opener);
    let err = transport.connect().unwrap_err();
    assert!(matches!(err, MemsError::TransportOpen { .. }));
    assert!(err.is_transport_failure());
    assert!(!transport.is_connected());
    assert_eq!(transport.state(), LinkState::Idle);
}

#[test]
fn test_write_failure_stops_worker_and_surfaces_fault() {
    let opener = Arc::new(RecordingOpener {
        fail_writes: true,
        ..Default::default()
    });
    let mut transport = Transport::new(ConnectionConfig::default(), opener);
    transport.connect().unwrap();
    transport.send([0xF4u8], 2).unwrap();

    assert!(wait_until(|| transport.fault().is_some()));
    assert!(!transport.is_connected());
    assert_eq!(
        transport.fault().map(|e| e.kind()),
        Some(io::ErrorKind::BrokenPipe)
    );
    assert!(matches!(
        transport.send([0xF4u8], 2),
        Err(MemsError::TransportIo(_))
    ));

    // disconnect still returns promptly with a dead worker
    transport.disconnect().unwrap();
    assert_eq!(transport.state(), LinkState::Idle);
}

#[test]
fn test_disconnect_is_idempotent_and_reconnect_works() {
    let opener = Arc::new(RecordingOpener::default());
    let mut transport = Transport::new(ConnectionConfig::default(), opener.clone());

    transport.disconnect().unwrap();
    transport.connect().unwrap();
    transport.connect().unwrap();
    assert!(transport.is_connected());

    transport.disconnect().unwrap();
    transport.disconnect().unwrap();
    assert!(!transport.is_connected());

    transport.connect().unwrap();
    transport.send([0x80u8], 29).unwrap();
    transport.disconnect().unwrap();
    assert_eq!(opener.writes(), vec![vec![0x80]]);
}

#[test]
fn test_received_chunks_fire_hooks_and_queue_in_order() {
    let (near, far) = memory_pair();
    let hook = Arc::new(CollectHook::default());
    let mut transport = Transport::new(ConnectionConfig::default(), Arc::new(near));
    transport.add_receive_hook(hook.clone());
    transport.connect().unwrap();

    let mut peer = far.open(&ConnectionConfig::default()).unwrap();
    peer.write_all(&[0xF4, 0x00]).unwrap();
    assert!(wait_until(|| hook.total() == 2));
    peer.write_all(&[0xCA]).unwrap();
    assert!(wait_until(|| hook.total() == 3));

    assert!(transport.has_received_data());
    let mut received = Vec::new();
    while let Some(chunk) = transport.read() {
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, vec![0xF4, 0x00, 0xCA]);
    assert!(transport.read().is_none());

    transport.disconnect().unwrap();
}

#[test]
fn test_expected_length_limits_each_read() {
    let (near, far) = memory_pair();
    let hook = Arc::new(CollectHook::default());
    let mut transport = Transport::new(ConnectionConfig::default(), Arc::new(near));
    transport.add_receive_hook(hook.clone());
    transport.connect().unwrap();

    let mut peer = far.open(&ConnectionConfig::default()).unwrap();
    transport.send([0xF4u8], 2).unwrap();
    assert!(wait_until(|| peer.bytes_to_read().unwrap() == 1));

    // reply plus an unsolicited trailing byte arrive together
    peer.write_all(&[0xF4, 0x00, 0xEE]).unwrap();
    assert!(wait_until(|| hook.total() == 3));

    let chunks = hook.chunks.lock().unwrap().clone();
    assert_eq!(chunks[0], Frame::from([0xF4u8, 0x00]));
    assert_eq!(chunks[1], Frame::from([0xEEu8]));

    assert_eq!(transport.clear_received(), 2);
    assert!(!transport.has_received_data());
    transport.disconnect().unwrap();
}

#[test]
fn test_broken_link_is_a_transport_failure() {
    let (near, far) = memory_pair();
    let mut transport = Transport::new(ConnectionConfig::default(), Arc::new(near));
    transport.connect().unwrap();

    far.break_link();
    assert!(wait_until(|| !transport.is_connected()));
    let err = transport.send([0xF4u8], 2).unwrap_err();
    assert!(err.is_transport_failure());

    transport.disconnect().unwrap();
    assert!(transport.connect().is_err());
}

#[test]
fn test_hook_only_transport_queues_nothing() {
    let (near, far) = memory_pair();
    let hook = Arc::new(CollectHook::default());
    let mut transport =
        Transport::new(ConnectionConfig::default(), Arc::new(near)).without_receive_queue();
    transport.add_receive_hook(hook.clone());
    transport.connect().unwrap();

    let mut peer = far.open(&ConnectionConfig::default()).unwrap();
    for _ in 0..10 {
        peer.write_all(&[0xF4]).unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    assert!(wait_until(|| hook.total() == 10));

    assert!(!transport.has_received_data());
    assert!(transport.read().is_none());
    transport.disconnect().unwrap();
}
