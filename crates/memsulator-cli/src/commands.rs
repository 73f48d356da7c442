use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use memsulator_core::prelude::*;
use memsulator_core::transport::list_ports;
use tracing::{info, warn};

const IDLE_TICK: Duration = Duration::from_millis(50);

fn install_ctrlc() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(running)
}

/// Sleep for `period`, returning early once `running` drops
fn pause(period: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + period;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(IDLE_TICK.min(deadline.saturating_duration_since(Instant::now())));
    }
}

pub fn emulate(
    config: ConnectionConfig,
    timeout: Duration,
    socat: bool,
    interval: Duration,
) -> Result<()> {
    let running = install_ctrlc()?;

    if socat {
        let mut emulator =
            Emulator::start(config, SocatProvisioner::new()).context("failed to start emulator")?;
        if let Some(port) = emulator.client_port() {
            println!("ECU emulator ready, connect a client to {port}");
        }
        println!("Press Ctrl+C to stop");

        while running.load(Ordering::SeqCst) {
            if !emulator.is_connected() {
                warn!("emulator link lost");
                break;
            }
            thread::sleep(IDLE_TICK);
        }
        emulator.disconnect()?;
        info!("emulator stopped");
        return Ok(());
    }

    let mut emulator = Emulator::start(config.clone(), MemoryLoopback::new())
        .context("failed to start emulator")?;
    let opener = emulator
        .client_opener()
        .context("emulator has no loopback pair")?;
    let mut client = Client::new(Transport::new(config, opener)).with_response_timeout(timeout);
    client.connect()?;

    let firmware = client.initialize().context("handshake with emulator failed")?;
    println!("Emulated ECU firmware {firmware}, polling data frames (Ctrl+C to stop)");

    while running.load(Ordering::SeqCst) {
        for command in ["request_data_frame_a", "request_data_frame_b"] {
            let dataframe = client.read_dataframe(command)?;
            let fields: Vec<String> = dataframe
                .fields
                .iter()
                .map(|f| format!("{}={:02X}", f.name, f.value))
                .collect();
            println!("{command}: {}", fields.join(" "));
        }
        pause(interval, &running);
    }

    client.disconnect()?;
    emulator.disconnect()?;
    info!("self-check stopped");
    Ok(())
}

/// Table name if known, otherwise hex bytes, otherwise the text as it is
fn parse_command(codec: &Codec, command: &str) -> Frame {
    if codec.opcode(command).is_some() {
        return codec.resolve_command(command);
    }
    match parse_hex(command) {
        Ok(bytes) => Frame::from(bytes),
        Err(_) => {
            warn!(command, "not a known command or hex, sending as text");
            codec.resolve_command(command)
        }
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(s).with_context(|| format!("invalid hex: {s}"))
}

pub fn send(
    config: ConnectionConfig,
    timeout: Duration,
    port: Option<String>,
    init: bool,
    command: &str,
    payload: Option<&str>,
) -> Result<()> {
    let config = match port {
        Some(port) => config.with_port(port),
        None => config,
    };
    if config.port_name.is_empty() {
        bail!("no serial port given, use --port or set port_name in the config file");
    }
    let payload = payload.map(parse_hex).transpose()?.unwrap_or_default();

    let port_name = config.port_name.clone();
    let mut client = Client::new(Transport::serial(config)).with_response_timeout(timeout);
    client
        .connect()
        .with_context(|| format!("failed to open {port_name}"))?;

    if init {
        let firmware = client.initialize().context("initialization failed")?;
        println!("firmware: {firmware}");
    }

    let frame = parse_command(client.codec(), command);
    let reply = client.send_command(&frame, &payload)?;
    println!("{reply}");

    if payload.is_empty() {
        if let Some(dataframe) = client.codec().parse_dataframe(&reply) {
            for field in &dataframe.fields {
                println!("  {:<28} 0x{:02X} ({})", field.name, field.value, field.value);
            }
        }
    }

    client.disconnect()?;
    Ok(())
}

pub fn ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}  [{:04x}:{:04x}] {}",
                port.name,
                vid,
                pid,
                port.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.name),
        }
    }
}
