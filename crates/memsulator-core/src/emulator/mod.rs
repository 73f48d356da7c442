//! MEMS emulator
//!
//! Stands in for the ECU on the far end of a loopback link so a client can
//! be exercised without hardware. Every command received is answered from
//! the protocol tables.

mod loopback;
mod responder;

pub use loopback::{
    LoopbackLink, LoopbackProvisioner, MemoryLoopback, SocatProvisioner, CODE_READER_PORT,
    ECU_PORT,
};
pub use responder::AutoResponder;

use std::sync::Arc;
use std::thread;
use tracing::info;

use crate::protocol::{Codec, Result};
use crate::transport::{ConnectionConfig, DeviceOpener, LinkState, Transport};

/// Fake ECU listening on one end of a loopback pair
pub struct Emulator {
    config: ConnectionConfig,
    codec: Codec,
    provisioner: Box<dyn LoopbackProvisioner>,
    link: Option<LoopbackLink>,
    transport: Option<Transport>,
}

impl Emulator {
    /// Create an emulator (no pair provisioned yet)
    pub fn new(config: ConnectionConfig, provisioner: impl LoopbackProvisioner + 'static) -> Self {
        Self {
            config,
            codec: Codec::default(),
            provisioner: Box::new(provisioner),
            link: None,
            transport: None,
        }
    }

    /// Provision a pair and start answering on it
    pub fn start(
        config: ConnectionConfig,
        provisioner: impl LoopbackProvisioner + 'static,
    ) -> Result<Self> {
        let mut emulator = Self::new(config, provisioner);
        emulator.connect()?;
        Ok(emulator)
    }

    /// Provision a pair if none is held, then open the emulator's end.
    ///
    /// Does nothing when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let link = match &self.link {
            Some(link) => link.clone(),
            None => {
                let link = self.provisioner.provision()?;
                let settle = self.provisioner.settle_delay();
                if !settle.is_zero() {
                    thread::sleep(settle);
                }
                info!(ecu = %link.ecu.device(), client = %link.client.device(), "loopback pair ready");
                self.transport = None;
                self.link = Some(link.clone());
                link
            }
        };

        let codec = self.codec;
        let config = &self.config;
        let transport = self.transport.get_or_insert_with(|| {
            let transport = Transport::new(config.with_port(link.ecu.device()), link.ecu.clone())
                .without_receive_queue();
            transport.add_receive_hook(Arc::new(AutoResponder::new(codec)));
            transport
        });

        if let Err(e) = transport.connect() {
            self.transport = None;
            self.release_link()?;
            return Err(e);
        }
        info!(device = %link.ecu.device(), "emulator listening");
        Ok(())
    }

    /// Stop answering, drain pending replies, then release the pair
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect()?;
        }
        self.release_link()
    }

    /// True while the emulator is answering
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_connected)
    }

    /// Lifecycle state of the emulator's transport
    pub fn state(&self) -> LinkState {
        self.transport
            .as_ref()
            .map_or(LinkState::Idle, Transport::state)
    }

    /// Opener for the client's end of the pair
    pub fn client_opener(&self) -> Option<Arc<dyn DeviceOpener>> {
        self.link.as_ref().map(|link| link.client.clone())
    }

    /// Device name of the client's end of the pair
    pub fn client_port(&self) -> Option<String> {
        self.link.as_ref().map(|link| link.client.device())
    }

    /// The emulator's own transport, while connected
    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    fn release_link(&mut self) -> Result<()> {
        if self.link.take().is_some() {
            self.provisioner.release()?;
            info!("loopback pair released");
        }
        Ok(())
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
