//! Loopback pair provisioning
//!
//! The emulator needs two linked endpoints: it listens on one, the client
//! dials the other. How the pair comes to exist is up to the provisioner.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::protocol::{MemsError, Result};
use crate::transport::{memory_pair, DeviceOpener, MemoryOpener, SerialOpener};

/// Emulator-side endpoint created by socat, relative to the home directory
pub const ECU_PORT: &str = "ttyecu";

/// Client-side endpoint created by socat, relative to the home directory
pub const CODE_READER_PORT: &str = "ttycodereader";

/// The two ends of a provisioned loopback pair
#[derive(Clone)]
pub struct LoopbackLink {
    /// End the emulator listens on
    pub ecu: Arc<dyn DeviceOpener>,
    /// End a client connects to
    pub client: Arc<dyn DeviceOpener>,
}

/// Creates and tears down a loopback pair
pub trait LoopbackProvisioner: Send {
    /// Create a linked pair of endpoints
    fn provision(&mut self) -> Result<LoopbackLink>;

    /// Tear the pair down again
    fn release(&mut self) -> Result<()>;

    /// Time to let the link stabilize before opening it
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// In-process loopback pair; no OS resources involved
#[derive(Debug, Default)]
pub struct MemoryLoopback {
    current: Option<MemoryOpener>,
}

impl MemoryLoopback {
    /// Create a provisioner with no pair yet
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopbackProvisioner for MemoryLoopback {
    fn provision(&mut self) -> Result<LoopbackLink> {
        let (ecu, client) = memory_pair();
        self.current = Some(ecu.clone());
        Ok(LoopbackLink {
            ecu: Arc::new(ecu),
            client: Arc::new(client),
        })
    }

    fn release(&mut self) -> Result<()> {
        if let Some(link) = self.current.take() {
            link.break_link();
        }
        Ok(())
    }
}

/// Pair of linked pseudo-terminals created by an external `socat` process
pub struct SocatProvisioner {
    ecu_path: PathBuf,
    client_path: PathBuf,
    link_timeout: Duration,
    settle_delay: Duration,
    process: Option<Child>,
}

impl Default for SocatProvisioner {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_paths(home.join(ECU_PORT), home.join(CODE_READER_PORT))
    }
}

impl SocatProvisioner {
    /// Endpoints `~/ttyecu` and `~/ttycodereader`
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints at explicit paths
    pub fn with_paths(ecu_path: impl Into<PathBuf>, client_path: impl Into<PathBuf>) -> Self {
        Self {
            ecu_path: ecu_path.into(),
            client_path: client_path.into(),
            link_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(1),
            process: None,
        }
    }

    /// Override the pause between provisioning and opening the link
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Link the emulator listens on
    pub fn ecu_path(&self) -> &Path {
        &self.ecu_path
    }

    /// Link a client connects to
    pub fn client_path(&self) -> &Path {
        &self.client_path
    }

    fn pty_address(path: &Path) -> String {
        format!("pty,link={},raw,echo=0", path.display())
    }

    fn wait_for_links(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.link_timeout;
        while !(self.ecu_path.exists() && self.client_path.exists()) {
            if let Some(child) = self.process.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(MemsError::Provisioning(format!(
                        "socat exited early ({status})"
                    )));
                }
            }
            if Instant::now() >= deadline {
                return Err(MemsError::Provisioning(format!(
                    "{} did not appear within {}ms",
                    self.ecu_path.display(),
                    self.link_timeout.as_millis()
                )));
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}

impl LoopbackProvisioner for SocatProvisioner {
    fn provision(&mut self) -> Result<LoopbackLink> {
        if self.process.is_some() {
            self.release()?;
        }

        info!(
            ecu = %self.ecu_path.display(),
            client = %self.client_path.display(),
            "creating virtual serial ports"
        );
        let child = Command::new("socat")
            .arg("-d")
            .arg("-d")
            .arg(Self::pty_address(&self.client_path))
            .arg(Self::pty_address(&self.ecu_path))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MemsError::Provisioning(format!("unable to start socat: {e}")))?;
        self.process = Some(child);

        if let Err(e) = self.wait_for_links() {
            let _ = self.release();
            return Err(e);
        }
        debug!("virtual serial ports verified");

        Ok(LoopbackLink {
            ecu: Arc::new(SerialOpener::at(self.ecu_path.to_string_lossy())),
            client: Arc::new(SerialOpener::at(self.client_path.to_string_lossy())),
        })
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut child) = self.process.take() else {
            return Ok(());
        };

        if let Err(e) = child.kill() {
            // already exited
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(MemsError::Provisioning(format!("unable to stop socat: {e}")));
            }
        }
        let _ = child.wait();

        // a killed socat leaves its links behind
        for path in [&self.ecu_path, &self.client_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "unable to remove link"),
            }
        }
        info!("virtual serial ports removed");
        Ok(())
    }

    fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

impl Drop for SocatProvisioner {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionConfig;

    #[test]
    fn test_memory_release_breaks_link() {
        let mut provisioner = MemoryLoopback::new();
        let link = provisioner.provision().unwrap();
        let config = ConnectionConfig::default();
        assert!(link.client.open(&config).is_ok());

        provisioner.release().unwrap();
        assert!(link.client.open(&config).is_err());
        // releasing twice is harmless
        provisioner.release().unwrap();
    }

    #[test]
    fn test_socat_default_paths_live_in_home() {
        let provisioner = SocatProvisioner::new();
        assert!(provisioner.ecu_path().ends_with(ECU_PORT));
        assert!(provisioner.client_path().ends_with(CODE_READER_PORT));
        assert_eq!(provisioner.settle_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_socat_release_without_provision() {
        let mut provisioner = SocatProvisioner::with_paths("/tmp/a", "/tmp/b");
        assert!(provisioner.release().is_ok());
    }
}
