//! A single provisioned container (VM domain) and the registry tracking all
//! of them.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::driver::{DomainHandle, DomainSpec, HypervisorDriver};
use crate::error::{Result, VirtError};

/// A provisioned container: one VM domain plus the bookkeeping needed to
/// stop it again later.
pub struct Container {
    uuid: Uuid,
    iso_path: PathBuf,
    driver: Arc<dyn HypervisorDriver>,
    handle: DomainHandle,
    ip: Option<Ipv4Addr>,
}

impl Container {
    /// Defines and starts a domain from `spec` using `driver`.
    pub fn start(driver: Arc<dyn HypervisorDriver>, spec: DomainSpec) -> Result<Self> {
        let handle = driver.define_and_start(&spec)?;
        Ok(Self {
            uuid: spec.uuid,
            iso_path: spec.iso_path,
            driver,
            handle,
            ip: None,
        })
    }

    /// This container's UUID.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The IP address acquired by a prior call to
    /// [`Container::wait_for_ip`], if any.
    #[must_use]
    pub const fn ip(&self) -> Option<Ipv4Addr> {
        self.ip
    }

    /// Polls for the domain's IP once a second, up to `max_tryout` times,
    /// caching and returning the first address seen.
    pub fn wait_for_ip(&mut self, max_tryout: u32) -> Result<Ipv4Addr> {
        for _ in 0..max_tryout {
            if let Some(ip) = self.driver.ip_of(&self.handle)? {
                self.ip = Some(ip);
                return Ok(ip);
            }
            thread::sleep(Duration::from_secs(1));
        }
        Err(VirtError::DomainUnreachable(self.uuid))
    }

    /// Whether the domain is still reported running by the driver.
    pub fn is_running(&self) -> Result<bool> {
        self.driver.is_running(&self.handle)
    }

    /// Stops the domain. Idempotent.
    pub fn stop(&self) -> Result<()> {
        self.driver.destroy(&self.handle)
    }

    /// Computes the SHA-256 hex digest of this container's boot ISO.
    pub fn iso_sha256(&self) -> Result<String> {
        hash_file(&self.iso_path)
    }
}

fn hash_file(path: &Path) -> Result<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Explicit, mutex-guarded registry of every live container, keyed by UUID.
pub struct VirtualizationRegistry {
    containers: Mutex<HashMap<Uuid, Container>>,
}

impl VirtualizationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a started container.
    #[allow(clippy::missing_panics_doc)]
    pub fn store(&self, container: Container) {
        let mut containers = self.containers.lock().expect("virt registry mutex poisoned");
        containers.insert(container.uuid(), container);
    }

    /// Removes and returns a container by UUID.
    #[allow(clippy::missing_panics_doc)]
    pub fn remove(&self, uuid: Uuid) -> Option<Container> {
        self.containers
            .lock()
            .expect("virt registry mutex poisoned")
            .remove(&uuid)
    }

    /// Whether a container with this UUID is currently registered.
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.containers
            .lock()
            .expect("virt registry mutex poisoned")
            .contains_key(&uuid)
    }

    /// Runs `f` against a held container without removing it.
    #[allow(clippy::missing_panics_doc)]
    pub fn with<R>(&self, uuid: Uuid, f: impl FnOnce(&Container) -> R) -> Option<R> {
        let containers = self.containers.lock().expect("virt registry mutex poisoned");
        containers.get(&uuid).map(f)
    }

    /// Lists every currently-registered UUID.
    #[allow(clippy::missing_panics_doc)]
    pub fn list(&self) -> Vec<Uuid> {
        self.containers
            .lock()
            .expect("virt registry mutex poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Number of registered containers.
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.lock().expect("virt registry mutex poisoned").len()
    }

    /// Whether the registry holds no containers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VirtualizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VirtualizationRegistry {
    fn drop(&mut self) {
        if let Ok(containers) = self.containers.lock() {
            for container in containers.values() {
                let _ = container.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_driver::MockDriver;
    use std::io::Write;

    fn spec(uuid: Uuid, iso_path: PathBuf) -> DomainSpec {
        DomainSpec {
            uuid,
            iso_path,
            nat_bridge: "virbr1".to_string(),
            memory_mib: 512,
            vcpus: 1,
        }
    }

    #[test]
    fn wait_for_ip_succeeds_once_mock_driver_reports_one() {
        let driver: Arc<dyn HypervisorDriver> = Arc::new(MockDriver::new(1));
        let mut iso = tempfile::NamedTempFile::new().expect("tempfile");
        iso.write_all(b"iso bytes").expect("write");
        let uuid = Uuid::new_v4();
        let mut container =
            Container::start(driver, spec(uuid, iso.path().to_path_buf())).expect("start");
        let ip = container.wait_for_ip(5).expect("ip");
        assert_eq!(ip, container.ip().unwrap());
    }

    #[test]
    fn wait_for_ip_times_out() {
        let driver: Arc<dyn HypervisorDriver> = Arc::new(MockDriver::new(100));
        let iso = tempfile::NamedTempFile::new().expect("tempfile");
        let uuid = Uuid::new_v4();
        let mut container =
            Container::start(driver, spec(uuid, iso.path().to_path_buf())).expect("start");
        let err = container.wait_for_ip(2).unwrap_err();
        assert!(matches!(err, VirtError::DomainUnreachable(_)));
    }

    #[test]
    fn iso_sha256_matches_known_digest() {
        let driver: Arc<dyn HypervisorDriver> = Arc::new(MockDriver::new(1));
        let mut iso = tempfile::NamedTempFile::new().expect("tempfile");
        iso.write_all(b"hello").expect("write");
        let uuid = Uuid::new_v4();
        let container =
            Container::start(driver, spec(uuid, iso.path().to_path_buf())).expect("start");
        assert_eq!(
            container.iso_sha256().expect("hash"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn registry_store_and_remove_round_trip() {
        let driver: Arc<dyn HypervisorDriver> = Arc::new(MockDriver::new(1));
        let iso = tempfile::NamedTempFile::new().expect("tempfile");
        let uuid = Uuid::new_v4();
        let container =
            Container::start(driver, spec(uuid, iso.path().to_path_buf())).expect("start");
        let registry = VirtualizationRegistry::new();
        registry.store(container);
        assert!(registry.contains(uuid));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(uuid).is_some());
        assert!(!registry.contains(uuid));
    }
}
