//! Hypervisor abstraction.
//!
//! Implementors handle the platform/hypervisor-specific details of domain
//! definition, IP acquisition, and teardown. This is the seam behind which
//! the real libvirt backend and the in-memory test backend are
//! interchangeable.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use uuid::Uuid;

use crate::error::Result;

/// Parameters needed to define and start a domain.
#[derive(Debug, Clone)]
pub struct DomainSpec {
    /// Unique identifier of the container this domain backs.
    pub uuid: Uuid,
    /// Path to the boot ISO.
    pub iso_path: PathBuf,
    /// Name of the host bridge the domain's NIC attaches to.
    pub nat_bridge: String,
    /// Memory allotted to the domain, in MiB.
    pub memory_mib: u32,
    /// Virtual CPUs allotted to the domain.
    pub vcpus: u32,
}

/// Opaque handle a driver uses to refer back to a defined domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainHandle(pub String);

impl DomainHandle {
    /// Builds the handle a driver should use for a container's domain: its
    /// UUID string, which doubles as the libvirt domain name.
    #[must_use]
    pub fn for_container(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Platform/hypervisor-agnostic domain lifecycle driver.
pub trait HypervisorDriver: Send + Sync {
    /// Defines and starts a domain from `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain cannot be defined or started.
    fn define_and_start(&self, spec: &DomainSpec) -> Result<DomainHandle>;

    /// Returns the domain's IPv4 address, if one has been leased yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot be queried.
    fn ip_of(&self, handle: &DomainHandle) -> Result<Option<Ipv4Addr>>;

    /// Returns whether the domain is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot be queried.
    fn is_running(&self, handle: &DomainHandle) -> Result<bool>;

    /// Stops and undefines the domain. Idempotent: stopping an
    /// already-stopped or already-unknown domain is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the hypervisor itself is unreachable.
    fn destroy(&self, handle: &DomainHandle) -> Result<()>;

    /// Returns whether this driver is operational in the current environment.
    fn is_available(&self) -> bool;
}
