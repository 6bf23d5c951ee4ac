//! # anwdl-virt
//!
//! Hypervisor-backed container (VM domain) lifecycle, behind a pluggable
//! [`HypervisorDriver`] trait, plus the SSH-backed endpoint administration
//! shell used to provision each guest's login credentials.

pub mod container;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod mock_driver;

#[cfg(feature = "libvirt")]
pub mod libvirt_driver;

pub use container::{Container, VirtualizationRegistry};
pub use driver::{DomainHandle, DomainSpec, HypervisorDriver};
pub use endpoint::EndpointShell;
pub use error::{EndpointError, EndpointResult, Result, VirtError};
pub use mock_driver::MockDriver;

#[cfg(feature = "libvirt")]
pub use libvirt_driver::LibvirtDriver;
