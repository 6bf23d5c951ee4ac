//! Real libvirt-backed hypervisor driver.
//!
//! A connection is opened fresh for every call rather than held for the
//! driver's lifetime, so a long-lived server process is never pinned to a
//! single libvirt connection that could silently die underneath it.

use std::fs;
use std::net::Ipv4Addr;

use virt::connect::Connect;
use virt::domain::Domain;

use crate::driver::{DomainHandle, DomainSpec, HypervisorDriver};
use crate::error::{Result, VirtError};

const LIBVIRT_URI: &str = "qemu:///system";
const DNSMASQ_STATUS_PATH: &str = "/var/lib/libvirt/dnsmasq/virbr0.status";

/// Hypervisor driver backed by a local libvirt daemon.
#[derive(Default)]
pub struct LibvirtDriver;

impl LibvirtDriver {
    /// Creates a new driver. Connecting is deferred to each call.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn connect() -> Result<Connect> {
        Connect::open(Some(LIBVIRT_URI)).map_err(|e| VirtError::Connection(e.to_string()))
    }

    fn domain_xml(spec: &DomainSpec) -> String {
        format!(
            r#"<domain type='kvm'>
  <name>{uuid}</name>
  <memory unit='MiB'>{memory_mib}</memory>
  <vcpu>{vcpus}</vcpu>
  <os>
    <type arch='x86_64'>hvm</type>
    <boot dev='cdrom'/>
  </os>
  <devices>
    <disk type='file' device='cdrom'>
      <driver name='qemu' type='raw'/>
      <source file='{iso_path}'/>
      <target dev='hda' bus='ide'/>
      <readonly/>
    </disk>
    <interface type='bridge'>
      <source bridge='{bridge}'/>
      <model type='virtio'/>
    </interface>
    <memballoon model='virtio'/>
  </devices>
</domain>"#,
            uuid = spec.uuid,
            memory_mib = spec.memory_mib,
            vcpus = spec.vcpus,
            iso_path = spec.iso_path.display(),
            bridge = spec.nat_bridge,
        )
    }

    fn find_domain(conn: &Connect, handle: &DomainHandle) -> Result<Domain> {
        Domain::lookup_by_name(conn, &handle.0)
            .map_err(|_| VirtError::UnknownDomain(handle.0.clone()))
    }

    /// Extracts the domain's NIC MAC address from its live XML description.
    fn mac_of(domain: &Domain) -> Result<Option<String>> {
        let xml = domain
            .get_xml_desc(0)
            .map_err(|e| VirtError::DomainStart(e.to_string()))?;
        Ok(xml
            .split("mac address='")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .map(str::to_ascii_lowercase))
    }

    /// Looks up the IPv4 address dnsmasq leased to `mac`, by scanning the
    /// bridge's JSON lease-status file (the same collaborator the original
    /// implementation parsed directly, rather than libvirt's own DHCP
    /// lease API, since not every deployment runs libvirt-managed DHCP).
    fn ip_for_mac(mac: &str) -> Result<Option<Ipv4Addr>> {
        let contents = match fs::read_to_string(DNSMASQ_STATUS_PATH) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        let leases: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap_or_default();
        for lease in leases {
            let lease_mac = lease
                .get("mac-address")
                .and_then(serde_json::Value::as_str)
                .map(str::to_ascii_lowercase);
            if lease_mac.as_deref() == Some(mac) {
                if let Some(ip) = lease.get("ip-address").and_then(serde_json::Value::as_str) {
                    return Ok(ip.parse().ok());
                }
            }
        }
        Ok(None)
    }
}

impl HypervisorDriver for LibvirtDriver {
    fn define_and_start(&self, spec: &DomainSpec) -> Result<DomainHandle> {
        let conn = Self::connect()?;
        let xml = Self::domain_xml(spec);
        let domain = Domain::define_xml(&conn, &xml)
            .map_err(|e| VirtError::DomainStart(e.to_string()))?;
        domain
            .create()
            .map_err(|e| VirtError::DomainStart(e.to_string()))?;
        Ok(DomainHandle::for_container(spec.uuid))
    }

    fn ip_of(&self, handle: &DomainHandle) -> Result<Option<Ipv4Addr>> {
        let conn = Self::connect()?;
        let domain = Self::find_domain(&conn, handle)?;
        match Self::mac_of(&domain)? {
            Some(mac) => Self::ip_for_mac(&mac),
            None => Ok(None),
        }
    }

    fn is_running(&self, handle: &DomainHandle) -> Result<bool> {
        let conn = Self::connect()?;
        let domain = match Self::find_domain(&conn, handle) {
            Ok(d) => d,
            Err(_) => return Ok(false),
        };
        domain
            .is_active()
            .map_err(|e| VirtError::DomainStart(e.to_string()))
    }

    fn destroy(&self, handle: &DomainHandle) -> Result<()> {
        let conn = Self::connect()?;
        let domain = match Self::find_domain(&conn, handle) {
            Ok(d) => d,
            Err(_) => return Ok(()),
        };
        if domain.is_active().unwrap_or(false) {
            let _ = domain.destroy();
        }
        let _ = domain.undefine();
        Ok(())
    }

    fn is_available(&self) -> bool {
        Self::connect().is_ok()
    }
}
