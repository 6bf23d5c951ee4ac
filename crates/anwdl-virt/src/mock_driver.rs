//! In-memory hypervisor driver used by tests and by environments with no
//! libvirt connection available.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use crate::driver::{DomainHandle, DomainSpec, HypervisorDriver};
use crate::error::{Result, VirtError};

struct MockDomain {
    running: bool,
    polls_before_ip: u32,
    polls_so_far: u32,
}

/// A driver that simulates a domain acquiring an IP after a fixed number of
/// polls, so the retry loop in [`crate::container::Container::start`] can be
/// exercised without a real hypervisor.
pub struct MockDriver {
    domains: Mutex<HashMap<String, MockDomain>>,
    polls_before_ip: u32,
}

impl MockDriver {
    /// Creates a mock driver whose domains acquire an IP after `polls_before_ip` calls to `ip_of`.
    #[must_use]
    pub fn new(polls_before_ip: u32) -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
            polls_before_ip,
        }
    }

    /// Forces a registered domain into the stopped state, for reaper tests.
    #[allow(clippy::missing_panics_doc)]
    pub fn force_stop(&self, handle: &DomainHandle) {
        if let Some(domain) = self.domains.lock().expect("mock driver mutex poisoned").get_mut(&handle.0) {
            domain.running = false;
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(2)
    }
}

impl HypervisorDriver for MockDriver {
    fn define_and_start(&self, spec: &DomainSpec) -> Result<DomainHandle> {
        let handle = DomainHandle::for_container(spec.uuid);
        let mut domains = self.domains.lock().expect("mock driver mutex poisoned");
        domains.insert(
            handle.0.clone(),
            MockDomain {
                running: true,
                polls_before_ip: self.polls_before_ip,
                polls_so_far: 0,
            },
        );
        Ok(handle)
    }

    fn ip_of(&self, handle: &DomainHandle) -> Result<Option<Ipv4Addr>> {
        let mut domains = self.domains.lock().expect("mock driver mutex poisoned");
        let domain = domains
            .get_mut(&handle.0)
            .ok_or_else(|| VirtError::UnknownDomain(handle.0.clone()))?;
        if !domain.running {
            return Ok(None);
        }
        domain.polls_so_far += 1;
        if domain.polls_so_far >= domain.polls_before_ip {
            Ok(Some(Ipv4Addr::new(192, 168, 122, 50)))
        } else {
            Ok(None)
        }
    }

    fn is_running(&self, handle: &DomainHandle) -> Result<bool> {
        let domains = self.domains.lock().expect("mock driver mutex poisoned");
        Ok(domains.get(&handle.0).is_some_and(|d| d.running))
    }

    fn destroy(&self, handle: &DomainHandle) -> Result<()> {
        let mut domains = self.domains.lock().expect("mock driver mutex poisoned");
        if let Some(domain) = domains.get_mut(&handle.0) {
            domain.running = false;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}
