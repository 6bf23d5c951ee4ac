//! The server engine: admission control, request dispatch, and the reaper.

use std::net::{IpAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use uuid::Uuid;

use anwdl_accesstoken::AccessTokenStore;
use anwdl_common::config::ServerConfig;
use anwdl_common::constants::APP_NAME;
use anwdl_common::types::RuntimeStats;
use anwdl_credentials::CredentialStore;
use anwdl_crypto::RsaWrapper;
use anwdl_forwarding::ForwarderPool;
use anwdl_protocol::{make_response, verify_request_content, Context, Event, Request, Response, Verb};
use anwdl_virt::{Container, DomainSpec, EndpointShell, HypervisorDriver, VirtualizationRegistry};

use crate::admission::IpFilter;
use crate::error::{EngineError, EngineResult, SessionError};
use crate::events::EventHandlerTable;
use crate::session::ClientSession;

/// The canonical response sent when a registered event handler aborts the
/// request currently being processed.
fn aborted_response() -> Response {
    make_response(
        false,
        "aborted by event handler",
        Map::new(),
        Some("aborted".to_string()),
    )
}

/// Everything the engine needs to provision a container, pulled out of
/// [`ServerConfig`] once at construction.
struct ContainerDefaults {
    iso_path: PathBuf,
    nat_bridge: String,
    memory_mib: u32,
    vcpus: u32,
    start_timeout_secs: u32,
    bootstrap_username: String,
    bootstrap_password: String,
    ssh_port: u16,
}

/// The server engine: owns every shared registry and drives admission,
/// request dispatch, and reaping.
pub struct Engine {
    rsa: RsaWrapper,
    hypervisor: Arc<dyn HypervisorDriver>,
    registry: VirtualizationRegistry,
    forwarders: ForwarderPool,
    credentials: CredentialStore,
    access_tokens: Option<AccessTokenStore>,
    ip_filter: IpFilter,
    events: EventHandlerTable,
    defaults: ContainerDefaults,
    max_running: Option<u32>,
    client_timeout: Duration,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
}

impl Engine {
    /// Builds an engine from a validated configuration, an already-loaded
    /// RSA identity, and a hypervisor driver. Loading or generating `rsa` is
    /// the caller's job (see `anwdl-cli`'s `start`/`regen-rsa` commands) so
    /// the engine itself never decides whether a key persists across restarts.
    pub fn new(
        config: &ServerConfig,
        rsa: RsaWrapper,
        hypervisor: Arc<dyn HypervisorDriver>,
        access_tokens: Option<AccessTokenStore>,
    ) -> EngineResult<Self> {
        let ip_filter = IpFilter::new(
            config.ip_filter.enabled,
            config.ip_filter.allowed.iter(),
            config.ip_filter.denied.iter(),
        );

        Ok(Self {
            rsa,
            hypervisor,
            registry: VirtualizationRegistry::new(),
            forwarders: ForwarderPool::new(
                config.port_forwarding.range_start..=config.port_forwarding.range_end,
            ),
            credentials: CredentialStore::new(),
            access_tokens,
            ip_filter,
            events: EventHandlerTable::new(),
            defaults: ContainerDefaults {
                iso_path: PathBuf::from(&config.container.iso_path),
                nat_bridge: config.container.nat_bridge_name.clone(),
                memory_mib: config.container.memory_mib,
                vcpus: config.container.vcpus,
                start_timeout_secs: config.container.start_timeout_secs,
                bootstrap_username: config.container.bootstrap_ssh_username.clone(),
                bootstrap_password: config.container.bootstrap_ssh_password.clone(),
                ssh_port: config.container.ssh_port,
            },
            max_running: config.server.max_allowed_running_container_domains,
            client_timeout: Duration::from_secs(config.server.client_timeout_secs),
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
        })
    }

    /// Registers an event handler. Only meaningful before [`Engine::accept_loop`] is called.
    pub fn on_event(
        &mut self,
        event: Event,
        handler: Box<dyn Fn(Context, &Value) -> anwdl_protocol::EventOutcome + Send + Sync>,
    ) {
        self.events.register(event, handler);
    }

    fn fire(&self, event: Event, context: Context, data: &Value) -> anwdl_protocol::EventOutcome {
        self.events.fire(event, context, data)
    }

    /// Runs the accept loop on an already-bound listener. Blocks until
    /// [`Engine::stop`] flips the running flag and a subsequent `accept`
    /// wakes up (or errors, which also ends the loop).
    pub fn accept_loop(self: &Arc<Self>, listener: TcpListener) -> EngineResult<()> {
        self.running.store(true, Ordering::SeqCst);
        *self.started_at.lock().expect("engine mutex poisoned") = Some(Instant::now());
        self.fire(Event::ServerStarted, Context::NormalProcess, &Value::Null);
        self.spawn_reaper();

        for incoming in listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let stream = match incoming {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };
            let peer_ip = stream
                .peer_addr()
                .map(|a| a.ip())
                .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

            if !self.ip_filter.is_allowed(peer_ip) {
                self.fire(
                    Event::ConnectionRefusedIpFilter,
                    Context::NormalProcess,
                    &json!({ "ip": peer_ip.to_string() }),
                );
                continue;
            }

            self.fire(
                Event::ConnectionAccepted,
                Context::NormalProcess,
                &json!({ "ip": peer_ip.to_string() }),
            );

            let engine = Arc::clone(self);
            let _ = thread::spawn(move || {
                if let Err(err) = engine.handle_client(stream, peer_ip) {
                    tracing::error!(error = %err, %peer_ip, "client session failed");
                }
            });
        }
        Ok(())
    }

    fn handle_client(&self, stream: TcpStream, peer_ip: IpAddr) -> EngineResult<()> {
        let _ = stream.set_read_timeout(Some(self.client_timeout));
        let mut session = ClientSession::new(stream, peer_ip);
        session.exchange_keys(&self.rsa)?;
        self.fire(Event::ClientInitialized, Context::NormalProcess, &Value::Null);

        let result = self.serve_one_request(&mut session);
        self.fire(Event::ClientClosed, Context::HandleEnd, &Value::Null);
        result
    }

    /// Receives and answers exactly one request on an already-keyed session.
    /// A request that fails to decode (malformed JSON or an unrecognized
    /// verb) gets a single canonical error response instead of a silently
    /// dropped connection.
    fn serve_one_request(&self, session: &mut ClientSession<TcpStream>) -> EngineResult<()> {
        let request = match session.recv_request() {
            Ok(request) => request,
            Err(SessionError::Serialization(_)) => {
                self.fire(Event::UnhandledVerb, Context::NormalProcess, &Value::Null);
                let response = make_response(
                    false,
                    "malformed request or unhandled verb",
                    Map::new(),
                    Some("decode".to_string()),
                );
                session.send_response(&response)?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if self
            .fire(Event::RequestReceived, Context::NormalProcess, &Value::Null)
            .is_abort()
        {
            session.send_response(&aborted_response())?;
            return Ok(());
        }

        let response = self.dispatch(&request);
        session.send_response(&response)?;
        Ok(())
    }

    /// Validates, authorizes, and routes a decoded request to its verb
    /// handler, converting any error into a well-formed failure response so
    /// a handler error never leaves a client without a reply. Exposed for the
    /// HTTP surface, which decodes its own `Request` from a path segment and
    /// form body rather than a binary-protocol frame.
    pub fn handle_request(&self, request: &Request) -> Response {
        self.dispatch(request)
    }

    fn dispatch(&self, request: &Request) -> Response {
        if let Err(errors) = verify_request_content(request) {
            let outcome = self.fire(
                Event::MalformedRequest,
                Context::NormalProcess,
                &json!({ "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>() }),
            );
            if outcome.is_abort() {
                return aborted_response();
            }
            let reason = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            return make_response(false, "malformed request", Map::new(), Some(reason));
        }

        if let Some(store) = &self.access_tokens {
            let token = request
                .parameters
                .get("access_token")
                .and_then(Value::as_str);
            let authorized = match token {
                Some(t) => store.entry_id_for(t).ok().flatten().is_some(),
                None => false,
            };
            if !authorized {
                let outcome = self.fire(Event::AccessTokenRefused, Context::NormalProcess, &Value::Null);
                if outcome.is_abort() {
                    return aborted_response();
                }
                return make_response(
                    false,
                    "access denied",
                    Map::new(),
                    Some("access_token".to_string()),
                );
            }
        }

        let result = match request.verb {
            Verb::Create => self.handle_create(),
            Verb::Destroy => self.handle_destroy(request),
            Verb::Stat => Ok(self.handle_stat()),
        };

        result.unwrap_or_else(|err| {
            make_response(false, err.to_string(), Map::new(), Some("error".to_string()))
        })
    }

    fn handle_create(&self) -> EngineResult<Response> {
        let used = u32::try_from(self.registry.len()).unwrap_or(u32::MAX);
        if let Some(max_running) = self.max_running {
            if used >= max_running {
                let outcome = self.fire(
                    Event::ConnectionRefusedCapacity,
                    Context::NormalProcess,
                    &Value::Null,
                );
                if outcome.is_abort() {
                    return Err(EngineError::Aborted);
                }
                return Err(EngineError::AtCapacity {
                    used,
                    total: max_running,
                });
            }
        }

        let uuid = Uuid::new_v4();
        let spec = DomainSpec {
            uuid,
            iso_path: self.defaults.iso_path.clone(),
            nat_bridge: self.defaults.nat_bridge.clone(),
            memory_mib: self.defaults.memory_mib,
            vcpus: self.defaults.vcpus,
        };

        let mut container = Container::start(Arc::clone(&self.hypervisor), spec)?;

        match self.finish_create(&mut container) {
            Ok(response) => {
                self.registry.store(container);
                Ok(response)
            }
            Err(err) => {
                // Reverse-order unwind: forwarder, then shell (already closed
                // inside finish_create on its own failure paths), then the
                // domain itself. The credential/registry entries were never
                // created on this path, so there is nothing to clean there.
                let _ = self.forwarders.delete_forwarder(uuid);
                let _ = container.stop();
                let outcome = self.fire(
                    Event::ContainerCreateFailed,
                    Context::Error,
                    &json!({ "container_uuid": uuid.to_string(), "error": err.to_string() }),
                );
                if outcome.is_abort() {
                    return Err(EngineError::Aborted);
                }
                Err(err)
            }
        }
    }

    fn finish_create(&self, container: &mut Container) -> EngineResult<Response> {
        let uuid = container.uuid();
        let ip = container.wait_for_ip(self.defaults.start_timeout_secs)?;
        if self
            .fire(
                Event::ContainerDomainStarted,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string(), "ip": ip.to_string() }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }

        let (username, password) = EndpointShell::generate_client_credentials();
        let shell = EndpointShell::open(
            ip,
            self.defaults.ssh_port,
            &self.defaults.bootstrap_username,
            &self.defaults.bootstrap_password,
        )?;
        if self
            .fire(
                Event::EndpointShellCreated,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string() }),
            )
            .is_abort()
        {
            shell.close();
            return Err(EngineError::Aborted);
        }
        shell.administrate(&username, &password, self.defaults.ssh_port)?;
        shell.close();
        if self
            .fire(
                Event::EndpointShellOpened,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string() }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }

        let host_port = self
            .forwarders
            .create_forwarder(uuid, ip, self.defaults.ssh_port)?;
        if self
            .fire(
                Event::ForwarderCreated,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string(), "port": host_port }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }
        if self
            .fire(
                Event::ForwarderStarted,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string(), "port": host_port }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }

        let (_, _, client_token) = self.credentials.add_entry(uuid)?;

        if self
            .fire(
                Event::ContainerCreated,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string() }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }

        let container_iso_sha256 = container.iso_sha256()?;

        let mut data = Map::new();
        data.insert("container_uuid".to_string(), json!(uuid.to_string()));
        data.insert("client_token".to_string(), json!(client_token));
        data.insert(
            "container_iso_sha256".to_string(),
            json!(container_iso_sha256),
        );
        data.insert("container_username".to_string(), json!(username));
        data.insert("container_password".to_string(), json!(password));
        data.insert("container_listen_port".to_string(), json!(host_port));
        Ok(make_response(true, "container created", data, None))
    }

    fn handle_destroy(&self, request: &Request) -> EngineResult<Response> {
        let uuid_str = request
            .parameters
            .get("container_uuid")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let token = request
            .parameters
            .get("client_token")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let uuid = match Uuid::parse_str(uuid_str) {
            Ok(uuid) => uuid,
            Err(_) => {
                if self
                    .fire(Event::AuthenticationError, Context::NormalProcess, &Value::Null)
                    .is_abort()
                {
                    return Err(EngineError::Aborted);
                }
                return Err(EngineError::UnknownContainer);
            }
        };

        let entry_id = match self.credentials.entry_id_for(uuid, token) {
            Some(entry_id) => entry_id,
            None => {
                if self
                    .fire(
                        Event::AuthenticationError,
                        Context::NormalProcess,
                        &json!({ "container_uuid": uuid.to_string() }),
                    )
                    .is_abort()
                {
                    return Err(EngineError::Aborted);
                }
                return Err(EngineError::UnknownContainer);
            }
        };

        let _ = self.forwarders.delete_forwarder(uuid);
        if let Some(container) = self.registry.remove(uuid) {
            let _ = container.stop();
        }
        self.credentials.delete_entry(entry_id);

        if self
            .fire(
                Event::ContainerDestroyed,
                Context::NormalProcess,
                &json!({ "container_uuid": uuid.to_string() }),
            )
            .is_abort()
        {
            return Err(EngineError::Aborted);
        }
        Ok(make_response(true, "container destroyed", Map::new(), None))
    }

    fn handle_stat(&self) -> Response {
        if self
            .fire(Event::StatRequested, Context::NormalProcess, &Value::Null)
            .is_abort()
        {
            return aborted_response();
        }
        let uptime_secs = self
            .started_at
            .lock()
            .expect("engine mutex poisoned")
            .map_or(0, |t| t.elapsed().as_secs());
        let stats = RuntimeStats {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            used_slots: u32::try_from(self.registry.len()).unwrap_or(u32::MAX),
            total_slots: self.max_running,
        };
        let slot_count_or_nolimit = |slots: Option<u32>| slots.map_or_else(|| json!("nolimit"), |n| json!(n));

        let mut data = Map::new();
        data.insert("name".to_string(), json!(APP_NAME));
        data.insert("version".to_string(), json!(stats.version));
        data.insert("uptime_secs".to_string(), json!(stats.uptime_secs));
        data.insert("used_slots".to_string(), json!(stats.used_slots));
        data.insert("total_slots".to_string(), slot_count_or_nolimit(stats.total_slots));
        data.insert(
            "available_slots".to_string(),
            slot_count_or_nolimit(stats.available_slots()),
        );
        make_response(true, "ok", data, None)
    }

    /// Spawns the background thread that detects domains the hypervisor
    /// reports as stopped outside of an explicit `Destroy` request, and
    /// reclaims their forwarder, credential entry, and registry slot.
    fn spawn_reaper(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let _ = thread::spawn(move || {
            while engine.running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_secs(
                    anwdl_common::constants::POLL_INTERVAL_SECS,
                ));
                engine.reap_once();
            }
        });
    }

    fn reap_once(&self) {
        let dead: Vec<Uuid> = self
            .registry
            .list()
            .into_iter()
            .filter(|uuid| {
                !self
                    .registry
                    .with(*uuid, |c| c.is_running().unwrap_or(false))
                    .unwrap_or(false)
            })
            .collect();

        for uuid in dead {
            let _ = self.forwarders.delete_forwarder(uuid);
            self.fire(
                Event::ForwarderStopped,
                Context::AutomaticAction,
                &json!({ "container_uuid": uuid.to_string() }),
            );
            if let Some(entry_id) = self.credentials.container_entry_id(uuid) {
                self.credentials.delete_entry(entry_id);
            }
            let _ = self.registry.remove(uuid);
            self.fire(
                Event::ContainerDomainStopped,
                Context::AutomaticAction,
                &json!({ "container_uuid": uuid.to_string() }),
            );
        }
    }

    /// Stops accepting new connections, tears down every live container,
    /// and closes the access token store.
    pub fn stop(&self, die_on_error: bool) {
        self.running.store(false, Ordering::SeqCst);
        for uuid in self.registry.list() {
            if let Some(container) = self.registry.remove(uuid) {
                if let Err(err) = container.stop() {
                    tracing::error!(error = %err, %uuid, "error stopping container during shutdown");
                    if die_on_error {
                        std::process::exit(0xDEAD);
                    }
                }
            }
        }
        self.fire(Event::ServerStopped, Context::NormalProcess, &Value::Null);
    }

    /// Whether the accept loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Exposes the current PKCS#1 public key DER, for diagnostics/tests.
    pub fn public_key_der(&self) -> anwdl_crypto::Result<Vec<u8>> {
        self.rsa.public_key_der()
    }
}
