//! Server configuration model.
//!
//! Mirrors the YAML configuration shape the original Python implementation
//! validated with a `cerberus` schema. Loading the file from disk and wiring
//! it into `clap` flags is the CLI crate's job; this module only owns the
//! shape and the validation rules.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Binary-protocol listener configuration.
    pub server: BinaryServerConfig,
    /// Optional HTTP/REST listener configuration.
    #[serde(default)]
    pub web_server: Option<WebServerConfig>,
    /// Container/VM provisioning defaults.
    pub container: ContainerConfig,
    /// Port forwarding pool configuration.
    pub port_forwarding: PortForwardingConfig,
    /// IP allow/deny filtering.
    #[serde(default)]
    pub ip_filter: IpFilterConfig,
    /// Access token gating.
    #[serde(default)]
    pub access_token: AccessTokenConfig,
    /// Log rotation policy (consumed by the CLI's logging setup, not by the engine).
    #[serde(default)]
    pub log_rotation: LogRotationConfig,
}

/// Binary protocol listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryServerConfig {
    /// Address to bind the binary protocol listener on.
    pub bind_address: String,
    /// Port to bind the binary protocol listener on.
    pub port: u16,
    /// RSA key size in bits used for the handshake.
    #[serde(default = "default_rsa_key_size")]
    pub rsa_key_size: usize,
    /// Path to a PKCS#1 PEM-encoded private key to load at startup. When
    /// unset, a fresh ephemeral keypair is generated on every start.
    #[serde(default)]
    pub rsa_key_path: Option<String>,
    /// Maximum number of container domains running simultaneously. `None`
    /// (or omitted from the YAML) means no cap is enforced; `Stat` then
    /// reports `"nolimit"` instead of a numeric slot count.
    #[serde(default)]
    pub max_allowed_running_container_domains: Option<u32>,
    /// Client socket receive timeout, in seconds.
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,
}

const fn default_rsa_key_size() -> usize {
    crate::constants::DEFAULT_RSA_KEY_SIZE
}

const fn default_client_timeout() -> u64 {
    30
}

/// HTTP/REST listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServerConfig {
    /// Address to bind the HTTP listener on.
    pub bind_address: String,
    /// Port to bind the HTTP listener on.
    pub port: u16,
    /// Whether to serve over TLS.
    #[serde(default)]
    pub enable_tls: bool,
    /// Path to the TLS certificate chain (PEM), required when `enable_tls` is set.
    #[serde(default)]
    pub tls_cert_path: Option<String>,
    /// Path to the TLS private key (PEM), required when `enable_tls` is set.
    #[serde(default)]
    pub tls_key_path: Option<String>,
}

/// Container/VM provisioning defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Path to the ISO image booted by every provisioned domain.
    pub iso_path: String,
    /// Name of the libvirt/host bridge to attach the domain NIC to.
    pub nat_bridge_name: String,
    /// Memory allotted to each domain, in MiB.
    #[serde(default = "default_container_memory")]
    pub memory_mib: u32,
    /// Virtual CPUs allotted to each domain.
    #[serde(default = "default_container_vcpus")]
    pub vcpus: u32,
    /// Seconds to wait for a domain to acquire an IP before failing CREATE.
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u32,
    /// Username baked into the boot ISO, used only to open the one-shot
    /// administration shell that provisions the client's own credentials.
    pub bootstrap_ssh_username: String,
    /// Password baked into the boot ISO, paired with `bootstrap_ssh_username`.
    pub bootstrap_ssh_password: String,
    /// Guest-side SSH port, both for the administration shell and for the
    /// port the forwarder ultimately relays to.
    #[serde(default = "default_dest_port")]
    pub ssh_port: u16,
}

const fn default_container_memory() -> u32 {
    512
}

const fn default_container_vcpus() -> u32 {
    1
}

const fn default_start_timeout() -> u32 {
    60
}

/// Port forwarder pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortForwardingConfig {
    /// First port in the forwardable range.
    pub range_start: u16,
    /// Last port (inclusive) in the forwardable range.
    pub range_end: u16,
    /// Destination port on the guest that the forwarder connects to (SSH, typically).
    #[serde(default = "default_dest_port")]
    pub destination_port: u16,
}

const fn default_dest_port() -> u16 {
    22
}

/// IP allow/deny filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpFilterConfig {
    /// When true, only `allowed` addresses may connect; otherwise `denied` addresses are blocked.
    #[serde(default)]
    pub enabled: bool,
    /// Addresses allowed to connect, when `enabled` and non-empty (allow-list mode).
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Addresses refused, when `enabled` and `allowed` is empty (deny-list mode).
    #[serde(default)]
    pub denied: Vec<String>,
}

/// Access token gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenConfig {
    /// When true, every request must carry a valid, enabled access token.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the SQLite file backing the access token store.
    #[serde(default)]
    pub database_path: Option<String>,
}

/// Log rotation policy, consumed only by the CLI's logging setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRotationConfig {
    /// Maximum log file size, in bytes, before rotating.
    #[serde(default = "default_max_log_size")]
    pub max_bytes: u64,
    /// Number of rotated files to retain.
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_log_size(),
            backup_count: default_backup_count(),
        }
    }
}

const fn default_max_log_size() -> u64 {
    10 * 1024 * 1024
}

const fn default_backup_count() -> u32 {
    5
}

impl ServerConfig {
    /// Parses a configuration document from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants the schema type alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.container.memory_mib < 256 {
            return Err(CommonError::Config {
                message: "container.memory_mib must be at least 256".to_string(),
            });
        }
        if self.container.vcpus < 1 {
            return Err(CommonError::Config {
                message: "container.vcpus must be at least 1".to_string(),
            });
        }
        if self.port_forwarding.range_end <= self.port_forwarding.range_start {
            return Err(CommonError::Config {
                message: "port_forwarding.range_end must be greater than range_start".to_string(),
            });
        }
        if let Some(max_domains) = self.server.max_allowed_running_container_domains {
            let range_width =
                u32::from(self.port_forwarding.range_end - self.port_forwarding.range_start) + 1;
            if range_width < max_domains {
                return Err(CommonError::Config {
                    message: "port_forwarding range must be at least as wide as \
                              max_allowed_running_container_domains"
                        .to_string(),
                });
            }
        }
        if let Some(web) = &self.web_server {
            if web.enable_tls && (web.tls_cert_path.is_none() || web.tls_key_path.is_none()) {
                return Err(CommonError::Config {
                    message: "web_server.enable_tls requires tls_cert_path and tls_key_path"
                        .to_string(),
                });
            }
        }
        if self.access_token.enabled && self.access_token.database_path.is_none() {
            return Err(CommonError::Config {
                message: "access_token.enabled requires a database_path".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
server:
  bind_address: "0.0.0.0"
  port: 7032
  max_allowed_running_container_domains: 4
container:
  iso_path: "/var/lib/anwdl/base.iso"
  nat_bridge_name: "virbr1"
  bootstrap_ssh_username: "root"
  bootstrap_ssh_password: "toor"
port_forwarding:
  range_start: 30000
  range_end: 30010
"#
    }

    #[test]
    fn parses_minimal_config() {
        let config = ServerConfig::from_yaml(minimal_yaml()).expect("valid config");
        assert_eq!(config.server.port, 7032);
        assert_eq!(config.container.memory_mib, 512);
    }

    #[test]
    fn rejects_narrow_port_range() {
        let yaml = minimal_yaml().replace("range_end: 30010", "range_end: 30002");
        let err = ServerConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, CommonError::Config { .. }));
    }

    #[test]
    fn uncapped_server_skips_range_width_check() {
        let yaml = minimal_yaml()
            .replace("  max_allowed_running_container_domains: 4\n", "")
            .replace("range_end: 30010", "range_end: 30001");
        let config = ServerConfig::from_yaml(&yaml).expect("valid config");
        assert!(config.server.max_allowed_running_container_domains.is_none());
    }

    #[test]
    fn rejects_low_memory() {
        let yaml = minimal_yaml().replacen(
            "nat_bridge_name: \"virbr1\"",
            "nat_bridge_name: \"virbr1\"\n  memory_mib: 64",
            1,
        );
        let err = ServerConfig::from_yaml(&yaml);
        assert!(err.is_err());
    }
}
