//! # Configuration
//!
//! A node needs three things before it can join the ring: its own identifier,
//! the address of its successor, and the address to listen on. They come from
//! an optional TOML file and command-line flags, flags taking precedence.
//!
//! ```toml
//! [node]
//! id = "alice"
//! listen_address = "0.0.0.0:8080"
//!
//! [ring]
//! next = "10.0.0.2:8080"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv6Addr, SocketAddr};

use super::error::ConfigError;
use super::messages::NodeId;

/// Port used when neither the file nor the flags name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let file: FileConfig = load_config("config/node1.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_string(),
        source,
    })
}

/// On-disk layout. Every field is optional so flags can fill the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub ring: RingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSection {
    pub id: Option<String>,
    pub listen_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RingSection {
    /// Successor address, `host:port` or a bare host.
    pub next: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub id: Option<String>,
    pub next: Option<String>,
    pub port: Option<u16>,
}

/// Validated node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: NodeId,
    pub listen_address: SocketAddr,
    /// Successor address, always with a port.
    pub next: String,
}

impl NodeConfig {
    /// Merge file values with command-line overrides and validate the result.
    ///
    /// A successor given as a bare host is dialed on this node's own listen
    /// port, since every node of a ring usually listens on the same one.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let id = overrides
            .id
            .or(file.node.id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingId)?;

        let mut listen_address = match file.node.listen_address {
            Some(address) => address
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidListenAddress {
                    address: address.clone(),
                    reason: e.to_string(),
                })?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };
        if let Some(port) = overrides.port {
            listen_address.set_port(port);
        }

        let next = overrides
            .next
            .or(file.ring.next)
            .map(|next| next.trim().to_string())
            .filter(|next| !next.is_empty())
            .ok_or(ConfigError::MissingSuccessor)?;
        let next = resolve_successor(&next, listen_address.port())?;

        Ok(Self {
            id: NodeId::new(id),
            listen_address,
            next,
        })
    }

    /// Load the file at `path` (if any) and merge it with `overrides`.
    pub fn load(path: Option<&str>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => load_config::<FileConfig>(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }
}

/// Validate a successor address and append `port` unless it already names one.
///
/// Accepted forms: `host:port`, a bare host, an IPv6 literal with or without
/// brackets, or `[ipv6]:port`. Hosts may not be empty or contain whitespace.
///
/// # Returns
/// - `Ok(String)`: the address with an explicit port
/// - `Err(ConfigError::InvalidSuccessor)`: anything else
fn resolve_successor(address: &str, port: u16) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSuccessor {
        address: address.to_string(),
        reason,
    };

    if address.parse::<SocketAddr>().is_ok() {
        return Ok(address.to_string());
    }
    if address.parse::<Ipv6Addr>().is_ok() {
        return Ok(format!("[{}]:{}", address, port));
    }
    if let Some(inner) = address.strip_prefix('[').and_then(|a| a.strip_suffix(']')) {
        return match inner.parse::<Ipv6Addr>() {
            Ok(_) => Ok(format!("{}:{}", address, port)),
            Err(_) => Err(invalid(format!("'{}' is not an IPv6 address", inner))),
        };
    }
    if address.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace".to_string()));
    }

    let host = match address.rsplit_once(':') {
        Some((host, p)) => {
            if p.parse::<u16>().is_err() {
                return Err(invalid(format!("invalid port '{}'", p)));
            }
            host
        }
        None => address,
    };
    if host.is_empty() {
        return Err(invalid("empty host".to_string()));
    }
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return Err(invalid(format!("invalid host '{}'", host)));
    }

    if host.len() == address.len() {
        Ok(format!("{}:{}", address, port))
    } else {
        Ok(address.to_string())
    }
}
