use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use tokio::net::lookup_host;

use crate::error::TransferError;
use crate::protocol::constants::DEFAULT_PORT;

/// Address of the receiving side, as handed over by the group negotiation
/// layer. `host` may be a hostname or a literal IPv4/IPv6 address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferEndpoint {
    host: String,
    port: u16,
}

impl TransferEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint on the well-known group owner port
    pub fn group_owner(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to every candidate socket address, in resolver order.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, TransferError> {
        let addrs: Vec<SocketAddr> = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransferError::AddressResolution {
                endpoint: self.to_string(),
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransferError::AddressResolution {
                endpoint: self.to_string(),
                reason: "no addresses returned".to_string(),
            });
        }

        Ok(addrs)
    }
}

impl From<SocketAddr> for TransferEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for TransferEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
