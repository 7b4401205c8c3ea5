//! Scheduler address parsing
//!
//! Addresses look like `protocol://location`. A bare location means `tcp`.

use crate::error::ClusterError;
use std::fmt;
use std::str::FromStr;

/// Default protocol when an address has no scheme
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// A parsed scheduler address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddress {
    protocol: String,
    location: String,
}

impl ClusterAddress {
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Split the location into host and port
    pub fn host_port(&self) -> Result<(&str, u16), ClusterError> {
        let (host, port) = self
            .location
            .rsplit_once(':')
            .ok_or_else(|| ClusterError::invalid_address(self.to_string(), "missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = port
            .parse::<u16>()
            .map_err(|e| ClusterError::invalid_address(self.to_string(), e.to_string()))?;
        Ok((host, port))
    }
}

impl FromStr for ClusterAddress {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (protocol, location) = match s.split_once("://") {
            Some((protocol, location)) => (protocol, location),
            None => (DEFAULT_PROTOCOL, s),
        };
        if protocol.is_empty() || !protocol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ClusterError::invalid_address(s, "malformed protocol"));
        }
        Ok(Self {
            protocol: protocol.to_lowercase(),
            location: location.to_string(),
        })
    }
}

impl fmt::Display for ClusterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.location)
    }
}
