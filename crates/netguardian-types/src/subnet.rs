//! IPv4 /24 subnet prefixes used by the sweep.

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/// The first three octets of a /24 network, e.g. `192.168.1`.
///
/// Sweeps walk prefixes in configured order; the order is a priority
/// heuristic, so prefixes are kept in a `Vec`, never a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// The address of host `last_octet` inside this prefix.
    pub fn host(&self, last_octet: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, last_octet)
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// The common home-network prefixes, most likely first.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(192, 168, 1),
            Self::new(192, 168, 0),
            Self::new(192, 168, 100),
            Self::new(10, 0, 0),
        ]
    }
}

impl std::fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

impl FromStr for SubnetPrefix {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EndpointError::InvalidPrefix(s.to_string());
        let trimmed = s.trim().trim_end_matches('.');

        let mut octets = [0u8; 3];
        let mut parts = trimmed.split('.');
        for slot in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for SubnetPrefix {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubnetPrefix> for String {
    fn from(prefix: SubnetPrefix) -> Self {
        prefix.to_string()
    }
}
