//! Network endpoints advertised in peer documents.
//!
//! An endpoint is one line of a peer document's `Endpoints:` section:
//!
//! - `BASIC_MERKLED_API [dns] [ipv4] [ipv6] port`: plain HTTP/WS node API.
//! - `BMAS host [ipv4] [ipv6] port [path]`: the same API behind TLS.
//!
//! Any other API kind is kept verbatim as [`Endpoint::Other`] so that a
//! node record survives a save/load cycle unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::TypesError;

const BMA_API: &str = "BASIC_MERKLED_API";
const BMAS_API: &str = "BMAS";

/// Host and port of a node API endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiAddress {
    pub dns: Option<String>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub port: u16,
    pub path: Option<String>,
}

impl ApiAddress {
    /// Build an address from a single host, classifying it as an IP or a name.
    pub fn from_host(host: &str, port: u16) -> Self {
        let mut address = Self {
            dns: None,
            ipv4: None,
            ipv6: None,
            port,
            path: None,
        };
        address.classify(host.trim_start_matches('[').trim_end_matches(']'));
        address
    }

    fn classify(&mut self, token: &str) {
        if let Ok(ip) = token.parse::<Ipv4Addr>() {
            self.ipv4 = Some(ip);
        } else if let Ok(ip) = token.parse::<Ipv6Addr>() {
            self.ipv6 = Some(ip);
        } else {
            self.dns = Some(token.to_string());
        }
    }

    /// Host to connect to: the DNS name, else IPv4, else bracketed IPv6.
    pub fn host(&self) -> Option<String> {
        if let Some(dns) = &self.dns {
            Some(dns.clone())
        } else if let Some(ip) = self.ipv4 {
            Some(ip.to_string())
        } else {
            self.ipv6.map(|ip| format!("[{ip}]"))
        }
    }

    fn parse(kind: &str, tokens: &[&str], raw: &str) -> Result<Self, TypesError> {
        let invalid = || TypesError::InvalidEndpoint(raw.to_string());
        let (port_token, hosts, path) = match tokens {
            [] => return Err(invalid()),
            [.., last] if last.parse::<u16>().is_ok() => (*last, &tokens[..tokens.len() - 1], None),
            // Only the TLS flavour accepts a trailing path.
            [.., port, path] if kind == BMAS_API => {
                (*port, &tokens[..tokens.len() - 2], Some(path.to_string()))
            }
            _ => return Err(invalid()),
        };
        let port = port_token.parse::<u16>().map_err(|_| invalid())?;
        if hosts.is_empty() || hosts.len() > 3 {
            return Err(invalid());
        }
        let mut address = Self {
            dns: None,
            ipv4: None,
            ipv6: None,
            port,
            path,
        };
        for host in hosts {
            address.classify(host);
        }
        Ok(address)
    }

    fn write_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dns) = &self.dns {
            write!(f, " {dns}")?;
        }
        if let Some(ip) = self.ipv4 {
            write!(f, " {ip}")?;
        }
        if let Some(ip) = self.ipv6 {
            write!(f, " {ip}")?;
        }
        write!(f, " {}", self.port)?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
        }
        Ok(())
    }
}

/// One endpoint of a peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Endpoint {
    /// Plain HTTP + WebSocket node API.
    Bma(ApiAddress),
    /// TLS HTTP + WebSocket node API.
    Bmas(ApiAddress),
    /// An API kind this crawler does not speak.
    Other(String),
}

impl Endpoint {
    /// Endpoint for a node reached by address rather than by peer document.
    pub fn from_address(secured: bool, host: &str, port: u16) -> Self {
        let address = ApiAddress::from_host(host, port);
        if secured {
            Self::Bmas(address)
        } else {
            Self::Bma(address)
        }
    }

    /// Whether the crawler can talk to this endpoint.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn address(&self) -> Option<&ApiAddress> {
        match self {
            Self::Bma(address) | Self::Bmas(address) => Some(address),
            Self::Other(_) => None,
        }
    }

    fn base_url(&self, http: bool) -> Option<String> {
        let (scheme, address) = match (self, http) {
            (Self::Bma(address), true) => ("http", address),
            (Self::Bma(address), false) => ("ws", address),
            (Self::Bmas(address), true) => ("https", address),
            (Self::Bmas(address), false) => ("wss", address),
            (Self::Other(_), _) => return None,
        };
        let host = address.host()?;
        let path = address
            .path
            .as_deref()
            .map(|p| format!("/{}", p.trim_matches('/')))
            .unwrap_or_default();
        Some(format!("{scheme}://{host}:{}{path}", address.port))
    }

    /// Full HTTP(S) URL for an API path such as `/blockchain/current`.
    pub fn http_url(&self, api_path: &str) -> Option<String> {
        self.base_url(true).map(|base| format!("{base}{api_path}"))
    }

    /// Full WS(S) URL for a subscription path such as `/ws/block`.
    pub fn ws_url(&self, api_path: &str) -> Option<String> {
        self.base_url(false).map(|base| format!("{base}{api_path}"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bma(address) => {
                f.write_str(BMA_API)?;
                address.write_fields(f)
            }
            Self::Bmas(address) => {
                f.write_str(BMAS_API)?;
                address.write_fields(f)
            }
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        match tokens.split_first() {
            Some((&BMA_API, rest)) => Ok(Self::Bma(ApiAddress::parse(BMA_API, rest, raw)?)),
            Some((&BMAS_API, rest)) => Ok(Self::Bmas(ApiAddress::parse(BMAS_API, rest, raw)?)),
            Some(_) => Ok(Self::Other(raw.to_string())),
            None => Err(TypesError::InvalidEndpoint(s.to_string())),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}
