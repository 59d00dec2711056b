//! Endpoint configuration and validation.
//!
//! [`EndpointSpec`] is the configured description of one target. It is never
//! mutated; [`EndpointSpec::validate`] produces a normalized [`Endpoint`] with
//! defaults applied, the address split into host and port, and the expect
//! pattern compiled. No I/O happens here.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Default connect timeout (1 second).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default read timeout (1 second).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default metric name.
pub const DEFAULT_NAME: &str = "net_response";

/// Host substituted when the address has an empty host component.
pub const DEFAULT_HOST: &str = "localhost";

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Errors that make an endpoint impossible to probe.
///
/// These are detected before any network I/O and mean the endpoint produces
/// no result for the run.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Protocol is neither `tcp` nor `udp`.
    #[error("invalid protocol '{0}': expected 'tcp' or 'udp'")]
    InvalidProtocol(String),

    /// UDP endpoint without a payload to send.
    #[error("send string cannot be empty for udp")]
    MissingSendPayload,

    /// UDP endpoint without an expected response pattern.
    #[error("expect string cannot be empty for udp")]
    MissingExpectPattern,

    /// Address could not be split into host and port.
    #[error("address {address}: {reason}")]
    AddressParse {
        address: String,
        reason: &'static str,
    },

    /// Address has an empty port component.
    #[error("address {0}: port cannot be empty")]
    MissingPort(String),

    /// Expect string is not a valid pattern.
    #[error("invalid expect pattern '{pattern}': {source}")]
    InvalidExpectPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Transport used for a probe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// Connection-oriented probe; a completed handshake proves reachability.
    Tcp,
    /// Connectionless probe; only a matching reply proves reachability.
    Udp,
}

/// Configured description of one probe target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Metric name for this target (default: "net_response").
    #[serde(default = "default_name")]
    pub name: String,
    /// Target as `host:port`. An empty host means localhost.
    #[serde(default)]
    pub address: String,
    /// Either "tcp" or "udp".
    #[serde(default)]
    pub protocol: String,
    /// Connect timeout (default: 1s when unset or zero).
    #[serde(default, with = "humantime_serde")]
    pub timeout: Duration,
    /// Read timeout (default: 1s when unset or zero).
    #[serde(default, with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Payload written after connecting. Required for udp.
    #[serde(default)]
    pub send: String,
    /// Pattern the response must contain. Required for udp.
    #[serde(default)]
    pub expect: String,
    /// Static tags attached to every result of this target.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl EndpointSpec {
    /// Create a new endpoint specification with default timeouts.
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            protocol: protocol.into(),
            timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            send: String::new(),
            expect: String::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Set the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the payload to send.
    pub fn with_send(mut self, send: impl Into<String>) -> Self {
        self.send = send.into();
        self
    }

    /// Set the expected response pattern.
    pub fn with_expect(mut self, expect: impl Into<String>) -> Self {
        self.expect = expect.into();
        self
    }

    /// Set static tags.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validate the specification and produce a normalized [`Endpoint`].
    ///
    /// # Errors
    /// Returns an [`EndpointError`] describing the first problem found.
    pub fn validate(&self) -> Result<Endpoint, EndpointError> {
        let protocol: Protocol = self
            .protocol
            .parse()
            .map_err(|_| EndpointError::InvalidProtocol(self.protocol.clone()))?;

        if protocol == Protocol::Udp {
            if self.send.is_empty() {
                return Err(EndpointError::MissingSendPayload);
            }
            if self.expect.is_empty() {
                return Err(EndpointError::MissingExpectPattern);
            }
        }

        let (host, port) = split_host_port(&self.address)?;
        if port.is_empty() {
            return Err(EndpointError::MissingPort(self.address.clone()));
        }
        let host = if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host.to_string()
        };

        let expect = if self.expect.is_empty() {
            None
        } else {
            Some(ExpectPattern::new(&self.expect)?)
        };

        Ok(Endpoint {
            name: self.name.clone(),
            host,
            port: port.to_string(),
            protocol,
            connect_timeout: or_default(self.timeout, DEFAULT_TIMEOUT),
            read_timeout: or_default(self.read_timeout, DEFAULT_READ_TIMEOUT),
            send: self.send.clone().into_bytes(),
            expect,
            tags: self.tags.clone(),
        })
    }
}

fn or_default(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

/// Compiled expect pattern with contains-semantics.
///
/// The pattern is searched anywhere in the response, so a plain string
/// matches when it appears as a substring.
#[derive(Debug, Clone)]
pub struct ExpectPattern(Regex);

impl ExpectPattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, EndpointError> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|source| EndpointError::InvalidExpectPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Whether the response contains the pattern.
    pub fn is_found(&self, response: &[u8]) -> bool {
        self.0.is_match(response)
    }

    /// Original pattern text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Validated, normalized endpoint ready to be probed.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Metric name.
    pub name: String,
    /// Host, never empty.
    pub host: String,
    /// Port, never empty.
    pub port: String,
    /// Transport.
    pub protocol: Protocol,
    /// Connect timeout, never zero.
    pub connect_timeout: Duration,
    /// Read timeout, never zero.
    pub read_timeout: Duration,
    /// Payload to write, possibly empty for tcp.
    pub send: Vec<u8>,
    /// Expected response pattern, always set for udp.
    pub expect: Option<ExpectPattern>,
    /// Static tags.
    pub tags: BTreeMap<String, String>,
}

impl Endpoint {
    /// Dialable `host:port` address, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Split `host:port`, `[host]:port` or `:port` into host and port.
///
/// The port may be empty; callers decide whether that is acceptable.
pub fn split_host_port(address: &str) -> Result<(&str, &str), EndpointError> {
    let fail = |reason| EndpointError::AddressParse {
        address: address.to_string(),
        reason,
    };

    let colon = address.rfind(':').ok_or_else(|| fail("missing port in address"))?;

    let (host, host_start, host_end) = if address.starts_with('[') {
        let close = address.find(']').ok_or_else(|| fail("missing ']' in address"))?;
        if close + 1 == address.len() {
            return Err(fail("missing port in address"));
        }
        if close + 1 != colon {
            return Err(if address.as_bytes()[close + 1] == b':' {
                fail("too many colons in address")
            } else {
                fail("missing port in address")
            });
        }
        (&address[1..close], 1, close + 1)
    } else {
        let host = &address[..colon];
        if host.contains(':') {
            return Err(fail("too many colons in address"));
        }
        (host, 0, 0)
    };

    if address[host_start..].contains('[') {
        return Err(fail("unexpected '[' in address"));
    }
    if address[host_end..].contains(']') {
        return Err(fail("unexpected ']' in address"));
    }

    Ok((host, &address[colon + 1..]))
}
