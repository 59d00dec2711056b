//! Probe Layer
//!
//! One-shot TCP/UDP reachability probes. Each probe connects within a
//! bounded timeout, optionally sends a payload, optionally reads a response
//! within a second timeout, and classifies the outcome.
//!
//! # Error Handling
//!
//! - **Configuration errors** ([`EndpointError`]): the endpoint cannot be
//!   probed at all. [`gather`] returns `Err` before any network I/O.
//! - **Negative outcomes** (timeout, refused connection, failed read, pattern
//!   mismatch): valid observations. They are returned as a [`ProbeResult`]
//!   with `result_code = 1`, never as `Err`.
//!
//! # Example
//!
//! ```rust,no_run
//! use net_response::probe::{EndpointSpec, gather};
//!
//! # async fn run() -> Result<(), net_response::probe::EndpointError> {
//! let spec = EndpointSpec::new("ssh", "tcp", "localhost:22").with_expect("SSH");
//! let result = gather(&spec).await?;
//! println!("{} in {:?}", result.result_type, result.response_time);
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod result;
pub mod tcp;
pub mod udp;

use chrono::Utc;

pub use endpoint::{
    DEFAULT_HOST, DEFAULT_NAME, DEFAULT_READ_TIMEOUT, DEFAULT_TIMEOUT, Endpoint, EndpointError,
    EndpointSpec, ExpectPattern, Protocol, split_host_port,
};
pub use result::{
    FieldValue, Fields, MetricRecord, ProbeOutcome, ProbeResult, ResultType, Tags,
};

/// Validate a specification and probe it.
///
/// # Errors
/// Returns [`EndpointError`] when the specification is invalid; no socket is
/// opened in that case.
pub async fn gather(spec: &EndpointSpec) -> Result<ProbeResult, EndpointError> {
    let endpoint = spec.validate()?;
    Ok(probe(&endpoint).await)
}

/// Probe an already validated endpoint.
pub async fn probe(endpoint: &Endpoint) -> ProbeResult {
    let timestamp = Utc::now();
    let outcome = match endpoint.protocol {
        Protocol::Tcp => tcp::probe(endpoint).await,
        Protocol::Udp => udp::probe(endpoint).await,
    };
    ProbeResult::assemble(endpoint, timestamp, outcome)
}
