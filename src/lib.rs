//! net-response - TCP/UDP reachability probes
//!
//! This crate probes network endpoints over TCP or UDP, measures response
//! time, and classifies each outcome as `success`, `timeout`,
//! `connection_failed`, `read_failed` or `string_mismatch`. It can be used
//! as a library, or run once per scheduler interval with the `net-response`
//! executable.
//!
//! # Architecture
//!
//! - **Probe**: endpoint validation, TCP/UDP probe execution, result records
//! - **Runner**: probes every configured endpoint once, sequentially or concurrently
//! - **Sink**: receives results (JSON lines, channel)
//! - **Config**: YAML configuration loading
//!
//! # Example
//!
//! ```rust,no_run
//! use net_response::{EndpointSpec, JsonLinesSink, ProbeRunner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoints = vec![
//!         EndpointSpec::new("ssh", "tcp", "localhost:22").with_expect("SSH"),
//!         EndpointSpec::new("dns", "udp", "127.0.0.1:53")
//!             .with_send("ping")
//!             .with_expect("pong"),
//!     ];
//!
//!     let sink = JsonLinesSink::new(std::io::stdout());
//!     let summary = ProbeRunner::new(endpoints).run(&sink).await;
//!     eprintln!("probed {} endpoints", summary.probed);
//! }
//! ```

pub mod config;
pub mod probe;
pub mod runner;
pub mod sink;

pub use config::{AppConfig, ConfigError};
pub use probe::{
    Endpoint, EndpointError, EndpointSpec, ProbeResult, Protocol, ResultType, gather,
};
pub use runner::{ProbeRunner, RunSummary};
pub use sink::{ChannelSink, JsonLinesSink, MetricSink, SinkError};
