//! Probe outcome classification and result records.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::endpoint::{Endpoint, Protocol};

/// String key/value tags of a result.
pub type Tags = BTreeMap<String, String>;

/// Typed fields of a result.
pub type Fields = BTreeMap<String, FieldValue>;

/// Closed classification of a finished probe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultType {
    /// Connected and, when requested, the response matched.
    Success,
    /// Connection attempt exceeded the connect timeout.
    Timeout,
    /// Connection (or socket setup) failed for any other reason.
    ConnectionFailed,
    /// No response could be read before the read timeout.
    ReadFailed,
    /// A response was read but did not contain the expected pattern.
    StringMismatch,
}

impl ResultType {
    /// Numeric result code: `0` for success, `1` for everything else.
    pub fn code(self) -> i64 {
        match self {
            Self::Success => 0,
            _ => 1,
        }
    }

    /// Whether the probe succeeded.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Value of a result field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// Raw outcome of a protocol probe, before identity tags are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub result_type: ResultType,
    pub response_time: Duration,
    pub string_found: Option<bool>,
}

impl ProbeOutcome {
    /// Outcome decided before any read was attempted.
    pub fn new(result_type: ResultType, response_time: Duration) -> Self {
        Self {
            result_type,
            response_time,
            string_found: None,
        }
    }

    /// TCP read attempted but nothing usable arrived.
    pub fn read_failed(response_time: Duration) -> Self {
        Self {
            result_type: ResultType::ReadFailed,
            response_time,
            string_found: Some(false),
        }
    }

    /// Response read and compared against the pattern.
    pub fn compared(found: bool, response_time: Duration) -> Self {
        Self {
            result_type: if found {
                ResultType::Success
            } else {
                ResultType::StringMismatch
            },
            response_time,
            string_found: Some(found),
        }
    }
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Metric name of the endpoint.
    pub name: String,
    /// Time the probe started (UTC).
    pub timestamp: DateTime<Utc>,
    /// Probed host (never empty).
    pub server: String,
    /// Probed port.
    pub port: String,
    /// Transport used.
    pub protocol: Protocol,
    /// Outcome classification.
    pub result_type: ResultType,
    /// Time from the start of the connection attempt to the last step reached.
    #[serde(with = "humantime_serde")]
    pub response_time: Duration,
    /// Whether the expected pattern was found; `None` when nothing was read.
    pub string_found: Option<bool>,
    /// Static tags configured on the endpoint.
    #[serde(default)]
    pub static_tags: Tags,
}

impl ProbeResult {
    /// Combine a validated endpoint with the outcome of its probe.
    pub fn assemble(endpoint: &Endpoint, timestamp: DateTime<Utc>, outcome: ProbeOutcome) -> Self {
        Self {
            name: endpoint.name.clone(),
            timestamp,
            server: endpoint.host.clone(),
            port: endpoint.port.clone(),
            protocol: endpoint.protocol,
            result_type: outcome.result_type,
            response_time: outcome.response_time,
            string_found: outcome.string_found,
            static_tags: endpoint.tags.clone(),
        }
    }

    /// `0` on success, `1` otherwise.
    pub fn result_code(&self) -> i64 {
        self.result_type.code()
    }

    /// Response time in fractional seconds.
    pub fn response_time_secs(&self) -> f64 {
        self.response_time.as_secs_f64()
    }

    /// Tag view of the result.
    ///
    /// Static tags are overridden by identity tags, which are overridden by
    /// the probe's own `result_text`.
    pub fn tags(&self) -> Tags {
        let mut tags = self.static_tags.clone();
        tags.insert("server".to_string(), self.server.clone());
        tags.insert("port".to_string(), self.port.clone());
        tags.insert("protocol".to_string(), self.protocol.to_string());
        tags.insert("result_text".to_string(), self.result_type.to_string());
        tags
    }

    /// Field view of the result.
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("result_code".to_string(), self.result_code().into());
        fields.insert(
            "result_type".to_string(),
            self.result_type.as_ref().into(),
        );
        fields.insert(
            "response_time".to_string(),
            self.response_time_secs().into(),
        );
        if let Some(found) = self.string_found {
            fields.insert("string_found".to_string(), found.into());
        }
        fields
    }

    /// Flattened record handed to sinks.
    pub fn to_record(&self) -> MetricRecord {
        MetricRecord {
            name: self.name.clone(),
            timestamp: self.timestamp,
            tags: self.tags(),
            fields: self.fields(),
        }
    }
}

/// Sink-facing name/tags/fields record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub tags: Tags,
    pub fields: Fields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::endpoint::EndpointSpec;
    use std::str::FromStr;

    fn endpoint() -> Endpoint {
        let mut tags = Tags::new();
        tags.insert("env".to_string(), "test".to_string());
        tags.insert("server".to_string(), "overridden".to_string());
        EndpointSpec::new("web", "tcp", ":8080")
            .with_tags(tags)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_result_type_strings() {
        assert_eq!(ResultType::Success.as_ref(), "success");
        assert_eq!(ResultType::Timeout.as_ref(), "timeout");
        assert_eq!(ResultType::ConnectionFailed.as_ref(), "connection_failed");
        assert_eq!(ResultType::ReadFailed.as_ref(), "read_failed");
        assert_eq!(ResultType::StringMismatch.to_string(), "string_mismatch");
        assert_eq!(
            ResultType::from_str("read_failed").unwrap(),
            ResultType::ReadFailed
        );
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(ResultType::Success.code(), 0);
        for failure in [
            ResultType::Timeout,
            ResultType::ConnectionFailed,
            ResultType::ReadFailed,
            ResultType::StringMismatch,
        ] {
            assert_eq!(failure.code(), 1);
            assert!(!failure.is_success());
        }
    }

    #[test]
    fn test_outcome_constructors() {
        let elapsed = Duration::from_millis(5);
        assert_eq!(ProbeOutcome::new(ResultType::Timeout, elapsed).string_found, None);
        assert_eq!(ProbeOutcome::read_failed(elapsed).string_found, Some(false));

        let hit = ProbeOutcome::compared(true, elapsed);
        assert_eq!(hit.result_type, ResultType::Success);
        assert_eq!(hit.string_found, Some(true));

        let miss = ProbeOutcome::compared(false, elapsed);
        assert_eq!(miss.result_type, ResultType::StringMismatch);
        assert_eq!(miss.string_found, Some(false));
    }

    #[test]
    fn test_tags_precedence() {
        let outcome = ProbeOutcome::new(ResultType::ConnectionFailed, Duration::from_millis(3));
        let result = ProbeResult::assemble(&endpoint(), Utc::now(), outcome);
        let tags = result.tags();

        assert_eq!(tags["server"], "localhost");
        assert_eq!(tags["port"], "8080");
        assert_eq!(tags["protocol"], "tcp");
        assert_eq!(tags["result_text"], "connection_failed");
        assert_eq!(tags["env"], "test");
    }

    #[test]
    fn test_fields_without_read() {
        let outcome = ProbeOutcome::new(ResultType::ConnectionFailed, Duration::from_millis(250));
        let result = ProbeResult::assemble(&endpoint(), Utc::now(), outcome);
        let fields = result.fields();

        assert_eq!(fields["result_code"], FieldValue::Int(1));
        assert_eq!(
            fields["result_type"],
            FieldValue::Str("connection_failed".to_string())
        );
        assert_eq!(fields["response_time"], FieldValue::Float(0.25));
        assert!(!fields.contains_key("string_found"));
    }

    #[test]
    fn test_fields_with_read() {
        let outcome = ProbeOutcome::compared(true, Duration::from_millis(10));
        let result = ProbeResult::assemble(&endpoint(), Utc::now(), outcome);
        let fields = result.fields();

        assert_eq!(result.result_code(), 0);
        assert_eq!(fields["result_code"], FieldValue::Int(0));
        assert_eq!(fields["string_found"], FieldValue::Bool(true));
    }

    #[test]
    fn test_record_json_shape() {
        let outcome = ProbeOutcome::compared(false, Duration::from_millis(10));
        let result = ProbeResult::assemble(&endpoint(), Utc::now(), outcome);
        let json = serde_json::to_value(result.to_record()).unwrap();

        assert_eq!(json["name"], "web");
        assert_eq!(json["tags"]["result_text"], "string_mismatch");
        assert_eq!(json["fields"]["result_code"], 1);
        assert_eq!(json["fields"]["string_found"], false);
        assert!(json["fields"]["response_time"].is_f64());
    }
}
