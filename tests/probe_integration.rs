//! Probe Integration Tests for net-response
//!
//! End-to-end checks of validation, classification and the runner against
//! real loopback listeners.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use net_response::probe::FieldValue;
use net_response::{
    ChannelSink, EndpointError, EndpointSpec, JsonLinesSink, ProbeRunner, ResultType, gather,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

// =============================================================================
// Test Helpers
// =============================================================================

/// Bind a loopback TCP listener, or `None` where binding is not permitted.
async fn tcp_listener() -> Option<TcpListener> {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => Some(l),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => None,
        Err(e) => panic!("Failed to bind test listener: {e}"),
    }
}

/// Start a TCP server that prefixes each echoed payload with `greeting`.
async fn start_tcp_echo(greeting: &'static str) -> Option<SocketAddr> {
    let listener = tcp_listener().await?;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut conn, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let n = conn.read(&mut buf).await.unwrap_or(0);
                let _ = conn.write_all(greeting.as_bytes()).await;
                let _ = conn.write_all(&buf[..n]).await;
                let _ = conn.write_all(b"\r\n").await;
                let _ = conn.shutdown().await;
            });
        }
    });

    Some(addr)
}

/// Start a UDP server that echoes every datagram.
async fn start_udp_echo() -> Option<SocketAddr> {
    let socket = match UdpSocket::bind("127.0.0.1:0").await {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("Failed to bind test socket: {e}"),
    };
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..n], peer).await;
        }
    });

    Some(addr)
}

/// Port on loopback with nothing listening.
async fn closed_port() -> Option<u16> {
    let listener = tcp_listener().await?;
    Some(listener.local_addr().unwrap().port())
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_protocol_rejected() {
    for protocol in ["", "icmp", "unknownprotocol", "http"] {
        let spec = EndpointSpec::new("bad", protocol, ":9999");
        let err = gather(&spec).await.unwrap_err();
        assert!(
            matches!(err, EndpointError::InvalidProtocol(_)),
            "protocol {protocol:?} gave {err}"
        );
    }
}

#[tokio::test]
async fn test_udp_requires_send_and_expect() {
    let no_send = EndpointSpec::new("udp", "udp", "127.0.0.1:7").with_expect("toast");
    assert!(matches!(
        gather(&no_send).await,
        Err(EndpointError::MissingSendPayload)
    ));

    let no_expect = EndpointSpec::new("udp", "udp", "127.0.0.1:7").with_send("toast");
    assert!(matches!(
        gather(&no_expect).await,
        Err(EndpointError::MissingExpectPattern)
    ));
}

#[tokio::test]
async fn test_address_errors() {
    let no_port = EndpointSpec::new("tcp", "tcp", ":");
    assert!(matches!(
        gather(&no_port).await,
        Err(EndpointError::MissingPort(_))
    ));

    let address_only = EndpointSpec::new("tcp", "tcp", "127.0.0.1");
    assert!(matches!(
        gather(&address_only).await,
        Err(EndpointError::AddressParse { .. })
    ));
}

// =============================================================================
// TCP
// =============================================================================

#[tokio::test]
async fn test_tcp_no_listener() {
    let Some(port) = closed_port().await else {
        return;
    };
    let spec = EndpointSpec::new("net_response", "tcp", format!(":{port}"));
    let result = gather(&spec).await.unwrap();

    assert_eq!(result.result_type, ResultType::ConnectionFailed);
    assert_eq!(result.result_code(), 1);
    assert_eq!(result.server, "localhost");
    assert!(!result.fields().contains_key("string_found"));

    let tags = result.tags();
    assert_eq!(tags["server"], "localhost");
    assert_eq!(tags["port"], port.to_string());
    assert_eq!(tags["protocol"], "tcp");
    assert_eq!(tags["result_text"], "connection_failed");
}

#[tokio::test]
async fn test_tcp_echo_success() {
    let Some(addr) = start_tcp_echo("").await else {
        return;
    };
    let spec = EndpointSpec::new("net_response", "tcp", addr.to_string())
        .with_send("test")
        .with_expect("test")
        .with_read_timeout(Duration::from_secs(3));
    let result = gather(&spec).await.unwrap();

    assert_eq!(result.result_type, ResultType::Success);
    assert_eq!(result.result_code(), 0);
    assert_eq!(result.string_found, Some(true));
    assert_eq!(result.fields()["string_found"], FieldValue::Bool(true));
}

#[tokio::test]
async fn test_tcp_echo_contains_match() {
    let Some(addr) = start_tcp_echo("SSH-2.0-Test ").await else {
        return;
    };
    let spec = EndpointSpec::new("ssh", "tcp", addr.to_string())
        .with_send("hello")
        .with_expect("SSH");
    let result = gather(&spec).await.unwrap();
    assert_eq!(result.result_type, ResultType::Success);
}

#[tokio::test]
async fn test_tcp_echo_mismatch() {
    let Some(addr) = start_tcp_echo("").await else {
        return;
    };
    let spec = EndpointSpec::new("net_response", "tcp", addr.to_string())
        .with_send("test")
        .with_expect("toast")
        .with_read_timeout(Duration::from_secs(3));
    let result = gather(&spec).await.unwrap();

    assert_eq!(result.result_type, ResultType::StringMismatch);
    assert_eq!(result.result_code(), 1);
    assert_eq!(result.string_found, Some(false));
}

#[tokio::test]
async fn test_tcp_probe_idempotent() {
    let Some(addr) = start_tcp_echo("").await else {
        return;
    };
    let spec = EndpointSpec::new("net_response", "tcp", addr.to_string())
        .with_send("stable")
        .with_expect("stable");

    let first = gather(&spec).await.unwrap();
    let second = gather(&spec).await.unwrap();
    assert_eq!(first.result_type, second.result_type);
    assert_eq!(first.result_code(), second.result_code());
    assert_eq!(first.string_found, second.string_found);
}

// =============================================================================
// UDP
// =============================================================================

#[tokio::test]
async fn test_udp_echo_success() {
    let Some(addr) = start_udp_echo().await else {
        return;
    };
    let spec = EndpointSpec::new("net_response", "udp", addr.to_string())
        .with_send("test")
        .with_expect("test")
        .with_read_timeout(Duration::from_secs(3));
    let result = gather(&spec).await.unwrap();

    assert_eq!(result.result_type, ResultType::Success);
    assert_eq!(result.result_code(), 0);
    assert_eq!(result.string_found, Some(true));
    assert_eq!(result.tags()["protocol"], "udp");
}

#[tokio::test]
async fn test_udp_no_listener_bounded() {
    let Some(port) = closed_port().await else {
        return;
    };
    let read_timeout = Duration::from_millis(500);
    let spec = EndpointSpec::new("net_response", "udp", format!("127.0.0.1:{port}"))
        .with_send("test")
        .with_expect("test")
        .with_read_timeout(read_timeout);

    let start = Instant::now();
    let result = gather(&spec).await.unwrap();

    assert_eq!(result.result_type, ResultType::ReadFailed);
    assert_eq!(result.result_code(), 1);
    assert_eq!(result.string_found, None);
    assert!(!result.fields().contains_key("string_found"));
    assert!(start.elapsed() < read_timeout + Duration::from_secs(2));
}

// =============================================================================
// Runner
// =============================================================================

#[tokio::test]
async fn test_concurrent_runner_no_cross_contamination() {
    let mut endpoints = Vec::new();
    for i in 0..8 {
        let Some(addr) = start_tcp_echo("").await else {
            return;
        };
        let payload = format!("payload-{i}");
        let expect = if i % 2 == 0 { payload.clone() } else { "absent".to_string() };
        endpoints.push(
            EndpointSpec::new(format!("ep-{i}"), "tcp", addr.to_string())
                .with_send(payload)
                .with_expect(expect)
                .with_read_timeout(Duration::from_secs(3)),
        );
    }
    let ports: HashMap<String, String> = endpoints
        .iter()
        .map(|spec| {
            let port = spec.address.rsplit(':').next().unwrap().to_string();
            (spec.name.clone(), port)
        })
        .collect();

    let (sink, mut rx) = ChannelSink::new(16);
    let summary = ProbeRunner::new(endpoints).run(&sink).await;
    drop(sink);
    assert_eq!(summary.probed, 8);

    let mut seen = 0;
    while let Some(result) = rx.recv().await {
        let index: usize = result.name.trim_start_matches("ep-").parse().unwrap();
        assert_eq!(result.port, ports[&result.name]);
        if index % 2 == 0 {
            assert_eq!(result.result_type, ResultType::Success);
        } else {
            assert_eq!(result.result_type, ResultType::StringMismatch);
        }
        seen += 1;
    }
    assert_eq!(seen, 8);
}

#[tokio::test]
async fn test_runner_json_output() {
    let Some(port) = closed_port().await else {
        return;
    };
    let endpoints = vec![
        EndpointSpec::new("skipped", "ftp", ":21"),
        EndpointSpec::new("down", "tcp", format!("127.0.0.1:{port}")),
    ];

    let sink = JsonLinesSink::new(Vec::new());
    let summary = ProbeRunner::new(endpoints).run(&sink).await;
    assert_eq!(summary.invalid, 1);

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], "down");
    assert_eq!(lines[0]["tags"]["result_text"], "connection_failed");
    assert_eq!(lines[0]["fields"]["result_code"], 1);
    assert!(lines[0]["fields"].get("string_found").is_none());
}
