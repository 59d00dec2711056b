//! UDP probe.
//!
//! UDP has no handshake, so reachability is only inferred from a reply: the
//! payload is sent on a connected socket and one datagram is awaited within
//! the read timeout.

use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;

use tokio::net::{UdpSocket, lookup_host};
use tokio::time::timeout;

use super::endpoint::Endpoint;
use super::result::{ProbeOutcome, ResultType};

/// Receive buffer size; larger datagrams are truncated.
pub const MAX_DATAGRAM_BYTES: usize = 1024;

/// Probe a UDP endpoint.
///
/// Never fails: every outcome is encoded in the returned [`ProbeOutcome`].
/// The socket is dropped, and therefore closed, before this returns.
pub async fn probe(endpoint: &Endpoint) -> ProbeOutcome {
    let target = endpoint.address();
    let start = Instant::now();

    let socket = match timeout(endpoint.connect_timeout, open_socket(&target)).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "UDP socket setup failed");
            return ProbeOutcome::new(ResultType::ConnectionFailed, start.elapsed());
        }
        Err(_) => {
            tracing::warn!(
                name = %endpoint.name,
                target = %target,
                timeout_ms = endpoint.connect_timeout.as_millis(),
                "UDP address resolution timed out"
            );
            return ProbeOutcome::new(ResultType::ConnectionFailed, start.elapsed());
        }
    };

    // Send failures are not classified; they surface as a failed read.
    if let Err(e) = socket.send(&endpoint.send).await {
        tracing::warn!(name = %endpoint.name, target = %target, error = %e, "UDP send failed");
    }

    let mut buf = [0u8; MAX_DATAGRAM_BYTES];
    let read = timeout(endpoint.read_timeout, socket.recv(&mut buf)).await;
    let elapsed = start.elapsed();

    match read {
        Ok(Ok(n)) => {
            let response = &buf[..n];
            // Validation guarantees a pattern for udp; any reply counts otherwise.
            let found = endpoint
                .expect
                .as_ref()
                .is_none_or(|pattern| pattern.is_found(response));
            tracing::debug!(
                name = %endpoint.name,
                target = %target,
                bytes = n,
                found,
                elapsed = ?elapsed,
                "UDP response read"
            );
            ProbeOutcome::compared(found, elapsed)
        }
        Ok(Err(e)) => {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "UDP read failed");
            ProbeOutcome::new(ResultType::ReadFailed, elapsed)
        }
        Err(_) => {
            tracing::warn!(
                name = %endpoint.name,
                target = %target,
                timeout_ms = endpoint.read_timeout.as_millis(),
                "UDP read timed out"
            );
            ProbeOutcome::new(ResultType::ReadFailed, elapsed)
        }
    }
}

/// Resolve the target and open an ephemeral socket connected to it.
async fn open_socket(target: &str) -> io::Result<UdpSocket> {
    let remote = lookup_host(target)
        .await?
        .next()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "no addresses found"))?;

    let local: SocketAddr = match remote {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(remote).await?;
    Ok(socket)
}
