//! TCP probe.
//!
//! Connects within the connect timeout, optionally writes the payload, and
//! when an expect pattern is set reads one line within the read timeout.

use std::io::{self, ErrorKind};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::endpoint::Endpoint;
use super::result::{ProbeOutcome, ResultType};

/// Upper bound on the response line read from the peer.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Probe a TCP endpoint.
///
/// Never fails: every outcome is encoded in the returned [`ProbeOutcome`].
/// The stream is dropped, and therefore closed, before this returns.
pub async fn probe(endpoint: &Endpoint) -> ProbeOutcome {
    let target = endpoint.address();
    let start = Instant::now();

    let mut stream = match connect_within(endpoint, &target, TcpStream::connect(&target)).await {
        Ok(stream) => stream,
        Err(result_type) => return ProbeOutcome::new(result_type, start.elapsed()),
    };
    let mut elapsed = start.elapsed();

    if !endpoint.send.is_empty() {
        // Send failures are not classified; a broken peer shows up on read.
        if let Err(e) = stream.write_all(&endpoint.send).await {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "TCP send failed");
        }
        elapsed = start.elapsed();
    }

    let Some(pattern) = &endpoint.expect else {
        tracing::debug!(name = %endpoint.name, target = %target, elapsed = ?elapsed, "TCP probe successful");
        return ProbeOutcome::new(ResultType::Success, elapsed);
    };

    let read = timeout(endpoint.read_timeout, read_line(&mut stream)).await;
    let elapsed = start.elapsed();

    match read {
        Ok(Ok(line)) => {
            let found = pattern.is_found(&line);
            tracing::debug!(
                name = %endpoint.name,
                target = %target,
                found,
                elapsed = ?elapsed,
                "TCP response read"
            );
            ProbeOutcome::compared(found, elapsed)
        }
        Ok(Err(e)) => {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "TCP read failed");
            ProbeOutcome::read_failed(elapsed)
        }
        Err(_) => {
            tracing::warn!(
                name = %endpoint.name,
                target = %target,
                timeout_ms = endpoint.read_timeout.as_millis(),
                "TCP read timed out"
            );
            ProbeOutcome::read_failed(elapsed)
        }
    }
}

/// Await `connect` within the endpoint's connect timeout.
///
/// Hitting the deadline, or an OS-level timed-out error, is `Timeout`; any
/// other error is `ConnectionFailed`.
async fn connect_within<F, T>(
    endpoint: &Endpoint,
    target: &str,
    connect: F,
) -> Result<T, ResultType>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(endpoint.connect_timeout, connect).await {
        Ok(Ok(connected)) => Ok(connected),
        Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "TCP connect timed out");
            Err(ResultType::Timeout)
        }
        Ok(Err(e)) => {
            tracing::warn!(name = %endpoint.name, target = %target, error = %e, "TCP connect failed");
            Err(ResultType::ConnectionFailed)
        }
        Err(_) => {
            tracing::warn!(
                name = %endpoint.name,
                target = %target,
                timeout_ms = endpoint.connect_timeout.as_millis(),
                "TCP connect timed out"
            );
            Err(ResultType::Timeout)
        }
    }
}

/// Read a single line, without its `\n` or `\r\n` terminator.
///
/// A final line cut short by end of stream is returned as is; end of stream
/// before any byte arrives is an error.
async fn read_line<R>(reader: R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader.take(MAX_LINE_BYTES));
    let mut line = Vec::new();

    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed before any response",
        ));
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(line)
}
