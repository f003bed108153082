//! Round-trip driver.
//!
//! Writes the payload, reads back exactly as many bytes, and repeats. There
//! is no framing on the wire: both ends agree on the transfer size because
//! the client always sends and expects the fixed payload length.

use bytes::Bytes;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Per-connection failure.
#[derive(Debug)]
pub enum RoundTripError {
    /// Could not establish the connection.
    Dial(io::Error),
    /// Writing the payload failed.
    Write(io::Error),
    /// Reading the echo failed, including short reads and peer close.
    Read(io::Error),
    /// The final echo differed from what was sent.
    Mismatch { sent: Bytes, received: Bytes },
    /// The exchange was abandoned before it completed.
    Cancelled,
}

impl RoundTripError {
    /// Whether this is a write or read failure on an established connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, RoundTripError::Write(_) | RoundTripError::Read(_))
    }
}

impl fmt::Display for RoundTripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundTripError::Dial(e) => write!(f, "dial failed: {e}"),
            RoundTripError::Write(e) => write!(f, "write failed: {e}"),
            RoundTripError::Read(e) => write!(f, "read failed: {e}"),
            RoundTripError::Mismatch { sent, received } => {
                write!(f, "wrong content: sent ")?;
                write_hex(f, sent)?;
                write!(f, ", received ")?;
                write_hex(f, received)
            }
            RoundTripError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for RoundTripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoundTripError::Dial(e) | RoundTripError::Write(e) | RoundTripError::Read(e) => Some(e),
            _ => None,
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

/// Run `repetitions` write-then-read-full exchanges of `payload` on `stream`.
///
/// Returns the wall time from before the first write to after the last
/// read. Any I/O error aborts immediately. After the last exchange the
/// echoed bytes are compared with the payload; the comparison is not
/// included in the measured time. At least one exchange is always made.
pub async fn round_trip<S>(
    stream: &mut S,
    repetitions: usize,
    payload: &[u8],
) -> Result<Duration, RoundTripError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut received = vec![0u8; payload.len()];

    let start = Instant::now();
    for _ in 0..repetitions.max(1) {
        stream
            .write_all(payload)
            .await
            .map_err(RoundTripError::Write)?;
        stream
            .read_exact(&mut received)
            .await
            .map_err(RoundTripError::Read)?;
    }
    let elapsed = start.elapsed();

    if received != payload {
        return Err(RoundTripError::Mismatch {
            sent: Bytes::copy_from_slice(payload),
            received: Bytes::from(received),
        });
    }

    Ok(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio_test::io::Builder;

    const PAYLOAD: &[u8] = b"0123456789abcdef";

    /// Echo everything on `stream`, sleeping `delay` before each reply.
    async fn delayed_echo(mut stream: DuplexStream, delay: Duration) {
        let mut buf = [0u8; 64];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            tokio::time::sleep(delay).await;
            if stream.write_all(&buf[..n]).await.is_err() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_successful_exchanges() {
        let mut stream = Builder::new()
            .write(PAYLOAD)
            .read(PAYLOAD)
            .write(PAYLOAD)
            .read(PAYLOAD)
            .write(PAYLOAD)
            .read(PAYLOAD)
            .build();

        let elapsed = round_trip(&mut stream, 3, PAYLOAD).await.unwrap();
        assert!(elapsed > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_echo_split_across_reads() {
        let mut stream = Builder::new()
            .write(PAYLOAD)
            .read(&PAYLOAD[..5])
            .read(&PAYLOAD[5..])
            .build();

        assert!(round_trip(&mut stream, 1, PAYLOAD).await.is_ok());
    }

    #[tokio::test]
    async fn test_final_mismatch() {
        let mut corrupted = PAYLOAD.to_vec();
        corrupted[15] ^= 0xff;

        let mut stream = Builder::new()
            .write(PAYLOAD)
            .read(PAYLOAD)
            .write(PAYLOAD)
            .read(&corrupted)
            .build();

        match round_trip(&mut stream, 2, PAYLOAD).await {
            Err(e @ RoundTripError::Mismatch { .. }) => {
                assert!(!e.is_transport());
                assert!(e.to_string().starts_with("wrong content"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_read() {
        let mut stream = Builder::new().write(PAYLOAD).read(&PAYLOAD[..8]).build();

        match round_trip(&mut stream, 1, PAYLOAD).await {
            Err(RoundTripError::Read(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_error_stops_loop() {
        let mut stream = Builder::new()
            .write(PAYLOAD)
            .read(PAYLOAD)
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        match round_trip(&mut stream, 5, PAYLOAD).await {
            Err(e @ RoundTripError::Write(_)) => assert!(e.is_transport()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_repetitions_still_exchanges() {
        let mut stream = Builder::new().write(PAYLOAD).read(PAYLOAD).build();
        assert!(round_trip(&mut stream, 0, PAYLOAD).await.is_ok());
    }

    #[tokio::test]
    async fn test_duration_grows_with_repetitions() {
        let delay = Duration::from_millis(5);

        let (mut client, server) = duplex(64);
        tokio::spawn(delayed_echo(server, delay));
        let one = round_trip(&mut client, 1, PAYLOAD).await.unwrap();

        let (mut client, server) = duplex(64);
        tokio::spawn(delayed_echo(server, delay));
        let ten = round_trip(&mut client, 10, PAYLOAD).await.unwrap();

        assert!(one >= delay);
        assert!(ten >= delay * 10);
        assert!(ten > one);
    }
}
