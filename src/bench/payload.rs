//! Benchmark payload.
//!
//! Every connection sends the same bytes for the whole run. The payload is
//! generated once from the operating system's CSPRNG and shared behind a
//! reference-counted `Bytes`, so handing it to a worker never copies it and
//! nothing can mutate it after generation.

use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;
use std::ops::Deref;

/// Size of the payload exchanged on every round trip.
pub const PAYLOAD_SIZE: usize = 16;

/// Read-only payload shared by all workers of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    /// Generate a fresh payload of `PAYLOAD_SIZE` random bytes.
    ///
    /// Fails only when the OS entropy source is unavailable.
    pub fn generate() -> Result<Self, rand::Error> {
        let mut buf = [0u8; PAYLOAD_SIZE];
        OsRng.try_fill_bytes(&mut buf)?;
        Ok(Payload(Bytes::copy_from_slice(&buf)))
    }

    #[cfg(test)]
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Payload(Bytes::from_static(bytes))
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}
