//! The signing capability itself is out of scope for this server (per the
//! design's external-interfaces section) — it is a pull-based callback the
//! embedder supplies, analogous to the original implementation's external
//! `gpg`-backed signer. This module only defines the seam.

/// Supplies response-body bytes to the signer and receives signature bytes
/// back, without the signing pipe needing to buffer the whole body or the
/// whole signature in memory at once.
pub trait SignEngine {
    /// Called repeatedly with chunks of the body to be signed, in order,
    /// terminated by an empty slice once the full body has been fed.
    fn feed(&mut self, chunk: &[u8]);

    /// Returns the next chunk of detached-signature bytes, or `None` once
    /// the signature is exhausted. Called only after `feed` has seen the
    /// terminating empty slice.
    fn next_signature_chunk(&mut self) -> Option<Vec<u8>>;
}

/// A `SignEngine` that produces no signature — used when the sigcache
/// decision says a response should not be signed (e.g. a `Range` request,
/// or a sigcache directory that doesn't exist for this resource).
pub struct NullSignEngine;

impl SignEngine for NullSignEngine {
    fn feed(&mut self, _chunk: &[u8]) {}
    fn next_signature_chunk(&mut self) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_engine_never_yields_a_signature() {
        let mut e = NullSignEngine;
        e.feed(b"whatever");
        e.feed(b"");
        assert_eq!(e.next_signature_chunk(), None);
    }
}
