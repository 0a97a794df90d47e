//! Fiat-Shamir coin derivation.
//!
//! Every reveal round hashes the full transcript — the round counter, both
//! weights, both commitments, and the message digest — and reduces the
//! digest to a coin in `[0, signed_weight)`. All counters are encoded as
//! fixed-width 8-byte little-endian values so no two transcripts share a
//! preimage.

use crate::{Digest, Hasher};

/// The transcript fields that select the coin for one reveal round.
pub(crate) struct CoinChoice<'a, D: Digest> {
    pub j: u64,
    pub signed_weight: u64,
    pub proven_weight: u64,
    pub sig_commit: &'a D,
    pub party_commit: &'a D,
    pub msg_digest: &'a D,
}

/// A number in `[0, signed_weight)` with a nearly uniform distribution,
/// randomized by every field of `choice`.
pub(crate) fn hash_coin<H: Hasher>(choice: &CoinChoice<'_, H::Digest>) -> u64 {
    let mut hasher = H::new();
    hasher
        .update(&choice.j.to_le_bytes())
        .update(&choice.signed_weight.to_le_bytes())
        .update(&choice.proven_weight.to_le_bytes())
        .update(choice.sig_commit.as_ref())
        .update(choice.party_commit.as_ref())
        .update(choice.msg_digest.as_ref());
    let digest = hasher.finalize();

    // Interpret the digest as a big-endian integer and reduce it modulo the
    // signed weight.
    debug_assert!(choice.signed_weight > 0);
    let modulus = u128::from(choice.signed_weight);
    let mut acc: u128 = 0;
    for &byte in digest.as_ref() {
        acc = ((acc << 8) | u128::from(byte)) % modulus;
    }
    acc as u64
}
