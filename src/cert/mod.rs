//! Certificate data model, builder, and verifier.
//!
//! The flow has three actors. The application fixes an ordered, weighted
//! participant set and commits it with [commit_participants]. The [Builder]
//! collects signatures over a common message into a slot table, commits the
//! table, samples reveal positions with the Fiat-Shamir coins, and emits a
//! [Cert]. The [Verifier] re-derives the coins and checks every reveal
//! against both commitments.

use crate::codec::{self, Codec, SizedCodec};
use crate::merkle::{Proof, Tree};
use crate::{Digest, Hasher, PublicKey, Signature};
use bytes::{Buf, BufMut};
use std::collections::BTreeMap;

mod bigfloat;
mod builder;
mod coin;
mod verifier;

pub use bigfloat::num_reveals;
pub use builder::Builder;
pub use verifier::Verifier;

/// Upper bound on the number of reveal rounds, capping both allocation and
/// the reveal-count iteration.
pub const MAX_REVEALS: u64 = 1024;

/// Decode bound on the sibling streams of a certificate's proofs.
pub(crate) const MAX_PROOF_DIGESTS: usize = 20 * MAX_REVEALS as usize;

/// Parameters shared by a builder and its verifier.
#[derive(Clone, Debug)]
pub struct Params {
    /// The message every participant signs.
    pub msg: Vec<u8>,
    /// The minimum aggregate weight the certificate attests to.
    pub proven_weight: u64,
    /// The security parameter `k + q`.
    pub sec_kq: u64,
}

/// A weighted participant, addressed by its position in the declared
/// ordered sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant<K: PublicKey> {
    pub public_key: K,
    pub weight: u64,
}

impl<K: PublicKey> Participant<K> {
    /// Canonical bytes committed to by the party tree:
    /// `public_key || weight_le64`.
    pub fn leaf(&self) -> Vec<u8> {
        let mut leaf = Vec::with_capacity(K::LEN_ENCODED + 8);
        leaf.extend_from_slice(self.public_key.as_ref());
        leaf.extend_from_slice(&self.weight.to_le_bytes());
        leaf
    }
}

impl<K: PublicKey> Codec for Participant<K> {
    fn write<B: BufMut>(&self, buf: &mut B) {
        self.public_key.write(buf);
        self.weight.write(buf);
    }

    fn len_encoded(&self) -> usize {
        K::LEN_ENCODED + u64::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let public_key = K::read(buf)?;
        let weight = u64::read(buf)?;
        Ok(Self { public_key, weight })
    }
}

/// One entry of the signature slot table.
///
/// `l` is the exclusive prefix sum of participant weights up to this
/// position, defining the half-open coin interval `[l, l + weight)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigSlot<S: Signature> {
    pub sig: Option<S>,
    pub l: u64,
}

impl<S: Signature> SigSlot<S> {
    /// Canonical bytes committed to by the signature tree:
    /// `sig || l_le64`, with an unsigned slot contributing an empty
    /// signature field.
    pub fn leaf(&self) -> Vec<u8> {
        let sig_len = self.sig.as_ref().map_or(0, |_| S::LEN_ENCODED);
        let mut leaf = Vec::with_capacity(sig_len + 8);
        if let Some(sig) = &self.sig {
            leaf.extend_from_slice(sig.as_ref());
        }
        leaf.extend_from_slice(&self.l.to_le_bytes());
        leaf
    }
}

impl<S: Signature> Default for SigSlot<S> {
    fn default() -> Self {
        Self { sig: None, l: 0 }
    }
}

impl<S: Signature> Codec for SigSlot<S> {
    fn write<B: BufMut>(&self, buf: &mut B) {
        self.sig.write(buf);
        self.l.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.sig.len_encoded() + u64::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let sig = Option::<S>::read(buf)?;
        let l = u64::read(buf)?;
        Ok(Self { sig, l })
    }
}

/// A participant selected by the coin procedure, disclosed in full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reveal<K: PublicKey> {
    pub party: Participant<K>,
    pub sig_slot: SigSlot<K::Signature>,
}

impl<K: PublicKey> Codec for Reveal<K> {
    fn write<B: BufMut>(&self, buf: &mut B) {
        self.party.write(buf);
        self.sig_slot.write(buf);
    }

    fn len_encoded(&self) -> usize {
        self.party.len_encoded() + self.sig_slot.len_encoded()
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let party = Participant::read(buf)?;
        let sig_slot = SigSlot::read(buf)?;
        Ok(Self { party, sig_slot })
    }
}

/// A compact certificate.
///
/// The reveal map is keyed by participant position; wire encoding and proof
/// construction always iterate it in ascending position order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cert<K: PublicKey, D: Digest> {
    /// Root of the Merkle tree over the fully-populated slot table.
    pub sig_commit: D,
    /// Aggregate weight of the slots holding signatures.
    pub signed_weight: u64,
    /// Multi-index proof for the revealed slots against `sig_commit`.
    pub sig_proofs: Proof<D>,
    /// Multi-index proof for the revealed participants against the party
    /// commitment.
    pub party_proofs: Proof<D>,
    /// The disclosed `(participant, slot)` records, keyed by position.
    pub reveals: BTreeMap<u64, Reveal<K>>,
}

impl<K: PublicKey, D: Digest> Codec for Cert<K, D> {
    fn write<B: BufMut>(&self, buf: &mut B) {
        self.sig_commit.write(buf);
        self.signed_weight.write(buf);
        codec::write_seq(buf, &self.sig_proofs.siblings);
        codec::write_seq(buf, &self.party_proofs.siblings);
        let reveals = u32::try_from(self.reveals.len()).expect("reveal count exceeds u32");
        buf.put_u32_le(reveals);
        for (position, reveal) in &self.reveals {
            position.write(buf);
            reveal.write(buf);
        }
    }

    fn len_encoded(&self) -> usize {
        D::LEN_ENCODED
            + u64::LEN_ENCODED
            + codec::seq_len_encoded(&self.sig_proofs.siblings)
            + codec::seq_len_encoded(&self.party_proofs.siblings)
            + 4
            + self
                .reveals
                .values()
                .map(|reveal| u64::LEN_ENCODED + reveal.len_encoded())
                .sum::<usize>()
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let sig_commit = D::read(buf)?;
        let signed_weight = u64::read(buf)?;
        let sig_proofs = Proof {
            siblings: codec::read_seq(buf, MAX_PROOF_DIGESTS)?,
        };
        let party_proofs = Proof {
            siblings: codec::read_seq(buf, MAX_PROOF_DIGESTS)?,
        };
        if buf.remaining() < 4 {
            return Err(codec::Error::EndOfBuffer);
        }
        let count = buf.get_u32_le() as usize;
        if count as u64 > MAX_REVEALS {
            return Err(codec::Error::LengthTooLarge(count, MAX_REVEALS as usize));
        }
        let mut reveals = BTreeMap::new();
        for _ in 0..count {
            let position = u64::read(buf)?;
            let reveal = Reveal::read(buf)?;
            if reveals.insert(position, reveal).is_some() {
                return Err(codec::Error::Invalid("reveal", "duplicate position"));
            }
        }
        Ok(Self {
            sig_commit,
            signed_weight,
            sig_proofs,
            party_proofs,
            reveals,
        })
    }
}

/// Build the party commitment tree over the canonical participant bytes.
///
/// The tree is fixed in advance of signing; the builder needs the full tree
/// (for proofs) and the verifier only its root.
pub fn commit_participants<H: Hasher, K: PublicKey>(participants: &[Participant<K>]) -> Tree<H> {
    let leaves: Vec<Vec<u8>> = participants.iter().map(Participant::leaf).collect();
    Tree::build(&leaves)
}
