//! Checks certificates against the party commitment.

use super::bigfloat::num_reveals;
use super::coin::{hash_coin, CoinChoice};
use super::{Cert, Params, MAX_REVEALS};
use crate::sha3::Sha3;
use crate::{BatchVerifier, Error, Hasher, Iterative, PublicKey};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::debug;

/// Verifies certificates. Stateless apart from its configured parameters
/// and the party commitment root.
pub struct Verifier<K: PublicKey, H: Hasher = Sha3, B: BatchVerifier<K> = Iterative> {
    params: Params,
    party_commit: H::Digest,
    _marker: PhantomData<(K, B)>,
}

impl<K, H, B> Verifier<K, H, B>
where
    K: PublicKey,
    H: Hasher,
    B: BatchVerifier<K>,
{
    pub fn new(params: Params, party_commit: H::Digest) -> Self {
        Self {
            params,
            party_commit,
            _marker: PhantomData,
        }
    }

    /// Check that `cert` is a valid certificate for this verifier's message
    /// and participant commitment.
    ///
    /// The signed weight must strictly exceed the proven weight, every
    /// reveal must carry a valid signature and be included in both
    /// commitments, and every recomputed coin must land inside some
    /// revealed slot's weight interval.
    pub fn verify(&self, cert: &Cert<K, H::Digest>) -> Result<(), Error> {
        if cert.signed_weight <= self.params.proven_weight {
            return Err(Error::InsufficientWeight(
                cert.signed_weight,
                self.params.proven_weight,
            ));
        }

        let mut hasher = H::new();
        let mut slot_digests = BTreeMap::new();
        let mut party_digests = BTreeMap::new();
        let mut public_keys = Vec::with_capacity(cert.reveals.len());
        let mut sigs = Vec::with_capacity(cert.reveals.len());
        for (&position, reveal) in &cert.reveals {
            hasher.update(&reveal.sig_slot.leaf());
            slot_digests.insert(position, hasher.finalize());
            hasher.update(&reveal.party.leaf());
            party_digests.insert(position, hasher.finalize());

            let Some(sig) = &reveal.sig_slot.sig else {
                debug!(position, "reveal without a signature");
                return Err(Error::InvalidSignature);
            };
            public_keys.push(reveal.party.public_key.clone());
            sigs.push(sig.clone());
        }
        if !B::batch_verify(&public_keys, &self.params.msg, &sigs) {
            return Err(Error::InvalidSignature);
        }

        cert.sig_proofs.verify::<H>(&cert.sig_commit, &slot_digests)?;
        cert.party_proofs
            .verify::<H>(&self.party_commit, &party_digests)?;

        let rounds = num_reveals(
            cert.signed_weight,
            self.params.proven_weight,
            self.params.sec_kq,
            MAX_REVEALS,
        )?;
        let msg_digest = H::hash(&self.params.msg);
        for j in 0..rounds {
            let coin = hash_coin::<H>(&CoinChoice {
                j,
                signed_weight: cert.signed_weight,
                proven_weight: self.params.proven_weight,
                sig_commit: &cert.sig_commit,
                party_commit: &self.party_commit,
                msg_digest: &msg_digest,
            });
            // Several rounds may land on the same slot; any revealed slot
            // whose interval contains the coin satisfies the round.
            let covered = cert.reveals.values().any(|reveal| {
                let end = reveal.sig_slot.l.saturating_add(reveal.party.weight);
                reveal.sig_slot.l <= coin && coin < end
            });
            if !covered {
                return Err(Error::MissingCoin(j, coin));
            }
        }

        Ok(())
    }
}
