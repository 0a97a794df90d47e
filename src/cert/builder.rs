//! Collects signatures and assembles certificates.

use super::bigfloat::num_reveals;
use super::coin::{hash_coin, CoinChoice};
use super::{Cert, Params, Participant, Reveal, SigSlot, MAX_REVEALS};
use crate::merkle::Tree;
use crate::sha3::Sha3;
use crate::{BatchVerifier, Error, Hasher, Iterative, PublicKey};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use tracing::debug;

/// Collects signatures over a common message into a slot table and freezes
/// them into a [Cert].
///
/// A builder is owned by one caller for its whole lifetime: construct it,
/// feed it signatures with [add_signature](Self::add_signature) or
/// [add_signatures](Self::add_signatures), and consume it with
/// [build](Self::build).
pub struct Builder<K: PublicKey, H: Hasher = Sha3, B: BatchVerifier<K> = Iterative> {
    params: Params,
    participants: Vec<Participant<K>>,
    party_tree: Tree<H>,
    slots: Vec<SigSlot<K::Signature>>,
    signed_weight: u64,
    _batch: PhantomData<B>,
}

impl<K, H, B> Builder<K, H, B>
where
    K: PublicKey,
    H: Hasher,
    B: BatchVerifier<K>,
{
    /// Create a builder over the declared participant sequence.
    ///
    /// `party_tree` must be the commitment tree over the same sequence (see
    /// [commit_participants](super::commit_participants)); panics if its
    /// leaf count does not match.
    pub fn new(params: Params, participants: Vec<Participant<K>>, party_tree: Tree<H>) -> Self {
        assert_eq!(
            party_tree.len(),
            participants.len(),
            "party tree does not commit to the given participants"
        );
        let slots = participants.iter().map(|_| SigSlot::default()).collect();
        Self {
            params,
            participants,
            party_tree,
            slots,
            signed_weight: 0,
            _batch: PhantomData,
        }
    }

    /// Aggregate weight of the signatures collected so far.
    pub fn signed_weight(&self) -> u64 {
        self.signed_weight
    }

    fn validate(&self, position: u64) -> Result<usize, Error> {
        let index = usize::try_from(position).map_err(|_| Error::OutOfRange(position))?;
        if index >= self.participants.len() {
            return Err(Error::OutOfRange(position));
        }
        if self.participants[index].weight == 0 {
            return Err(Error::ZeroWeight(position));
        }
        if self.slots[index].sig.is_some() {
            return Err(Error::DuplicateSlot(position));
        }
        Ok(index)
    }

    fn record(&mut self, index: usize, sig: K::Signature) {
        self.slots[index].sig = Some(sig);
        self.signed_weight = self
            .signed_weight
            .checked_add(self.participants[index].weight)
            .expect("signed weight overflows u64");
    }

    /// Verify and store one participant's signature.
    pub fn add_signature(&mut self, position: u64, sig: K::Signature) -> Result<(), Error> {
        let index = self.validate(position)?;
        if !self.participants[index]
            .public_key
            .verify(&self.params.msg, &sig)
        {
            return Err(Error::InvalidSignature);
        }
        self.record(index, sig);
        Ok(())
    }

    /// Verify and store a batch of signatures, all-or-nothing.
    ///
    /// Every position is validated before one batched signature check; on
    /// any failure no slot is modified.
    pub fn add_signatures(&mut self, entries: &[(u64, K::Signature)]) -> Result<(), Error> {
        let mut indices = Vec::with_capacity(entries.len());
        let mut seen = BTreeSet::new();
        let mut public_keys = Vec::with_capacity(entries.len());
        let mut sigs = Vec::with_capacity(entries.len());
        for (position, sig) in entries {
            let index = self.validate(*position)?;
            if !seen.insert(index) {
                return Err(Error::DuplicateSlot(*position));
            }
            indices.push(index);
            public_keys.push(self.participants[index].public_key.clone());
            sigs.push(sig.clone());
        }
        if !B::batch_verify(&public_keys, &self.params.msg, &sigs) {
            return Err(Error::InvalidSignature);
        }
        for (index, sig) in indices.into_iter().zip(sigs) {
            self.record(index, sig);
        }
        Ok(())
    }

    /// Freeze the slot table and emit a certificate.
    ///
    /// Fails with [Error::InsufficientWeight] unless the collected weight
    /// reaches the proven weight, and with [Error::TooManyReveals] if the
    /// security parameter would require more than [MAX_REVEALS] rounds.
    pub fn build(mut self) -> Result<Cert<K, H::Digest>, Error> {
        if self.participants.is_empty() || self.signed_weight < self.params.proven_weight {
            return Err(Error::InsufficientWeight(
                self.signed_weight,
                self.params.proven_weight,
            ));
        }

        // Exclusive prefix sums of the participant weights.
        let mut total: u64 = 0;
        for (slot, participant) in self.slots.iter_mut().zip(&self.participants) {
            slot.l = total;
            total = total
                .checked_add(participant.weight)
                .expect("total weight overflows u64");
        }

        let leaves: Vec<Vec<u8>> = self.slots.iter().map(SigSlot::leaf).collect();
        let sig_tree = Tree::<H>::build(&leaves);
        let sig_commit = sig_tree.root().expect("slot table is non-empty");
        let party_commit = self.party_tree.root().expect("party tree is non-empty");

        let rounds = num_reveals(
            self.signed_weight,
            self.params.proven_weight,
            self.params.sec_kq,
            MAX_REVEALS,
        )?;
        let msg_digest = H::hash(&self.params.msg);

        let mut reveals = BTreeMap::new();
        let mut positions = Vec::with_capacity(rounds as usize);
        for j in 0..rounds {
            let coin = hash_coin::<H>(&CoinChoice {
                j,
                signed_weight: self.signed_weight,
                proven_weight: self.params.proven_weight,
                sig_commit: &sig_commit,
                party_commit: &party_commit,
                msg_digest: &msg_digest,
            });
            let position = self.coin_index(coin);
            // Repeat draws collapse into a single reveal.
            if reveals.contains_key(&position) {
                continue;
            }
            let index = position as usize;
            reveals.insert(
                position,
                Reveal {
                    party: self.participants[index].clone(),
                    sig_slot: self.slots[index].clone(),
                },
            );
            positions.push(position);
        }

        let sig_proofs = sig_tree.prove(&positions)?;
        let party_proofs = self.party_tree.prove(&positions)?;
        debug!(
            rounds,
            reveals = reveals.len(),
            signed_weight = self.signed_weight,
            "assembled certificate"
        );

        Ok(Cert {
            sig_commit,
            signed_weight: self.signed_weight,
            sig_proofs,
            party_proofs,
            reveals,
        })
    }

    /// The unique position whose weight interval contains `coin`.
    ///
    /// The interval is half-open on the right: a coin equal to
    /// `l + weight` belongs to a later slot.
    fn coin_index(&self, coin: u64) -> u64 {
        let mut lo = 0;
        let mut hi = self.slots.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if coin < self.slots[mid].l {
                hi = mid;
            } else if coin < self.slots[mid].l + self.participants[mid].weight {
                return mid as u64;
            } else {
                lo = mid + 1;
            }
        }
        unreachable!("coin {coin} outside the weight range");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::commit_participants;
    use crate::schnorr::PrivateKey;
    use crate::Signer;

    fn participants(weights: &[u64]) -> (Vec<PrivateKey>, Vec<Participant<crate::schnorr::PublicKey>>) {
        let signers: Vec<PrivateKey> = (0..weights.len() as u64).map(PrivateKey::from_seed).collect();
        let participants = signers
            .iter()
            .zip(weights)
            .map(|(signer, &weight)| Participant {
                public_key: signer.public_key(),
                weight,
            })
            .collect();
        (signers, participants)
    }

    fn params(proven_weight: u64) -> Params {
        Params {
            msg: b"hello world".to_vec(),
            proven_weight,
            sec_kq: 128,
        }
    }

    fn builder(
        params: Params,
        participants: Vec<Participant<crate::schnorr::PublicKey>>,
    ) -> Builder<crate::schnorr::PublicKey> {
        let party_tree = commit_participants::<Sha3, _>(&participants);
        Builder::new(params, participants, party_tree)
    }

    #[test]
    fn test_out_of_range() {
        let (signers, parts) = participants(&[1, 1]);
        let mut builder = builder(params(1), parts);
        let sig = signers[0].sign(b"hello world");
        assert_eq!(builder.add_signature(2, sig), Err(Error::OutOfRange(2)));
        assert_eq!(builder.signed_weight(), 0);
    }

    #[test]
    fn test_zero_weight_rejected_without_side_effects() {
        let (signers, parts) = participants(&[1, 0, 1]);
        let mut builder = builder(params(1), parts);
        let sig = signers[1].sign(b"hello world");
        assert_eq!(builder.add_signature(1, sig), Err(Error::ZeroWeight(1)));
        assert_eq!(builder.signed_weight(), 0);
        assert!(builder.slots[1].sig.is_none());
    }

    #[test]
    fn test_duplicate_slot() {
        let (signers, parts) = participants(&[1, 1]);
        let mut builder = builder(params(1), parts);
        let sig = signers[0].sign(b"hello world");
        builder.add_signature(0, sig.clone()).unwrap();
        assert_eq!(
            builder.add_signature(0, sig),
            Err(Error::DuplicateSlot(0))
        );
        assert_eq!(builder.signed_weight(), 1);
    }

    #[test]
    fn test_invalid_signature() {
        let (signers, parts) = participants(&[1, 1]);
        let mut builder = builder(params(1), parts);
        let wrong = signers[0].sign(b"some other message");
        assert_eq!(
            builder.add_signature(0, wrong),
            Err(Error::InvalidSignature)
        );
        assert_eq!(builder.signed_weight(), 0);
    }

    #[test]
    fn test_add_signatures_all_or_nothing() {
        let (signers, parts) = participants(&[1, 1, 1]);
        let mut builder = builder(params(1), parts);
        let entries = vec![
            (0, signers[0].sign(b"hello world")),
            (1, signers[1].sign(b"tampered")),
            (2, signers[2].sign(b"hello world")),
        ];
        assert_eq!(
            builder.add_signatures(&entries),
            Err(Error::InvalidSignature)
        );
        assert_eq!(builder.signed_weight(), 0);
        assert!(builder.slots.iter().all(|slot| slot.sig.is_none()));
    }

    #[test]
    fn test_add_signatures_rejects_in_batch_duplicates() {
        let (signers, parts) = participants(&[1, 1]);
        let mut builder = builder(params(1), parts);
        let sig = signers[0].sign(b"hello world");
        let entries = vec![(0, sig.clone()), (0, sig)];
        assert_eq!(
            builder.add_signatures(&entries),
            Err(Error::DuplicateSlot(0))
        );
        assert_eq!(builder.signed_weight(), 0);
    }

    #[test]
    fn test_below_threshold_uniform_set() {
        // 400 of 1000 unit-weight participants sign; half the weight is
        // proven. All participants share one vote key to keep setup cheap.
        let signer = PrivateKey::from_seed(5);
        let sig = signer.sign(b"hello world");
        let participants: Vec<_> = (0..1000)
            .map(|_| Participant {
                public_key: signer.public_key(),
                weight: 1,
            })
            .collect();
        let party_tree = commit_participants::<Sha3, _>(&participants);
        let mut builder: Builder<_> = Builder::new(params(500), participants, party_tree);
        for position in 0..400 {
            builder.add_signature(position, sig.clone()).unwrap();
        }
        assert_eq!(builder.signed_weight(), 400);
        assert_eq!(builder.build(), Err(Error::InsufficientWeight(400, 500)));
    }

    #[test]
    fn test_insufficient_weight() {
        let (signers, parts) = participants(&[1, 1, 1, 1]);
        let mut builder = builder(params(3), parts);
        builder.add_signature(0, signers[0].sign(b"hello world")).unwrap();
        builder.add_signature(1, signers[1].sign(b"hello world")).unwrap();
        assert_eq!(
            builder.build(),
            Err(Error::InsufficientWeight(2, 3))
        );
    }

    #[test]
    fn test_prefix_sums() {
        let weights = [3u64, 0, 5, 1, 2];
        let (signers, parts) = participants(&weights);
        let mut builder = builder(params(1), parts);
        for (position, signer) in signers.iter().enumerate() {
            if weights[position] == 0 {
                continue;
            }
            builder
                .add_signature(position as u64, signer.sign(b"hello world"))
                .unwrap();
        }
        let cert = builder.build().unwrap();

        // l is the exclusive prefix sum: 0, 3, 3, 8, 9.
        let expected = [0u64, 3, 3, 8, 9];
        for (&position, reveal) in &cert.reveals {
            assert_eq!(reveal.sig_slot.l, expected[position as usize]);
        }
    }

    #[test]
    fn test_coin_index_unit_weights() {
        let n = 1000u64;
        let (_, parts) = participants(&vec![1u64; n as usize]);
        let mut builder = builder(params(1), parts);
        let mut total = 0;
        for slot in builder.slots.iter_mut() {
            slot.l = total;
            total += 1;
        }
        for coin in 0..n {
            assert_eq!(builder.coin_index(coin), coin);
        }
    }

    #[test]
    fn test_coin_index_weighted_intervals() {
        let weights = [3u64, 1, 4, 2];
        let (_, parts) = participants(&weights);
        let mut builder = builder(params(1), parts);
        let mut total = 0;
        for (slot, &weight) in builder.slots.iter_mut().zip(&weights) {
            slot.l = total;
            total += weight;
        }
        let expected = [0, 0, 0, 1, 2, 2, 2, 2, 3, 3];
        for (coin, &position) in expected.iter().enumerate() {
            assert_eq!(builder.coin_index(coin as u64), position);
        }
    }
}
