//! Compact certificates of collective knowledge.
//!
//! A compact certificate proves that a set of weighted participants, whose
//! public keys were committed in advance, jointly signed a common message
//! with aggregate weight above a stated threshold. Instead of shipping every
//! signature, the certificate commits to the full signature table with a
//! Merkle tree and reveals only the slots selected by a Fiat-Shamir coin
//! procedure, so its size is sublinear in the number of participants.
//!
//! # Usage
//!
//! Participants and their weights are fixed up front and committed with
//! [cert::commit_participants]. A [cert::Builder] collects signatures over
//! the message, and once the accumulated weight reaches the proven weight,
//! [cert::Builder::build] freezes the table and emits a [cert::Cert]. A
//! [cert::Verifier] holding the same parameters and the party commitment
//! checks the certificate without any further interaction.
//!
//! ```rust
//! use compact_cert::{
//!     cert::{commit_participants, Builder, Params, Participant, Verifier},
//!     schnorr::PrivateKey,
//!     Sha3, Signer,
//! };
//!
//! // Ten participants of weight one, all holding Schnorr keys.
//! let signers: Vec<_> = (0..10u64).map(PrivateKey::from_seed).collect();
//! let participants: Vec<_> = signers
//!     .iter()
//!     .map(|signer| Participant {
//!         public_key: signer.public_key(),
//!         weight: 1,
//!     })
//!     .collect();
//! let party_tree = commit_participants::<Sha3, _>(&participants);
//! let party_root = party_tree.root().unwrap();
//!
//! let params = Params {
//!     msg: b"hello world".to_vec(),
//!     proven_weight: 5,
//!     sec_kq: 64,
//! };
//! let mut builder: Builder<_> = Builder::new(params.clone(), participants, party_tree);
//! for (pos, signer) in signers.iter().enumerate() {
//!     builder
//!         .add_signature(pos as u64, signer.sign(b"hello world"))
//!         .unwrap();
//! }
//! let cert = builder.build().unwrap();
//!
//! let verifier: Verifier<_> = Verifier::new(params, party_root);
//! verifier.verify(&cert).unwrap();
//! ```

use core::fmt::{Debug, Display};
use core::hash::Hash;
use thiserror::Error;

pub mod bls12381;
pub mod cert;
pub mod codec;
pub mod merkle;
pub mod schnorr;
pub mod sha3;

pub use sha3::Sha3;

use codec::SizedCodec;

/// Errors surfaced by certificate construction and verification.
///
/// Every failure is fatal to its operation; nothing is retried and there is
/// no partial acceptance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("position {0} out of range")]
    OutOfRange(u64),
    #[error("participant {0} has zero weight")]
    ZeroWeight(u64),
    #[error("signature already present for position {0}")]
    DuplicateSlot(u64),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid proof")]
    InvalidProof,
    #[error("signed weight {0} does not meet proven weight {1}")]
    InsufficientWeight(u64, u64),
    #[error("required reveals exceed bound {0}")]
    TooManyReveals(u64),
    #[error("no reveal contains coin {1} for round {0}")]
    MissingCoin(u64, u64),
}

/// A fixed-width output of a [Hasher], cheap to copy and compare.
pub trait Digest:
    SizedCodec
    + Clone
    + Copy
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Hash
    + AsRef<[u8]>
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

/// A streaming, restartable cryptographic hash.
///
/// The commitment trees, the message digest, and the coin derivation all run
/// through the same hasher type, so a builder and verifier must be
/// instantiated with matching implementations. The hash is treated as a
/// random oracle.
pub trait Hasher: Default + Clone + Send + Sync + 'static {
    /// Digest generated by the hasher.
    type Digest: Digest;

    /// Create a new, empty hasher.
    fn new() -> Self {
        Self::default()
    }

    /// Append a message to previously recorded data.
    fn update(&mut self, message: &[u8]) -> &mut Self;

    /// Hash all recorded data and reset the hasher to its initial state.
    fn finalize(&mut self) -> Self::Digest;

    /// Reset the hasher without generating a digest.
    ///
    /// This does not need to be called after `finalize`.
    fn reset(&mut self) -> &mut Self;

    /// Hash a single message with a one-time-use hasher.
    fn hash(message: &[u8]) -> Self::Digest {
        let mut hasher = Self::new();
        hasher.update(message);
        hasher.finalize()
    }
}

/// A signature over a message.
pub trait Signature:
    SizedCodec + Clone + PartialEq + Eq + Hash + AsRef<[u8]> + Debug + Send + Sync + 'static
{
}

/// Verifies [Signature]s over messages.
pub trait Verifier {
    /// The type of [Signature] this verifier can verify.
    type Signature: Signature;

    /// Verify that `signature` is valid over `message`.
    fn verify(&self, message: &[u8], signature: &Self::Signature) -> bool;
}

/// A public key, able to verify [Signature]s and to be committed to by its
/// canonical byte encoding (a compressed curve point).
pub trait PublicKey:
    Verifier
    + SizedCodec
    + Clone
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Hash
    + AsRef<[u8]>
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

/// Produces [Signature]s that can be verified with a corresponding
/// [PublicKey].
pub trait Signer: Clone + Send + Sync + 'static {
    /// The type of [Signature] produced by this signer.
    type Signature: Signature;

    /// The corresponding [PublicKey] type.
    type PublicKey: PublicKey<Signature = Self::Signature>;

    /// Returns the [PublicKey] corresponding to this signer.
    fn public_key(&self) -> Self::PublicKey;

    /// Sign a message.
    fn sign(&self, message: &[u8]) -> Self::Signature;
}

/// Verifies that every signature in a same-message batch is correct.
///
/// Providers may verify the batch faster than one-by-one iteration (see
/// [bls12381::Aggregate]); the contract is all-or-nothing either way.
pub trait BatchVerifier<K: PublicKey> {
    /// Verify `signatures[i]` against `public_keys[i]` over `message` for
    /// every `i`. Returns `false` if any pair fails or if the slices differ
    /// in length.
    fn batch_verify(public_keys: &[K], message: &[u8], signatures: &[K::Signature]) -> bool;
}

/// Default [BatchVerifier] that iterates the single-key check.
#[derive(Clone, Copy, Debug, Default)]
pub struct Iterative;

impl<K: PublicKey> BatchVerifier<K> for Iterative {
    fn batch_verify(public_keys: &[K], message: &[u8], signatures: &[K::Signature]) -> bool {
        public_keys.len() == signatures.len()
            && public_keys
                .iter()
                .zip(signatures)
                .all(|(public_key, signature)| public_key.verify(message, signature))
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
