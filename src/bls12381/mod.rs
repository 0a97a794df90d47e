//! BLS12-381 signatures with public keys in G1 (48 bytes) and signatures in
//! G2 (96 bytes).
//!
//! The aggregatable provider: because every slot signs the same message,
//! a batch can be checked by summing the public keys, summing the
//! signatures, and performing a single aggregate pairing check
//! (see [Aggregate]).
//!
//! Serialization follows the ZCash BLS12-381 compressed-point format and
//! messages are hashed to the curve per RFC 9380. Group membership is
//! checked when keys and signatures are decoded, not on every verification.

use crate::codec::{self, Codec, SizedCodec};
use crate::hex;
use blst::min_pk::{AggregateSignature, PublicKey as BlstPublicKey, SecretKey, Signature as BlstSignature};
use blst::BLST_ERROR;
use bytes::{Buf, BufMut};
use core::fmt::{Debug, Display};
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::CryptoRngCore;
use zeroize::Zeroize;

const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

const PRIVATE_KEY_LENGTH: usize = 32;
const PUBLIC_KEY_LENGTH: usize = 48;
const SIGNATURE_LENGTH: usize = 96;

/// BLS12-381 private key (a scalar).
#[derive(Clone)]
pub struct PrivateKey {
    key: SecretKey,
}

impl PrivateKey {
    /// Create a fresh [PrivateKey] using the supplied RNG.
    pub fn from_rng<R: CryptoRngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 32];
        rng.fill_bytes(&mut ikm);
        let key = SecretKey::key_gen(&ikm, &[]).expect("ikm is long enough");
        ikm.zeroize();
        Self { key }
    }

    /// Create a [PrivateKey] from a seed.
    ///
    /// # Warning
    ///
    /// This function is insecure and should only be used for examples and
    /// testing.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self::from_rng(&mut rng)
    }
}

impl crate::Signer for PrivateKey {
    type Signature = Signature;
    type PublicKey = PublicKey;

    fn public_key(&self) -> Self::PublicKey {
        let key = self.key.sk_to_pk();
        Self::PublicKey {
            raw: key.compress(),
            key,
        }
    }

    fn sign(&self, message: &[u8]) -> Self::Signature {
        let signature = self.key.sign(message, DST, &[]);
        Signature {
            raw: signature.compress(),
            signature,
        }
    }
}

impl Codec for PrivateKey {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.key.to_bytes());
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        if buf.remaining() < PRIVATE_KEY_LENGTH {
            return Err(codec::Error::EndOfBuffer);
        }
        let mut raw = [0u8; PRIVATE_KEY_LENGTH];
        buf.copy_to_slice(&mut raw);
        let key = SecretKey::from_bytes(&raw)
            .map_err(|_| codec::Error::Invalid("bls private key", "not a valid scalar"))?;
        raw.zeroize();
        Ok(Self { key })
    }
}

impl SizedCodec for PrivateKey {
    const LEN_ENCODED: usize = PRIVATE_KEY_LENGTH;
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.to_bytes() == other.key.to_bytes()
    }
}

impl Eq for PrivateKey {}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PrivateKey(..)")
    }
}

/// BLS12-381 public key (a point in G1, compressed to 48 bytes).
#[derive(Clone)]
pub struct PublicKey {
    raw: [u8; PUBLIC_KEY_LENGTH],
    key: BlstPublicKey,
}

impl crate::PublicKey for PublicKey {}

impl crate::Verifier for PublicKey {
    type Signature = Signature;

    fn verify(&self, message: &[u8], sig: &Self::Signature) -> bool {
        // Group checks were performed when the key and signature were
        // constructed or decoded.
        sig.signature.verify(false, message, DST, &[], &self.key, false) == BLST_ERROR::BLST_SUCCESS
    }
}

impl Codec for PublicKey {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.raw);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        if buf.remaining() < PUBLIC_KEY_LENGTH {
            return Err(codec::Error::EndOfBuffer);
        }
        let mut raw = [0u8; PUBLIC_KEY_LENGTH];
        buf.copy_to_slice(&mut raw);
        let key = BlstPublicKey::key_validate(&raw)
            .map_err(|_| codec::Error::Invalid("bls public key", "not a point in G1"))?;
        Ok(Self { raw, key })
    }
}

impl SizedCodec for PublicKey {
    const LEN_ENCODED: usize = PUBLIC_KEY_LENGTH;
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for PublicKey {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

/// BLS12-381 signature (a point in G2, compressed to 96 bytes).
#[derive(Clone)]
pub struct Signature {
    raw: [u8; SIGNATURE_LENGTH],
    signature: BlstSignature,
}

impl crate::Signature for Signature {}

impl Codec for Signature {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.raw);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        if buf.remaining() < SIGNATURE_LENGTH {
            return Err(codec::Error::EndOfBuffer);
        }
        let mut raw = [0u8; SIGNATURE_LENGTH];
        buf.copy_to_slice(&mut raw);
        let signature = BlstSignature::sig_validate(&raw, false)
            .map_err(|_| codec::Error::Invalid("bls signature", "not a point in G2"))?;
        Ok(Self { raw, signature })
    }
}

impl SizedCodec for Signature {
    const LEN_ENCODED: usize = SIGNATURE_LENGTH;
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for Signature {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

/// Batch verifier that aggregates the public keys and signatures and runs a
/// single pairing check.
///
/// This is only sound because every signature in a batch is over the *same*
/// message: aggregating `e(pk_i, H(m))` terms by bilinearity requires a
/// common `H(m)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aggregate;

impl crate::BatchVerifier<PublicKey> for Aggregate {
    fn batch_verify(public_keys: &[PublicKey], message: &[u8], signatures: &[Signature]) -> bool {
        if public_keys.len() != signatures.len() {
            return false;
        }
        if public_keys.is_empty() {
            return true;
        }
        let sigs: Vec<&BlstSignature> = signatures.iter().map(|sig| &sig.signature).collect();
        let Ok(aggregate) = AggregateSignature::aggregate(&sigs, false) else {
            return false;
        };
        let keys: Vec<&BlstPublicKey> = public_keys.iter().map(|key| &key.key).collect();
        aggregate
            .to_signature()
            .fast_aggregate_verify(false, message, DST, &keys)
            == BLST_ERROR::BLST_SUCCESS
    }
}
