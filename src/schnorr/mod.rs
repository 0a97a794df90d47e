//! Schnorr signatures over secp256k1 (BIP-340).
//!
//! The per-signature provider: every slot carries its own 64-byte
//! signature and verification iterates key by key.

use crate::codec::{self, Codec, SizedCodec};
use crate::hex;
use bytes::{Buf, BufMut};
use core::fmt::{Debug, Display};
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use k256::schnorr::{
    signature::{Signer as K256Signer, Verifier as K256Verifier},
    SigningKey, VerifyingKey,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

const PRIVATE_KEY_LENGTH: usize = 32;
const PUBLIC_KEY_LENGTH: usize = 32;
const SIGNATURE_LENGTH: usize = 64;

/// Schnorr private key over secp256k1.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    raw: [u8; PRIVATE_KEY_LENGTH],
    #[zeroize(skip)]
    key: SigningKey,
}

impl PrivateKey {
    /// Create a fresh [PrivateKey] using the supplied RNG.
    pub fn from_rng<R: CryptoRngCore>(rng: &mut R) -> Self {
        let key = SigningKey::random(rng);
        let raw = key.to_bytes().into();
        Self { raw, key }
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
        let key = *self.key.verifying_key();
        Self::PublicKey {
            raw: key.to_bytes().into(),
            key,
        }
    }

    fn sign(&self, message: &[u8]) -> Self::Signature {
        let sig: k256::schnorr::Signature = K256Signer::sign(&self.key, message);
        Signature::from(sig)
    }
}

impl Codec for PrivateKey {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.raw);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let raw = read_array::<PRIVATE_KEY_LENGTH, B>(buf)?;
        let key = SigningKey::from_bytes(&raw)
            .map_err(|_| codec::Error::Invalid("schnorr private key", "malformed scalar"))?;
        Ok(Self { raw, key })
    }
}

impl SizedCodec for PrivateKey {
    const LEN_ENCODED: usize = PRIVATE_KEY_LENGTH;
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PrivateKey {}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PrivateKey(..)")
    }
}

/// Schnorr public key over secp256k1 (x-only, 32 bytes as per BIP-340).
#[derive(Clone)]
pub struct PublicKey {
    raw: [u8; PUBLIC_KEY_LENGTH],
    key: VerifyingKey,
}

impl crate::PublicKey for PublicKey {}

impl crate::Verifier for PublicKey {
    type Signature = Signature;

    fn verify(&self, message: &[u8], sig: &Self::Signature) -> bool {
        K256Verifier::verify(&self.key, message, &sig.signature).is_ok()
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
        let raw = read_array::<PUBLIC_KEY_LENGTH, B>(buf)?;
        let key = VerifyingKey::from_bytes(&raw)
            .map_err(|_| codec::Error::Invalid("schnorr public key", "not an x-only point"))?;
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

/// Schnorr signature over secp256k1 (64 bytes as per BIP-340).
#[derive(Clone)]
pub struct Signature {
    raw: [u8; SIGNATURE_LENGTH],
    signature: k256::schnorr::Signature,
}

impl crate::Signature for Signature {}

impl From<k256::schnorr::Signature> for Signature {
    fn from(value: k256::schnorr::Signature) -> Self {
        Self {
            raw: value.to_bytes(),
            signature: value,
        }
    }
}

impl Codec for Signature {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.raw);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        let raw = read_array::<SIGNATURE_LENGTH, B>(buf)?;
        let signature = k256::schnorr::Signature::try_from(raw.as_slice())
            .map_err(|_| codec::Error::Invalid("schnorr signature", "malformed"))?;
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

fn read_array<const N: usize, B: Buf>(buf: &mut B) -> Result<[u8; N], codec::Error> {
    if buf.remaining() < N {
        return Err(codec::Error::EndOfBuffer);
    }
    let mut array = [0u8; N];
    buf.copy_to_slice(&mut array);
    Ok(array)
}
