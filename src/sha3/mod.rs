//! SHA3-256 implementation of the [Hasher](crate::Hasher) trait.

use crate::codec::{self, Codec, SizedCodec};
use crate::hex;
use bytes::{Buf, BufMut};
use core::fmt::{Debug, Display};
use core::ops::Deref;
use sha3::{Digest as _, Sha3_256};

const DIGEST_LENGTH: usize = 32;

/// Generate a SHA3-256 digest from a message.
pub fn hash(message: &[u8]) -> Digest {
    let array: [u8; DIGEST_LENGTH] = Sha3_256::digest(message).into();
    Digest::from(array)
}

/// SHA3-256 hasher.
#[derive(Debug)]
pub struct Sha3 {
    hasher: Sha3_256,
}

impl Default for Sha3 {
    fn default() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }
}

impl Clone for Sha3 {
    fn clone(&self) -> Self {
        // The in-flight state is not cloned; a clone starts fresh.
        Self::default()
    }
}

impl crate::Hasher for Sha3 {
    type Digest = Digest;

    fn update(&mut self, message: &[u8]) -> &mut Self {
        self.hasher.update(message);
        self
    }

    fn finalize(&mut self) -> Self::Digest {
        let finalized: [u8; DIGEST_LENGTH] = self.hasher.finalize_reset().into();
        Digest(finalized)
    }

    fn reset(&mut self) -> &mut Self {
        self.hasher = Sha3_256::new();
        self
    }
}

/// Digest of a SHA3-256 hashing operation.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl crate::Digest for Digest {}

impl From<[u8; DIGEST_LENGTH]> for Digest {
    fn from(value: [u8; DIGEST_LENGTH]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Digest {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Codec for Digest {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, codec::Error> {
        if buf.remaining() < DIGEST_LENGTH {
            return Err(codec::Error::EndOfBuffer);
        }
        let mut digest = [0u8; DIGEST_LENGTH];
        buf.copy_to_slice(&mut digest);
        Ok(Self(digest))
    }
}

impl SizedCodec for Digest {
    const LEN_ENCODED: usize = DIGEST_LENGTH;
}

impl Debug for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hasher;

    const EMPTY_DIGEST: &str = "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a";
    const HELLO_DIGEST: &str = "644bcc7e564373040999aac89e7622f3ca71fba1d972fd94a31c3bfbf24e3938";

    #[test]
    fn test_empty_input() {
        let mut hasher = Sha3::new();
        assert_eq!(hex(hasher.finalize().as_ref()), EMPTY_DIGEST);
    }

    #[test]
    fn test_sha3() {
        let msg = b"hello world";

        // Generate initial digest
        let mut hasher = Sha3::new();
        hasher.update(msg);
        let digest = hasher.finalize();
        assert_eq!(hex(digest.as_ref()), HELLO_DIGEST);

        // Hasher is restartable after finalize
        hasher.update(msg);
        assert_eq!(hasher.finalize(), digest);

        // Reset discards recorded data
        hasher.update(b"hello mars");
        hasher.reset();
        hasher.update(msg);
        assert_eq!(hasher.finalize(), digest);

        // One-shot helpers agree
        assert_eq!(hash(msg), digest);
        assert_eq!(Sha3::hash(msg), digest);
    }

    #[test]
    fn test_multiple_updates() {
        let mut hasher = Sha3::new();
        hasher.update(b"hello").update(b" world");
        assert_eq!(hex(hasher.finalize().as_ref()), HELLO_DIGEST);
    }

    #[test]
    fn test_codec_roundtrip() {
        let digest = hash(b"hello world");
        let encoded = digest.encode();
        assert_eq!(encoded.len(), Digest::LEN_ENCODED);
        assert_eq!(Digest::decode(encoded.freeze()).unwrap(), digest);
    }

    #[test]
    fn test_digest_len() {
        assert_eq!(size_of::<Digest>(), DIGEST_LENGTH);
    }
}
