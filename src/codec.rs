//! Canonical byte encoding for certificate material.
//!
//! All integers are encoded little-endian. Sequences carry a `u32` length
//! prefix and optional values a one-byte tag, so every encoding is
//! self-delimiting and round-trips unambiguously. Decoding is bounds-checked:
//! callers of [read_seq] supply the maximum element count they are willing to
//! allocate for.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Errors that can occur when decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("end of buffer")]
    EndOfBuffer,
    #[error("{0} bytes of extra data")]
    ExtraData(usize),
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, &'static str),
    #[error("length {0} exceeds limit {1}")]
    LengthTooLarge(usize, usize),
}

/// A type that can be encoded to and decoded from bytes.
pub trait Codec: Sized {
    /// Encode this value to a writer.
    fn write<B: BufMut>(&self, buf: &mut B);

    /// The encoded length of this value.
    fn len_encoded(&self) -> usize;

    /// Read a value from a buffer, leaving any trailing bytes in place.
    fn read<B: Buf>(buf: &mut B) -> Result<Self, Error>;

    /// Encode this value to a fresh buffer.
    fn encode(&self) -> BytesMut {
        let len = self.len_encoded();
        let mut buf = BytesMut::with_capacity(len);
        self.write(&mut buf);
        debug_assert_eq!(buf.len(), len);
        buf
    }

    /// Decode a value from a buffer, rejecting trailing bytes.
    fn decode<B: Buf>(mut buf: B) -> Result<Self, Error> {
        let result = Self::read(&mut buf)?;
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(result)
    }
}

/// A [Codec] with a fixed-length encoding.
pub trait SizedCodec: Codec {
    /// The encoded length of every value of this type.
    const LEN_ENCODED: usize;
}

impl Codec for u64 {
    fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(*self);
    }

    fn len_encoded(&self) -> usize {
        Self::LEN_ENCODED
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, Error> {
        if buf.remaining() < Self::LEN_ENCODED {
            return Err(Error::EndOfBuffer);
        }
        Ok(buf.get_u64_le())
    }
}

impl SizedCodec for u64 {
    const LEN_ENCODED: usize = 8;
}

impl<T: Codec> Codec for Option<T> {
    fn write<B: BufMut>(&self, buf: &mut B) {
        match self {
            Some(value) => {
                buf.put_u8(1);
                value.write(buf);
            }
            None => buf.put_u8(0),
        }
    }

    fn len_encoded(&self) -> usize {
        1 + self.as_ref().map_or(0, Codec::len_encoded)
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self, Error> {
        if buf.remaining() < 1 {
            return Err(Error::EndOfBuffer);
        }
        match buf.get_u8() {
            0 => Ok(None),
            1 => Ok(Some(T::read(buf)?)),
            _ => Err(Error::Invalid("option", "unknown tag")),
        }
    }
}

/// Write a length-prefixed sequence.
///
/// Panics if the sequence holds more than `u32::MAX` items.
pub fn write_seq<T: Codec, B: BufMut>(buf: &mut B, items: &[T]) {
    let len = u32::try_from(items.len()).expect("sequence length exceeds u32");
    buf.put_u32_le(len);
    for item in items {
        item.write(buf);
    }
}

/// The encoded length of a length-prefixed sequence.
pub fn seq_len_encoded<T: Codec>(items: &[T]) -> usize {
    4 + items.iter().map(Codec::len_encoded).sum::<usize>()
}

/// Read a length-prefixed sequence of at most `max` items.
pub fn read_seq<T: Codec, B: Buf>(buf: &mut B, max: usize) -> Result<Vec<T>, Error> {
    if buf.remaining() < 4 {
        return Err(Error::EndOfBuffer);
    }
    let len = buf.get_u32_le() as usize;
    if len > max {
        return Err(Error::LengthTooLarge(len, max));
    }
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(T::read(buf)?);
    }
    Ok(items)
}
