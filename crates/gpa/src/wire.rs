//! Little-endian fixed-width encoding shared by GPA message codecs.
//!
//! Every field is either fixed-size (integers, keys, hashes, signatures) or a
//! `u16` length prefix followed by that many bytes.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::GpaError;
use crate::hashing::{HashValue, HASH_SIZE};
use crate::keys::{PublicKey, Signature, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.buf.put_i64_le(v);
        self
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_slice(v);
        self
    }

    pub fn write_hash(&mut self, v: &HashValue) -> &mut Self {
        self.write_bytes(v.as_bytes())
    }

    pub fn write_public_key(&mut self, v: &PublicKey) -> &mut Self {
        self.write_bytes(v.as_bytes())
    }

    pub fn write_signature(&mut self, v: &Signature) -> &mut Self {
        self.write_bytes(&v.to_bytes())
    }

    /// Writes a collection length as `u16`.
    pub fn write_len(&mut self, field: &'static str, len: usize) -> Result<&mut Self, GpaError> {
        let len = u16::try_from(len).map_err(|_| GpaError::InvalidField {
            field,
            reason: format!("length {len} exceeds {}", u16::MAX),
        })?;
        Ok(self.write_u16(len))
    }

    /// Writes a `u16`-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, field: &'static str, v: &str) -> Result<&mut Self, GpaError> {
        self.write_len(field, v.len())?;
        Ok(self.write_bytes(v.as_bytes()))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Cursor over an encoded buffer. Every read checks the remaining length
/// first and fails with [`GpaError::Truncated`] instead of panicking.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), GpaError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(GpaError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, GpaError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, GpaError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i64(&mut self) -> Result<i64, GpaError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], GpaError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], GpaError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_hash(&mut self) -> Result<HashValue, GpaError> {
        Ok(HashValue::from_bytes(self.read_array::<HASH_SIZE>()?))
    }

    pub fn read_public_key(&mut self) -> Result<PublicKey, GpaError> {
        PublicKey::from_bytes(&self.read_array::<PUBLIC_KEY_SIZE>()?)
    }

    pub fn read_signature(&mut self) -> Result<Signature, GpaError> {
        Ok(Signature::from_bytes(&self.read_array::<SIGNATURE_SIZE>()?))
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, GpaError> {
        let len = usize::from(self.read_u16()?);
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| GpaError::InvalidField {
            field,
            reason: e.to_string(),
        })
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), GpaError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(GpaError::TrailingData(n)),
        }
    }
}
