use crate::*;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};

/// A SHA-256 digest
pub type HashValue = [u8; 32];

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// SHA-256 of `message`, using a fresh hasher per call.
pub fn hash(message: &[u8]) -> HashValue {
    Sha256::digest(message).into()
}

/// Encode a non-negative integer as exactly `length` big-endian bytes, zero-padded on the left.
///
/// The caller guarantees that `n < 256^length`.
pub fn nat_to_bytes(n: &BigUint, length: usize) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let bytes = &bytes[start..];
    debug_assert!(bytes.len() <= length);

    let mut result = vec![0u8; length];
    let offset = length.saturating_sub(bytes.len());
    result[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(length)..]);
    result
}

/// Decode big-endian bytes as a non-negative integer.
pub fn nat_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Longest field a compact vector can hold
pub const MAX_VECTOR_LEN: usize = 0x7FFF;

/// Append a compact length-prefixed vector.
///
/// Lengths below 128 take one byte, longer ones (up to 0x7FFF) take two bytes with the top bit set.
pub(crate) fn write_vector(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = bytes.len();
    debug_assert!(len <= MAX_VECTOR_LEN);
    if len > 127 {
        out.push(((len >> 8) as u8) | 0x80);
        out.push(len as u8);
    } else {
        out.push(len as u8);
    }
    out.extend_from_slice(bytes);
}

/// Cursor over a byte slice, reporting failures against a named structure.
pub(crate) struct Reader<'a> {
    structure: &'static str,
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(structure: &'static str, buf: &'a [u8]) -> Self {
        Reader { structure, buf }
    }

    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.structure, kind)
    }

    pub fn remaining_len(&self) -> usize {
        self.buf.len()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.buf.len() < n {
            return Err(self.error(ParseErrorKind::Truncated));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_32(&mut self) -> Result<[u8; 32], ParseError> {
        let mut b = [0u8; 32];
        b.copy_from_slice(self.read_bytes(32)?);
        Ok(b)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ParseError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(b))
    }

    /// Read a field prefixed by a 1-byte length, rejecting lengths above `max`.
    pub fn read_u8_prefixed(&mut self, field: &'static str, max: usize) -> Result<&'a [u8], ParseError> {
        let len = self.read_u8()? as usize;
        self.check_len(field, len, max)?;
        self.read_bytes(len)
    }

    /// Read a field prefixed by a 2-byte length, rejecting lengths above `max`.
    pub fn read_u16_prefixed(&mut self, field: &'static str, max: usize) -> Result<&'a [u8], ParseError> {
        let len = self.read_u16()? as usize;
        self.check_len(field, len, max)?;
        self.read_bytes(len)
    }

    /// Read a compact vector written by `write_vector`.
    pub fn read_vector(&mut self) -> Result<&'a [u8], ParseError> {
        let mut len = self.read_u8()? as usize;
        if len > 127 {
            len = ((len & 0x7F) << 8) + self.read_u8()? as usize;
            if len <= 127 {
                return Err(self.error(ParseErrorKind::NonCanonicalLength));
            }
        }
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> Result<String, ParseError> {
        let bytes = self.read_vector()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.error(ParseErrorKind::InvalidUtf8))
    }

    /// Consume everything left, rejecting more than `max` bytes.
    pub fn read_remaining(&mut self, field: &'static str, max: usize) -> Result<&'a [u8], ParseError> {
        self.check_len(field, self.buf.len(), max)?;
        let rest = self.buf;
        self.buf = &[];
        Ok(rest)
    }

    fn check_len(&self, field: &'static str, len: usize, max: usize) -> Result<(), ParseError> {
        if len > max {
            return Err(self.error(ParseErrorKind::Oversized { field, len, max }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nat_to_bytes() {
        let n = BigUint::from(0x0102u32);
        assert_eq!(nat_to_bytes(&n, 4), vec![0, 0, 1, 2]);
        assert_eq!(nat_to_bytes(&n, 2), vec![1, 2]);
        assert_eq!(nat_to_bytes(&BigUint::from(0u32), 3), vec![0, 0, 0]);

        // High bit set must not grow a sign byte
        let n = BigUint::from(0xFFu32);
        assert_eq!(nat_to_bytes(&n, 1), vec![0xFF]);
        assert_eq!(nat_from_bytes(&[0, 0, 0xFF]), n);
    }

    #[test]
    fn test_vectors() {
        let short = vec![7u8; 5];
        let long = vec![9u8; 300];

        let mut out = Vec::new();
        write_vector(&mut out, &short);
        write_vector(&mut out, &long);
        write_vector(&mut out, &[]);
        assert_eq!(out[0], 5);
        assert_eq!(&out[6..8], &[0x81, 0x2C]);

        let mut reader = Reader::new("test", &out);
        assert_eq!(reader.read_vector().unwrap(), short.as_slice());
        assert_eq!(reader.read_vector().unwrap(), long.as_slice());
        assert!(reader.read_vector().unwrap().is_empty());
        assert_eq!(reader.remaining_len(), 0);

        // Two-byte prefix for a short length is rejected
        let mut reader = Reader::new("test", &[0x80, 0x05, 1, 2, 3, 4, 5]);
        let err = reader.read_vector().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NonCanonicalLength);
    }

    #[test]
    fn test_reader_errors() {
        let mut reader = Reader::new("Thing", &[0x00, 0x05, 1, 2]);
        let err = reader.read_u16_prefixed("field", 1024).unwrap_err();
        assert_eq!(err.structure, "Thing");
        assert_eq!(err.kind, ParseErrorKind::Truncated);

        let mut reader = Reader::new("Thing", &[0x00, 0x05, 1, 2, 3, 4, 5]);
        let err = reader.read_u16_prefixed("field", 4).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Oversized {
                field: "field",
                len: 5,
                max: 4
            }
        );
    }

    #[test]
    fn test_hash() {
        assert_eq!(
            hex::encode(hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
