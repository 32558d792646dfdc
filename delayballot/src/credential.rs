//! Interface to an anonymous credential scheme with nullifiers.
//!
//! The zero-knowledge backend is supplied by the caller. Any scheme works as long as a
//! signature made with a secret credential proves membership in a credential set without
//! revealing which member signed, and carries a serial number that is the same every time
//! the same credential signs.

use std::fmt;
use thiserror::Error;

pub const PUBLIC_CREDENTIAL_LEN: usize = 32;
pub const SECRET_CREDENTIAL_LEN: usize = 96;

/// Error reported by a credential backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CredentialError(pub String);

/// The public half of an anonymous credential.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicCredential(pub [u8; PUBLIC_CREDENTIAL_LEN]);

impl PublicCredential {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicCredential({})", hex::encode(self.0))
    }
}

/// A voter's secret credential.
///
/// The serial number is the nullifier attached to every signature made with this credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretCredential {
    pub public: PublicCredential,
    pub serial_no: [u8; 32],
    pub secret: [u8; 32],
}

impl SecretCredential {
    pub fn to_bytes(&self) -> [u8; SECRET_CREDENTIAL_LEN] {
        let mut bytes = [0u8; SECRET_CREDENTIAL_LEN];
        bytes[0..32].copy_from_slice(&self.public.0);
        bytes[32..64].copy_from_slice(&self.serial_no);
        bytes[64..96].copy_from_slice(&self.secret);
        bytes
    }

    /// Split 96 bytes into their parts. Backends may apply further checks.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        if bytes.len() != SECRET_CREDENTIAL_LEN {
            return Err(CredentialError(format!(
                "secret credential must be {} bytes, got {}",
                SECRET_CREDENTIAL_LEN,
                bytes.len()
            )));
        }
        let mut public = [0u8; 32];
        let mut serial_no = [0u8; 32];
        let mut secret = [0u8; 32];
        public.copy_from_slice(&bytes[0..32]);
        serial_no.copy_from_slice(&bytes[32..64]);
        secret.copy_from_slice(&bytes[64..96]);
        Ok(SecretCredential {
            public: PublicCredential(public),
            serial_no,
            secret,
        })
    }
}

impl fmt::Debug for SecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SecretCredential")
            .field("public", &self.public)
            .finish()
    }
}

/// An anonymous credential scheme
pub trait CredentialSystem {
    type Set: CredentialSet;

    fn generate_secret_credential(&self) -> Result<SecretCredential, CredentialError>;

    fn secret_credential_from_bytes(&self, bytes: &[u8]) -> Result<SecretCredential, CredentialError>;

    fn public_credential_from_bytes(&self, bytes: &[u8]) -> Result<PublicCredential, CredentialError>;

    /// Build a verification context over `credentials`, which are sorted and deduplicated.
    fn make_credential_set(&self, credentials: Vec<PublicCredential>) -> Result<Self::Set, CredentialError>;
}

/// A fixed set of public credentials that anonymous signatures are made against
pub trait CredentialSet {
    /// Sign `message` anonymously. The signature carries `secret.serial_no`.
    fn sign(&self, secret: &SecretCredential, message: &[u8]) -> Result<Vec<u8>, CredentialError>;

    /// Check that `signature` over `message` was made by some member of the set with serial `serial_no`.
    fn verify(&self, serial_no: &[u8], signature: &[u8], message: &[u8]) -> bool;

    /// Number of credentials in the set
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_credential_bytes() {
        let secret = SecretCredential {
            public: PublicCredential([1; 32]),
            serial_no: [2; 32],
            secret: [3; 32],
        };
        let bytes = secret.to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[32], 2);
        assert_eq!(bytes[95], 3);
        assert_eq!(SecretCredential::from_bytes(&bytes).unwrap(), secret);
        assert!(SecretCredential::from_bytes(&bytes[1..]).is_err());

        // Debug output never shows the secret
        assert!(!format!("{:?}", secret).contains("0303"));
    }
}
