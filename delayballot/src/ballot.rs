use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes128Gcm;

pub const MAX_VDF_INPUT_LEN: usize = 4096;
pub const MAX_PAYLOAD_LEN: usize = 4096;
pub const MAX_SERIAL_NO_LEN: usize = 80;
pub const MAX_SIGNATURE_LEN: usize = 30000;

const TAG_LEN: usize = 16;

/// A plaintext ballot. Its shape is defined by the election's voting method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ballot {
    pub content: Vec<u8>,
}

impl Ballot {
    pub fn new(content: Vec<u8>) -> Self {
        Ballot { content }
    }

    /// Seal the ballot so that it can only be opened with the output of `solution`.
    ///
    /// Every solution must be used for exactly one ballot: the key and nonce are derived from it.
    pub fn encrypt(&self, solution: &vdf::Solution) -> Result<EncryptedBallot, Error> {
        if self.content.len() + TAG_LEN > MAX_PAYLOAD_LEN {
            return Err(Error::BallotTooLarge(self.content.len()));
        }

        let (cipher, nonce) = timed_release_cipher(solution);
        let payload = cipher
            .encrypt(GenericArray::from_slice(&nonce), self.content.as_slice())
            .map_err(|_| Error::EncryptionFailed)?;

        Ok(EncryptedBallot {
            vdf_input: solution.input.clone(),
            payload,
        })
    }
}

/// A ballot sealed under a VDF puzzle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptedBallot {
    pub vdf_input: Vec<u8>,

    /// AES-128-GCM ciphertext followed by its 16 byte tag
    pub payload: Vec<u8>,
}

impl EncryptedBallot {
    /// Open the ballot with a solution to its puzzle.
    ///
    /// `solution.input` must equal `self.vdf_input`. A wrong output or a tampered payload
    /// fails authentication and yields `Error::DecryptionFailed`.
    pub fn decrypt(&self, solution: &vdf::Solution) -> Result<Ballot, Error> {
        debug_assert_eq!(self.vdf_input, solution.input);

        let (cipher, nonce) = timed_release_cipher(solution);
        let content = cipher
            .decrypt(GenericArray::from_slice(&nonce), self.payload.as_slice())
            .map_err(|_| Error::DecryptionFailed)?;

        Ok(Ballot { content })
    }

    /// Hash of the VDF input, used to match decryption messages to this ballot
    pub fn input_hash(&self) -> HashValue {
        hash(&self.vdf_input)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(self.vdf_input.len() <= MAX_VDF_INPUT_LEN);
        debug_assert!(self.payload.len() <= MAX_PAYLOAD_LEN);

        let mut out = Vec::with_capacity(2 + self.vdf_input.len() + self.payload.len());
        out.extend_from_slice(&(self.vdf_input.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.vdf_input);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("EncryptedBallot", bytes);
        let vdf_input = reader
            .read_u16_prefixed("vdf input", MAX_VDF_INPUT_LEN)?
            .to_vec();
        let payload = reader.read_remaining("payload", MAX_PAYLOAD_LEN)?.to_vec();
        Ok(EncryptedBallot { vdf_input, payload })
    }
}

/// An encrypted ballot signed anonymously with a voter's credential
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignedBallot {
    pub encrypted_ballot: EncryptedBallot,

    /// Nullifier of the signing credential
    pub serial_no: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedBallot {
    pub fn sign<S: CredentialSet>(
        encrypted_ballot: EncryptedBallot,
        credential_set: &S,
        secret: &SecretCredential,
    ) -> Result<Self, Error> {
        let signature = credential_set.sign(secret, &encrypted_ballot.to_bytes())?;
        if signature.len() > MAX_SIGNATURE_LEN {
            return Err(Error::Credential(CredentialError(format!(
                "signature too large ({} bytes)",
                signature.len()
            ))));
        }

        Ok(SignedBallot {
            encrypted_ballot,
            serial_no: secret.serial_no.to_vec(),
            signature,
        })
    }

    pub fn verify<S: CredentialSet>(&self, credential_set: &S) -> bool {
        credential_set.verify(
            &self.serial_no,
            &self.signature,
            &self.encrypted_ballot.to_bytes(),
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(self.serial_no.len() <= MAX_SERIAL_NO_LEN);
        debug_assert!(self.signature.len() <= MAX_SIGNATURE_LEN);

        let encrypted = self.encrypted_ballot.to_bytes();
        let mut out =
            Vec::with_capacity(3 + self.serial_no.len() + self.signature.len() + encrypted.len());
        out.push(self.serial_no.len() as u8);
        out.extend_from_slice(&self.serial_no);
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
        out.extend(encrypted);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("SignedBallot", bytes);
        let serial_no = reader
            .read_u8_prefixed("serial number", MAX_SERIAL_NO_LEN)?
            .to_vec();
        let signature = reader
            .read_u16_prefixed("signature", MAX_SIGNATURE_LEN)?
            .to_vec();
        let encrypted_ballot = EncryptedBallot::from_bytes(reader.read_remaining("ballot", usize::MAX)?)?;
        Ok(SignedBallot {
            encrypted_ballot,
            serial_no,
            signature,
        })
    }
}

/// Key and nonce for a ballot sealed under `solution`: the first 16 and next 12 bytes of
/// `SHA-256(input || output)`.
fn timed_release_cipher(solution: &vdf::Solution) -> (Aes128Gcm, [u8; 12]) {
    let mut material = Vec::with_capacity(solution.input.len() + solution.output.len());
    material.extend_from_slice(&solution.input);
    material.extend_from_slice(&solution.output);
    let digest = hash(&material);

    let cipher = Aes128Gcm::new(GenericArray::from_slice(&digest[0..16]));
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[16..28]);
    (cipher, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution() -> vdf::Solution {
        vdf::Solution {
            input: vec![0x11; 64],
            output: vec![0x22; 32],
            proof: vec![0x33; 32],
        }
    }

    #[test]
    fn test_encrypt_decrypt() {
        let sol = solution();
        let ballot = Ballot::new(b"ABOLISH ICE".to_vec());

        let encrypted = ballot.encrypt(&sol).unwrap();
        assert_eq!(encrypted.vdf_input, sol.input);
        assert_eq!(encrypted.payload.len(), ballot.content.len() + 16);
        assert_eq!(encrypted.decrypt(&sol).unwrap(), ballot);

        // Same input, different output
        let mut wrong = sol.clone();
        wrong.output[0] ^= 1;
        assert!(matches!(encrypted.decrypt(&wrong), Err(Error::DecryptionFailed)));

        // Tampered payload
        let mut tampered = encrypted.clone();
        tampered.payload[0] ^= 0x80;
        assert!(matches!(tampered.decrypt(&sol), Err(Error::DecryptionFailed)));

        // Empty ballots are fine
        let empty = Ballot::new(vec![]);
        assert_eq!(empty.encrypt(&sol).unwrap().decrypt(&sol).unwrap(), empty);
    }

    #[test]
    fn test_ballot_too_large() {
        let sol = solution();
        assert!(Ballot::new(vec![1; 4080]).encrypt(&sol).is_ok());
        assert!(matches!(
            Ballot::new(vec![1; 4081]).encrypt(&sol),
            Err(Error::BallotTooLarge(4081))
        ));
    }

    #[test]
    fn test_encrypted_ballot_bytes() {
        let encrypted = Ballot::new(vec![1]).encrypt(&solution()).unwrap();
        let bytes = encrypted.to_bytes();
        assert_eq!(&bytes[0..2], &[0, 64]);
        assert_eq!(EncryptedBallot::from_bytes(&bytes).unwrap(), encrypted);

        let err = EncryptedBallot::from_bytes(&bytes[..30]).unwrap_err();
        assert_eq!(err.structure, "EncryptedBallot");
        assert_eq!(err.kind, ParseErrorKind::Truncated);

        let mut oversized = vec![0, 1, 7];
        oversized.extend(vec![0; 4097]);
        let err = EncryptedBallot::from_bytes(&oversized).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Oversized { .. }));
    }

    #[test]
    fn test_signed_ballot_bytes() {
        let signed = SignedBallot {
            encrypted_ballot: Ballot::new(vec![2]).encrypt(&solution()).unwrap(),
            serial_no: vec![9; 32],
            signature: vec![8; 500],
        };
        let bytes = signed.to_bytes();
        assert_eq!(bytes[0], 32);
        assert_eq!(SignedBallot::from_bytes(&bytes).unwrap(), signed);

        // Serial number longer than 80 bytes
        let mut bad = bytes.clone();
        bad[0] = 81;
        let err = SignedBallot::from_bytes(&bad).unwrap_err();
        assert_eq!(err.structure, "SignedBallot");

        // Inner ballot errors are reported against the inner structure
        let err = SignedBallot::from_bytes(&bytes[..36 + 500]).unwrap_err();
        assert_eq!(err.structure, "EncryptedBallot");
    }
}
