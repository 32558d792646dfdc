use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use std::convert::TryFrom;

/// Binds a voter's long-term identity to an anonymous public credential.
///
/// Posted once per voter while credentials are being collected. Later votes made with the
/// credential cannot be linked back to this message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMessage {
    pub public_key: PublicKey,
    pub signature: Signature,
    pub credential: Vec<u8>,
}

impl CredentialMessage {
    pub fn sign(secret: &SecretKey, credential: Vec<u8>) -> Self {
        let public_key = PublicKey::from(secret);
        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&credential, &public_key);

        CredentialMessage {
            public_key,
            signature,
            credential,
        }
    }

    pub fn verify(&self) -> Result<(), ed25519_dalek::SignatureError> {
        self.public_key
            .verify_strict(&self.credential, &self.signature)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH + self.credential.len());
        out.extend_from_slice(self.public_key.as_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
        out.extend_from_slice(&self.credential);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("CredentialMessage", bytes);
        let public_key = PublicKey::from_bytes(reader.read_bytes(PUBLIC_KEY_LENGTH)?)
            .map_err(|_| reader.error(ParseErrorKind::InvalidPublicKey))?;
        let signature = Signature::try_from(reader.read_bytes(SIGNATURE_LENGTH)?)
            .map_err(|_| reader.error(ParseErrorKind::InvalidSignature))?;
        let credential = reader.read_remaining("credential", usize::MAX)?.to_vec();

        Ok(CredentialMessage {
            public_key,
            signature,
            credential,
        })
    }
}

/// The revealed half of a VDF solution, which opens one encrypted ballot.
///
/// The puzzle input is identified by its hash since it is already on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionMessage {
    pub input_hash: HashValue,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

impl DecryptionMessage {
    pub fn from_solution(solution: &vdf::Solution) -> Self {
        DecryptionMessage {
            input_hash: hash(&solution.input),
            output: solution.output.clone(),
            proof: solution.proof.clone(),
        }
    }

    /// Rebuild the full solution for the puzzle `vdf_input`.
    pub fn solution_for(&self, vdf_input: &[u8]) -> vdf::Solution {
        vdf::Solution {
            input: vdf_input.to_vec(),
            output: self.output.clone(),
            proof: self.proof.clone(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(self.output.len() <= vdf::MAX_OUTPUT_LEN);

        let mut out = Vec::with_capacity(34 + self.output.len() + self.proof.len());
        out.extend_from_slice(&self.input_hash);
        out.extend_from_slice(&(self.output.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.output);
        out.extend_from_slice(&self.proof);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("DecryptionMessage", bytes);
        let input_hash = reader.read_32()?;
        let output = reader
            .read_u16_prefixed("output", vdf::MAX_OUTPUT_LEN)?
            .to_vec();
        let proof = reader.read_remaining("proof", usize::MAX)?.to_vec();

        Ok(DecryptionMessage {
            input_hash,
            output,
            proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_message() {
        let (secret, public) = generate_keypair();
        let msg = CredentialMessage::sign(&secret, vec![5; 32]);
        assert_eq!(msg.public_key, public);
        msg.verify().unwrap();

        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 32 + 64 + 32);
        assert_eq!(CredentialMessage::from_bytes(&bytes).unwrap(), msg);

        // Swapping the credential breaks the signature
        let mut forged = msg.clone();
        forged.credential = vec![6; 32];
        assert!(forged.verify().is_err());

        // Signed by someone else
        let (other_secret, _) = generate_keypair();
        let mut forged = CredentialMessage::sign(&other_secret, vec![5; 32]);
        forged.public_key = public;
        assert!(forged.verify().is_err());

        let err = CredentialMessage::from_bytes(&bytes[..90]).unwrap_err();
        assert_eq!(err.structure, "CredentialMessage");
        assert_eq!(err.kind, ParseErrorKind::Truncated);
    }

    #[test]
    fn test_decryption_message() {
        let solution = vdf::Solution {
            input: vec![1; 64],
            output: vec![2; 32],
            proof: vec![3; 96],
        };
        let msg = DecryptionMessage::from_solution(&solution);
        assert_eq!(msg.input_hash, hash(&solution.input));
        assert_eq!(msg.solution_for(&solution.input), solution);

        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 32 + 2 + 32 + 96);
        assert_eq!(DecryptionMessage::from_bytes(&bytes).unwrap(), msg);

        let mut bad = bytes.clone();
        bad[32] = 0x04;
        bad[33] = 0x01;
        let err = DecryptionMessage::from_bytes(&bad).unwrap_err();
        assert_eq!(err.structure, "DecryptionMessage");
        assert!(matches!(err.kind, ParseErrorKind::Oversized { .. }));
    }
}
