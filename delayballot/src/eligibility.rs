use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexMap;

const MAGIC: u32 = 0x454C_4C01;
const ENTRY_LEN: usize = 64;

/// The voters allowed to take part in an election.
///
/// Each entry maps a long-term Ed25519 public key to a commitment to the voter's identity.
/// The hash of the canonical encoding commits to the whole list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityList {
    /// Keyed by raw public key bytes.
    ///
    /// Hashmaps are not allowed because their unstable ordering leads to non-determinism.
    entries: IndexMap<[u8; 32], HashValue>,
}

impl EligibilityList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a voter. A missing identity commitment is recorded as all zeroes.
    pub fn add(&mut self, public_key: &PublicKey, identity_commitment: Option<HashValue>) -> Result<(), Error> {
        let key = public_key.to_bytes();
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateEligibleKey);
        }
        self.entries.insert(key, identity_commitment.unwrap_or([0; 32]));
        Ok(())
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.entries.contains_key(public_key.as_bytes())
    }

    pub fn identity_commitment(&self, public_key: &PublicKey) -> Option<&HashValue> {
        self.entries.get(public_key.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order entries by public key bytes
    pub fn sort(&mut self) {
        self.entries.sort_keys();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + ENTRY_LEN * self.entries.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        for (key, commitment) in self.entries.iter() {
            out.extend_from_slice(key);
            out.extend_from_slice(commitment);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("EligibilityList", bytes);
        if bytes.len() < 4 || (bytes.len() - 4) % ENTRY_LEN != 0 {
            return Err(reader.error(ParseErrorKind::InvalidSize));
        }
        if reader.read_u32()? != MAGIC {
            return Err(reader.error(ParseErrorKind::InvalidMagic));
        }

        let mut list = EligibilityList::new();
        while reader.remaining_len() > 0 {
            let key = reader.read_32()?;
            let commitment = reader.read_32()?;
            let public_key = PublicKey::from_bytes(&key)
                .map_err(|_| reader.error(ParseErrorKind::InvalidPublicKey))?;
            list.add(&public_key, Some(commitment))
                .map_err(|_| reader.error(ParseErrorKind::DuplicateKey))?;
        }
        Ok(list)
    }

    /// Commitment to the eligible voter set
    pub fn hash(&self) -> HashValue {
        hash(&self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_list() {
        let (_, a) = generate_keypair();
        let (_, b) = generate_keypair();
        let (_, c) = generate_keypair();

        let mut list = EligibilityList::new();
        list.add(&a, None).unwrap();
        list.add(&b, Some([7; 32])).unwrap();
        assert!(matches!(list.add(&a, None), Err(Error::DuplicateEligibleKey)));

        assert!(list.contains(&a));
        assert!(!list.contains(&c));
        assert_eq!(list.identity_commitment(&a), Some(&[0; 32]));
        assert_eq!(list.identity_commitment(&b), Some(&[7; 32]));

        let bytes = list.to_bytes();
        assert_eq!(bytes.len(), 4 + 128);
        assert_eq!(&bytes[0..4], &[0x45, 0x4C, 0x4C, 0x01]);
        assert_eq!(&bytes[4..36], a.as_bytes());

        let decoded = EligibilityList::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.hash(), list.hash());
    }

    #[test]
    fn test_sort_changes_commitment() {
        let mut list = EligibilityList::new();
        let mut keys = Vec::new();
        for _ in 0..5 {
            let (_, public) = generate_keypair();
            list.add(&public, None).unwrap();
            keys.push(public.to_bytes());
        }
        keys.sort();

        let mut sorted = list.clone();
        sorted.sort();
        let bytes = sorted.to_bytes();
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(&bytes[4 + i * 64..4 + i * 64 + 32], key);
        }

        // Sorting is idempotent
        let mut again = sorted.clone();
        again.sort();
        assert_eq!(again.hash(), sorted.hash());
    }

    #[test]
    fn test_parse_errors() {
        let (_, a) = generate_keypair();
        let mut list = EligibilityList::new();
        list.add(&a, None).unwrap();
        let bytes = list.to_bytes();

        let err = EligibilityList::from_bytes(&bytes[..40]).unwrap_err();
        assert_eq!(err.structure, "EligibilityList");
        assert_eq!(err.kind, ParseErrorKind::InvalidSize);

        let mut bad_magic = bytes.clone();
        bad_magic[3] = 0x02;
        let err = EligibilityList::from_bytes(&bad_magic).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidMagic);

        let mut duplicated = bytes.clone();
        duplicated.extend_from_slice(&bytes[4..]);
        let err = EligibilityList::from_bytes(&duplicated).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateKey);

        // Empty list is valid
        let empty = EligibilityList::from_bytes(&MAGIC.to_be_bytes()).unwrap();
        assert!(empty.is_empty());
    }
}
