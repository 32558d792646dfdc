use crate::*;
use std::sync::{Arc, Mutex, MutexGuard};

/// A public, append-only bulletin board
pub trait BroadcastChannel {
    fn post_credential(&self, msg: &CredentialMessage) -> Result<(), Error>;

    fn post_signed_ballot(&self, ballot: &SignedBallot) -> Result<(), Error>;

    fn post_ballot_decryption(&self, msg: &DecryptionMessage) -> Result<(), Error>;

    /// All credential messages, in posting order
    fn credentials(&self) -> Result<Vec<CredentialMessage>, Error>;

    /// All signed ballots, in posting order
    fn signed_ballots(&self) -> Result<Vec<SignedBallot>, Error>;

    /// All decryption messages, in posting order
    fn ballot_decryptions(&self) -> Result<Vec<DecryptionMessage>, Error>;
}

impl<T: BroadcastChannel + ?Sized> BroadcastChannel for Arc<T> {
    fn post_credential(&self, msg: &CredentialMessage) -> Result<(), Error> {
        (**self).post_credential(msg)
    }

    fn post_signed_ballot(&self, ballot: &SignedBallot) -> Result<(), Error> {
        (**self).post_signed_ballot(ballot)
    }

    fn post_ballot_decryption(&self, msg: &DecryptionMessage) -> Result<(), Error> {
        (**self).post_ballot_decryption(msg)
    }

    fn credentials(&self) -> Result<Vec<CredentialMessage>, Error> {
        (**self).credentials()
    }

    fn signed_ballots(&self) -> Result<Vec<SignedBallot>, Error> {
        (**self).signed_ballots()
    }

    fn ballot_decryptions(&self) -> Result<Vec<DecryptionMessage>, Error> {
        (**self).ballot_decryptions()
    }
}

/// A simple channel that keeps encoded messages in memory.
///
/// Anyone can post anything to a bulletin board, so entries that fail to decode are skipped
/// when reading rather than failing the whole read.
#[derive(Default)]
pub struct MemChannel {
    credentials: Mutex<Vec<Vec<u8>>>,
    signed_ballots: Mutex<Vec<Vec<u8>>>,
    ballot_decryptions: Mutex<Vec<Vec<u8>>>,
}

impl MemChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post arbitrary bytes as a credential message
    pub fn post_raw_credential(&self, bytes: Vec<u8>) -> Result<(), Error> {
        lock(&self.credentials)?.push(bytes);
        Ok(())
    }

    /// Post arbitrary bytes as a signed ballot
    pub fn post_raw_signed_ballot(&self, bytes: Vec<u8>) -> Result<(), Error> {
        lock(&self.signed_ballots)?.push(bytes);
        Ok(())
    }

    /// Post arbitrary bytes as a decryption message
    pub fn post_raw_ballot_decryption(&self, bytes: Vec<u8>) -> Result<(), Error> {
        lock(&self.ballot_decryptions)?.push(bytes);
        Ok(())
    }
}

impl BroadcastChannel for MemChannel {
    fn post_credential(&self, msg: &CredentialMessage) -> Result<(), Error> {
        self.post_raw_credential(msg.to_bytes())
    }

    fn post_signed_ballot(&self, ballot: &SignedBallot) -> Result<(), Error> {
        self.post_raw_signed_ballot(ballot.to_bytes())
    }

    fn post_ballot_decryption(&self, msg: &DecryptionMessage) -> Result<(), Error> {
        self.post_raw_ballot_decryption(msg.to_bytes())
    }

    fn credentials(&self) -> Result<Vec<CredentialMessage>, Error> {
        Ok(decode_all(&lock(&self.credentials)?, CredentialMessage::from_bytes))
    }

    fn signed_ballots(&self) -> Result<Vec<SignedBallot>, Error> {
        Ok(decode_all(&lock(&self.signed_ballots)?, SignedBallot::from_bytes))
    }

    fn ballot_decryptions(&self) -> Result<Vec<DecryptionMessage>, Error> {
        Ok(decode_all(&lock(&self.ballot_decryptions)?, DecryptionMessage::from_bytes))
    }
}

fn lock(entries: &Mutex<Vec<Vec<u8>>>) -> Result<MutexGuard<Vec<Vec<u8>>>, Error> {
    entries
        .lock()
        .map_err(|_| Error::Channel("channel lock poisoned".to_owned()))
}

fn decode_all<T>(entries: &[Vec<u8>], decode: fn(&[u8]) -> Result<T, ParseError>) -> Vec<T> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(position, bytes)| match decode(bytes) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(position, error = %e, "skipping malformed channel entry");
                None
            }
        })
        .collect()
}
