use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("delayballot: {0}")]
    Parse(#[from] ParseError),

    #[error("delayballot: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("delayballot: wrong election phase: expected {expected}, currently {actual}")]
    WrongPhase {
        expected: ElectionPhase,
        actual: ElectionPhase,
    },

    #[error("delayballot: no choice named {0:?}")]
    UnknownChoice(String),

    #[error("delayballot: invalid choice selection for {method} voting: {indices:?}")]
    InvalidChoice {
        method: &'static str,
        indices: Vec<usize>,
    },

    #[error("delayballot: no such voting method: {0}")]
    NoSuchVotingMethod(String),

    #[error("delayballot: invalid number of choices ({count}) for {method} voting")]
    InvalidNumberOfChoices { method: &'static str, count: usize },

    #[error("delayballot: vdf difficulty must be positive and even, got {0}")]
    InvalidDifficulty(u64),

    #[error("delayballot: {field} too long ({len} bytes)")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("delayballot: voting must start before tallying")]
    InvalidSchedule,

    #[error("delayballot: malformed vdf input")]
    InvalidVdfInput,

    #[error("delayballot: vdf computation cancelled")]
    Cancelled,

    #[error("delayballot: ballot content too large ({0} bytes)")]
    BallotTooLarge(usize),

    #[error("delayballot: failed to encrypt ballot")]
    EncryptionFailed,

    #[error("delayballot: failed to decrypt ballot")]
    DecryptionFailed,

    /// A validly signed ballot has no usable decryption on the channel yet.
    ///
    /// Retry the tally after posting a decryption for this ballot
    /// (see `Election::post_ballot_decryption`).
    #[error("delayballot: ballot not decrypted (vdf input hash {})", hex::encode(.0.input_hash()))]
    BallotNotDecrypted(Box<EncryptedBallot>),

    #[error("delayballot: credential backend error: {0}")]
    Credential(#[from] CredentialError),

    #[error("delayballot: {0} is not available to an observer")]
    ObserverSecrets(&'static str),

    #[error("delayballot: missing secret: {0}")]
    MissingSecret(&'static str),

    #[error("delayballot: duplicate public key in eligibility list")]
    DuplicateEligibleKey,

    #[error("delayballot: missing configuration variable {0}")]
    MissingConfig(&'static str),

    #[error("delayballot: broadcast channel error: {0}")]
    Channel(String),

    #[error("delayballot: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delayballot: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("delayballot: invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A message that could not be decoded, tagged with the structure being read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {structure}: {kind}")]
pub struct ParseError {
    pub structure: &'static str,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(structure: &'static str, kind: ParseErrorKind) -> Self {
        ParseError { structure, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    Truncated,

    #[error("{field} too large ({len} > {max})")]
    Oversized {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid size")]
    InvalidSize,

    #[error("invalid magic")]
    InvalidMagic,

    #[error("unknown version {0}")]
    UnknownVersion(u32),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("duplicate public key")]
    DuplicateKey,

    #[error("non-canonical length encoding")]
    NonCanonicalLength,

    #[error("invalid utf-8 string")]
    InvalidUtf8,

    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),
}
