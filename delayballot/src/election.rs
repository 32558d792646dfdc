use crate::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;

/// How far an election has got. A snapshot of the channel, not a result.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ElectionProgress {
    pub phase: ElectionPhase,
    pub count: usize,
    pub total: usize,

    /// Provisional counts over the ballots decrypted so far, during tallying
    pub tally: Option<Vec<TallyCount>>,
}

/// One election as seen by one participant.
///
/// Every operation reads the phase from the clock and refuses to run outside its phase.
pub struct Election<B, C, K = SystemClock> {
    params: ElectionParams,
    channel: B,
    credentials: C,
    secrets: Secrets,
    clock: K,
    vdf: vdf::Pietrzak,
}

enum Opened {
    Ballot(Ballot),

    /// No decryption message names this ballot
    Missing,

    /// Decryption messages exist but none of them opens the ballot
    Invalid,
}

impl<B, C> Election<B, C, SystemClock>
where
    B: BroadcastChannel,
    C: CredentialSystem,
{
    pub fn new(params: ElectionParams, channel: B, credentials: C, secrets: Secrets) -> Result<Self, Error> {
        Self::with_clock(params, channel, credentials, secrets, SystemClock)
    }
}

impl<B, C, K> Election<B, C, K>
where
    B: BroadcastChannel,
    C: CredentialSystem,
    K: Clock,
{
    pub fn with_clock(
        params: ElectionParams,
        channel: B,
        credentials: C,
        secrets: Secrets,
        clock: K,
    ) -> Result<Self, Error> {
        let vdf = vdf::Pietrzak::new(params.vdf_difficulty())?;
        Ok(Election {
            params,
            channel,
            credentials,
            secrets,
            clock,
            vdf,
        })
    }

    pub fn params(&self) -> &ElectionParams {
        &self.params
    }

    pub fn channel(&self) -> &B {
        &self.channel
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn phase(&self) -> ElectionPhase {
        self.params.phase_at(self.clock.now())
    }

    /// Publish this voter's public credential, signed with their long-term key.
    pub fn post_credential(&self) -> Result<(), Error> {
        self.require_phase(ElectionPhase::CredGen)?;

        let private_key = self.secrets.private_key()?;
        let secret = self.secrets.secret_credential(&self.credentials)?;
        let msg = CredentialMessage::sign(&private_key, secret.public.as_bytes().to_vec());
        self.channel.post_credential(&msg)?;

        tracing::info!(public_key = %hex::encode(msg.public_key.as_bytes()), "posted credential");
        Ok(())
    }

    /// The set of credentials that may vote, once credential generation is over.
    pub fn credential_set(&self) -> Result<C::Set, Error> {
        let phase = self.phase();
        if phase == ElectionPhase::CredGen {
            return Err(Error::WrongPhase {
                expected: ElectionPhase::Vote,
                actual: phase,
            });
        }

        let mut public: Vec<PublicCredential> = self
            .valid_credentials()?
            .into_iter()
            .map(|(_, (_, credential))| credential)
            .collect();
        public.sort();
        public.dedup();

        Ok(self.credentials.make_credential_set(public)?)
    }

    /// Cast an encrypted ballot for the choices labelled `labels`.
    ///
    /// The VDF solution is stored before the ballot is posted so that the voter can reveal
    /// it when tallying starts.
    pub fn vote<S: AsRef<str>>(&self, labels: &[S]) -> Result<SignedBallot, Error> {
        self.require_phase(ElectionPhase::Vote)?;

        let indices = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.params
                    .choice_index(label)
                    .ok_or_else(|| Error::UnknownChoice(label.to_owned()))
            })
            .collect::<Result<Vec<usize>, Error>>()?;
        let ballot = self.params.voting_method().vote(&indices)?;
        let secret = self.secrets.secret_credential(&self.credentials)?;
        let set = self.credential_set()?;

        let solution = self.vdf.create()?;
        self.secrets.set_vdf_solution(&solution)?;

        let encrypted = ballot.encrypt(&solution)?;
        let signed = SignedBallot::sign(encrypted, &set, &secret)?;
        self.secrets.set_ballot(&signed)?;
        self.channel.post_signed_ballot(&signed)?;

        tracing::info!(
            serial_no = %hex::encode(&signed.serial_no),
            credentials = set.len(),
            "posted signed ballot"
        );
        Ok(signed)
    }

    /// Publish the stored VDF solution for this voter's own ballot.
    pub fn reveal_ballot_decryption(&self) -> Result<(), Error> {
        self.require_phase(ElectionPhase::Tally)?;
        let solution = self.secrets.vdf_solution()?;
        self.post_solution(&solution)
    }

    /// Open someone else's ballot the slow way by solving its puzzle, then publish the solution.
    pub fn post_ballot_decryption(&self, encrypted_ballot: &EncryptedBallot) -> Result<(), Error> {
        self.require_phase(ElectionPhase::Tally)?;
        let solution = self.vdf.solve(&encrypted_ballot.vdf_input)?;
        self.post_solution(&solution)
    }

    /// Like `post_ballot_decryption`, but gives up with `Error::Cancelled` once `cancel` is set.
    pub fn post_ballot_decryption_cancellable(
        &self,
        encrypted_ballot: &EncryptedBallot,
        cancel: &AtomicBool,
    ) -> Result<(), Error> {
        self.require_phase(ElectionPhase::Tally)?;
        let solution = self
            .vdf
            .solve_cancellable(&encrypted_ballot.vdf_input, cancel)?;
        self.post_solution(&solution)
    }

    /// Count every valid ballot.
    ///
    /// Fails with `Error::BallotNotDecrypted` if any valid ballot cannot be opened yet.
    pub fn tally(&self) -> Result<Vec<TallyCount>, Error> {
        self.require_phase(ElectionPhase::Tally)?;

        let set = self.credential_set()?;
        let decryptions = self.channel.ballot_decryptions()?;
        let decryptions = index_decryptions(&decryptions);

        let mut ballots = Vec::new();
        for signed in self.valid_ballots(&set)? {
            match self.open(&signed.encrypted_ballot, &decryptions) {
                Opened::Ballot(ballot) => ballots.push(ballot),
                Opened::Missing | Opened::Invalid => {
                    return Err(Error::BallotNotDecrypted(Box::new(signed.encrypted_ballot)));
                }
            }
        }

        let counts = self.params.voting_method().tally(&ballots);
        tracing::info!(ballots = ballots.len(), "tally complete");
        Ok(counts)
    }

    /// Summarize what is on the channel for the current phase.
    pub fn progress(&self) -> Result<ElectionProgress, Error> {
        let phase = self.phase();
        match phase {
            ElectionPhase::CredGen => Ok(ElectionProgress {
                phase,
                count: self.valid_credentials()?.len(),
                total: self.params.eligibility_list().len(),
                tally: None,
            }),
            ElectionPhase::Vote => {
                let set = self.credential_set()?;
                Ok(ElectionProgress {
                    phase,
                    count: self.valid_ballots(&set)?.len(),
                    total: set.len(),
                    tally: None,
                })
            }
            ElectionPhase::Tally => {
                let set = self.credential_set()?;
                let decryptions = self.channel.ballot_decryptions()?;
                let decryptions = index_decryptions(&decryptions);
                let valid = self.valid_ballots(&set)?;

                let mut ballots = Vec::new();
                let mut invalid = 0;
                for signed in &valid {
                    match self.open(&signed.encrypted_ballot, &decryptions) {
                        Opened::Ballot(ballot) => ballots.push(ballot),
                        Opened::Invalid => invalid += 1,
                        Opened::Missing => {}
                    }
                }

                Ok(ElectionProgress {
                    phase,
                    count: ballots.len(),
                    total: valid.len() - invalid,
                    tally: Some(self.params.voting_method().tally(&ballots)),
                })
            }
        }
    }

    fn require_phase(&self, expected: ElectionPhase) -> Result<(), Error> {
        let actual = self.phase();
        if actual != expected {
            return Err(Error::WrongPhase { expected, actual });
        }
        Ok(())
    }

    fn post_solution(&self, solution: &vdf::Solution) -> Result<(), Error> {
        let msg = DecryptionMessage::from_solution(solution);
        self.channel.post_ballot_decryption(&msg)?;
        tracing::info!(input_hash = %hex::encode(msg.input_hash), "posted ballot decryption");
        Ok(())
    }

    /// Valid credentials by long-term public key.
    ///
    /// A key that posted several valid messages keeps the one whose encoding sorts first, so
    /// every observer settles on the same credential regardless of channel order.
    fn valid_credentials(&self) -> Result<BTreeMap<[u8; 32], (Vec<u8>, PublicCredential)>, Error> {
        let eligibility_list = self.params.eligibility_list();
        let mut valid: BTreeMap<[u8; 32], (Vec<u8>, PublicCredential)> = BTreeMap::new();

        for msg in self.channel.credentials()? {
            let key = msg.public_key.to_bytes();
            if !eligibility_list.contains(&msg.public_key) {
                tracing::debug!(public_key = %hex::encode(key), "skipping credential from ineligible key");
                continue;
            }
            if let Err(e) = msg.verify() {
                tracing::debug!(public_key = %hex::encode(key), error = %e, "skipping badly signed credential");
                continue;
            }
            let credential = match self.credentials.public_credential_from_bytes(&msg.credential) {
                Ok(credential) => credential,
                Err(e) => {
                    tracing::debug!(public_key = %hex::encode(key), error = %e, "skipping malformed credential");
                    continue;
                }
            };

            let encoded = msg.to_bytes();
            let keep_existing = matches!(valid.get(&key), Some((existing, _)) if existing <= &encoded);
            if !keep_existing {
                valid.insert(key, (encoded, credential));
            }
        }
        Ok(valid)
    }

    /// Signed ballots that count, in channel order.
    ///
    /// The first validly signed ballot for each serial number wins. A ballot with a bad
    /// signature does not use up its serial number.
    fn valid_ballots(&self, set: &C::Set) -> Result<Vec<SignedBallot>, Error> {
        let mut serial_nos = HashSet::new();
        let mut valid = Vec::new();

        for signed in self.channel.signed_ballots()? {
            if serial_nos.contains(&signed.serial_no) {
                tracing::debug!(serial_no = %hex::encode(&signed.serial_no), "skipping repeated serial number");
                continue;
            }
            if !signed.verify(set) {
                tracing::debug!(serial_no = %hex::encode(&signed.serial_no), "skipping badly signed ballot");
                continue;
            }
            serial_nos.insert(signed.serial_no.clone());
            valid.push(signed);
        }
        Ok(valid)
    }

    /// Try each decryption message for this ballot in turn.
    fn open(&self, encrypted: &EncryptedBallot, decryptions: &HashMap<HashValue, Vec<&DecryptionMessage>>) -> Opened {
        let candidates = match decryptions.get(&encrypted.input_hash()) {
            Some(candidates) => candidates,
            None => return Opened::Missing,
        };

        for msg in candidates {
            let solution = msg.solution_for(&encrypted.vdf_input);
            if !self.vdf.verify(&solution) {
                tracing::debug!(input_hash = %hex::encode(msg.input_hash), "skipping decryption with bad proof");
                continue;
            }
            match encrypted.decrypt(&solution) {
                Ok(ballot) => return Opened::Ballot(ballot),
                Err(_) => {
                    tracing::debug!(input_hash = %hex::encode(msg.input_hash), "skipping decryption that does not open ballot");
                }
            }
        }
        Opened::Invalid
    }
}

fn index_decryptions(decryptions: &[DecryptionMessage]) -> HashMap<HashValue, Vec<&DecryptionMessage>> {
    let mut index: HashMap<HashValue, Vec<&DecryptionMessage>> = HashMap::new();
    for msg in decryptions {
        index.entry(msg.input_hash).or_default().push(msg);
    }
    index
}
