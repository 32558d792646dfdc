use crate::*;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const PARAMS_VERSION: u32 = 0;

/// The stage an election is in, derived from the clock
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElectionPhase {
    /// Voters post their anonymous credentials
    CredGen,

    /// Voters post encrypted ballots
    Vote,

    /// Ballots are decrypted and counted
    Tally,
}

impl fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ElectionPhase::CredGen => "CRED_GEN",
            ElectionPhase::Vote => "VOTE",
            ElectionPhase::Tally => "TALLY",
        };
        f.write_str(name)
    }
}

/// Source of the current time. Elections read it on every call.
pub trait Clock {
    fn now(&self) -> SystemTime;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

/// Immutable description of an election
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionParams {
    eligibility_list: EligibilityList,
    vote_start: SystemTime,
    tally_start: SystemTime,
    vdf_difficulty: u64,
    voting_method: VotingMethod,
    title: String,
    description: String,
    choices: Vec<String>,
}

impl ElectionParams {
    /// Validate and build election parameters.
    ///
    /// Voting must start strictly before tallying, the difficulty must be positive and even,
    /// and the voting method must accept the number of choices. The title, description and
    /// each choice label are at most `MAX_VECTOR_LEN` bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eligibility_list: EligibilityList,
        vote_start: SystemTime,
        tally_start: SystemTime,
        vdf_difficulty: u64,
        voting_method: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        choices: Vec<String>,
    ) -> Result<Self, Error> {
        if vote_start >= tally_start {
            return Err(Error::InvalidSchedule);
        }
        if vdf_difficulty == 0 || vdf_difficulty % 2 != 0 {
            return Err(Error::InvalidDifficulty(vdf_difficulty));
        }
        let voting_method = VotingMethod::new(voting_method, choices.len())?;

        let title = title.into();
        let description = description.into();
        check_field_len("title", &title)?;
        check_field_len("description", &description)?;
        for choice in &choices {
            check_field_len("choice", choice)?;
        }

        Ok(ElectionParams {
            eligibility_list,
            vote_start,
            tally_start,
            vdf_difficulty,
            voting_method,
            title,
            description,
            choices,
        })
    }

    pub fn eligibility_list(&self) -> &EligibilityList {
        &self.eligibility_list
    }

    pub fn vote_start(&self) -> SystemTime {
        self.vote_start
    }

    pub fn tally_start(&self) -> SystemTime {
        self.tally_start
    }

    pub fn vdf_difficulty(&self) -> u64 {
        self.vdf_difficulty
    }

    pub fn voting_method(&self) -> VotingMethod {
        self.voting_method
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Index of the choice labelled exactly `label`
    pub fn choice_index(&self, label: &str) -> Option<usize> {
        self.choices.iter().position(|c| c == label)
    }

    pub fn phase_at(&self, now: SystemTime) -> ElectionPhase {
        if now < self.vote_start {
            ElectionPhase::CredGen
        } else if now < self.tally_start {
            ElectionPhase::Vote
        } else {
            ElectionPhase::Tally
        }
    }

    /// Encode the parameters. Instants are stored as whole unix seconds.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PARAMS_VERSION.to_be_bytes());
        out.extend_from_slice(&unix_seconds(self.vote_start).to_be_bytes());
        out.extend_from_slice(&unix_seconds(self.tally_start).to_be_bytes());
        out.extend_from_slice(&self.vdf_difficulty.to_be_bytes());
        write_vector(&mut out, self.voting_method.name().as_bytes());
        write_vector(&mut out, self.title.as_bytes());
        write_vector(&mut out, self.description.as_bytes());
        out.extend_from_slice(&(self.choices.len() as u16).to_be_bytes());
        for choice in &self.choices {
            write_vector(&mut out, choice.as_bytes());
        }
        out.extend(self.eligibility_list.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("ElectionParams", bytes);
        let version = reader.read_u32()?;
        if version != PARAMS_VERSION {
            return Err(reader.error(ParseErrorKind::UnknownVersion(version)));
        }

        let vote_start = read_instant(&mut reader)?;
        let tally_start = read_instant(&mut reader)?;
        let vdf_difficulty = reader.read_u64()?;
        let voting_method = reader.read_string()?;
        let title = reader.read_string()?;
        let description = reader.read_string()?;

        let num_choices = reader.read_u16()?;
        let mut choices = Vec::with_capacity(num_choices as usize);
        for _ in 0..num_choices {
            choices.push(reader.read_string()?);
        }

        let eligibility_list =
            EligibilityList::from_bytes(reader.read_remaining("eligibility list", usize::MAX)?)?;

        ElectionParams::new(
            eligibility_list,
            vote_start,
            tally_start,
            vdf_difficulty,
            &voting_method,
            title,
            description,
            choices,
        )
        .map_err(|e| {
            let reason = match e {
                Error::InvalidSchedule => "schedule",
                Error::InvalidDifficulty(_) => "vdf difficulty",
                Error::NoSuchVotingMethod(_) => "voting method",
                Error::FieldTooLong { field, .. } => field,
                _ => "number of choices",
            };
            reader.error(ParseErrorKind::InvalidParams(reason))
        })
    }
}

fn check_field_len(field: &'static str, value: &str) -> Result<(), Error> {
    if value.len() > MAX_VECTOR_LEN {
        return Err(Error::FieldTooLong {
            field,
            len: value.len(),
        });
    }
    Ok(())
}

fn read_instant(reader: &mut Reader) -> Result<SystemTime, ParseError> {
    let secs = reader.read_u64()?;
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .ok_or_else(|| reader.error(ParseErrorKind::InvalidParams("schedule")))
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
