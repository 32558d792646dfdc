use crate::*;
use std::cmp::Ordering;

pub const MAX_PLURALITY_CHOICES: usize = 256;
pub const MAX_APPROVAL_CHOICES: usize = 1024;

/// The number of votes received by one choice
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TallyCount {
    pub index: usize,
    pub count: u64,
}

impl TallyCount {
    pub fn new(index: usize) -> Self {
        TallyCount { index, count: 0 }
    }
}

/// Ordered by count, then by index. For presentation only.
impl Ord for TallyCount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for TallyCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Most votes first, ties broken by lower index.
pub fn ranked(counts: &[TallyCount]) -> Vec<TallyCount> {
    let mut ranked = counts.to_vec();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.index.cmp(&b.index)));
    ranked
}

/// How ballots are filled in and counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingMethod {
    /// One choice per ballot, encoded as a single byte
    Plurality { num_choices: usize },

    /// Any subset of choices, encoded as one 0/1 byte per choice
    Approval { num_choices: usize },
}

impl VotingMethod {
    /// Look up a voting method by name.
    pub fn new(name: &str, num_choices: usize) -> Result<Self, Error> {
        let (method, max) = match name {
            "Plurality" => (VotingMethod::Plurality { num_choices }, MAX_PLURALITY_CHOICES),
            "Approval" => (VotingMethod::Approval { num_choices }, MAX_APPROVAL_CHOICES),
            _ => return Err(Error::NoSuchVotingMethod(name.to_owned())),
        };

        if num_choices == 0 || num_choices > max {
            return Err(Error::InvalidNumberOfChoices {
                method: method.name(),
                count: num_choices,
            });
        }
        Ok(method)
    }

    pub fn name(&self) -> &'static str {
        match self {
            VotingMethod::Plurality { .. } => "Plurality",
            VotingMethod::Approval { .. } => "Approval",
        }
    }

    pub fn num_choices(&self) -> usize {
        match *self {
            VotingMethod::Plurality { num_choices } => num_choices,
            VotingMethod::Approval { num_choices } => num_choices,
        }
    }

    /// Fill in a ballot for the choices at `indices`.
    pub fn vote(&self, indices: &[usize]) -> Result<Ballot, Error> {
        let invalid = || Error::InvalidChoice {
            method: self.name(),
            indices: indices.to_vec(),
        };
        if indices.iter().any(|i| *i >= self.num_choices()) {
            return Err(invalid());
        }

        match *self {
            VotingMethod::Plurality { .. } => match indices {
                [index] => Ok(Ballot::new(vec![*index as u8])),
                _ => Err(invalid()),
            },
            VotingMethod::Approval { num_choices } => {
                let mut content = vec![0u8; num_choices];
                for index in indices {
                    content[*index] = 1;
                }
                Ok(Ballot::new(content))
            }
        }
    }

    /// Count decrypted ballots. Malformed ballots are left out of the counts.
    pub fn tally(&self, ballots: &[Ballot]) -> Vec<TallyCount> {
        let num_choices = self.num_choices();
        let mut counts: Vec<TallyCount> = (0..num_choices).map(TallyCount::new).collect();
        let mut excluded = 0usize;

        for ballot in ballots {
            match self {
                VotingMethod::Plurality { .. } => {
                    let index = match ballot.content.as_slice() {
                        [index] if (*index as usize) < num_choices => *index as usize,
                        _ => {
                            excluded += 1;
                            continue;
                        }
                    };
                    counts[index].count += 1;
                }
                VotingMethod::Approval { .. } => {
                    if ballot.content.len() != num_choices || ballot.content.iter().any(|b| *b > 1) {
                        excluded += 1;
                        continue;
                    }
                    for (count, approval) in counts.iter_mut().zip(ballot.content.iter()) {
                        count.count += *approval as u64;
                    }
                }
            }
        }

        if excluded > 0 {
            tracing::debug!(method = self.name(), excluded, "excluded malformed ballots from tally");
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballots(contents: &[&[u8]]) -> Vec<Ballot> {
        contents.iter().map(|c| Ballot::new(c.to_vec())).collect()
    }

    fn counts(tally: &[TallyCount]) -> Vec<u64> {
        tally.iter().map(|c| c.count).collect()
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            VotingMethod::new("Plurality", 3).unwrap(),
            VotingMethod::Plurality { num_choices: 3 }
        );
        assert_eq!(VotingMethod::new("Approval", 1024).unwrap().num_choices(), 1024);
        assert!(matches!(
            VotingMethod::new("Borda", 3),
            Err(Error::NoSuchVotingMethod(_))
        ));
        assert!(matches!(
            VotingMethod::new("Plurality", 257),
            Err(Error::InvalidNumberOfChoices { .. })
        ));
        assert!(VotingMethod::new("Plurality", 256).is_ok());
        assert!(VotingMethod::new("Approval", 0).is_err());
        assert!(VotingMethod::new("Approval", 1025).is_err());
    }

    #[test]
    fn test_plurality() {
        let method = VotingMethod::new("Plurality", 3).unwrap();
        assert_eq!(method.vote(&[1]).unwrap().content, vec![1]);
        assert!(method.vote(&[3]).is_err());
        assert!(method.vote(&[0, 1]).is_err());
        assert!(method.vote(&[]).is_err());

        let tally = method.tally(&ballots(&[&[0x00], &[0x01], &[0x01], &[0xFF]]));
        assert_eq!(counts(&tally), vec![1, 2, 0]);
        assert_eq!(tally[1].index, 1);

        // Wrong length is excluded
        let tally = method.tally(&ballots(&[&[], &[0, 1], &[2]]));
        assert_eq!(counts(&tally), vec![0, 0, 1]);
    }

    #[test]
    fn test_approval() {
        let method = VotingMethod::new("Approval", 3).unwrap();
        assert_eq!(method.vote(&[0, 2]).unwrap().content, vec![1, 0, 1]);
        assert_eq!(method.vote(&[]).unwrap().content, vec![0, 0, 0]);
        assert_eq!(method.vote(&[2, 2]).unwrap().content, vec![0, 0, 1]);
        assert!(method.vote(&[3]).is_err());

        let tally = method.tally(&ballots(&[&[1, 0, 1], &[0, 0, 2]]));
        assert_eq!(counts(&tally), vec![1, 0, 1]);

        let tally = method.tally(&ballots(&[&[1, 1], &[1, 1, 1], &[0, 1, 1]]));
        assert_eq!(counts(&tally), vec![1, 2, 2]);
    }

    #[test]
    fn test_ordering() {
        let tally = vec![
            TallyCount { index: 0, count: 3 },
            TallyCount { index: 1, count: 5 },
            TallyCount { index: 2, count: 3 },
        ];
        let mut sorted = tally.clone();
        sorted.sort();
        assert_eq!(
            sorted.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 2, 1]
        );
        assert_eq!(
            ranked(&tally).iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![1, 0, 2]
        );
    }
}
