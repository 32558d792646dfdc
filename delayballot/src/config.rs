use crate::*;
use std::env::var;
use std::path::PathBuf;

pub const SECRETS_PATH_VAR: &str = "DELAYBALLOT_SECRETS_PATH";
pub const ELECTION_ID_VAR: &str = "DELAYBALLOT_ELECTION_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where a voter's local secrets are kept
    pub secrets_path: PathBuf,

    /// Secrets for different elections share one file, keyed by this id
    pub election_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secrets_path = match lookup(SECRETS_PATH_VAR) {
            Some(val) => PathBuf::from(val),
            None => PathBuf::from("./delayballot-secrets.json"),
        };

        let election_id = match lookup(ELECTION_ID_VAR) {
            Some(val) if !val.is_empty() => val,
            _ => return Err(Error::MissingConfig(ELECTION_ID_VAR)),
        };

        Ok(Config {
            secrets_path,
            election_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup() {
        let mut env = HashMap::new();
        env.insert(ELECTION_ID_VAR, "board-2021".to_owned());

        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.election_id, "board-2021");
        assert_eq!(config.secrets_path, PathBuf::from("./delayballot-secrets.json"));

        env.insert(SECRETS_PATH_VAR, "/tmp/secrets.json".to_owned());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.secrets_path, PathBuf::from("/tmp/secrets.json"));

        env.remove(ELECTION_ID_VAR);
        assert!(matches!(
            Config::from_lookup(|k| env.get(k).cloned()),
            Err(Error::MissingConfig(ELECTION_ID_VAR))
        ));
    }
}
