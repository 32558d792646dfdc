use crate::*;
use ed25519_dalek::SecretKey;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A voter's private state for an election.
///
/// Observers can tally and watch progress but hold no secrets.
pub enum Secrets {
    Observer,
    Local(LocalSecrets),
}

impl Secrets {
    pub fn private_key(&self) -> Result<SecretKey, Error> {
        self.local("private key")?.private_key()
    }

    pub fn secret_credential<C: CredentialSystem>(&self, system: &C) -> Result<SecretCredential, Error> {
        self.local("secret credential")?.secret_credential(system)
    }

    pub fn ballot(&self) -> Result<SignedBallot, Error> {
        self.local("ballot")?.ballot()
    }

    pub fn set_ballot(&self, ballot: &SignedBallot) -> Result<(), Error> {
        self.local("ballot")?.set_ballot(ballot)
    }

    pub fn vdf_solution(&self) -> Result<vdf::Solution, Error> {
        self.local("vdf solution")?.vdf_solution()
    }

    pub fn set_vdf_solution(&self, solution: &vdf::Solution) -> Result<(), Error> {
        self.local("vdf solution")?.set_vdf_solution(solution)
    }

    fn local(&self, op: &'static str) -> Result<&LocalSecrets, Error> {
        match self {
            Secrets::Observer => Err(Error::ObserverSecrets(op)),
            Secrets::Local(local) => Ok(local),
        }
    }
}

impl From<LocalSecrets> for Secrets {
    fn from(local: LocalSecrets) -> Self {
        Secrets::Local(local)
    }
}

/// Serialized form of the secrets file. All values are hex.
///
/// Ballots and solutions are keyed by election id.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct SecretsState {
    #[serde(default)]
    private_key: Option<String>,

    #[serde(default)]
    secret_credential: Option<String>,

    #[serde(default)]
    ballots: BTreeMap<String, String>,

    #[serde(default)]
    solutions: BTreeMap<String, String>,
}

/// Secrets held by the voter, optionally mirrored to a JSON file after every change.
pub struct LocalSecrets {
    election_id: String,
    path: Option<PathBuf>,
    state: Mutex<SecretsState>,
}

impl LocalSecrets {
    /// Secrets that live only as long as this value
    pub fn in_memory(election_id: impl Into<String>) -> Self {
        LocalSecrets {
            election_id: election_id.into(),
            path: None,
            state: Mutex::new(SecretsState::default()),
        }
    }

    /// Load the secrets file named by `config`, starting empty if it does not exist yet.
    pub fn open(config: &Config) -> Result<Self, Error> {
        Self::open_path(&config.secrets_path, config.election_id.clone())
    }

    pub fn open_path(path: &Path, election_id: impl Into<String>) -> Result<Self, Error> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            SecretsState::default()
        };

        Ok(LocalSecrets {
            election_id: election_id.into(),
            path: Some(path.to_owned()),
            state: Mutex::new(state),
        })
    }

    /// Provision a fresh Ed25519 key and secret credential, replacing any existing ones.
    pub fn generate<C: CredentialSystem>(&self, system: &C) -> Result<(), Error> {
        let (secret_key, _) = generate_keypair();
        let credential = system.generate_secret_credential()?;

        self.update(|state| {
            state.private_key = Some(hex::encode(secret_key.as_bytes()));
            state.secret_credential = Some(hex::encode(&credential.to_bytes()[..]));
        })
    }

    pub fn election_id(&self) -> &str {
        &self.election_id
    }

    pub fn private_key(&self) -> Result<SecretKey, Error> {
        let bytes = self.read(|s| s.private_key.clone(), "private key")?;
        Ok(SecretKey::from_bytes(&bytes)?)
    }

    pub fn set_private_key(&self, secret_key: &SecretKey) -> Result<(), Error> {
        self.update(|state| state.private_key = Some(hex::encode(secret_key.as_bytes())))
    }

    pub fn secret_credential<C: CredentialSystem>(&self, system: &C) -> Result<SecretCredential, Error> {
        let bytes = self.read(|s| s.secret_credential.clone(), "secret credential")?;
        Ok(system.secret_credential_from_bytes(&bytes)?)
    }

    pub fn set_secret_credential(&self, credential: &SecretCredential) -> Result<(), Error> {
        self.update(|state| state.secret_credential = Some(hex::encode(&credential.to_bytes()[..])))
    }

    pub fn ballot(&self) -> Result<SignedBallot, Error> {
        let bytes = self.read(|s| s.ballots.get(&self.election_id).cloned(), "ballot")?;
        Ok(SignedBallot::from_bytes(&bytes)?)
    }

    pub fn set_ballot(&self, ballot: &SignedBallot) -> Result<(), Error> {
        let encoded = hex::encode(ballot.to_bytes());
        self.update(|state| {
            state.ballots.insert(self.election_id.clone(), encoded);
        })
    }

    pub fn vdf_solution(&self) -> Result<vdf::Solution, Error> {
        let bytes = self.read(|s| s.solutions.get(&self.election_id).cloned(), "vdf solution")?;
        Ok(vdf::Solution::from_bytes(&bytes)?)
    }

    pub fn set_vdf_solution(&self, solution: &vdf::Solution) -> Result<(), Error> {
        let encoded = hex::encode(solution.to_bytes());
        self.update(|state| {
            state.solutions.insert(self.election_id.clone(), encoded);
        })
    }

    fn read<F>(&self, field: F, name: &'static str) -> Result<Vec<u8>, Error>
    where
        F: FnOnce(&SecretsState) -> Option<String>,
    {
        let value = field(&*self.lock()).ok_or(Error::MissingSecret(name))?;
        Ok(hex::decode(value)?)
    }

    // The state is only ever replaced whole, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<SecretsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `change` to a copy of the state and keep it only once it is on disk.
    fn update<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SecretsState),
    {
        let mut state = self.lock();
        let mut next = state.clone();
        change(&mut next);
        self.save(&next)?;
        *state = next;
        Ok(())
    }

    /// Write the whole file next to the old one, then rename it into place.
    fn save(&self, state: &SecretsState) -> Result<(), Error> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let contents = serde_json::to_string_pretty(state)?;
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::MockCredentials;

    fn solution() -> vdf::Solution {
        vdf::Solution {
            input: vec![1; 8],
            output: vec![2; 4],
            proof: vec![3; 4],
        }
    }

    #[test]
    fn test_observer() {
        let secrets = Secrets::Observer;
        assert!(matches!(
            secrets.private_key(),
            Err(Error::ObserverSecrets("private key"))
        ));
        assert!(matches!(
            secrets.secret_credential(&MockCredentials),
            Err(Error::ObserverSecrets(_))
        ));
        assert!(matches!(secrets.ballot(), Err(Error::ObserverSecrets(_))));
        assert!(matches!(
            secrets.set_vdf_solution(&solution()),
            Err(Error::ObserverSecrets("vdf solution"))
        ));
    }

    #[test]
    fn test_in_memory() {
        let secrets = Secrets::from(LocalSecrets::in_memory("e1"));
        assert!(matches!(secrets.private_key(), Err(Error::MissingSecret(_))));
        assert!(matches!(secrets.vdf_solution(), Err(Error::MissingSecret(_))));

        secrets.set_vdf_solution(&solution()).unwrap();
        assert_eq!(secrets.vdf_solution().unwrap(), solution());

        if let Secrets::Local(local) = &secrets {
            local.generate(&MockCredentials).unwrap();
        }
        let key = secrets.private_key().unwrap();
        let credential = secrets.secret_credential(&MockCredentials).unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert_eq!(credential.serial_no, hash(&credential.public.0));
    }

    #[test]
    fn test_file_persistence() {
        let path = std::env::temp_dir().join(format!(
            "delayballot-secrets-test-{}.json",
            hex::encode(&hash(&rand::random::<[u8; 16]>())[..8])
        ));

        let first = LocalSecrets::open_path(&path, "election-a").unwrap();
        first.generate(&MockCredentials).unwrap();
        first.set_vdf_solution(&solution()).unwrap();
        let key = first.private_key().unwrap();

        // Same file, same election
        let reopened = LocalSecrets::open_path(&path, "election-a").unwrap();
        assert_eq!(reopened.private_key().unwrap().as_bytes(), key.as_bytes());
        assert_eq!(reopened.vdf_solution().unwrap(), solution());

        // Same file, different election: keys are shared, solutions are not
        let other = LocalSecrets::open_path(&path, "election-b").unwrap();
        assert_eq!(other.private_key().unwrap().as_bytes(), key.as_bytes());
        assert!(matches!(other.vdf_solution(), Err(Error::MissingSecret(_))));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_save_keeps_old_state() {
        let dir = std::env::temp_dir().join(format!(
            "delayballot-missing-{}",
            hex::encode(&hash(&rand::random::<[u8; 16]>())[..8])
        ));
        let secrets = LocalSecrets::open_path(&dir.join("secrets.json"), "election-a").unwrap();

        // The directory does not exist, so nothing can be written
        assert!(matches!(
            secrets.set_vdf_solution(&solution()),
            Err(Error::Io(_))
        ));
        assert!(matches!(secrets.vdf_solution(), Err(Error::MissingSecret(_))));

        std::fs::create_dir(&dir).unwrap();
        secrets.set_vdf_solution(&solution()).unwrap();
        assert_eq!(secrets.vdf_solution().unwrap(), solution());
        assert!(dir.join("secrets.json").exists());
        assert!(!dir.join("secrets.json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
