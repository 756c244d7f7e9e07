//! Durable username/password registry.
//!
//! The backing store is a flat file of `username:password` records,
//! one per line. The whole file is loaded at open and re-read after
//! every append so records written by concurrent processes are picked
//! up.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("username already exists")]
    UsernameTaken,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct CredentialStore {
    path: PathBuf,
    users: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    /// Open the registry, creating the backing file if it is missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let users = Self::load_file(&path)?;
        tracing::info!(path = %path.display(), users = users.len(), "credential registry loaded");
        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    fn load_file(path: &Path) -> io::Result<HashMap<String, String>> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mut users = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some((user, pass)) = line.split_once(':') {
                users.insert(user.to_string(), pass.to_string());
            }
        }
        Ok(users)
    }

    /// Persist a new credential pair. Fails with [`CredentialError::UsernameTaken`]
    /// if the username is already registered. On success the record is
    /// appended to the backing file and the in-memory map reloaded from
    /// disk, so appends from other writers become visible as well.
    pub fn register(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let mut users = self.users.lock();
        if users.contains_key(username) {
            return Err(CredentialError::UsernameTaken);
        }
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{username}:{password}")?;
        *users = Self::load_file(&self.path)?;
        tracing::info!(%username, "registered new user");
        Ok(())
    }

    /// Plain equality against the stored password. Passwords are kept
    /// and compared in the clear.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users
            .lock()
            .get(username)
            .is_some_and(|stored| stored == password)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.lock().contains_key(username)
    }
}
