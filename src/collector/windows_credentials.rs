use crate::model::{Credentials, Identity, Secret};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One raw record from an LSA secrets dump. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsCredentials {
    pub username: String,
    pub password: String,
    pub ntlm_hash: String,
    pub lm_hash: String,
}

impl WindowsCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        ntlm_hash: impl Into<String>,
        lm_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ntlm_hash: ntlm_hash.into(),
            lm_hash: lm_hash.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
            && self.password.is_empty()
            && self.ntlm_hash.is_empty()
            && self.lm_hash.is_empty()
    }
}

/// Turns raw dump records into credentials.
///
/// A record yields one `(identity, password)` entry when either side is
/// present, then one `(identity, hash)` entry per hash it carries, LM first.
/// Duplicate records give duplicate entries.
pub fn to_credentials(records: &[WindowsCredentials]) -> Vec<Credentials> {
    let mut credentials = Vec::new();

    for record in records {
        let identity = non_empty(&record.username).map(Identity::username);
        let password = non_empty(&record.password).map(Secret::password);

        if identity.is_some() || password.is_some() {
            credentials.extend(Credentials::new(identity.clone(), password).ok());
        }

        let hashes = [
            non_empty(&record.lm_hash).map(Secret::lm_hash),
            non_empty(&record.ntlm_hash).map(Secret::nt_hash),
        ];
        for hash in hashes.into_iter().flatten() {
            match hash.and_then(|secret| Credentials::new(identity.clone(), Some(secret))) {
                Ok(entry) => credentials.push(entry),
                Err(e) => debug!(error = %e, "Skipping unusable hash"),
            }
        }
    }

    credentials
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
