use crate::error::CredentialsError;
use serde::{Deserialize, Serialize};

/// Who a secret belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identity {
    #[serde(rename = "username")]
    Username(String),
}

impl Identity {
    pub fn username(name: impl Into<String>) -> Self {
        Identity::Username(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identity::Username(name) => name,
        }
    }
}

/// A usable secret, either plaintext or one of the Windows hash forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Secret {
    #[serde(rename = "password")]
    Password(String),
    #[serde(rename = "nt_hash")]
    NtHash(String),
    #[serde(rename = "lm_hash")]
    LmHash(String),
}

impl Secret {
    pub fn password(password: impl Into<String>) -> Self {
        Secret::Password(password.into())
    }

    /// Builds an NT hash secret; the value must be 32 hex digits.
    pub fn nt_hash(value: impl Into<String>) -> Result<Self, CredentialsError> {
        let value = value.into();
        validate_hash("NT", &value)?;
        Ok(Secret::NtHash(value))
    }

    /// Builds an LM hash secret; the value must be 32 hex digits.
    pub fn lm_hash(value: impl Into<String>) -> Result<Self, CredentialsError> {
        let value = value.into();
        validate_hash("LM", &value)?;
        Ok(Secret::LmHash(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Secret::Password(_) => "password",
            Secret::NtHash(_) => "nt_hash",
            Secret::LmHash(_) => "lm_hash",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Secret::Password(v) | Secret::NtHash(v) | Secret::LmHash(v) => v,
        }
    }

    fn validate(&self) -> Result<(), CredentialsError> {
        match self {
            Secret::Password(_) => Ok(()),
            Secret::NtHash(v) => validate_hash("NT", v),
            Secret::LmHash(v) => validate_hash("LM", v),
        }
    }
}

fn validate_hash(kind: &'static str, value: &str) -> Result<(), CredentialsError> {
    if value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(CredentialsError::InvalidHash {
            kind,
            value: value.to_string(),
        })
    }
}

/// An `(identity, secret)` pair. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "CredentialsRecord")]
pub struct Credentials {
    identity: Option<Identity>,
    secret: Option<Secret>,
}

#[derive(Deserialize)]
struct CredentialsRecord {
    #[serde(default)]
    identity: Option<Identity>,
    #[serde(default)]
    secret: Option<Secret>,
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = CredentialsError;

    fn try_from(record: CredentialsRecord) -> Result<Self, Self::Error> {
        if let Some(secret) = &record.secret {
            secret.validate()?;
        }
        Credentials::new(record.identity, record.secret)
    }
}

impl Credentials {
    pub fn new(identity: Option<Identity>, secret: Option<Secret>) -> Result<Self, CredentialsError> {
        if identity.is_none() && secret.is_none() {
            return Err(CredentialsError::Empty);
        }
        Ok(Self { identity, secret })
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }
}
