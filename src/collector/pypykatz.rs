//! Reader for pypykatz LSA dumps (`pypykatz lsa minidump <file> --json`).

use super::windows_credentials::WindowsCredentials;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-session credential packages that may carry secrets.
const CREDENTIAL_TYPES: [&str; 8] = [
    "msv_creds",
    "wdigest_creds",
    "ssp_creds",
    "livessp_creds",
    "dpapi_creds",
    "kerberos_creds",
    "credman_creds",
    "tspkg_creds",
];

/// Where the mimikatz collector gets its raw records from.
///
/// Reading a source may block; collectors call it off the async runtime.
pub trait WindowsCredentialsSource: Send + Sync {
    fn get_windows_credentials(&self) -> Result<Vec<WindowsCredentials>>;
}

impl<F> WindowsCredentialsSource for F
where
    F: Fn() -> Result<Vec<WindowsCredentials>> + Send + Sync,
{
    fn get_windows_credentials(&self) -> Result<Vec<WindowsCredentials>> {
        self()
    }
}

/// A pypykatz JSON dump on disk.
pub struct PypykatzDump {
    path: PathBuf,
}

impl PypykatzDump {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WindowsCredentialsSource for PypykatzDump {
    fn get_windows_credentials(&self) -> Result<Vec<WindowsCredentials>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read pypykatz dump: {:?}", self.path))?;
        parse_pypykatz_output(&content)
    }
}

/// Extracts raw records from pypykatz JSON output.
///
/// Accepts a single dump object (with `logon_sessions`) or a map of dump
/// file name to such objects. Entries with no password and no hashes are
/// skipped.
pub fn parse_pypykatz_output(content: &str) -> Result<Vec<WindowsCredentials>> {
    let root: Value = serde_json::from_str(content).context("Failed to parse pypykatz output")?;

    let dumps: Vec<&Value> = if root.get("logon_sessions").is_some() {
        vec![&root]
    } else {
        root.as_object()
            .map(|files| files.values().collect())
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    for dump in dumps {
        let Some(sessions) = dump.get("logon_sessions").and_then(Value::as_object) else {
            continue;
        };

        for session in sessions.values() {
            for cred_type in CREDENTIAL_TYPES {
                let entries = session.get(cred_type).and_then(Value::as_array);
                for entry in entries.into_iter().flatten() {
                    let record = to_windows_credentials(entry);
                    if has_secret(&record) {
                        records.push(record);
                    }
                }
            }
        }
    }

    Ok(records)
}

fn to_windows_credentials(entry: &Value) -> WindowsCredentials {
    WindowsCredentials {
        username: string_field(entry, "username"),
        password: string_field(entry, "password"),
        ntlm_hash: hash_field(entry, "NThash"),
        lm_hash: hash_field(entry, "LMHash"),
    }
}

fn has_secret(record: &WindowsCredentials) -> bool {
    !(record.password.is_empty() && record.ntlm_hash.is_empty() && record.lm_hash.is_empty())
}

fn string_field(entry: &Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Hashes appear either as hex strings or as raw byte arrays.
fn hash_field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(hex)) => hex.clone(),
        Some(Value::Array(bytes)) => bytes
            .iter()
            .filter_map(Value::as_u64)
            .filter_map(|b| u8::try_from(b).ok())
            .map(|b| format!("{:02x}", b))
            .collect(),
        _ => String::new(),
    }
}
