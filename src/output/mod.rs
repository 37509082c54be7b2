mod cli;
mod json;

pub use cli::{credentials_table, fingerprint_table, releases_table};
pub use json::print_json;

use crate::analyzer::CredentialsAnalysis;
use crate::model::{Credentials, HostFingerprint};
use crate::plugin::{AgentPluginMetadata, AgentPluginRepositoryIndex};
use anyhow::Result;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_fingerprints(fingerprints: &[HostFingerprint], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            cli::print_fingerprints_table(fingerprints);
            Ok(())
        }
        OutputFormat::Json => print_json(fingerprints),
    }
}

pub fn print_credentials(credentials: &[Credentials], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            cli::print_credentials_table(credentials);
            Ok(())
        }
        OutputFormat::Json => print_json(credentials),
    }
}

pub fn print_index(index: &AgentPluginRepositoryIndex, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            cli::print_index_table(index);
            Ok(())
        }
        OutputFormat::Json => print_json(index),
    }
}

pub fn print_release(release: &AgentPluginMetadata, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            cli::print_release_table(release);
            Ok(())
        }
        OutputFormat::Json => print_json(release),
    }
}

pub fn print_analysis(analysis: &CredentialsAnalysis, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            cli::print_analysis_text(analysis);
            Ok(())
        }
        OutputFormat::Json => print_json(analysis),
    }
}
