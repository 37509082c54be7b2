//! Checks a run's stolen credentials against the set the operator expected.

use crate::model::Credentials;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CredentialsAnalysis {
    AllStolen,
    CountMismatch { expected: usize, stolen: usize },
    ContentMismatch {
        missing: Vec<Credentials>,
        unexpected: Vec<Credentials>,
    },
}

impl CredentialsAnalysis {
    pub fn is_match(&self) -> bool {
        matches!(self, CredentialsAnalysis::AllStolen)
    }
}

/// Compares both sides as sets.
///
/// Duplicates collapse before counting, so a collector that reported the
/// same secret twice still matches. Cardinality is checked first; a
/// content mismatch is only reported when the counts agree.
pub fn analyze_stolen_credentials(
    expected: &[Credentials],
    stolen: &[Credentials],
) -> CredentialsAnalysis {
    let expected: BTreeSet<&Credentials> = expected.iter().collect();
    let stolen: BTreeSet<&Credentials> = stolen.iter().collect();

    if expected.len() != stolen.len() {
        return CredentialsAnalysis::CountMismatch {
            expected: expected.len(),
            stolen: stolen.len(),
        };
    }

    if expected == stolen {
        return CredentialsAnalysis::AllStolen;
    }

    CredentialsAnalysis::ContentMismatch {
        missing: expected.difference(&stolen).map(|c| (*c).clone()).collect(),
        unexpected: stolen.difference(&expected).map(|c| (*c).clone()).collect(),
    }
}

impl std::fmt::Display for CredentialsAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsAnalysis::AllStolen => write!(f, "All expected credentials were stolen"),
            CredentialsAnalysis::CountMismatch { expected, stolen } => write!(
                f,
                "Expected {} distinct credentials, {} were stolen",
                expected, stolen
            ),
            CredentialsAnalysis::ContentMismatch {
                missing,
                unexpected,
            } => write!(
                f,
                "Stolen credentials differ: {} missing, {} unexpected",
                missing.len(),
                unexpected.len()
            ),
        }
    }
}
