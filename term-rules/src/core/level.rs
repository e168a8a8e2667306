//! Violation severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The severity of a check or of a recorded violation.
///
/// Severities are ordered: `Critical > Error > Warning`. A `Critical`
/// violation stops the processing of the remaining violations of the same
/// batch.
///
/// # Examples
///
/// ```rust
/// use term_rules::core::Severity;
///
/// assert!(Severity::Critical > Severity::Error);
/// assert!(Severity::Error > Severity::Warning);
/// assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Should be looked at, does not make the data unusable
    Warning = 0,
    /// The data does not satisfy the rule
    #[default]
    Error = 1,
    /// The data is unsound; further analysis of the batch is pointless
    Critical = 2,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Checks if this severity is at least as severe as another one.
    pub fn is_at_least(&self, other: Severity) -> bool {
        *self >= other
    }

    /// Returns true for [`Severity::Critical`].
    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown error level '{other}', expected one of warning, error, critical"
            )),
        }
    }
}
