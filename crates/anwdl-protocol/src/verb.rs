//! The three request verbs understood by both the binary and HTTP surfaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    /// Provision a new container/VM and return its access credentials.
    Create,
    /// Tear down a previously provisioned container/VM.
    Destroy,
    /// Report server runtime statistics.
    Stat,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "CREATE",
            Self::Destroy => "DESTROY",
            Self::Stat => "STAT",
        };
        f.write_str(s)
    }
}

/// Error returned when a string does not name a known verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVerb(pub String);

impl fmt::Display for UnknownVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown verb: {}", self.0)
    }
}

impl std::error::Error for UnknownVerb {}

impl FromStr for Verb {
    type Err = UnknownVerb;

    /// Parses a verb case-insensitively, matching the HTTP surface's path
    /// segment normalization.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "DESTROY" => Ok(Self::Destroy),
            "STAT" => Ok(Self::Stat),
            other => Err(UnknownVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("create".parse::<Verb>().unwrap(), Verb::Create);
        assert_eq!("Destroy".parse::<Verb>().unwrap(), Verb::Destroy);
        assert_eq!("STAT".parse::<Verb>().unwrap(), Verb::Stat);
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!("DELETE".parse::<Verb>().is_err());
    }
}
