use rusty_ulid::Ulid;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Sortable record identifier. Lexicographic order follows creation time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct Eid(String);

impl Display for Eid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Eid {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Eid(s.to_string()))
    }
}

impl Deref for Eid {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Eid {
    fn from(fr: &str) -> Self {
        Eid(fr.to_string())
    }
}

impl Eid {
    #[inline]
    pub fn new() -> Eid {
        Eid(Ulid::generate().to_string().to_lowercase())
    }

    /// File name of the record this id belongs to.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl Default for Eid {
    fn default() -> Self {
        Self::new()
    }
}
