use std::fmt;
use std::str::FromStr;

/// Reviewer classification of a top-level record
///
/// Stored as a nullable integer column: NULL is `Unknown`, 0 is
/// `Individual`, 1 is `Group`. Linked children inherit their parent's
/// classification and are never classified on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupClassification {
    #[default]
    Unknown,
    Individual,
    Group,
}

impl GroupClassification {
    /// Converts the classification to its database column value
    pub fn to_db_value(&self) -> Option<i64> {
        match self {
            Self::Unknown => None,
            Self::Individual => Some(0),
            Self::Group => Some(1),
        }
    }

    /// Parses a classification from its database column value
    ///
    /// Any non-zero value is treated as a group, matching how SQLite stores
    /// booleans.
    pub fn from_db_value(value: Option<i64>) -> Self {
        match value {
            None => Self::Unknown,
            Some(0) => Self::Individual,
            Some(_) => Self::Group,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Individual => "individual",
            Self::Group => "group",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Unknown, Self::Individual, Self::Group]
    }
}

impl fmt::Display for GroupClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "individual" => Ok(Self::Individual),
            "group" => Ok(Self::Group),
            other => Err(format!(
                "unknown classification '{}', expected individual, group or unknown",
                other
            )),
        }
    }
}
