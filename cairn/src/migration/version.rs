use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A migration version, conventionally the unix timestamp of its creation.
///
/// `MigrationVersion::ZERO` is the state before any migration ran.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MigrationVersion(u64);

impl MigrationVersion {
    pub const ZERO: MigrationVersion = MigrationVersion(0);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    /// Get the version number
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for MigrationVersion {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

impl FromStr for MigrationVersion {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl std::fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering_and_display() {
        let a = MigrationVersion::new(1710955091);
        let b: MigrationVersion = "1733513436".parse().unwrap();
        assert!(a < b);
        assert!(MigrationVersion::ZERO < a);
        assert_eq!(b.to_string(), "1733513436");
        assert!("v12".parse::<MigrationVersion>().is_err());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert_eq!(Direction::Up.to_string(), "up");
        assert!("sideways".parse::<Direction>().is_err());
    }
}
