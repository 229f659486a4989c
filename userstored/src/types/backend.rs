use serde::{Deserialize, Serialize};

use crate::params::ConfigError;

/// Storage service a facade is bound to.
///
/// The selector is read once from configuration and never changes for the
/// lifetime of a facade.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Document database, the primary store.
    #[default]
    Mongodb,
    /// DataStax HCD exposing the Data API.
    Hcd,
    /// DataStax Astra DB exposing the Data API.
    Astra,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mongodb => "mongodb",
            Self::Hcd => "hcd",
            Self::Astra => "astra",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mongodb" => Ok(Self::Mongodb),
            "hcd" => Ok(Self::Hcd),
            "astra" => Ok(Self::Astra),
            _ => Err(ConfigError::UnsupportedBackend(value.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn from_str() {
        assert_eq!(BackendKind::from_str("mongodb").unwrap(), BackendKind::Mongodb);
        assert_eq!(BackendKind::from_str("hcd").unwrap(), BackendKind::Hcd);
        assert_eq!(BackendKind::from_str("astra").unwrap(), BackendKind::Astra);

        let err = BackendKind::from_str("postgres").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedBackend(v) if v == "postgres"));
    }

    #[test]
    fn to_str() {
        assert_eq!("mongodb", BackendKind::Mongodb.to_string());
        assert_eq!("hcd", BackendKind::Hcd.to_string());
        assert_eq!("astra", BackendKind::Astra.to_string());
    }

    #[test]
    fn default_is_mongodb() {
        assert_eq!(BackendKind::default(), BackendKind::Mongodb);
    }
}
