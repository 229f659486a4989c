use serde::{Deserialize, Serialize};

use super::BackendKind;

/// Status reported by [`DatabaseInfo`], the connection is not checked.
pub const STATUS_CONNECTED: &str = "connected";

/// Outcome of a record migration between two backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub success: bool,
    pub message: String,
    pub synced_count: usize,
    /// Leading per-record errors, truncated to
    /// [`crate::params::MIGRATION_REPORTED_ERRORS`] entries.
    pub errors: Vec<String>,
}

impl MigrationReport {
    /// A migration that did not run to completion.
    pub fn failed(message: impl Into<String>, synced_count: usize) -> Self {
        Self {
            success: false,
            message: message.into(),
            synced_count,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    pub status: String,
}

impl DatabaseInfo {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            status: STATUS_CONNECTED.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_info_shape() {
        let info = serde_json::to_value(DatabaseInfo::new(BackendKind::Hcd)).unwrap();
        assert_eq!(info, serde_json::json!({ "type": "hcd", "status": "connected" }));
    }
}
