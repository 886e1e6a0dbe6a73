use crate::{error::ModelError, options::normalize_variant};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum IsolationLevel {
    /// Transaction at the server's default level.
    #[default]
    Default,
    ReadCommitted,
    /// No explicit transaction; the copy runs as a single statement.
    None,
    Serializable,
    ReadUncommitted,
    RepeatableRead,
    Snapshot,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Default => "default",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::None => "none",
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Snapshot => "snapshot",
        }
    }

    pub fn uses_transaction(&self) -> bool {
        !matches!(self, IsolationLevel::None)
    }
}

impl FromStr for IsolationLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "default" => Ok(IsolationLevel::Default),
            "readcommitted" => Ok(IsolationLevel::ReadCommitted),
            "none" => Ok(IsolationLevel::None),
            "serializable" => Ok(IsolationLevel::Serializable),
            "readuncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "repeatableread" => Ok(IsolationLevel::RepeatableRead),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            _ => Err(ModelError::UnknownVariant {
                kind: "isolation level",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoadOptions {
    /// Seconds before the load is aborted; 0 disables the limit.
    pub command_timeout_seconds: u64,
    pub fire_triggers: bool,
    pub keep_identity: bool,
    #[serde(alias = "convert_empty_property_values_to_null")]
    pub convert_empty_to_null: bool,
    #[serde(alias = "sql_transaction_isolation_level")]
    pub isolation_level: IsolationLevel,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            command_timeout_seconds: 60,
            fire_triggers: false,
            keep_identity: false,
            convert_empty_to_null: false,
            isolation_level: IsolationLevel::Default,
        }
    }
}

impl LoadOptions {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
