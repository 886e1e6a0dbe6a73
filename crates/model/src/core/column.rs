use crate::core::data_type::ColumnType;
use serde::{Deserialize, Serialize};

/// Name, declared type and position of one column of a cursor or dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name exactly as reported by the source (e.g. `varchar`, `timestamptz`).
    pub type_name: String,
    pub column_type: ColumnType,
    pub ordinal: usize,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, ordinal: usize) -> Self {
        let type_name = type_name.into();
        ColumnDescriptor {
            name: name.into(),
            column_type: ColumnType::from_type_name(&type_name),
            type_name,
            ordinal,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
