use model::core::value::Value;

/// Provides database-specific CSV encoding for COPY style ingestion.
pub trait CopyValueEncoder {
    /// Encodes a concrete value into the backend's CSV representation.
    fn encode_value(&self, value: &Value) -> String;

    /// Encodes a SQL NULL into its CSV literal form (e.g. `\N`).
    fn encode_null(&self) -> String;

    /// Encodes a cell, sending empty strings as NULL when `empty_as_null` is set.
    fn encode_cell(&self, value: &Value, empty_as_null: bool) -> String {
        if value.is_null() || (empty_as_null && value.is_empty_string()) {
            self.encode_null()
        } else {
            self.encode_value(value)
        }
    }
}
