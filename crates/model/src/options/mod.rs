pub mod format;
pub mod load;

/// Lowercases and drops separators so `Read-Committed`, `read_committed` and
/// `ReadCommitted` name the same enumerant.
pub(crate) fn normalize_variant(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lets serde accept every spelling `FromStr` accepts.
macro_rules! impl_try_from_string {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = crate::error::ModelError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )+
    };
}

impl_try_from_string!(
    format::FieldDelimiter,
    format::LineBreak,
    format::FileEncoding,
    load::IsolationLevel,
);
