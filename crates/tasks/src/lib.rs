pub mod error;
pub mod export;
pub mod load;

pub use error::TaskError;
pub use export::{ExportInput, ExportOutput, save_query_to_csv};
pub use load::{BulkInsertInput, bulk_insert};
