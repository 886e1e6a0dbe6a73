pub mod core;
pub mod error;
pub mod options;
pub mod records;
