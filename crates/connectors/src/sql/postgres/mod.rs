pub mod bulk;
pub mod copy;
pub mod decode;
pub mod encoder;
pub mod metadata;
pub mod params;
pub mod query;
pub mod utils;
pub mod wire;

pub use bulk::bulk_load;
pub use query::{PgRowCursor, QueryRequest, QueryRunner};
