pub mod emitter;
pub mod encoding;
pub mod error;
pub mod header;
pub mod pattern;
pub mod streamer;
pub mod value;

pub use emitter::CsvEmitter;
pub use encoding::{EncodingWriter, OutputEncoding};
pub use error::ExportError;
pub use streamer::{PreparedExport, stream_to_csv};
