mod codec;
mod errors;
mod service;
mod source;

pub use codec::export_memos;
pub use errors::CsvError;
pub use service::{CollisionPolicy, ImportService, ImportSummary};
pub use source::read_source;
