pub mod db;
pub mod extractor;
pub mod remote;

pub use db::PgLocalStore;
pub use extractor::TextExtractor;
pub use remote::HttpRemoteStore;
