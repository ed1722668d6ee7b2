pub mod document;
pub mod fetch;

pub use document::{load_document, load_documents, parse_document};
pub use fetch::{DefaultFetcher, Fetch, FileFetcher, HttpFetcher, join_location};
