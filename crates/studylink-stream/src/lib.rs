//! # studylink-stream
//!
//! Wire layer for Studylink.
//!
//! This crate provides:
//! - Line-buffered decoder for the evaluation event stream
//! - Transport trait abstracting the evaluation service
//! - HTTP transport implementation

pub mod decoder;
pub mod http;
pub mod traits;

pub use decoder::StreamDecoder;
pub use http::HttpTransport;
pub use traits::{ByteStream, EvaluationTransport};
