//! Transport trait definitions.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use studylink_core::EvaluateRequest;

/// Raw byte stream from the evaluation service.
///
/// Dropping the stream aborts the underlying connection; that is how
/// cancellation reaches the wire.
pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Vec<u8>>> + Send>>;

/// Boundary to the external classification pipeline.
///
/// One call opens one streaming evaluation; the caller owns the returned
/// stream and its lifetime. Implementations must not buffer whole
/// responses - chunks are handed over as they arrive.
#[async_trait]
pub trait EvaluationTransport: Send + Sync {
    /// Open a streaming evaluation for the given request body.
    async fn open_stream(&self, request: &EvaluateRequest) -> anyhow::Result<ByteStream>;
}
