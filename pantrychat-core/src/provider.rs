use async_trait::async_trait;

use crate::error::CoreResult;
use crate::http_client::ByteStream;
use crate::model::GenerationRequest;

/// A generation backend that streams raw NDJSON bytes.
///
/// The returned stream is the session's upstream handle: an `Ok` item is a
/// chunk, an `Err` item is a connection-level failure, and the end of the
/// stream is a clean close. Dropping it must release the connection.
/// Implementations do not retry.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_stream(&self, req: &GenerationRequest) -> CoreResult<ByteStream>;

    /// Cheap reachability probe. Default assumes reachable.
    async fn health(&self) -> CoreResult<()> {
        Ok(())
    }
}
