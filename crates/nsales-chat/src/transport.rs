//! Transport abstraction for streamed chat requests

use async_trait::async_trait;
use nsales_client::{ChatClient, ChunkStream, Result, StreamRequest};
use tokio_util::sync::CancellationToken;

/// Opens streamed replies for chat submissions
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue a request and return its chunk stream.
    ///
    /// Cancelling `cancel` must end the returned stream promptly.
    async fn open_stream(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream>;
}

/// HTTP transport backed by [`ChatClient`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ChatClient,
}

impl HttpTransport {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Underlying REST client
    pub fn client(&self) -> &ChatClient {
        &self.client
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        self.client.stream_message(&request, cancel).await
    }
}
