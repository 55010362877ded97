//! HTTP transport for the evaluation service.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, error, instrument};

use studylink_core::{Config, Error, EvaluateRequest, TransportError};

use crate::traits::{ByteStream, EvaluationTransport};

/// Path of the streaming evaluation endpoint.
const STREAM_PATH: &str = "/evaluate/stream";

/// Reqwest-backed transport for the evaluation service.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a transport from configuration.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.limits.connect_timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.service.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The service base URL this transport targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EvaluationTransport for HttpTransport {
    #[instrument(skip(self, request), fields(report = request.report.crg_report_id))]
    async fn open_stream(&self, request: &EvaluateRequest) -> anyhow::Result<ByteStream> {
        debug!(studies = request.studies.len(), "opening evaluation stream");

        let response = self
            .client
            .post(format!("{}{}", self.base_url, STREAM_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "evaluation service rejected the request");
            return Err(TransportError::api(status.as_u16(), body).into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| -> anyhow::Result<Vec<u8>> {
                match chunk {
                    Ok(bytes) => Ok(bytes.to_vec()),
                    Err(e) => Err(TransportError::body(e.to_string()).into()),
                }
            });

        Ok(Box::pin(stream))
    }
}
