//! HTTP transport for SOAP calls.

use std::future::Future;
use std::time::Duration;

use crate::core::SriError;

/// Posts a SOAP envelope and returns the raw response body.
///
/// Implementations return [`SriError::Transport`] for connection failures,
/// timeouts and non-2xx statuses. Parsing is left to the caller.
pub trait SoapTransport: Send + Sync {
    fn post(&self, url: &str, body: String) -> impl Future<Output = Result<String, SriError>> + Send;
}

/// [`SoapTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, SriError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SriError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SoapTransport for HttpTransport {
    async fn post(&self, url: &str, body: String) -> Result<String, SriError> {
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "")
            .body(body)
            .send()
            .await
            .map_err(|e| SriError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SriError::Transport(e.to_string()))?;

        // The SRI answers faults with HTTP 500 and a SOAP body; let the parser
        // surface the faultstring.
        if status.is_server_error() && text.contains("Fault") {
            return Ok(text);
        }
        if !status.is_success() {
            return Err(SriError::Transport(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }
}

impl<T: SoapTransport> SoapTransport for std::sync::Arc<T> {
    fn post(&self, url: &str, body: String) -> impl Future<Output = Result<String, SriError>> + Send {
        (**self).post(url, body)
    }
}
