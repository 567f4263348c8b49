//! Environment-driven configuration.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `SRI_ENVIRONMENT` | `test`/`1` or `production`/`2` | `test` |
//! | `SRI_TIMEOUT_SECS` | HTTP timeout | `30` |
//! | `SRI_FALLBACK` | `propagate` or `synthesize` | `propagate` |
//! | `SRI_AUTH_MAX_ATTEMPTS` | authorization queries | `3` |
//! | `SRI_AUTH_DELAY_MS` | wait before and between queries | `3000` |
//! | `SRI_TEST_RECEPTION_URL` etc. | endpoint overrides | official URLs |
//! | `SRI_CERT_PATH` | PKCS#12 file | none |
//! | `SRI_CERT_PASSWORD` | PKCS#12 password | none |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Environment, SriError};
use crate::gateway::{GatewayConfig, HttpTransport, SriEndpoints, SriGateway, TransportFailurePolicy};
use crate::pipeline::{InvoicePipeline, PollPolicy};
use crate::signing::{FileCertificateProvider, XadesSigner};

#[derive(Clone, Serialize, Deserialize)]
pub struct SriConfig {
    pub gateway: GatewayConfig,
    pub poll: PollPolicy,
    pub certificate_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub certificate_password: Option<String>,
}

impl std::fmt::Debug for SriConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SriConfig")
            .field("gateway", &self.gateway)
            .field("poll", &self.poll)
            .field("certificate_path", &self.certificate_path)
            .field(
                "certificate_password",
                &self.certificate_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl SriConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, SriError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank values take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SriError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("SRI_ENVIRONMENT").as_deref() {
            None => Environment::Test,
            Some(v) => parse_environment(v)?,
        };

        let mut endpoints = SriEndpoints::default();
        if let Some(url) = get("SRI_TEST_RECEPTION_URL") {
            endpoints.test.reception = url;
        }
        if let Some(url) = get("SRI_TEST_AUTHORIZATION_URL") {
            endpoints.test.authorization = url;
        }
        if let Some(url) = get("SRI_PRODUCTION_RECEPTION_URL") {
            endpoints.production.reception = url;
        }
        if let Some(url) = get("SRI_PRODUCTION_AUTHORIZATION_URL") {
            endpoints.production.authorization = url;
        }

        let mut gateway = GatewayConfig::new(environment).with_endpoints(endpoints);
        if let Some(secs) = get("SRI_TIMEOUT_SECS") {
            gateway = gateway.with_timeout(Duration::from_secs(parse_number("SRI_TIMEOUT_SECS", &secs)?));
        }
        if let Some(policy) = get("SRI_FALLBACK") {
            gateway = gateway.with_transport_failure_policy(parse_policy(&policy)?);
        }

        let mut poll = PollPolicy::default();
        if let Some(n) = get("SRI_AUTH_MAX_ATTEMPTS") {
            poll.max_attempts = parse_number("SRI_AUTH_MAX_ATTEMPTS", &n)?;
        }
        if let Some(ms) = get("SRI_AUTH_DELAY_MS") {
            let delay = Duration::from_millis(parse_number("SRI_AUTH_DELAY_MS", &ms)?);
            poll.initial_delay = delay;
            poll.retry_delay = delay;
        }

        Ok(Self {
            gateway,
            poll,
            certificate_path: get("SRI_CERT_PATH").map(PathBuf::from),
            certificate_password: get("SRI_CERT_PASSWORD"),
        })
    }

    /// Gateway over HTTPS with the configured timeout.
    pub fn http_gateway(&self) -> Result<SriGateway<HttpTransport>, SriError> {
        let transport = HttpTransport::new(self.gateway.timeout)?;
        Ok(SriGateway::new(self.gateway.clone(), transport))
    }

    /// Signer reading the certificate file on every signature.
    pub fn file_signer(&self) -> Result<XadesSigner<FileCertificateProvider>, SriError> {
        let path = self
            .certificate_path
            .as_ref()
            .ok_or_else(|| SriError::Config("SRI_CERT_PATH is not set".into()))?;
        let password = self
            .certificate_password
            .as_ref()
            .ok_or_else(|| SriError::Config("SRI_CERT_PASSWORD is not set".into()))?;
        Ok(XadesSigner::new(FileCertificateProvider::new(path.clone()), password.clone()))
    }

    pub fn pipeline(&self) -> Result<InvoicePipeline<FileCertificateProvider, HttpTransport>, SriError> {
        Ok(InvoicePipeline::new(self.file_signer()?, self.http_gateway()?).with_poll_policy(self.poll))
    }
}

fn parse_environment(value: &str) -> Result<Environment, SriError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "test" | "pruebas" => Ok(Environment::Test),
        "2" | "production" | "produccion" => Ok(Environment::Production),
        other => Err(SriError::Config(format!("unknown SRI_ENVIRONMENT '{other}'"))),
    }
}

fn parse_policy(value: &str) -> Result<TransportFailurePolicy, SriError> {
    match value.to_ascii_lowercase().as_str() {
        "propagate" => Ok(TransportFailurePolicy::PropagateError),
        "synthesize" => Ok(TransportFailurePolicy::SynthesizeSuccess),
        other => Err(SriError::Config(format!("unknown SRI_FALLBACK '{other}'"))),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, SriError> {
    value
        .parse()
        .map_err(|_| SriError::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}
