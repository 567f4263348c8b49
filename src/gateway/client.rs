//! [`SriGateway`]: reception and authorization calls with the configured
//! transport-failure policy.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{GatewayConfig, TransportFailurePolicy};
use super::soap::{
    self, AuthorizationResponse, AuthorizationStatus, ReceptionResponse, ReceptionStatus,
};
use super::transport::SoapTransport;
use crate::core::{SriError, SriMessage, validate_access_key_format};

/// Outcome of `validarComprobante`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionResult {
    pub status: ReceptionStatus,
    pub messages: Vec<SriMessage>,
    /// `true` when the SRI was never reached and the result was synthesized.
    pub simulated: bool,
}

impl ReceptionResult {
    pub fn is_received(&self) -> bool {
        self.status == ReceptionStatus::Received
    }

    fn synthesized() -> Self {
        Self {
            status: ReceptionStatus::Received,
            messages: Vec::new(),
            simulated: true,
        }
    }
}

impl From<ReceptionResponse> for ReceptionResult {
    fn from(resp: ReceptionResponse) -> Self {
        let status = if resp.is_already_registered() {
            ReceptionStatus::Received
        } else {
            resp.status
        };
        Self {
            status,
            messages: resp.messages,
            simulated: false,
        }
    }
}

/// Coarse authorization state handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationState {
    Authorized,
    /// Not decided yet; ask again later.
    InProcess,
    /// Terminal. See [`AuthorizationResult::messages`].
    Rejected,
}

/// Outcome of `autorizacionComprobante`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub access_key: String,
    pub status: AuthorizationState,
    pub number: Option<String>,
    pub authorized_at: Option<String>,
    pub environment: Option<String>,
    /// The authorized `comprobante` as returned by the SRI.
    pub authorized_xml: Option<String>,
    pub messages: Vec<SriMessage>,
    pub simulated: bool,
}

impl AuthorizationResult {
    pub fn is_authorized(&self) -> bool {
        self.status == AuthorizationState::Authorized
    }

    fn from_response(access_key: &str, resp: AuthorizationResponse) -> Self {
        let status = match resp.status() {
            AuthorizationStatus::Authorized => AuthorizationState::Authorized,
            AuthorizationStatus::NotAuthorized => AuthorizationState::Rejected,
            AuthorizationStatus::InProcess => AuthorizationState::InProcess,
        };
        match resp.decisive().cloned() {
            Some(entry) => Self {
                access_key: access_key.to_string(),
                status,
                number: entry.number,
                authorized_at: entry.authorized_at,
                environment: entry.environment,
                authorized_xml: entry.document,
                messages: entry.messages,
                simulated: false,
            },
            None => Self {
                access_key: access_key.to_string(),
                status,
                number: None,
                authorized_at: None,
                environment: None,
                authorized_xml: None,
                messages: Vec::new(),
                simulated: false,
            },
        }
    }

    fn synthesized(access_key: &str, environment: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            status: AuthorizationState::Authorized,
            number: Some(access_key.to_string()),
            authorized_at: None,
            environment: Some(environment.to_string()),
            authorized_xml: None,
            messages: Vec::new(),
            simulated: true,
        }
    }
}

/// Client for the SRI offline web services.
///
/// Holds no mutable state; one gateway can serve concurrent submissions.
#[derive(Debug, Clone)]
pub struct SriGateway<T> {
    config: GatewayConfig,
    transport: T,
}

impl<T: SoapTransport> SriGateway<T> {
    pub fn new(config: GatewayConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit a signed document to the reception service.
    ///
    /// A `DEVUELTA` answer is returned as a result, not an error. Transport
    /// and parse failures follow [`GatewayConfig::effective_policy`].
    pub async fn send_receipt(&self, signed_xml: &str) -> Result<ReceptionResult, SriError> {
        let envelope = soap::reception_envelope(signed_xml)?;
        let url = &self.config.endpoints().reception;
        debug!(url = %url, bytes = envelope.len(), "sending document to SRI reception");

        let outcome = match self.transport.post(url, envelope).await {
            Ok(body) => soap::parse_reception_response(&body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(resp) => {
                let result = ReceptionResult::from(resp);
                info!(status = ?result.status, messages = result.messages.len(), "SRI reception answered");
                Ok(result)
            }
            Err(e) => self.on_failure(e, "reception", ReceptionResult::synthesized),
        }
    }

    /// Query the authorization service for one access key.
    ///
    /// The key must be exactly 49 digits; anything else fails with
    /// [`SriError::InvalidAccessKey`] before any request is made.
    pub async fn authorize(&self, access_key: &str) -> Result<AuthorizationResult, SriError> {
        validate_access_key_format(access_key)?;

        let envelope = soap::authorization_envelope(access_key)?;
        let url = &self.config.endpoints().authorization;
        debug!(url = %url, access_key, "querying SRI authorization");

        let outcome = match self.transport.post(url, envelope).await {
            Ok(body) => soap::parse_authorization_response(&body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(resp) => {
                let result = AuthorizationResult::from_response(access_key, resp);
                info!(access_key, status = ?result.status, "SRI authorization answered");
                Ok(result)
            }
            Err(e) => self.on_failure(e, "authorization", || {
                AuthorizationResult::synthesized(access_key, self.config.environment.label())
            }),
        }
    }

    fn on_failure<R>(
        &self,
        error: SriError,
        operation: &str,
        synthesize: impl FnOnce() -> R,
    ) -> Result<R, SriError> {
        match (&error, self.config.effective_policy()) {
            (SriError::Transport(_), TransportFailurePolicy::SynthesizeSuccess) => {
                warn!(
                    operation,
                    error = %error,
                    environment = %self.config.environment,
                    "SRI call failed, synthesizing a successful result"
                );
                Ok(synthesize())
            }
            _ => Err(error),
        }
    }
}
